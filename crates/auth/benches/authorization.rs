use criterion::{Criterion, black_box, criterion_group, criterion_main};

use miliki_auth::{Action, Permission, PermissionTable, Principal, Resource, Role, authorize};
use miliki_core::{OrganizationId, UserId};

fn bench_authorize(c: &mut Criterion) {
    let table = PermissionTable::default();
    let org = OrganizationId::new();
    let principal = Principal {
        user_id: UserId::new(),
        role: Role::Manager,
        active_organization_id: Some(org),
    };

    c.bench_function("authorize/full_table", |b| {
        b.iter(|| {
            for resource in Resource::ALL {
                for action in Action::ALL {
                    let _ = black_box(authorize(
                        &table,
                        Some(&principal),
                        Permission::new(resource, action),
                        Some(org),
                    ));
                }
            }
        })
    });
}

criterion_group!(benches, bench_authorize);
criterion_main!(benches);
