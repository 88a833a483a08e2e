//! Service-level tests over the in-memory stores.
//!
//! Each test drives `AppServices` the way the HTTP layer does: sign up,
//! resolve the session from the token, run operations and inspect the
//! envelopes.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use miliki_auth::{Role, Session, SessionToken, SignInInput, SignUpInput};
    use miliki_billing::{
        InvoiceStatus, NewInvoiceInput, NewPaymentInput, PaymentMethod, PaymentStatus,
    };
    use miliki_guests::{BookingStatus, NewBookingInput, NewGuestInput};
    use miliki_leasing::{NewTenancyInput, Tenancy, TenancyStatus};
    use miliki_organizations::{NewInvitationInput, NewOrganizationInput, Organization};
    use miliki_properties::{
        NOT_OWNER_MESSAGE, NewPropertyInput, NewUnitInput, Property, PropertyType, Unit, UnitStatus,
    };

    use crate::access::{ActionResult, FailureKind};
    use crate::config::AppConfig;
    use crate::email::LoggingEmailSender;
    use crate::services::{AppServices, TenancyFilter};
    use crate::store::Stores;

    struct Actor {
        token: SessionToken,
    }

    impl Actor {
        async fn session(&self, services: &AppServices) -> Session {
            services
                .resolve_session(&self.token)
                .await
                .expect("session should resolve")
        }
    }

    fn ok<T: std::fmt::Debug>(result: ActionResult<T>) -> T {
        assert!(result.success, "expected success, got: {}", result.message);
        result.data.expect("successful result carries data")
    }

    fn failed<T>(result: ActionResult<T>, kind: FailureKind) -> String {
        assert!(!result.success, "expected failure");
        assert_eq!(result.error, Some(kind), "message: {}", result.message);
        result.message
    }

    async fn sign_up(services: &AppServices, handle: &str) -> Actor {
        let signed_in = ok(services
            .sign_up(SignUpInput {
                email: format!("{handle}@example.com"),
                username: handle.to_string(),
                name: handle.to_string(),
                password: "correct horse battery".to_string(),
            })
            .await);
        Actor {
            token: SessionToken::from_presented(&signed_in.token).unwrap(),
        }
    }

    async fn org_with_owner(services: &AppServices, handle: &str, org_name: &str) -> (Actor, Organization) {
        let owner = sign_up(services, handle).await;
        let session = owner.session(services).await;
        let org = ok(services
            .create_organization(
                Some(&session),
                NewOrganizationInput {
                    name: org_name.to_string(),
                    slug: None,
                },
            )
            .await);
        (owner, org)
    }

    /// Invite `handle` as `role` and have them accept.
    async fn join(services: &AppServices, owner: &Actor, handle: &str, role: Role) -> Actor {
        let member = sign_up(services, handle).await;
        let invitation = ok(services
            .create_invitation(
                Some(&owner.session(services).await),
                NewInvitationInput {
                    email: format!("{handle}@example.com"),
                    role,
                },
            )
            .await);
        ok(services
            .accept_invitation(Some(&member.session(services).await), invitation.id)
            .await);
        member
    }

    fn property_input(name: &str) -> NewPropertyInput {
        NewPropertyInput {
            name: name.to_string(),
            address: "12 Ngong Road".to_string(),
            city: "Nairobi".to_string(),
            property_type: PropertyType::Apartment,
            description: None,
        }
    }

    fn unit_input(number: &str, rent: i64) -> NewUnitInput {
        NewUnitInput {
            unit_number: number.to_string(),
            bedrooms: 2,
            bathrooms: 1,
            rent_amount: rent,
            status: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn property_with_unit(services: &AppServices, session: &Session) -> (Property, Unit) {
        let property = ok(services.create_property(Some(session), property_input("Kilimani Court")).await);
        let unit = ok(services
            .create_unit(Some(session), property.id, unit_input("A1", 45_000))
            .await);
        (property, unit)
    }

    async fn lease(services: &AppServices, session: &Session, unit: &Unit) -> Tenancy {
        ok(services
            .create_tenancy(
                Some(session),
                NewTenancyInput {
                    unit_id: unit.id,
                    tenant_id: session.user_id,
                    start_date: date(2025, 1, 1),
                    end_date: date(2025, 12, 31),
                    rent_amount: None,
                    deposit_amount: 90_000,
                },
            )
            .await)
    }

    #[tokio::test]
    async fn creator_owns_and_activates_new_organization() {
        let services = AppServices::in_memory();
        let (owner, org) = org_with_owner(&services, "amina", "Acme Homes").await;

        let session = owner.session(&services).await;
        assert_eq!(session.active_organization_id, Some(org.id));
        assert_eq!(session.role, Role::Owner);
        assert_eq!(org.slug.as_str(), "acme-homes");

        let mine = ok(services.list_my_organizations(Some(&session)).await);
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].role, Role::Owner);
    }

    #[tokio::test]
    async fn anonymous_callers_are_unauthenticated() {
        let services = AppServices::in_memory();
        let result = services.create_property(None, property_input("Nowhere")).await;
        assert_eq!(result.status_code(), 401);
        failed(services.list_guests(None).await, FailureKind::Unauthenticated);
    }

    #[tokio::test]
    async fn manager_creates_property_but_member_cannot() {
        let services = AppServices::in_memory();
        let (owner, _) = org_with_owner(&services, "amina", "Acme Homes").await;
        let manager = join(&services, &owner, "baraka", Role::Manager).await;
        let member = join(&services, &owner, "chebet", Role::Member).await;

        let property = ok(services
            .create_property(Some(&manager.session(&services).await), property_input("Lavington Villas"))
            .await);
        assert_eq!(property.name, "Lavington Villas");

        let message = failed(
            services
                .create_property(Some(&member.session(&services).await), property_input("Nope"))
                .await,
            FailureKind::Forbidden,
        );
        assert_eq!(message, "You do not have permission to create this property");
    }

    #[tokio::test]
    async fn only_the_owner_may_delete_a_property() {
        let services = AppServices::in_memory();
        let (owner, _) = org_with_owner(&services, "amina", "Acme Homes").await;
        let manager = join(&services, &owner, "baraka", Role::Manager).await;
        let owner_session = owner.session(&services).await;
        let property = ok(services.create_property(Some(&owner_session), property_input("Kilimani Court")).await);

        let result = services
            .delete_property(Some(&manager.session(&services).await), property.id)
            .await;
        assert_eq!(failed(result, FailureKind::Forbidden), NOT_OWNER_MESSAGE);
        ok(services.get_property(Some(&owner_session), property.id).await);

        ok(services.delete_property(Some(&owner_session), property.id).await);
        let gone = services.get_property(Some(&owner_session), property.id).await;
        assert_eq!(failed(gone, FailureKind::NotFound), "Property not found");
    }

    #[tokio::test]
    async fn records_of_another_organization_are_out_of_scope() {
        let services = AppServices::in_memory();
        let (owner_a, _) = org_with_owner(&services, "amina", "Acme Homes").await;
        let (owner_b, _) = org_with_owner(&services, "baraka", "Baraka Estates").await;
        let property = ok(services
            .create_property(Some(&owner_a.session(&services).await), property_input("Kilimani Court"))
            .await);

        let result = services
            .get_property(Some(&owner_b.session(&services).await), property.id)
            .await;
        assert_eq!(
            failed(result, FailureKind::Forbidden),
            "That record belongs to a different organization"
        );
    }

    #[tokio::test]
    async fn empty_lists_succeed() {
        let services = AppServices::in_memory();
        let (owner, org) = org_with_owner(&services, "amina", "Acme Homes").await;
        let session = owner.session(&services).await;
        assert!(ok(services.list_properties(Some(&session), org.slug.as_str()).await).is_empty());
        assert!(ok(services.list_invoices(Some(&session)).await).is_empty());
    }

    #[tokio::test]
    async fn writes_invalidate_cached_reads() {
        let services = AppServices::in_memory();
        let (owner, org) = org_with_owner(&services, "amina", "Acme Homes").await;
        let session = owner.session(&services).await;

        let before = ok(services.list_properties(Some(&session), org.slug.as_str()).await);
        assert!(before.is_empty());
        assert_eq!(services.cache.stats().entries, 1);

        let (property, _) = property_with_unit(&services, &session).await;
        let after = ok(services.list_properties(Some(&session), org.slug.as_str()).await);
        assert_eq!(after.len(), 1);

        let stats = ok(services.property_stats(Some(&session)).await);
        assert_eq!(stats.total_units, 1);
        ok(services
            .create_unit(Some(&session), property.id, unit_input("A2", 50_000))
            .await);
        let stats = ok(services.property_stats(Some(&session)).await);
        assert_eq!(stats.total_units, 2);
    }

    #[tokio::test]
    async fn tenancy_lifecycle_drives_unit_status() {
        let services = AppServices::in_memory();
        let (owner, _) = org_with_owner(&services, "amina", "Acme Homes").await;
        let session = owner.session(&services).await;
        let (property, unit) = property_with_unit(&services, &session).await;
        let tenancy = lease(&services, &session, &unit).await;
        assert_eq!(tenancy.status, TenancyStatus::Pending);
        assert_eq!(tenancy.rent_amount, 45_000);

        ok(services
            .update_tenancy_status(Some(&session), tenancy.id, TenancyStatus::Active)
            .await);
        let occupied = ok(services.get_unit(Some(&session), unit.id).await);
        assert_eq!(occupied.status, UnitStatus::Occupied);

        let blocked = services.delete_property(Some(&session), property.id).await;
        assert!(failed(blocked, FailureKind::Conflict).contains("occupied"));
        failed(services.delete_unit(Some(&session), unit.id).await, FailureKind::Conflict);

        ok(services
            .update_tenancy_status(Some(&session), tenancy.id, TenancyStatus::Expired)
            .await);
        let vacant = ok(services.get_unit(Some(&session), unit.id).await);
        assert_eq!(vacant.status, UnitStatus::Vacant);

        let illegal = services
            .update_tenancy_status(Some(&session), tenancy.id, TenancyStatus::Active)
            .await;
        failed(illegal, FailureKind::Conflict);
    }

    #[tokio::test]
    async fn tenancy_rules_are_enforced() {
        let services = AppServices::in_memory();
        let (owner, _) = org_with_owner(&services, "amina", "Acme Homes").await;
        let session = owner.session(&services).await;
        let (_, unit) = property_with_unit(&services, &session).await;

        let too_short = services
            .create_tenancy(
                Some(&session),
                NewTenancyInput {
                    unit_id: unit.id,
                    tenant_id: session.user_id,
                    start_date: date(2025, 1, 1),
                    end_date: date(2025, 1, 20),
                    rent_amount: None,
                    deposit_amount: 0,
                },
            )
            .await;
        assert_eq!(
            failed(too_short, FailureKind::Validation),
            "Tenancy must last at least 28 days"
        );

        lease(&services, &session, &unit).await;
        let overlapping = services
            .create_tenancy(
                Some(&session),
                NewTenancyInput {
                    unit_id: unit.id,
                    tenant_id: session.user_id,
                    start_date: date(2025, 6, 1),
                    end_date: date(2026, 5, 31),
                    rent_amount: None,
                    deposit_amount: 0,
                },
            )
            .await;
        failed(overlapping, FailureKind::Conflict);

        let filtered = ok(services
            .list_tenancies(Some(&session), TenancyFilter { unit_id: Some(unit.id) })
            .await);
        assert_eq!(filtered.len(), 1);
    }

    #[tokio::test]
    async fn renewed_tenancy_keeps_the_unit_occupied() {
        let services = AppServices::in_memory();
        let (owner, _) = org_with_owner(&services, "amina", "Acme Homes").await;
        let session = owner.session(&services).await;
        let (_, unit) = property_with_unit(&services, &session).await;
        let tenancy = lease(&services, &session, &unit).await;
        for status in [TenancyStatus::Active, TenancyStatus::Renewed] {
            ok(services.update_tenancy_status(Some(&session), tenancy.id, status).await);
        }
        let renewed = ok(services.get_unit(Some(&session), unit.id).await);
        assert_eq!(renewed.status, UnitStatus::Occupied);

        let vacate = services
            .update_unit_status(Some(&session), unit.id, UnitStatus::Vacant)
            .await;
        assert_eq!(
            failed(vacate, FailureKind::Conflict),
            "This unit has an active tenancy; end the tenancy first"
        );

        let overlapping = services
            .create_tenancy(
                Some(&session),
                NewTenancyInput {
                    unit_id: unit.id,
                    tenant_id: session.user_id,
                    start_date: date(2025, 6, 1),
                    end_date: date(2026, 5, 31),
                    rent_amount: None,
                    deposit_amount: 0,
                },
            )
            .await;
        assert!(failed(overlapping, FailureKind::Conflict).contains("RENEWED"));

        let delete = services.delete_unit(Some(&session), unit.id).await;
        assert_eq!(
            failed(delete, FailureKind::Conflict),
            "Cannot delete a unit with a pending, active or renewed tenancy (1 found)"
        );

        ok(services
            .update_tenancy_status(Some(&session), tenancy.id, TenancyStatus::Expired)
            .await);
        let ended = ok(services.get_unit(Some(&session), unit.id).await);
        assert_eq!(ended.status, UnitStatus::Vacant);
    }

    #[tokio::test]
    async fn ended_tenancies_do_not_block_deletion_unless_invoiced() {
        let services = AppServices::in_memory();
        let (owner, _) = org_with_owner(&services, "amina", "Acme Homes").await;
        let session = owner.session(&services).await;
        let (property, first) = property_with_unit(&services, &session).await;
        let second = ok(services
            .create_unit(Some(&session), property.id, unit_input("A2", 50_000))
            .await);

        let expired = lease(&services, &session, &first).await;
        for status in [TenancyStatus::Active, TenancyStatus::Expired] {
            ok(services.update_tenancy_status(Some(&session), expired.id, status).await);
        }
        ok(services.delete_unit(Some(&session), first.id).await);
        let remaining = ok(services
            .list_tenancies(Some(&session), TenancyFilter { unit_id: Some(first.id) })
            .await);
        assert!(remaining.is_empty());

        let cancelled = lease(&services, &session, &second).await;
        let invoice = ok(services
            .create_invoice(
                Some(&session),
                NewInvoiceInput {
                    tenancy_id: cancelled.id,
                    amount: None,
                    due_date: date(2025, 1, 5),
                    description: None,
                },
            )
            .await);
        ok(services
            .update_tenancy_status(Some(&session), cancelled.id, TenancyStatus::Cancelled)
            .await);

        let blocked = services.delete_property(Some(&session), property.id).await;
        assert_eq!(
            failed(blocked, FailureKind::Conflict),
            "Cannot delete a property whose past tenancies have invoices (1 invoiced); delete those invoices first"
        );

        ok(services.delete_invoice(Some(&session), invoice.id).await);
        ok(services.delete_property(Some(&session), property.id).await);
        assert!(ok(services.list_tenancies(Some(&session), TenancyFilter::default()).await).is_empty());
    }

    #[tokio::test]
    async fn payment_tenancy_must_match_its_invoice() {
        let services = AppServices::in_memory();
        let (owner, _) = org_with_owner(&services, "amina", "Acme Homes").await;
        let session = owner.session(&services).await;
        let (property, unit) = property_with_unit(&services, &session).await;
        let other_unit = ok(services
            .create_unit(Some(&session), property.id, unit_input("A2", 50_000))
            .await);
        let tenancy = lease(&services, &session, &unit).await;
        let other = lease(&services, &session, &other_unit).await;
        let invoice = ok(services
            .create_invoice(
                Some(&session),
                NewInvoiceInput {
                    tenancy_id: tenancy.id,
                    amount: None,
                    due_date: date(2025, 2, 1),
                    description: None,
                },
            )
            .await);
        let pay = |tenancy_id| NewPaymentInput {
            invoice_id: Some(invoice.id),
            tenancy_id: Some(tenancy_id),
            guest_id: None,
            amount: 5_000,
            method: PaymentMethod::BankTransfer,
            status: None,
            reference: None,
        };

        let mismatched = services.record_payment(Some(&session), pay(other.id)).await;
        assert_eq!(
            failed(mismatched, FailureKind::Validation),
            "Tenancy does not match the invoice's tenancy"
        );
        let matched = ok(services.record_payment(Some(&session), pay(tenancy.id)).await);
        assert_eq!(matched.tenancy_id, Some(tenancy.id));
    }

    #[tokio::test]
    async fn payments_settle_and_reopen_invoices() {
        let services = AppServices::in_memory();
        let (owner, _) = org_with_owner(&services, "amina", "Acme Homes").await;
        let session = owner.session(&services).await;
        let (_, unit) = property_with_unit(&services, &session).await;
        let tenancy = lease(&services, &session, &unit).await;

        let invoice = ok(services
            .create_invoice(
                Some(&session),
                NewInvoiceInput {
                    tenancy_id: tenancy.id,
                    amount: None,
                    due_date: date(2025, 2, 1),
                    description: Some("February rent".into()),
                },
            )
            .await);
        assert_eq!(invoice.amount, 45_000);

        let pay = |amount: i64| NewPaymentInput {
            invoice_id: Some(invoice.id),
            tenancy_id: None,
            guest_id: None,
            amount,
            method: PaymentMethod::MobileMoney,
            status: Some(PaymentStatus::Completed),
            reference: None,
        };

        let too_much = services.record_payment(Some(&session), pay(50_000)).await;
        assert!(failed(too_much, FailureKind::Conflict).contains("exceeds the outstanding balance"));

        ok(services.record_payment(Some(&session), pay(20_000)).await);
        let partial = ok(services.get_invoice(Some(&session), invoice.id).await);
        assert_eq!(partial.status, InvoiceStatus::Pending);

        let last = ok(services.record_payment(Some(&session), pay(25_000)).await);
        assert_eq!(last.tenancy_id, Some(tenancy.id));
        let paid = ok(services.get_invoice(Some(&session), invoice.id).await);
        assert_eq!(paid.status, InvoiceStatus::Paid);

        ok(services
            .update_payment_status(Some(&session), last.id, PaymentStatus::Refunded)
            .await);
        // due 2025-02-01, long past
        let reopened = ok(services.get_invoice(Some(&session), invoice.id).await);
        assert_eq!(reopened.status, InvoiceStatus::Overdue);

        ok(services.record_payment(Some(&session), pay(25_000)).await);
        let settled_again = ok(services.get_invoice(Some(&session), invoice.id).await);
        assert_eq!(settled_again.status, InvoiceStatus::Paid);

        failed(
            services.delete_invoice(Some(&session), invoice.id).await,
            FailureKind::Conflict,
        );
    }

    #[tokio::test]
    async fn duplicate_guests_return_the_existing_record() {
        let services = AppServices::in_memory();
        let host = sign_up(&services, "amina").await;
        let session = host.session(&services).await;
        let guest = |phone: &str, email: Option<&str>| NewGuestInput {
            name: "Wanjiru Mwangi".into(),
            phone: phone.into(),
            email: email.map(Into::into),
            id_number: None,
            notes: None,
        };

        let first = ok(services
            .create_guest(Some(&session), guest("+254 712 345 678", Some("wanjiru@example.com")))
            .await);

        let dup_phone = services
            .create_guest(Some(&session), guest("+254712345678", None))
            .await;
        assert_eq!(dup_phone.existing.as_ref().unwrap()["id"], first.id.to_string());
        assert_eq!(
            failed(dup_phone, FailureKind::Conflict),
            "A guest with this phone number already exists"
        );

        let dup_email = services
            .create_guest(Some(&session), guest("+254700000001", Some("WANJIRU@example.com")))
            .await;
        assert_eq!(
            failed(dup_email, FailureKind::Conflict),
            "A guest with this email already exists"
        );

        let other_host = sign_up(&services, "baraka").await;
        ok(services
            .create_guest(
                Some(&other_host.session(&services).await),
                guest("+254 712 345 678", None),
            )
            .await);
    }

    #[tokio::test]
    async fn guest_deletion_lists_every_blocker() {
        let services = AppServices::in_memory();
        let (owner, _) = org_with_owner(&services, "amina", "Acme Homes").await;
        let session = owner.session(&services).await;
        let guest = ok(services
            .create_guest(
                Some(&session),
                NewGuestInput {
                    name: "Otieno".into(),
                    phone: "0722 000 111".into(),
                    email: None,
                    id_number: None,
                    notes: None,
                },
            )
            .await);
        let booking = ok(services
            .create_booking(
                Some(&session),
                guest.id,
                NewBookingInput {
                    unit_id: None,
                    check_in: date(2025, 8, 1),
                    check_out: date(2025, 8, 4),
                },
            )
            .await);
        let payment = ok(services
            .record_payment(
                Some(&session),
                NewPaymentInput {
                    invoice_id: None,
                    tenancy_id: None,
                    guest_id: Some(guest.id),
                    amount: 12_000,
                    method: PaymentMethod::Cash,
                    status: None,
                    reference: None,
                },
            )
            .await);

        let blocked = services.delete_guest(Some(&session), guest.id).await;
        assert_eq!(
            failed(blocked, FailureKind::Conflict),
            "Cannot delete this guest: 1 pending booking, 1 pending payment"
        );

        ok(services
            .update_booking_status(Some(&session), booking.id, BookingStatus::Cancelled)
            .await);
        ok(services
            .update_payment_status(Some(&session), payment.id, PaymentStatus::Failed)
            .await);
        ok(services.delete_guest(Some(&session), guest.id).await);
        assert!(ok(services.list_guests(Some(&session)).await).is_empty());
    }

    #[tokio::test]
    async fn bookings_check_unit_scope_maintenance_and_calendar() {
        let services = AppServices::in_memory();
        let (owner, _) = org_with_owner(&services, "amina", "Acme Homes").await;
        let session = owner.session(&services).await;
        let (_, unit) = property_with_unit(&services, &session).await;
        let guest_input = || NewGuestInput {
            name: "Otieno".into(),
            phone: "0722 000 111".into(),
            email: None,
            id_number: None,
            notes: None,
        };
        let stay = |check_in, check_out| NewBookingInput {
            unit_id: Some(unit.id),
            check_in,
            check_out,
        };

        let (outsider, _) = org_with_owner(&services, "baraka", "Baraka Estates").await;
        let outsider = outsider.session(&services).await;
        let their_guest = ok(services.create_guest(Some(&outsider), guest_input()).await);
        let foreign = services
            .create_booking(Some(&outsider), their_guest.id, stay(date(2025, 8, 1), date(2025, 8, 4)))
            .await;
        assert_eq!(
            failed(foreign, FailureKind::Forbidden),
            "That record belongs to a different organization"
        );

        let guest = ok(services.create_guest(Some(&session), guest_input()).await);
        ok(services
            .create_booking(Some(&session), guest.id, stay(date(2025, 8, 1), date(2025, 8, 4)))
            .await);
        let double = services
            .create_booking(Some(&session), guest.id, stay(date(2025, 8, 3), date(2025, 8, 6)))
            .await;
        assert_eq!(
            failed(double, FailureKind::Conflict),
            "This unit is already booked for some of these nights"
        );
        ok(services
            .create_booking(Some(&session), guest.id, stay(date(2025, 8, 4), date(2025, 8, 6)))
            .await);

        ok(services
            .update_unit_status(Some(&session), unit.id, UnitStatus::Maintenance)
            .await);
        let closed = services
            .create_booking(Some(&session), guest.id, stay(date(2025, 9, 1), date(2025, 9, 3)))
            .await;
        assert_eq!(
            failed(closed, FailureKind::Conflict),
            "This unit is under maintenance and cannot be booked"
        );
    }

    #[tokio::test]
    async fn invitations_are_mailed_and_bound_to_the_invitee() {
        let mailer = Arc::new(LoggingEmailSender::new());
        let services = AppServices::new(AppConfig::default(), Stores::in_memory(), mailer.clone());
        let (owner, org) = org_with_owner(&services, "amina", "Acme Homes").await;
        let outsider = sign_up(&services, "zawadi").await;

        let invitation = ok(services
            .create_invitation(
                Some(&owner.session(&services).await),
                NewInvitationInput {
                    email: "baraka@example.com".into(),
                    role: Role::Manager,
                },
            )
            .await);
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "baraka@example.com");
        assert!(sent[0].text.contains(&invitation.id.to_string()));

        let wrong = services
            .accept_invitation(Some(&outsider.session(&services).await), invitation.id)
            .await;
        assert!(failed(wrong, FailureKind::Conflict).contains("different email"));

        let invitee = sign_up(&services, "baraka").await;
        ok(services
            .accept_invitation(Some(&invitee.session(&services).await), invitation.id)
            .await);
        let session = invitee.session(&services).await;
        assert_eq!(session.active_organization_id, Some(org.id));
        assert_eq!(session.role, Role::Manager);

        let again = services.accept_invitation(Some(&session), invitation.id).await;
        failed(again, FailureKind::Conflict);
    }

    #[tokio::test]
    async fn the_last_owner_stays() {
        let services = AppServices::in_memory();
        let (owner, _) = org_with_owner(&services, "amina", "Acme Homes").await;
        let session = owner.session(&services).await;

        let demote = services
            .update_member_role(Some(&session), session.user_id, Role::Manager)
            .await;
        assert_eq!(
            failed(demote, FailureKind::Conflict),
            "An organization must keep at least one owner"
        );
        failed(
            services.remove_member(Some(&session), session.user_id).await,
            FailureKind::Conflict,
        );

        let manager = join(&services, &owner, "baraka", Role::Manager).await;
        let manager_id = manager.session(&services).await.user_id;
        ok(services
            .update_member_role(Some(&session), manager_id, Role::Owner)
            .await);
        assert_eq!(manager.session(&services).await.role, Role::Owner);
        let members = ok(services.list_members(Some(&session)).await);
        assert_eq!(members.len(), 2);
    }

    #[tokio::test]
    async fn organizations_with_properties_cannot_be_deleted() {
        let services = AppServices::in_memory();
        let (owner, org) = org_with_owner(&services, "amina", "Acme Homes").await;
        let session = owner.session(&services).await;
        let property = ok(services.create_property(Some(&session), property_input("Kilimani Court")).await);

        failed(
            services.delete_organization(Some(&session), org.id).await,
            FailureKind::Conflict,
        );
        ok(services.delete_property(Some(&session), property.id).await);
        ok(services.delete_organization(Some(&session), org.id).await);

        let session = owner.session(&services).await;
        assert_eq!(session.active_organization_id, None);
        assert!(ok(services.list_my_organizations(Some(&session)).await).is_empty());
    }

    #[tokio::test]
    async fn sign_in_checks_the_password() {
        let services = AppServices::in_memory();
        let (_, org) = org_with_owner(&services, "amina", "Acme Homes").await;

        let wrong = services
            .sign_in(SignInInput {
                email: "amina@example.com".into(),
                password: "not the password".into(),
            })
            .await;
        assert_eq!(failed(wrong, FailureKind::Unauthenticated), "Invalid email or password");

        let signed_in = ok(services
            .sign_in(SignInInput {
                email: "AMINA@example.com".into(),
                password: "correct horse battery".into(),
            })
            .await);
        assert_eq!(signed_in.session.active_organization_id, Some(org.id));

        let token = SessionToken::from_presented(&signed_in.token).unwrap();
        let session = services.resolve_session(&token).await.unwrap();
        ok(services.sign_out(Some(&session)).await);
        assert!(services.resolve_session(&token).await.is_none());
    }
}
