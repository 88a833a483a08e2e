//! Application services: one method per catalog operation.
//!
//! Every method is a thin composition of domain rules and store calls run
//! through [`AppServices::run`], so each returns an [`ActionResult`] and
//! never an error.
//!
//! [`ActionResult`]: crate::access::ActionResult

use std::sync::Arc;

use anyhow::Context;
use miliki_auth::PermissionTable;
use miliki_core::UserId;

use crate::cache::TagCache;
use crate::catalog::{TagIds, TagKind};
use crate::config::AppConfig;
use crate::email::{EmailSender, LoggingEmailSender, sender_from_config};
use crate::store::{PgStore, Stores};

mod auth;
mod billing;
mod guests;
mod leasing;
mod organizations;
mod properties;

pub use auth::SignedIn;
pub use leasing::TenancyFilter;

pub struct AppServices {
    pub stores: Stores,
    pub cache: TagCache,
    pub permissions: PermissionTable,
    pub email: Arc<dyn EmailSender>,
    pub config: AppConfig,
}

impl AppServices {
    pub fn new(config: AppConfig, stores: Stores, email: Arc<dyn EmailSender>) -> Self {
        Self {
            cache: TagCache::new(config.cache_ttl),
            permissions: PermissionTable::default(),
            stores,
            email,
            config,
        }
    }

    /// Postgres when `DATABASE_URL` is set (schema applied on connect),
    /// in-memory stores otherwise.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let stores = match &config.database_url {
            Some(url) => {
                let pg = PgStore::connect(url, 10)
                    .await
                    .context("failed to connect to Postgres")?;
                pg.apply_schema().await.context("failed to apply schema")?;
                tracing::info!("using Postgres stores");
                Stores::from_backend(Arc::new(pg))
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory stores");
                Stores::in_memory()
            }
        };
        let email = sender_from_config(&config.email);
        Ok(Self::new(config, stores, email))
    }

    /// In-memory stores and a logging mailer.
    pub fn in_memory() -> Self {
        Self::new(
            AppConfig::default(),
            Stores::in_memory(),
            Arc::new(LoggingEmailSender::new()),
        )
    }

    /// Drop per-user cached reads for users other than the actor, whose tags
    /// the wrapper already renders.
    fn invalidate_for_users(&self, kind: TagKind, users: impl IntoIterator<Item = UserId>) {
        let tags: Vec<String> = users
            .into_iter()
            .filter_map(|u| kind.render(&TagIds::default().user(u)))
            .collect();
        if !tags.is_empty() {
            self.cache.invalidate(&tags);
        }
    }
}
