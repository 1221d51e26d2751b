use std::sync::Arc;

use sqlx::PgPool;

use config::Config;
use crm_client::CrmClient;
use lock::LockService;

/// Shared application state, the Rust-native replacement for the teacher's
/// `DeploymentImpl` handle: every route gets a cheap clone of this, backed by
/// a connection pool and an `Arc`'d lock table.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: PgPool,
    pub crm: Arc<CrmClient>,
    pub locks: Arc<LockService>,
}
