use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::repositories::error::RepoError;

/// The configured pool of managers eligible for site-request assignment
/// (spec §4.9 step 2). `iteration_order` breaks ties on equal deal tallies.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Manager {
    pub id: uuid::Uuid,
    pub external_id: i64,
    pub user_external_id: i64,
    pub iteration_order: i32,
    pub is_deleted_in_bitrix: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Manager {
    pub async fn list_active_in_order(pool: &PgPool) -> Result<Vec<Self>, RepoError> {
        Ok(sqlx::query_as::<_, Manager>(
            "SELECT * FROM manager WHERE is_deleted_in_bitrix = false ORDER BY iteration_order",
        )
        .fetch_all(pool)
        .await?)
    }
}
