use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::repositories::error::RepoError;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AdditionalInfo {
    pub id: uuid::Uuid,
    pub deal_external_id: i64,
    pub note: Option<String>,
    pub source_site_order: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AdditionalInfo {
    pub async fn find_for_deal(pool: &PgPool, deal_external_id: i64) -> Result<Option<Self>, RepoError> {
        Ok(
            sqlx::query_as::<_, AdditionalInfo>("SELECT * FROM additional_info WHERE deal_external_id = $1")
                .bind(deal_external_id)
                .fetch_optional(pool)
                .await?,
        )
    }

    pub async fn upsert(
        pool: &PgPool,
        deal_external_id: i64,
        note: Option<&str>,
        source_site_order: Option<&str>,
    ) -> Result<Self, RepoError> {
        Ok(sqlx::query_as::<_, AdditionalInfo>(
            r#"
            INSERT INTO additional_info (deal_external_id, note, source_site_order)
            VALUES ($1, $2, $3)
            ON CONFLICT (deal_external_id) DO UPDATE SET
                note = EXCLUDED.note,
                source_site_order = EXCLUDED.source_site_order,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(deal_external_id)
        .bind(note)
        .bind(source_site_order)
        .fetch_one(pool)
        .await?)
    }
}
