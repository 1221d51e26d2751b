use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::repositories::error::RepoError;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProductAgreementSupervisor {
    pub id: uuid::Uuid,
    pub deal_external_id: i64,
    pub supervisor_external_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductAgreementSupervisor {
    pub async fn list_for_deal(pool: &PgPool, deal_external_id: i64) -> Result<Vec<Self>, RepoError> {
        Ok(sqlx::query_as::<_, ProductAgreementSupervisor>(
            "SELECT * FROM product_agreement_supervisor WHERE deal_external_id = $1 ORDER BY created_at",
        )
        .bind(deal_external_id)
        .fetch_all(pool)
        .await?)
    }

    pub async fn add(
        pool: &PgPool,
        deal_external_id: i64,
        supervisor_external_id: i64,
    ) -> Result<Self, RepoError> {
        Ok(sqlx::query_as::<_, ProductAgreementSupervisor>(
            r#"
            INSERT INTO product_agreement_supervisor (deal_external_id, supervisor_external_id)
            VALUES ($1, $2)
            ON CONFLICT (deal_external_id, supervisor_external_id) DO UPDATE SET updated_at = now()
            RETURNING *
            "#,
        )
        .bind(deal_external_id)
        .bind(supervisor_external_id)
        .fetch_one(pool)
        .await?)
    }
}
