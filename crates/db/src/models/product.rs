use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::repositories::error::RepoError;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: uuid::Uuid,
    pub external_id: i64,
    pub xml_id: Option<String>,
    pub name: String,
    pub price: f64,
    pub currency_id: String,
    pub is_deleted_in_bitrix: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub async fn find_by_xml_id(pool: &PgPool, xml_id: &str) -> Result<Self, RepoError> {
        sqlx::query_as::<_, Product>("SELECT * FROM product WHERE xml_id = $1")
            .bind(xml_id)
            .fetch_optional(pool)
            .await?
            .ok_or(RepoError::NotFound("Product"))
    }

    pub async fn find_by_external_id(pool: &PgPool, external_id: i64) -> Result<Self, RepoError> {
        sqlx::query_as::<_, Product>("SELECT * FROM product WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(pool)
            .await?
            .ok_or(RepoError::NotFound("Product"))
    }

    pub async fn upsert(
        pool: &PgPool,
        external_id: i64,
        xml_id: Option<&str>,
        name: &str,
        price: f64,
        currency_id: &str,
    ) -> Result<Self, RepoError> {
        Ok(sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO product (external_id, xml_id, name, price, currency_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (external_id) DO UPDATE SET
                xml_id = EXCLUDED.xml_id,
                name = EXCLUDED.name,
                price = EXCLUDED.price,
                currency_id = EXCLUDED.currency_id,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(external_id)
        .bind(xml_id)
        .bind(name)
        .bind(price)
        .bind(currency_id)
        .fetch_one(pool)
        .await?)
    }
}
