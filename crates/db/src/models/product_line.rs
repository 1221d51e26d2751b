use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::repositories::error::RepoError;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProductLine {
    pub id: uuid::Uuid,
    pub external_id: i64,
    pub deal_external_id: i64,
    pub product_external_id: i64,
    pub product_name: String,
    pub price: f64,
    pub quantity: f64,
    pub discount_rate: Option<f64>,
    pub is_deleted_in_bitrix: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ProductLineRow {
    pub external_id: i64,
    pub product_external_id: i64,
    pub product_name: String,
    pub price: f64,
    pub quantity: f64,
    pub discount_rate: Option<f64>,
}

impl ProductLine {
    pub async fn list_for_deal(pool: &PgPool, deal_external_id: i64) -> Result<Vec<Self>, RepoError> {
        Ok(sqlx::query_as::<_, ProductLine>(
            "SELECT * FROM product_line WHERE deal_external_id = $1 ORDER BY created_at",
        )
        .bind(deal_external_id)
        .fetch_all(pool)
        .await?)
    }

    /// Replaces every row for the deal (mirrors `crm.item.productrow.set`,
    /// spec §4.9 step 4 — a full replace, not a per-row diff).
    pub async fn replace_for_deal(
        pool: &PgPool,
        deal_external_id: i64,
        rows: Vec<ProductLineRow>,
    ) -> Result<Vec<Self>, RepoError> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM product_line WHERE deal_external_id = $1")
            .bind(deal_external_id)
            .execute(&mut *tx)
            .await?;

        let mut saved = Vec::with_capacity(rows.len());
        for row in rows {
            let inserted = sqlx::query_as::<_, ProductLine>(
                r#"
                INSERT INTO product_line
                    (external_id, deal_external_id, product_external_id, product_name, price, quantity, discount_rate)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
                "#,
            )
            .bind(row.external_id)
            .bind(deal_external_id)
            .bind(row.product_external_id)
            .bind(&row.product_name)
            .bind(row.price)
            .bind(row.quantity)
            .bind(row.discount_rate)
            .fetch_one(&mut *tx)
            .await?;
            saved.push(inserted);
        }

        tx.commit().await?;
        Ok(saved)
    }
}
