use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, error::DatabaseError};

use crate::repositories::error::RepoError;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Deal {
    pub id: uuid::Uuid,
    pub external_id: i64,
    pub title: String,
    pub category_id: i32,
    pub stage_id: String,
    pub status_deal: String,
    pub opportunity: f64,
    pub probability: Option<i32>,
    pub currency_id: String,
    pub company_external_id: Option<i64>,
    pub contact_external_id: Option<i64>,
    pub lead_external_id: Option<i64>,
    pub assigned_by_external_id: i64,
    pub created_by_external_id: i64,
    pub modify_by_external_id: Option<i64>,
    pub moved_by_external_id: Option<i64>,
    pub last_activity_by_external_id: Option<i64>,
    pub begin_date: Option<NaiveDate>,
    pub close_date: Option<NaiveDate>,
    pub moved_date: Option<NaiveDate>,
    pub comments: Option<String>,
    pub is_deleted_in_bitrix: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deal {
    pub fn is_main_funnel(&self) -> bool {
        self.category_id == 0
    }
}

/// Sparse patch applied by both `create` and `update` — mirrors the original's
/// `data.dump(exclude_unset=true)` (spec §4.4): fields left `None` are not
/// written.
#[derive(Debug, Default, Clone)]
pub struct DealData {
    pub title: Option<String>,
    pub category_id: Option<i32>,
    pub stage_id: Option<String>,
    pub status_deal: Option<String>,
    pub opportunity: Option<f64>,
    pub probability: Option<i32>,
    pub currency_id: Option<String>,
    pub company_external_id: Option<i64>,
    pub contact_external_id: Option<i64>,
    pub lead_external_id: Option<i64>,
    pub assigned_by_external_id: Option<i64>,
    pub created_by_external_id: Option<i64>,
    pub modify_by_external_id: Option<i64>,
    pub moved_by_external_id: Option<i64>,
    pub last_activity_by_external_id: Option<i64>,
    pub begin_date: Option<NaiveDate>,
    pub close_date: Option<NaiveDate>,
    pub moved_date: Option<NaiveDate>,
    pub comments: Option<String>,
}

impl Deal {
    pub async fn exists(pool: &PgPool, external_id: i64) -> Result<bool, RepoError> {
        let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM deal WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn find_by_external_id(pool: &PgPool, external_id: i64) -> Result<Option<Self>, RepoError> {
        Ok(sqlx::query_as::<_, Deal>("SELECT * FROM deal WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(pool)
            .await?)
    }

    pub async fn create(pool: &PgPool, external_id: i64, data: DealData) -> Result<Self, RepoError> {
        if Self::exists(pool, external_id).await? {
            return Err(RepoError::Conflict("Deal", external_id));
        }
        sqlx::query_as::<_, Deal>(
            r#"
            INSERT INTO deal (
                external_id, title, category_id, stage_id, status_deal, opportunity, probability,
                currency_id, company_external_id, contact_external_id, lead_external_id,
                assigned_by_external_id, created_by_external_id, modify_by_external_id,
                moved_by_external_id, last_activity_by_external_id, begin_date, close_date,
                moved_date, comments
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            RETURNING *
            "#,
        )
        .bind(external_id)
        .bind(data.title.unwrap_or_default())
        .bind(data.category_id.unwrap_or(0))
        .bind(data.stage_id.unwrap_or_else(|| "NEW".to_string()))
        .bind(data.status_deal.unwrap_or_else(|| "NEW".to_string()))
        .bind(data.opportunity.unwrap_or(0.0))
        .bind(data.probability)
        .bind(data.currency_id.unwrap_or_else(|| "RUB".to_string()))
        .bind(data.company_external_id)
        .bind(data.contact_external_id)
        .bind(data.lead_external_id)
        .bind(data.assigned_by_external_id.unwrap_or_default())
        .bind(data.created_by_external_id.unwrap_or_default())
        .bind(data.modify_by_external_id)
        .bind(data.moved_by_external_id)
        .bind(data.last_activity_by_external_id)
        .bind(data.begin_date)
        .bind(data.close_date)
        .bind(data.moved_date)
        .bind(data.comments)
        .fetch_one(pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                RepoError::Conflict("Deal", external_id)
            }
            _ => RepoError::Database(e),
        })
    }

    pub async fn update(pool: &PgPool, external_id: i64, data: DealData) -> Result<Self, RepoError> {
        sqlx::query_as::<_, Deal>(
            r#"
            UPDATE deal SET
                title = COALESCE($2, title),
                category_id = COALESCE($3, category_id),
                stage_id = COALESCE($4, stage_id),
                status_deal = COALESCE($5, status_deal),
                opportunity = COALESCE($6, opportunity),
                probability = COALESCE($7, probability),
                currency_id = COALESCE($8, currency_id),
                company_external_id = COALESCE($9, company_external_id),
                contact_external_id = COALESCE($10, contact_external_id),
                lead_external_id = COALESCE($11, lead_external_id),
                assigned_by_external_id = COALESCE($12, assigned_by_external_id),
                created_by_external_id = COALESCE($13, created_by_external_id),
                modify_by_external_id = COALESCE($14, modify_by_external_id),
                moved_by_external_id = COALESCE($15, moved_by_external_id),
                last_activity_by_external_id = COALESCE($16, last_activity_by_external_id),
                begin_date = COALESCE($17, begin_date),
                close_date = COALESCE($18, close_date),
                moved_date = COALESCE($19, moved_date),
                comments = COALESCE($20, comments),
                updated_at = now()
            WHERE external_id = $1
            RETURNING *
            "#,
        )
        .bind(external_id)
        .bind(data.title)
        .bind(data.category_id)
        .bind(data.stage_id)
        .bind(data.status_deal)
        .bind(data.opportunity)
        .bind(data.probability)
        .bind(data.currency_id)
        .bind(data.company_external_id)
        .bind(data.contact_external_id)
        .bind(data.lead_external_id)
        .bind(data.assigned_by_external_id)
        .bind(data.created_by_external_id)
        .bind(data.modify_by_external_id)
        .bind(data.moved_by_external_id)
        .bind(data.last_activity_by_external_id)
        .bind(data.begin_date)
        .bind(data.close_date)
        .bind(data.moved_date)
        .bind(data.comments)
        .fetch_optional(pool)
        .await?
        .ok_or(RepoError::NotFound("Deal"))
    }

    pub async fn set_deleted_in_bitrix(pool: &PgPool, external_id: i64, flag: bool) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE deal SET is_deleted_in_bitrix = $2, updated_at = now() WHERE external_id = $1",
        )
        .bind(external_id)
        .bind(flag)
        .execute(pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound("Deal"));
        }
        Ok(())
    }

    /// Tally of deals in the prospective semantic stage per assigned manager,
    /// restricted to `manager_external_ids` (spec §4.9 step 2). Managers with
    /// zero prospective deals are present with a count of 0.
    pub async fn tally_prospective_by_assigned(
        pool: &PgPool,
        manager_external_ids: &[i64],
    ) -> Result<HashMap<i64, i64>, RepoError> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT d.assigned_by_external_id, COUNT(*) as cnt
            FROM deal d
            JOIN deal_stage ds ON ds.external_id = d.stage_id
            WHERE ds.semantic_id = 'P' AND d.assigned_by_external_id = ANY($1)
            GROUP BY d.assigned_by_external_id
            "#,
        )
        .bind(manager_external_ids)
        .fetch_all(pool)
        .await?;

        let mut tally: HashMap<i64, i64> = manager_external_ids.iter().map(|id| (*id, 0)).collect();
        for (manager_id, count) in rows {
            tally.insert(manager_id, count);
        }
        Ok(tally)
    }
}
