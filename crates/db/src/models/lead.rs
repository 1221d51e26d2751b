use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::repositories::error::RepoError;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lead {
    pub id: uuid::Uuid,
    pub external_id: i64,
    pub title: String,
    pub status_id: Option<String>,
    pub assigned_by_external_id: i64,
    pub created_by_external_id: i64,
    pub is_deleted_in_bitrix: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct LeadData {
    pub title: Option<String>,
    pub status_id: Option<String>,
    pub assigned_by_external_id: Option<i64>,
    pub created_by_external_id: Option<i64>,
}

impl Lead {
    pub async fn exists(pool: &PgPool, external_id: i64) -> Result<bool, RepoError> {
        let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM lead WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn find_by_external_id(pool: &PgPool, external_id: i64) -> Result<Self, RepoError> {
        sqlx::query_as::<_, Lead>("SELECT * FROM lead WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(pool)
            .await?
            .ok_or(RepoError::NotFound("Lead"))
    }

    pub async fn create(pool: &PgPool, external_id: i64, data: LeadData) -> Result<Self, RepoError> {
        if Self::exists(pool, external_id).await? {
            return Err(RepoError::Conflict("Lead", external_id));
        }
        Ok(sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO lead (external_id, title, status_id, assigned_by_external_id, created_by_external_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(external_id)
        .bind(data.title.unwrap_or_default())
        .bind(data.status_id)
        .bind(data.assigned_by_external_id.unwrap_or_default())
        .bind(data.created_by_external_id.unwrap_or_default())
        .fetch_one(pool)
        .await?)
    }

    pub async fn update(pool: &PgPool, external_id: i64, data: LeadData) -> Result<Self, RepoError> {
        sqlx::query_as::<_, Lead>(
            r#"
            UPDATE lead SET
                title = COALESCE($2, title),
                status_id = COALESCE($3, status_id),
                assigned_by_external_id = COALESCE($4, assigned_by_external_id),
                created_by_external_id = COALESCE($5, created_by_external_id),
                updated_at = now()
            WHERE external_id = $1
            RETURNING *
            "#,
        )
        .bind(external_id)
        .bind(data.title)
        .bind(data.status_id)
        .bind(data.assigned_by_external_id)
        .bind(data.created_by_external_id)
        .fetch_optional(pool)
        .await?
        .ok_or(RepoError::NotFound("Lead"))
    }

    pub async fn set_deleted_in_bitrix(pool: &PgPool, external_id: i64, flag: bool) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE lead SET is_deleted_in_bitrix = $2, updated_at = now() WHERE external_id = $1",
        )
        .bind(external_id)
        .bind(flag)
        .execute(pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound("Lead"));
        }
        Ok(())
    }
}
