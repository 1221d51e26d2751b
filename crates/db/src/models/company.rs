use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::repositories::error::RepoError;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Company {
    pub id: uuid::Uuid,
    pub external_id: i64,
    pub title: String,
    pub assigned_by_external_id: i64,
    pub created_by_external_id: i64,
    pub is_deleted_in_bitrix: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct CompanyData {
    pub title: Option<String>,
    pub assigned_by_external_id: Option<i64>,
    pub created_by_external_id: Option<i64>,
}

impl Company {
    pub async fn exists(pool: &PgPool, external_id: i64) -> Result<bool, RepoError> {
        let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM company WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn find_by_external_id(pool: &PgPool, external_id: i64) -> Result<Self, RepoError> {
        sqlx::query_as::<_, Company>("SELECT * FROM company WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(pool)
            .await?
            .ok_or(RepoError::NotFound("Company"))
    }

    pub async fn create(pool: &PgPool, external_id: i64, data: CompanyData) -> Result<Self, RepoError> {
        if Self::exists(pool, external_id).await? {
            return Err(RepoError::Conflict("Company", external_id));
        }
        Ok(sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO company (external_id, title, assigned_by_external_id, created_by_external_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(external_id)
        .bind(data.title.unwrap_or_default())
        .bind(data.assigned_by_external_id.unwrap_or_default())
        .bind(data.created_by_external_id.unwrap_or_default())
        .fetch_one(pool)
        .await?)
    }

    pub async fn update(pool: &PgPool, external_id: i64, data: CompanyData) -> Result<Self, RepoError> {
        sqlx::query_as::<_, Company>(
            r#"
            UPDATE company SET
                title = COALESCE($2, title),
                assigned_by_external_id = COALESCE($3, assigned_by_external_id),
                created_by_external_id = COALESCE($4, created_by_external_id),
                updated_at = now()
            WHERE external_id = $1
            RETURNING *
            "#,
        )
        .bind(external_id)
        .bind(data.title)
        .bind(data.assigned_by_external_id)
        .bind(data.created_by_external_id)
        .fetch_optional(pool)
        .await?
        .ok_or(RepoError::NotFound("Company"))
    }

    pub async fn set_deleted_in_bitrix(pool: &PgPool, external_id: i64, flag: bool) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE company SET is_deleted_in_bitrix = $2, updated_at = now() WHERE external_id = $1",
        )
        .bind(external_id)
        .bind(flag)
        .execute(pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound("Company"));
        }
        Ok(())
    }
}
