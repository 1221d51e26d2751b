use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::repositories::error::RepoError;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Contact {
    pub id: uuid::Uuid,
    pub external_id: i64,
    pub name: String,
    pub last_name: Option<String>,
    pub assigned_by_external_id: i64,
    pub created_by_external_id: i64,
    pub company_external_id: Option<i64>,
    pub is_deleted_in_bitrix: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ContactData {
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub assigned_by_external_id: Option<i64>,
    pub created_by_external_id: Option<i64>,
    pub company_external_id: Option<i64>,
}

impl Contact {
    pub async fn exists(pool: &PgPool, external_id: i64) -> Result<bool, RepoError> {
        let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM contact WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn find_by_external_id(pool: &PgPool, external_id: i64) -> Result<Self, RepoError> {
        sqlx::query_as::<_, Contact>("SELECT * FROM contact WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(pool)
            .await?
            .ok_or(RepoError::NotFound("Contact"))
    }

    pub async fn create(pool: &PgPool, external_id: i64, data: ContactData) -> Result<Self, RepoError> {
        if Self::exists(pool, external_id).await? {
            return Err(RepoError::Conflict("Contact", external_id));
        }
        Ok(sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contact (external_id, name, last_name, assigned_by_external_id, created_by_external_id, company_external_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(external_id)
        .bind(data.name.unwrap_or_default())
        .bind(data.last_name)
        .bind(data.assigned_by_external_id.unwrap_or_default())
        .bind(data.created_by_external_id.unwrap_or_default())
        .bind(data.company_external_id)
        .fetch_one(pool)
        .await?)
    }

    pub async fn update(pool: &PgPool, external_id: i64, data: ContactData) -> Result<Self, RepoError> {
        sqlx::query_as::<_, Contact>(
            r#"
            UPDATE contact SET
                name = COALESCE($2, name),
                last_name = COALESCE($3, last_name),
                assigned_by_external_id = COALESCE($4, assigned_by_external_id),
                created_by_external_id = COALESCE($5, created_by_external_id),
                company_external_id = COALESCE($6, company_external_id),
                updated_at = now()
            WHERE external_id = $1
            RETURNING *
            "#,
        )
        .bind(external_id)
        .bind(data.name)
        .bind(data.last_name)
        .bind(data.assigned_by_external_id)
        .bind(data.created_by_external_id)
        .bind(data.company_external_id)
        .fetch_optional(pool)
        .await?
        .ok_or(RepoError::NotFound("Contact"))
    }

    pub async fn set_deleted_in_bitrix(pool: &PgPool, external_id: i64, flag: bool) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE contact SET is_deleted_in_bitrix = $2, updated_at = now() WHERE external_id = $1",
        )
        .bind(external_id)
        .bind(flag)
        .execute(pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound("Contact"));
        }
        Ok(())
    }

    /// Used by the site-request owner-resolution step (M) once a duplicate
    /// search has already confirmed the phone is new.
    pub async fn create_with_phone_owner(
        pool: &PgPool,
        external_id: i64,
        name: &str,
        assigned_by_external_id: i64,
        created_by_external_id: i64,
    ) -> Result<Self, RepoError> {
        Self::create(
            pool,
            external_id,
            ContactData {
                name: Some(name.to_string()),
                last_name: None,
                assigned_by_external_id: Some(assigned_by_external_id),
                created_by_external_id: Some(created_by_external_id),
                company_external_id: None,
            },
        )
        .await
    }
}
