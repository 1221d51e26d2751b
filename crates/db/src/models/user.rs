use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::repositories::error::RepoError;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: uuid::Uuid,
    pub external_id: i64,
    pub name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub department_external_id: Option<i64>,
    pub is_deleted_in_bitrix: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct UserData {
    pub name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub department_external_id: Option<i64>,
}

impl User {
    pub async fn exists(pool: &PgPool, external_id: i64) -> Result<bool, RepoError> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM app_user WHERE external_id = $1")
                .bind(external_id)
                .fetch_optional(pool)
                .await?;
        Ok(row.is_some())
    }

    pub async fn find_by_external_id(pool: &PgPool, external_id: i64) -> Result<Self, RepoError> {
        sqlx::query_as::<_, User>("SELECT * FROM app_user WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(pool)
            .await?
            .ok_or(RepoError::NotFound("User"))
    }

    pub async fn create(pool: &PgPool, external_id: i64, data: UserData) -> Result<Self, RepoError> {
        let existing: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM app_user WHERE external_id = $1")
                .bind(external_id)
                .fetch_optional(pool)
                .await?;
        if existing.is_some() {
            return Err(RepoError::Conflict("User", external_id));
        }
        Ok(sqlx::query_as::<_, User>(
            r#"
            INSERT INTO app_user (external_id, name, last_name, email, department_external_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(external_id)
        .bind(&data.name)
        .bind(&data.last_name)
        .bind(&data.email)
        .bind(data.department_external_id)
        .fetch_one(pool)
        .await?)
    }

    pub async fn update(pool: &PgPool, external_id: i64, data: UserData) -> Result<Self, RepoError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE app_user SET
                name = $2,
                last_name = $3,
                email = $4,
                department_external_id = $5,
                updated_at = now()
            WHERE external_id = $1
            RETURNING *
            "#,
        )
        .bind(external_id)
        .bind(&data.name)
        .bind(&data.last_name)
        .bind(&data.email)
        .bind(data.department_external_id)
        .fetch_optional(pool)
        .await?
        .ok_or(RepoError::NotFound("User"))
    }

    pub async fn set_deleted_in_bitrix(
        pool: &PgPool,
        external_id: i64,
        flag: bool,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE app_user SET is_deleted_in_bitrix = $2, updated_at = now() WHERE external_id = $1",
        )
        .bind(external_id)
        .bind(flag)
        .execute(pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound("User"));
        }
        Ok(())
    }
}
