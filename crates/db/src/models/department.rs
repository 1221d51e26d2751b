use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::repositories::error::RepoError;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Department {
    pub id: uuid::Uuid,
    pub external_id: i64,
    pub name: String,
    pub parent_external_id: Option<i64>,
    pub is_deleted_in_bitrix: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct DepartmentData {
    pub name: String,
    pub parent_external_id: Option<i64>,
}

impl Department {
    pub async fn find_by_external_id(pool: &PgPool, external_id: i64) -> Result<Self, RepoError> {
        sqlx::query_as::<_, Department>("SELECT * FROM department WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(pool)
            .await?
            .ok_or(RepoError::NotFound("Department"))
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, RepoError> {
        Ok(
            sqlx::query_as::<_, Department>("SELECT * FROM department ORDER BY external_id")
                .fetch_all(pool)
                .await?,
        )
    }

    /// Create-or-update by `external_id`, used by the pull-all department
    /// import (§4.11) which does not gate on prior existence checks.
    pub async fn upsert(
        pool: &PgPool,
        external_id: i64,
        data: DepartmentData,
    ) -> Result<Self, RepoError> {
        Ok(sqlx::query_as::<_, Department>(
            r#"
            INSERT INTO department (external_id, name, parent_external_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (external_id) DO UPDATE SET
                name = EXCLUDED.name,
                parent_external_id = EXCLUDED.parent_external_id,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(external_id)
        .bind(&data.name)
        .bind(data.parent_external_id)
        .fetch_one(pool)
        .await?)
    }
}
