use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::repositories::error::RepoError;

/// Bitrix classifies every stage into one of three coarse buckets; kept as a
/// plain string at the DB boundary and typed here for callers in `reconcile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SemanticStage {
    Prospective,
    Success,
    Fail,
}

impl SemanticStage {
    pub fn from_code(code: &str) -> SemanticStage {
        match code {
            "S" => SemanticStage::Success,
            "F" => SemanticStage::Fail,
            _ => SemanticStage::Prospective,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DealStage {
    pub id: uuid::Uuid,
    pub external_id: String,
    pub name: String,
    pub sort_order: i32,
    pub semantic_id: String,
    pub is_deleted_in_bitrix: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DealStage {
    pub fn semantic(&self) -> SemanticStage {
        SemanticStage::from_code(&self.semantic_id)
    }

    pub async fn find_by_external_id(pool: &PgPool, external_id: &str) -> Result<Self, RepoError> {
        sqlx::query_as::<_, DealStage>("SELECT * FROM deal_stage WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(pool)
            .await?
            .ok_or(RepoError::NotFound("DealStage"))
    }

    pub async fn find_by_sort_order(pool: &PgPool, sort_order: i32) -> Result<Self, RepoError> {
        sqlx::query_as::<_, DealStage>("SELECT * FROM deal_stage WHERE sort_order = $1")
            .bind(sort_order)
            .fetch_optional(pool)
            .await?
            .ok_or(RepoError::NotFound("DealStage"))
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, RepoError> {
        Ok(
            sqlx::query_as::<_, DealStage>("SELECT * FROM deal_stage ORDER BY sort_order")
                .fetch_all(pool)
                .await?,
        )
    }
}
