use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::repositories::error::RepoError;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TimelineComment {
    pub id: uuid::Uuid,
    pub external_id: i64,
    pub entity_type: String,
    pub entity_external_id: i64,
    pub author_external_id: Option<i64>,
    pub comment: String,
    pub is_deleted_in_bitrix: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimelineComment {
    pub async fn list_for_entity(
        pool: &PgPool,
        entity_type: &str,
        entity_external_id: i64,
    ) -> Result<Vec<Self>, RepoError> {
        Ok(sqlx::query_as::<_, TimelineComment>(
            "SELECT * FROM timeline_comment WHERE entity_type = $1 AND entity_external_id = $2 ORDER BY created_at",
        )
        .bind(entity_type)
        .bind(entity_external_id)
        .fetch_all(pool)
        .await?)
    }

    pub async fn upsert(
        pool: &PgPool,
        external_id: i64,
        entity_type: &str,
        entity_external_id: i64,
        author_external_id: Option<i64>,
        comment: &str,
    ) -> Result<Self, RepoError> {
        Ok(sqlx::query_as::<_, TimelineComment>(
            r#"
            INSERT INTO timeline_comment (external_id, entity_type, entity_external_id, author_external_id, comment)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (external_id) DO UPDATE SET
                comment = EXCLUDED.comment,
                author_external_id = EXCLUDED.author_external_id,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(external_id)
        .bind(entity_type)
        .bind(entity_external_id)
        .bind(author_external_id)
        .bind(comment)
        .fetch_one(pool)
        .await?)
    }

    /// Tombstones any local comment for `(entity_type, entity_external_id)`
    /// whose `external_id` is not present in `keep_external_ids` — the other
    /// half of timeline sync (spec §4.8.1).
    pub async fn tombstone_missing(
        pool: &PgPool,
        entity_type: &str,
        entity_external_id: i64,
        keep_external_ids: &[i64],
    ) -> Result<u64, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE timeline_comment SET is_deleted_in_bitrix = true, updated_at = now()
            WHERE entity_type = $1 AND entity_external_id = $2 AND NOT (external_id = ANY($3))
            "#,
        )
        .bind(entity_type)
        .bind(entity_external_id)
        .bind(keep_external_ids)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
