use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::repositories::error::RepoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    Phone,
    Email,
    Web,
    Im,
    Link,
}

impl ChannelKind {
    pub fn as_type_id(&self) -> &'static str {
        match self {
            ChannelKind::Phone => "PHONE",
            ChannelKind::Email => "EMAIL",
            ChannelKind::Web => "WEB",
            ChannelKind::Im => "IM",
            ChannelKind::Link => "LINK",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CommunicationChannelType {
    pub id: uuid::Uuid,
    pub type_id: String,
    pub value_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommunicationChannelType {
    pub async fn get_or_create(
        pool: &PgPool,
        type_id: &str,
        value_type: &str,
    ) -> Result<Self, RepoError> {
        Ok(sqlx::query_as::<_, CommunicationChannelType>(
            r#"
            INSERT INTO communication_channel_type (type_id, value_type)
            VALUES ($1, $2)
            ON CONFLICT (type_id, value_type) DO UPDATE SET type_id = EXCLUDED.type_id
            RETURNING *
            "#,
        )
        .bind(type_id)
        .bind(value_type)
        .fetch_one(pool)
        .await?)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CommunicationChannel {
    pub id: uuid::Uuid,
    pub entity_type: String,
    pub entity_external_id: i64,
    pub channel_type_id: uuid::Uuid,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommunicationChannel {
    pub async fn list_for_owner(
        pool: &PgPool,
        entity_type: &str,
        entity_external_id: i64,
        kind: ChannelKind,
    ) -> Result<Vec<String>, RepoError> {
        let values: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT cc.value
            FROM communication_channel cc
            JOIN communication_channel_type cct ON cct.id = cc.channel_type_id
            WHERE cc.entity_type = $1 AND cc.entity_external_id = $2 AND cct.type_id = $3
            ORDER BY cc.created_at
            "#,
        )
        .bind(entity_type)
        .bind(entity_external_id)
        .bind(kind.as_type_id())
        .fetch_all(pool)
        .await?;
        Ok(values.into_iter().map(|(v,)| v).collect())
    }

    /// Replace-on-set semantics (spec §4.4 F / §8 property 6): an absent
    /// field leaves existing rows untouched, the caller must not invoke this
    /// unless the field was present in the update payload (even as `[]`).
    pub async fn replace_for_owner(
        pool: &PgPool,
        entity_type: &str,
        entity_external_id: i64,
        kind: ChannelKind,
        value_type: &str,
        values: Vec<String>,
    ) -> Result<(), RepoError> {
        let channel_type = CommunicationChannelType::get_or_create(pool, kind.as_type_id(), value_type).await?;

        let mut tx = pool.begin().await?;
        sqlx::query(
            "DELETE FROM communication_channel WHERE entity_type = $1 AND entity_external_id = $2 AND channel_type_id = $3",
        )
        .bind(entity_type)
        .bind(entity_external_id)
        .bind(channel_type.id)
        .execute(&mut *tx)
        .await?;

        for value in values {
            sqlx::query(
                "INSERT INTO communication_channel (entity_type, entity_external_id, channel_type_id, value) VALUES ($1, $2, $3, $4)",
            )
            .bind(entity_type)
            .bind(entity_external_id)
            .bind(channel_type.id)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
