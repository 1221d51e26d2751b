use serde_json::{Value, json};
use sqlx::PgPool;
use tracing::warn;

use crm_client::CrmClient;
use crm_client::wire::id_from_wire;
use db::models::timeline_comment::TimelineComment;

/// Lists CRM comments for `(DEAL, deal_external_id)`, upserts each locally,
/// and tombstones any local row the CRM no longer lists. Fire-and-forget
/// after a deal sync (spec §4.8.1) — failures are logged, never propagated.
pub async fn sync_comments(pool: &PgPool, crm: &CrmClient, deal_external_id: i64) {
    if let Err(e) = try_sync_comments(pool, crm, deal_external_id).await {
        warn!(deal_external_id, error = %e, "timeline comment sync failed");
    }
}

async fn try_sync_comments(
    pool: &PgPool,
    crm: &CrmClient,
    deal_external_id: i64,
) -> Result<(), crm_client::CrmClientError> {
    let body = crm
        .call(
            "crm.timeline.comment.list",
            json!({ "filter": { "ENTITY_ID": deal_external_id, "ENTITY_TYPE": "deal" } }),
        )
        .await?;

    let comments = body.as_array().cloned().unwrap_or_default();
    let mut kept_ids = Vec::with_capacity(comments.len());

    for comment in &comments {
        let Some(external_id) = comment.get("ID").and_then(id_from_wire) else { continue };
        let text = comment.get("COMMENT").and_then(Value::as_str).unwrap_or_default();
        let author = comment.get("AUTHOR_ID").and_then(id_from_wire);

        if let Err(e) = TimelineComment::upsert(pool, external_id, "deal", deal_external_id, author, text).await {
            warn!(external_id, deal_external_id, error = %e, "failed to upsert timeline comment");
            continue;
        }
        kept_ids.push(external_id);
    }

    if let Err(e) = TimelineComment::tombstone_missing(pool, "deal", deal_external_id, &kept_ids).await {
        warn!(deal_external_id, error = %e, "failed to tombstone stale timeline comments");
    }

    Ok(())
}
