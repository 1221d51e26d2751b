//! Webhook intake pipeline (spec §4.6 component I): parses Bitrix24's
//! bracket-key form body, validates it, serializes processing per entity id
//! behind a lock, and dispatches into the ingest pipeline.

pub mod error;
pub mod form;
pub mod response;
pub mod validate;

use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use tracing::info;

use config::Config;
use coordination::RequestContext;
use crm_client::CrmClient;
use crm_client::adapters::DealAdapter;
use crm_client::wire::id_from_wire;
use db::models::deal::Deal;
use ingest::DealIngest;
use lock::{LockConfig, LockService};

pub use error::WebhookError;
pub use response::WebhookResponse;
pub use validate::{WebhookAuth, WebhookPayload};

/// Bitrix24 encodes the affected entity in the event name's prefix
/// (`ONCRMDEAL*`, `ONCRMLEAD*`, ...). Only deals have a wired ingest path
/// today; other kinds are accepted but acknowledged without further work.
fn is_deal_event(event: &str) -> bool {
    event.to_uppercase().starts_with("ONCRMDEAL")
}

fn is_delete_event(event: &str) -> bool {
    event.to_uppercase().ends_with("DELETE")
}

fn extract_entity_id(data: &Value) -> Option<i64> {
    data.get("FIELDS").and_then(|f| f.get("ID")).and_then(id_from_wire)
}

pub struct WebhookGateway<'a> {
    pub config: &'a Config,
    pub pool: &'a PgPool,
    pub crm: &'a CrmClient,
    pub locks: &'a LockService,
}

impl<'a> WebhookGateway<'a> {
    /// Entry point: `form` is the raw flat `(key, value)` pairs exactly as
    /// received from the HTTP form body.
    pub async fn handle(&self, form: &[(String, String)]) -> WebhookResponse {
        match self.try_handle(form).await {
            Ok(response) => response,
            Err(e) => WebhookResponse::error(e.status_code(), e.to_string()),
        }
    }

    async fn try_handle(&self, form: &[(String, String)]) -> Result<WebhookResponse, WebhookError> {
        let tree = form::parse_flat_to_nested(form);
        let payload = validate::parse_payload(&tree)?;

        validate::validate_event(&self.config.webhook, &payload.event)?;
        validate::validate_security(&self.config.webhook, &payload.auth, payload.ts)?;

        let entity_id = extract_entity_id(&payload.data)
            .ok_or_else(|| WebhookError::Validation("missing data[FIELDS][ID]".into()))?;

        if self.config.test_mode
            && let Some(test_deal_id) = self.config.test_deal_id
            && entity_id != test_deal_id
        {
            return Ok(WebhookResponse::success(&payload.event, "skipped (test mode)"));
        }

        if !is_deal_event(&payload.event) {
            info!(event = %payload.event, entity_id, "webhook event has no wired handler, acknowledging");
            return Ok(WebhookResponse::success(&payload.event, "accepted, no handler wired for this entity"));
        }

        if is_delete_event(&payload.event) {
            Deal::set_deleted_in_bitrix(self.pool, entity_id, true).await.ok();
            return Ok(WebhookResponse::success(&payload.event, "tombstoned"));
        }

        let lock_key = format!("deal:{entity_id}");
        let lease = LockConfig::default();
        let _guard = match self.locks.acquire(&lock_key, &lease).await {
            Ok(guard) => guard,
            Err(lock::LockError::MaxRetriesExceeded(_)) => {
                return Ok(WebhookResponse::skipped(
                    &payload.event,
                    "still processing this entity",
                    "retry the webhook after the current lock lease expires",
                ));
            }
        };

        let ctx = RequestContext::new(self.pool.clone());
        let adapter = DealAdapter;
        let ingest = DealIngest { pool: self.pool, crm: self.crm, adapter: &adapter };
        ingest.import(&ctx, entity_id, Utc::now().date_naive()).await?;
        ctx.finish();

        Ok(WebhookResponse::success(&payload.event, "processed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deal_events_are_recognized_by_prefix() {
        assert!(is_deal_event("ONCRMDEALUPDATE"));
        assert!(!is_deal_event("ONCRMLEADADD"));
    }

    #[test]
    fn delete_suffix_is_detected() {
        assert!(is_delete_event("ONCRMDEALDELETE"));
        assert!(!is_delete_event("ONCRMDEALUPDATE"));
    }

    #[test]
    fn extracts_entity_id_from_nested_fields() {
        let data = serde_json::json!({ "FIELDS": { "ID": "55" } });
        assert_eq!(extract_entity_id(&data), Some(55));
    }
}
