use chrono::NaiveDate;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, warn};

use coordination::RequestContext;
use crm_client::adapters::DealAdapter;
use crm_client::{CrmClient, EntityAdapter};
use db::models::deal::{Deal, DealData};
use db::models::deal_stage::{DealStage, SemanticStage};
use db::repositories::EntityKind;
use reconcile::{DealSnapshot, DealStatus, ReconcileError, StageCatalog};

use crate::error::IngestError;

/// Reads a CRM deal record into the shape reconciliation needs plus the raw
/// fields used to seed a first-time local row (spec §4.8).
fn parse_crm_deal(external_id: i64, raw: &Value) -> Result<(DealSnapshot, DealData), IngestError> {
    let string_at = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_string);
    let id_at = |key: &str| raw.get(key).and_then(crm_client::wire::id_from_wire);
    let bool_at = |key: &str| raw.get(key).map(crm_client::wire::bool_from_wire).unwrap_or(false);

    let stage_id = string_at("STAGE_ID").unwrap_or_else(|| "NEW".to_string());
    let semantic_code = string_at("STAGE_SEMANTIC_ID").unwrap_or_else(|| "P".to_string());
    let status_deal = DealStatus::from_wire(&string_at("STATUS_DEAL").unwrap_or_else(|| "NEW".to_string()));

    let snapshot = DealSnapshot {
        external_id,
        category_id: raw.get("CATEGORY_ID").and_then(Value::as_i64).unwrap_or(0) as i32,
        stage_id: stage_id.clone(),
        stage_semantic: SemanticStage::from_code(&semantic_code),
        status_deal,
        company_external_id: id_at("COMPANY_ID"),
    };

    if bool_at("IS_DELETED_IN_BITRIX") {
        return Err(IngestError::MalformedRecord("Deal", external_id, "tombstoned by CRM".into()));
    }

    let data = DealData {
        title: string_at("TITLE"),
        category_id: Some(snapshot.category_id),
        stage_id: Some(stage_id),
        status_deal: Some(snapshot.status_deal.as_wire()),
        opportunity: raw.get("OPPORTUNITY").and_then(Value::as_f64),
        probability: raw.get("PROBABILITY").and_then(Value::as_i64).map(|v| v as i32),
        currency_id: string_at("CURRENCY_ID"),
        company_external_id: snapshot.company_external_id,
        contact_external_id: id_at("CONTACT_ID"),
        lead_external_id: id_at("LEAD_ID"),
        assigned_by_external_id: id_at("ASSIGNED_BY_ID"),
        created_by_external_id: id_at("CREATED_BY_ID"),
        modify_by_external_id: id_at("MODIFY_BY_ID"),
        moved_by_external_id: id_at("MOVED_BY_ID"),
        last_activity_by_external_id: id_at("LAST_ACTIVITY_BY"),
        begin_date: string_at("BEGINDATE").and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        close_date: string_at("CLOSEDATE").and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        moved_date: None,
        comments: string_at("COMMENTS"),
    };

    Ok((snapshot, data))
}

pub struct DealIngest<'a> {
    pub pool: &'a PgPool,
    pub crm: &'a CrmClient,
    pub adapter: &'a DealAdapter,
}

impl<'a> DealIngest<'a> {
    /// Imports or refreshes deal `external_id`, guarding against re-entrant
    /// calls for the same id within one request (spec §4.3, §4.8).
    pub async fn import(&self, ctx: &RequestContext, external_id: i64, today: NaiveDate) -> Result<Deal, IngestError> {
        if ctx.is_updated(EntityKind::Deal, external_id) {
            return Deal::find_by_external_id(self.pool, external_id)
                .await?
                .ok_or(db::repositories::RepoError::NotFound("Deal").into());
        }

        ctx.begin_creation(EntityKind::Deal, external_id)?;
        let result = self.sync(ctx, external_id, today).await;
        ctx.end_creation(EntityKind::Deal, external_id);
        result
    }

    async fn sync(&self, ctx: &RequestContext, external_id: i64, today: NaiveDate) -> Result<Deal, IngestError> {
        let raw = self.adapter.get(self.crm, external_id).await?;
        let (snapshot, fields) = parse_crm_deal(external_id, &raw)?;
        let deal_db = Deal::find_by_external_id(self.pool, external_id).await?;

        let stages = DealStage::list_all(self.pool).await?;
        let catalog = StageCatalog::new(&stages);

        let patch = match reconcile::handle_deal(&snapshot, deal_db.as_ref(), &catalog, today, |_| true) {
            Ok(patch) => patch,
            Err(ReconcileError::InvalidState { external_id, rollback_status }) => {
                let rollback = serde_json::json!({ "STATUS_DEAL": rollback_status.clone() });
                if let Err(e) = self.crm.call("crm.deal.update", self.adapter.update_schema(external_id, rollback)).await {
                    warn!(external_id, error = %e, "failed to push status rollback to CRM");
                }
                return Err(ReconcileError::InvalidState { external_id, rollback_status }.into());
            }
            Err(other) => return Err(other.into()),
        };

        let deal = if deal_db.is_some() {
            Deal::update(self.pool, external_id, patch.clone().into_deal_data()).await?
        } else {
            let mut seed = fields;
            if let Some(status) = patch.status() {
                seed.status_deal = Some(status.as_wire());
            }
            if let Some(stage) = patch.stage() {
                seed.stage_id = Some(stage.to_string());
            }
            if let Some(moved_date) = patch.moved_date() {
                seed.moved_date = Some(moved_date);
            }
            Deal::create(self.pool, external_id, seed).await?
        };

        if patch.has_changes() {
            self.crm.call("crm.deal.update", self.adapter.update_schema(external_id, patch.into_crm_fields())).await?;
        }

        ctx.mark_updated(EntityKind::Deal, external_id);
        info!(external_id, "deal synchronized");
        Ok(deal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_crm_deal_reads_canonical_fields() {
        let raw = json!({
            "ID": "42",
            "TITLE": "T",
            "CATEGORY_ID": 0,
            "STAGE_ID": "NEW",
            "STAGE_SEMANTIC_ID": "P",
            "STATUS_DEAL": "NEW",
            "OPPORTUNITY": 1000.0,
            "CURRENCY_ID": "RUB",
        });
        let (snapshot, data) = parse_crm_deal(42, &raw).unwrap();
        assert_eq!(snapshot.external_id, 42);
        assert_eq!(snapshot.stage_id, "NEW");
        assert_eq!(data.title.as_deref(), Some("T"));
        assert_eq!(data.opportunity, Some(1000.0));
    }

    #[test]
    fn parse_crm_deal_rejects_tombstoned_record() {
        let raw = json!({ "ID": 1, "IS_DELETED_IN_BITRIX": true });
        let err = parse_crm_deal(1, &raw).unwrap_err();
        assert!(matches!(err, IngestError::MalformedRecord("Deal", 1, _)));
    }
}
