use db::models::deal_stage::SemanticStage;

use crate::status::DealStatus;

/// Normalized view of a deal as reported by the CRM, already decoded from
/// the wire format (spec §6) by the caller. Reconciliation never talks to
/// the CRM client directly, which keeps `handle_deal` a pure function.
#[derive(Debug, Clone)]
pub struct DealSnapshot {
    pub external_id: i64,
    pub category_id: i32,
    pub stage_id: String,
    pub stage_semantic: SemanticStage,
    pub status_deal: DealStatus,
    pub company_external_id: Option<i64>,
}
