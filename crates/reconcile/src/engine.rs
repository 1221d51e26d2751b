use chrono::NaiveDate;
use tracing::debug;

use db::models::deal::Deal;
use db::models::deal_stage::SemanticStage;

use crate::diff_tracker::DiffTracker;
use crate::error::ReconcileError;
use crate::snapshot::DealSnapshot;
use crate::stage_catalog::StageCatalog;
use crate::status::DealStatus;

/// Reconciles one deal against the stage transition table (spec §4.7).
/// `today` is passed in rather than read from the clock so the function
/// stays deterministic and testable without a fake-clock harness.
///
/// Returns the sparse patch to apply locally (and, if non-empty, to push
/// back to the CRM). `ReconcileError::InvalidState` means the caller must
/// push `rollback_status` back to the CRM and must not touch the local row.
pub fn handle_deal(
    snapshot: &DealSnapshot,
    deal_db: Option<&Deal>,
    catalog: &StageCatalog,
    today: NaiveDate,
    product_available: impl Fn(&DealSnapshot) -> bool,
) -> Result<DiffTracker, ReconcileError> {
    if snapshot.category_id != 0 {
        return Err(ReconcileError::NotInMainFunnel(snapshot.external_id, snapshot.category_id));
    }

    let mut tracker = DiffTracker::new();

    if snapshot.stage_semantic == SemanticStage::Fail {
        return Ok(handle_fail_deal(snapshot, deal_db, today, tracker));
    }

    let Some(deal_db) = deal_db else {
        return handle_new_deal(snapshot, catalog, today, tracker);
    };

    let db_status = DealStatus::from_wire(&deal_db.status_deal);
    if snapshot.status_deal != db_status {
        debug!(
            external_id = snapshot.external_id,
            crm_status = ?snapshot.status_deal,
            db_status = ?db_status,
            "deal status changed externally, rolling back"
        );
        return Err(ReconcileError::InvalidState {
            external_id: snapshot.external_id,
            rollback_status: deal_db.status_deal.clone(),
        });
    }

    match &snapshot.status_deal {
        DealStatus::New => handle_new_status(snapshot, catalog, &mut tracker),
        DealStatus::Accepted => handle_accepted_status(snapshot, catalog, &product_available, &mut tracker),
        other => {
            debug!(external_id = snapshot.external_id, status = ?other, "no reconciliation rule for status, skipping");
        }
    }

    Ok(tracker)
}

fn handle_fail_deal(
    snapshot: &DealSnapshot,
    deal_db: Option<&Deal>,
    today: NaiveDate,
    mut tracker: DiffTracker,
) -> DiffTracker {
    let db_already_lost = deal_db.map(|d| d.status_deal == "DEAL_LOSE").unwrap_or(false);
    if snapshot.status_deal != DealStatus::DealLose || !db_already_lost {
        tracker.set_status(DealStatus::DealLose);
        let moved_is_today = deal_db.and_then(|d| d.moved_date).map(|d| d == today).unwrap_or(false);
        if !moved_is_today {
            tracker.set_moved_date(today);
        }
    }
    tracker
}

fn handle_new_deal(
    snapshot: &DealSnapshot,
    catalog: &StageCatalog,
    today: NaiveDate,
    mut tracker: DiffTracker,
) -> Result<DiffTracker, ReconcileError> {
    if snapshot.status_deal != DealStatus::New {
        tracker.set_status(DealStatus::New);
    }
    let initial_stage = catalog
        .by_sort_order(1)
        .ok_or_else(|| ReconcileError::SyncError(snapshot.external_id, "no stage with sort_order=1".into()))?;
    if snapshot.stage_id != initial_stage.external_id {
        tracker.set_stage(initial_stage.external_id.clone());
    }
    tracker.set_moved_date(today);
    Ok(tracker)
}

fn handle_new_status(snapshot: &DealSnapshot, catalog: &StageCatalog, tracker: &mut DiffTracker) {
    let current_sort = catalog.sort_order_of(&snapshot.stage_id).unwrap_or(1);
    if current_sort > 1 {
        if let Some(second_stage) = catalog.by_sort_order(2) {
            tracker.set_stage(second_stage.external_id.clone());
        }
        tracker.set_status(DealStatus::Accepted);
    }
}

fn handle_accepted_status(
    snapshot: &DealSnapshot,
    catalog: &StageCatalog,
    product_available: &impl Fn(&DealSnapshot) -> bool,
    tracker: &mut DiffTracker,
) {
    let available_sort = if snapshot.company_external_id.is_some() && product_available(snapshot) { 3 } else { 2 };
    if let Some(stage) = catalog.by_sort_order(available_sort) {
        if snapshot.stage_id != stage.external_id {
            tracker.set_stage(stage.external_id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn stage(external_id: &str, sort_order: i32, semantic_id: &str) -> db::models::deal_stage::DealStage {
        db::models::deal_stage::DealStage {
            id: uuid::Uuid::new_v4(),
            external_id: external_id.to_string(),
            name: external_id.to_string(),
            sort_order,
            semantic_id: semantic_id.to_string(),
            is_deleted_in_bitrix: false,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn stages() -> Vec<db::models::deal_stage::DealStage> {
        vec![
            stage("NEW", 1, "P"),
            stage("PREPARATION", 2, "P"),
            stage("EXECUTING", 3, "P"),
            stage("LOSE", 13, "F"),
        ]
    }

    fn snapshot(status: DealStatus, stage_id: &str, semantic: SemanticStage) -> DealSnapshot {
        DealSnapshot {
            external_id: 42,
            category_id: 0,
            stage_id: stage_id.to_string(),
            stage_semantic: semantic,
            status_deal: status,
            company_external_id: None,
        }
    }

    #[test]
    fn first_observation_snaps_to_initial_stage() {
        let stages = stages();
        let catalog = StageCatalog::new(&stages);
        let snap = snapshot(DealStatus::Other("".into()), "NEW", SemanticStage::Prospective);
        let today = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();

        let patch = handle_deal(&snap, None, &catalog, today, |_| true).unwrap();
        assert_eq!(patch.status().cloned(), Some(DealStatus::New));
        assert_eq!(patch.moved_date(), Some(today));
        assert!(patch.stage().is_none());
    }

    #[test]
    fn fail_semantic_forces_deal_lose() {
        let stages = stages();
        let catalog = StageCatalog::new(&stages);
        let snap = snapshot(DealStatus::New, "LOSE", SemanticStage::Fail);
        let today = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();

        let patch = handle_deal(&snap, None, &catalog, today, |_| true).unwrap();
        assert_eq!(patch.status().cloned(), Some(DealStatus::DealLose));
        assert_eq!(patch.moved_date(), Some(today));
    }

    #[test]
    fn not_in_main_funnel_is_rejected() {
        let stages = stages();
        let catalog = StageCatalog::new(&stages);
        let mut snap = snapshot(DealStatus::New, "NEW", SemanticStage::Prospective);
        snap.category_id = 5;
        let today = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();

        let err = handle_deal(&snap, None, &catalog, today, |_| true).unwrap_err();
        assert!(matches!(err, ReconcileError::NotInMainFunnel(42, 5)));
    }

    #[test]
    fn external_status_change_is_rolled_back() {
        let stages = stages();
        let catalog = StageCatalog::new(&stages);
        let snap = snapshot(DealStatus::New, "NEW", SemanticStage::Prospective);
        let today = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();

        let deal_db = Deal {
            id: uuid::Uuid::new_v4(),
            external_id: 42,
            title: "T".into(),
            category_id: 0,
            stage_id: "NEW".into(),
            status_deal: "ACCEPTED".into(),
            opportunity: 0.0,
            probability: None,
            currency_id: "RUB".into(),
            company_external_id: None,
            contact_external_id: None,
            lead_external_id: None,
            assigned_by_external_id: 1,
            created_by_external_id: 1,
            modify_by_external_id: None,
            moved_by_external_id: None,
            last_activity_by_external_id: None,
            begin_date: None,
            close_date: None,
            moved_date: None,
            comments: None,
            is_deleted_in_bitrix: false,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let err = handle_deal(&snap, Some(&deal_db), &catalog, today, |_| true).unwrap_err();
        match err {
            ReconcileError::InvalidState { external_id, rollback_status } => {
                assert_eq!(external_id, 42);
                assert_eq!(rollback_status, "ACCEPTED");
            }
            other => panic!("expected InvalidState, got {other:?}"),
        }
    }

    #[test]
    fn new_status_advances_to_accepted_when_stage_moved_past_initial() {
        let stages = stages();
        let catalog = StageCatalog::new(&stages);
        let snap = snapshot(DealStatus::New, "EXECUTING", SemanticStage::Prospective);
        let today = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();

        let deal_db = Deal {
            id: uuid::Uuid::new_v4(),
            external_id: 42,
            title: "T".into(),
            category_id: 0,
            stage_id: "EXECUTING".into(),
            status_deal: "NEW".into(),
            opportunity: 0.0,
            probability: None,
            currency_id: "RUB".into(),
            company_external_id: None,
            contact_external_id: None,
            lead_external_id: None,
            assigned_by_external_id: 1,
            created_by_external_id: 1,
            modify_by_external_id: None,
            moved_by_external_id: None,
            last_activity_by_external_id: None,
            begin_date: None,
            close_date: None,
            moved_date: None,
            comments: None,
            is_deleted_in_bitrix: false,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let patch = handle_deal(&snap, Some(&deal_db), &catalog, today, |_| true).unwrap();
        assert_eq!(patch.stage(), Some("PREPARATION"));
        assert_eq!(patch.status().cloned(), Some(DealStatus::Accepted));
    }
}
