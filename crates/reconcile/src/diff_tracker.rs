use chrono::NaiveDate;

use db::models::deal::DealData;

use crate::status::DealStatus;

/// Sparse patch accumulated while reconciling one deal, mirroring the
/// original's narrow update-tracker: record field flips as they happen,
/// hand back a sparse patch, and answer `has_changes()`.
#[derive(Debug, Default, Clone)]
pub struct DiffTracker {
    status_deal: Option<DealStatus>,
    stage_id: Option<String>,
    moved_date: Option<NaiveDate>,
}

impl DiffTracker {
    pub fn new() -> Self {
        DiffTracker::default()
    }

    pub fn set_status(&mut self, value: DealStatus) {
        self.status_deal = Some(value);
    }

    pub fn set_stage(&mut self, external_id: String) {
        self.stage_id = Some(external_id);
    }

    pub fn set_moved_date(&mut self, value: NaiveDate) {
        self.moved_date = Some(value);
    }

    pub fn has_changes(&self) -> bool {
        self.status_deal.is_some() || self.stage_id.is_some() || self.moved_date.is_some()
    }

    pub fn status(&self) -> Option<&DealStatus> {
        self.status_deal.as_ref()
    }

    pub fn stage(&self) -> Option<&str> {
        self.stage_id.as_deref()
    }

    pub fn moved_date(&self) -> Option<NaiveDate> {
        self.moved_date
    }

    /// Sparse `DealData` patch, ready for `Deal::update` or to seed a
    /// fresh `Deal::create` call.
    pub fn into_deal_data(self) -> DealData {
        DealData {
            stage_id: self.stage_id,
            status_deal: self.status_deal.map(|s| s.as_wire()),
            moved_date: self.moved_date,
            ..Default::default()
        }
    }

    /// The subset of fields worth pushing back to the CRM, keyed by the
    /// CRM's own field names (spec §4.7's "only if any differ" contract).
    pub fn into_crm_fields(self) -> serde_json::Value {
        let mut fields = serde_json::Map::new();
        if let Some(stage_id) = &self.stage_id {
            fields.insert("STAGE_ID".to_string(), serde_json::Value::String(stage_id.clone()));
        }
        if let Some(status) = &self.status_deal {
            fields.insert("STATUS_DEAL".to_string(), serde_json::Value::String(status.as_wire()));
        }
        if let Some(moved_date) = self.moved_date {
            fields.insert("MOVED_TIME".to_string(), serde_json::Value::String(moved_date.to_string()));
        }
        serde_json::Value::Object(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn empty_tracker_has_no_changes() {
        let tracker = DiffTracker::new();
        assert!(!tracker.has_changes());
        assert!(tracker.into_crm_fields().as_object().unwrap().is_empty());
    }

    #[test]
    fn recorded_fields_surface_in_both_views() {
        let mut tracker = DiffTracker::new();
        tracker.set_status(DealStatus::Accepted);
        tracker.set_stage("PREPARATION".to_string());
        tracker.set_moved_date(NaiveDate::from_ymd_opt(2025, 11, 20).unwrap());
        assert!(tracker.has_changes());

        let crm_fields = tracker.clone().into_crm_fields();
        assert_eq!(crm_fields["STATUS_DEAL"], "ACCEPTED");
        assert_eq!(crm_fields["STAGE_ID"], "PREPARATION");

        let patch = tracker.into_deal_data();
        assert_eq!(patch.status_deal.as_deref(), Some("ACCEPTED"));
        assert_eq!(patch.stage_id.as_deref(), Some("PREPARATION"));
    }
}
