use db::models::deal_stage::DealStage;

/// Read-only view over the 13 precomputed stages, keyed both ways. Built
/// once per reconciliation call from `DealStage::list_all`.
pub struct StageCatalog<'a> {
    stages: &'a [DealStage],
}

impl<'a> StageCatalog<'a> {
    pub fn new(stages: &'a [DealStage]) -> Self {
        StageCatalog { stages }
    }

    pub fn by_sort_order(&self, sort_order: i32) -> Option<&'a DealStage> {
        self.stages.iter().find(|s| s.sort_order == sort_order)
    }

    pub fn by_external_id(&self, external_id: &str) -> Option<&'a DealStage> {
        self.stages.iter().find(|s| s.external_id == external_id)
    }

    pub fn sort_order_of(&self, external_id: &str) -> Option<i32> {
        self.by_external_id(external_id).map(|s| s.sort_order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stage(external_id: &str, sort_order: i32, semantic_id: &str) -> DealStage {
        DealStage {
            id: uuid::Uuid::new_v4(),
            external_id: external_id.to_string(),
            name: external_id.to_string(),
            sort_order,
            semantic_id: semantic_id.to_string(),
            is_deleted_in_bitrix: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn looks_up_by_sort_order_and_external_id() {
        let stages = vec![stage("NEW", 1, "P"), stage("PREPARATION", 2, "P"), stage("WON", 13, "S")];
        let catalog = StageCatalog::new(&stages);
        assert_eq!(catalog.by_sort_order(1).unwrap().external_id, "NEW");
        assert_eq!(catalog.sort_order_of("PREPARATION"), Some(2));
        assert!(catalog.by_sort_order(99).is_none());
    }
}
