use thiserror::Error;

/// Error taxonomy for the reconciliation engine (spec §4.7, §7).
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("deal {0} not found in CRM")]
    NotFound(i64),
    #[error("deal {0} is not in the main funnel (category_id={1})")]
    NotInMainFunnel(i64, i32),
    #[error("deal {external_id} status was changed externally; rolling back to '{rollback_status}'")]
    InvalidState { external_id: i64, rollback_status: String },
    #[error("failed to synchronize deal {0}: {1}")]
    SyncError(i64, String),
}

impl ReconcileError {
    pub fn external_id(&self) -> i64 {
        match self {
            ReconcileError::NotFound(id) => *id,
            ReconcileError::NotInMainFunnel(id, _) => *id,
            ReconcileError::InvalidState { external_id, .. } => *external_id,
            ReconcileError::SyncError(id, _) => *id,
        }
    }
}
