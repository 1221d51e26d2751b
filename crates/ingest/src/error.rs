use db::repositories::EntityKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Crm(#[from] crm_client::CrmClientError),
    #[error(transparent)]
    Repo(#[from] db::repositories::RepoError),
    #[error(transparent)]
    Reconcile(#[from] reconcile::ReconcileError),
    #[error("entity revisited mid-import: {0} {1}")]
    Cyclic(EntityKind, i64),
    #[error("malformed CRM record for {0} {1}: {2}")]
    MalformedRecord(&'static str, i64, String),
}

impl From<coordination::CyclicCall> for IngestError {
    fn from(value: coordination::CyclicCall) -> Self {
        IngestError::Cyclic(value.0, value.1)
    }
}
