use thiserror::Error;

/// Shared across every entity repository (spec's generic-repository component,
/// §4.4): one error shape rather than fifteen near-identical enums, since
/// every entity kind hits the same three failure modes at this layer.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0} already exists with external_id {1}")]
    Conflict(&'static str, i64),
}

impl RepoError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, RepoError::Conflict(_, _))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RepoError::NotFound(_))
    }
}
