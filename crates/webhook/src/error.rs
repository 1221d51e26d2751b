use thiserror::Error;

/// Maps directly to the §6 response table: `validation`/`security` become
/// 400/401, `not_found` 404, `lock_exhausted` 409, everything else 500.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("security check failed: {0}")]
    Security(String),
    #[error("entity not found after refresh")]
    NotFound,
    #[error("processing already in progress for this entity")]
    LockExhausted,
    #[error(transparent)]
    Ingest(#[from] ingest::IngestError),
    #[error(transparent)]
    Lock(#[from] lock::LockError),
}

impl WebhookError {
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::Validation(_) => 400,
            WebhookError::Security(_) => 401,
            WebhookError::NotFound => 404,
            WebhookError::LockExhausted => 409,
            WebhookError::Lock(lock::LockError::MaxRetriesExceeded(_)) => 409,
            WebhookError::Ingest(ingest::IngestError::Repo(db::repositories::RepoError::NotFound(_))) => 404,
            WebhookError::Ingest(_) => 500,
        }
    }
}
