use thiserror::Error;

/// Error taxonomy for the CRM HTTP client (spec §4.2, §7): `auth` surfaces
/// as 401/authentication-required, `api` as 5xx unless the CRM itself says
/// "not found", in which case ingest substitutes a tombstone default.
#[derive(Debug, Error)]
pub enum CrmClientError {
    #[error("authentication required: {message}")]
    Auth { message: String, authorize_url: Option<String> },
    #[error("CRM API error {status:?}: {code} - {description}")]
    Api { status: Option<u16>, code: String, description: String },
    #[error("entity not found in CRM")]
    NotFound,
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CrmClientError {
    /// True for the CRM's own "token is stale" signal — the client retries
    /// these internally after a token refresh (spec §4.2 step 2).
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            CrmClientError::Api { code, .. } if code == "expired_token" || code == "invalid_token"
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CrmClientError::NotFound)
    }
}
