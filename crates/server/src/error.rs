use thiserror::Error;

/// Startup-time errors only; the HTTP handlers themselves translate their
/// crate-specific errors into response bodies directly (see
/// `webhook::WebhookResponse`, `routes::site_request`).
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    TokenStore(#[from] token_store::TokenStoreError),
    #[error(transparent)]
    Broker(#[from] lapin::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
