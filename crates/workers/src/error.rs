use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("imap error: {0}")]
    Imap(#[from] imap::Error),
    #[error("broker error: {0}")]
    Broker(#[from] lapin::Error),
    #[error("failed to encode message envelope: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    SiteRequest(#[from] site_request::SiteRequestError),
}
