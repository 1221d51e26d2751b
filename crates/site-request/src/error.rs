use thiserror::Error;

#[derive(Debug, Error)]
pub enum SiteRequestError {
    #[error(transparent)]
    Crm(#[from] crm_client::CrmClientError),
    #[error(transparent)]
    Repo(#[from] db::repositories::RepoError),
    #[error("no manager configured for site-request assignment")]
    NoManagerAvailable,
    #[error("could not resolve an owner or manager for phone {0}")]
    NoOwnerResolved(String),
}
