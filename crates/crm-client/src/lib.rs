pub mod adapters;
pub mod client;
pub mod error;
pub mod wire;

pub use adapters::{DealAdapter, EntityAdapter, ItemAdapter, LeadAdapter, ListPage, PAGE_SIZE};
pub use client::CrmClient;
pub use error::CrmClientError;
