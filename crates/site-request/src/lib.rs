//! Site-request pipeline (spec §4.9 component M): turns a price inquiry from
//! the public website into a Bitrix24 deal. Every step records its own
//! outcome into the returned result instead of aborting the whole request —
//! only owner resolution and deal creation itself are fatal.

pub mod error;
pub mod manager;
pub mod owner;
pub mod product;
pub mod timeline;

use serde_json::json;
use sqlx::PgPool;
use tracing::info;

use crm_client::adapters::DealAdapter;
use crm_client::wire::id_from_wire;
use crm_client::{CrmClient, EntityAdapter};

pub use error::SiteRequestError;
pub use owner::Owner;

const DEFAULT_DEAL_TITLE: &str = "Запрос цены с сайта";

#[derive(Debug, Clone, Default)]
pub struct SiteRequestInput {
    pub phone: String,
    pub name: Option<String>,
    pub product_xml_id: Option<String>,
    pub product_discount: Option<f64>,
    pub comment: Option<String>,
    pub message_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SiteRequestResult {
    pub deal_external_id: i64,
    pub owner: Owner,
    pub assigned_by_external_id: i64,
    pub product_attached: bool,
    pub timeline_posted: bool,
}

/// Resolves the owner/manager, creates the deal, attaches the requested
/// product if one was named, and posts a timeline note summarizing the
/// request. Only owner resolution and deal creation can fail the whole
/// call; product attach and the timeline note degrade independently.
pub async fn handle_request(
    pool: &PgPool,
    crm: &CrmClient,
    input: &SiteRequestInput,
) -> Result<SiteRequestResult, SiteRequestError> {
    let (owner, assigned_by_external_id) = owner::resolve_owner(pool, crm, &input.phone, input.name.as_deref()).await?;

    let title = match &input.message_id {
        Some(message_id) => format!("{DEFAULT_DEAL_TITLE} #{message_id}"),
        None => DEFAULT_DEAL_TITLE.to_string(),
    };

    let (owner_field, owner_id) = owner.deal_field();
    let mut fields = json!({
        "TITLE": title,
        owner_field: owner_id,
        "ASSIGNED_BY_ID": assigned_by_external_id,
    });
    if let Some(comment) = &input.comment {
        fields["COMMENTS"] = json!(comment);
    }

    let adapter = DealAdapter;
    let created = crm.call("crm.deal.add", adapter.create_schema(fields)).await?;
    let deal_external_id = id_from_wire(&created).ok_or(SiteRequestError::NoOwnerResolved(input.phone.clone()))?;

    info!(deal_external_id, ?owner, assigned_by_external_id, "site-request deal created");

    let product_name = match &input.product_xml_id {
        Some(xml_id) => product::attach_product(pool, crm, deal_external_id, xml_id, input.product_discount).await,
        None => None,
    };
    let product_attached = product_name.is_some();

    let note = timeline::complex_comment(product_name.as_deref().unwrap_or("—"), input.comment.as_deref());
    let timeline_posted = timeline::post_note(crm, deal_external_id, &note).await;

    Ok(SiteRequestResult {
        deal_external_id,
        owner,
        assigned_by_external_id,
        product_attached,
        timeline_posted,
    })
}
