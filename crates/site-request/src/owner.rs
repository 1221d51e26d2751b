use serde_json::json;
use sqlx::PgPool;
use tracing::warn;

use crm_client::CrmClient;
use crm_client::wire::id_from_wire;

use crate::error::SiteRequestError;
use crate::manager::least_loaded_manager;

/// The CRM entity that ends up holding the new deal's relationship, chosen
/// during owner resolution (spec §4.9 step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Contact(i64),
    Company(i64),
}

impl Owner {
    /// The deal field this owner is written into.
    pub fn deal_field(&self) -> (&'static str, i64) {
        match self {
            Owner::Contact(id) => ("CONTACT_ID", *id),
            Owner::Company(id) => ("COMPANY_ID", *id),
        }
    }
}

async fn assigned_by_of(crm: &CrmClient, method: &str, id: i64) -> Option<i64> {
    match crm.call(method, json!({ "id": id })).await {
        Ok(entity) => entity.get("ASSIGNED_BY_ID").and_then(id_from_wire),
        Err(e) => {
            warn!(method, id, error = %e, "failed to look up assigned manager for duplicate match");
            None
        }
    }
}

/// Finds the contact or company already attached to `phone` via Bitrix's own
/// duplicate index; falls back to creating a brand-new contact assigned to
/// whichever manager is least loaded (spec §4.9 step 1-2).
pub async fn resolve_owner(
    pool: &PgPool,
    crm: &CrmClient,
    phone: &str,
    name: Option<&str>,
) -> Result<(Owner, i64), SiteRequestError> {
    let duplicates = crm
        .call("crm.duplicate.findbycomm", json!({ "type": "PHONE", "values": [phone] }))
        .await?;

    if let Some(contact_id) = duplicates.get("CONTACT").and_then(|v| v.as_array()).and_then(|a| a.first()).and_then(id_from_wire)
        && let Some(assigned) = assigned_by_of(crm, "crm.contact.get", contact_id).await
    {
        return Ok((Owner::Contact(contact_id), assigned));
    }

    if let Some(company_id) = duplicates.get("COMPANY").and_then(|v| v.as_array()).and_then(|a| a.first()).and_then(id_from_wire)
        && let Some(assigned) = assigned_by_of(crm, "crm.company.get", company_id).await
    {
        return Ok((Owner::Company(company_id), assigned));
    }

    let assigned = least_loaded_manager(pool).await?;
    let contact = crm
        .call(
            "crm.contact.add",
            json!({
                "fields": {
                    "NAME": name.unwrap_or_default(),
                    "ASSIGNED_BY_ID": assigned,
                    "PHONE": [{ "VALUE": phone, "VALUE_TYPE": "WORK" }],
                }
            }),
        )
        .await?;
    let contact_id = id_from_wire(&contact).ok_or_else(|| SiteRequestError::NoOwnerResolved(phone.to_string()))?;
    Ok((Owner::Contact(contact_id), assigned))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deal_field_maps_contact_and_company() {
        assert_eq!(Owner::Contact(7).deal_field(), ("CONTACT_ID", 7));
        assert_eq!(Owner::Company(9).deal_field(), ("COMPANY_ID", 9));
    }
}
