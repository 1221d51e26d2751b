//! Per-entity CRM adapters (spec §4.2/§4.3 component C). Method names are
//! derived from `(entity kind, action)`; `item`-style entities additionally
//! carry `entityTypeId`. Each adapter owns its own `create_schema`/
//! `update_schema` mapping and a tombstone default used when the CRM
//! reports an entity as not found.

use async_trait::async_trait;
use db::repositories::EntityKind;
use serde_json::{Value, json};

use crate::client::CrmClient;
use crate::error::CrmClientError;

pub const PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone)]
pub struct ListPage {
    pub result: Vec<Value>,
    pub total: u64,
    pub next: Option<u32>,
}

#[async_trait]
pub trait EntityAdapter: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Builds the request body for a create call from a canonical field map.
    fn create_schema(&self, fields: Value) -> Value;

    /// Builds the request body for an update call from a canonical field map.
    fn update_schema(&self, external_id: i64, fields: Value) -> Value;

    /// A tombstone record substituted when the CRM reports *not found*
    /// (spec §4.2, §8 property around `get_default`).
    fn get_default(&self, external_id: i64) -> Value;

    async fn get(&self, client: &CrmClient, external_id: i64) -> Result<Value, CrmClientError>;

    async fn list(
        &self,
        client: &CrmClient,
        select: &[&str],
        filter: Value,
        order: Value,
        start: u32,
    ) -> Result<ListPage, CrmClientError>;
}

fn list_page_from_body(body: Value) -> ListPage {
    let result = body.get("result").and_then(Value::as_array).cloned().unwrap_or_default();
    let total = body.get("total").and_then(Value::as_u64).unwrap_or(result.len() as u64);
    let next = body.get("next").and_then(Value::as_u64).map(|n| n as u32);
    ListPage { result, total, next }
}

pub struct DealAdapter;

#[async_trait]
impl EntityAdapter for DealAdapter {
    fn kind(&self) -> EntityKind {
        EntityKind::Deal
    }

    fn create_schema(&self, fields: Value) -> Value {
        json!({ "fields": fields })
    }

    fn update_schema(&self, external_id: i64, fields: Value) -> Value {
        json!({ "id": external_id, "fields": fields })
    }

    fn get_default(&self, external_id: i64) -> Value {
        json!({ "ID": external_id, "IS_DELETED_IN_BITRIX": true })
    }

    async fn get(&self, client: &CrmClient, external_id: i64) -> Result<Value, CrmClientError> {
        match client.call("crm.deal.get", json!({ "id": external_id })).await {
            Err(e) if e.is_not_found() => Ok(self.get_default(external_id)),
            other => other,
        }
    }

    async fn list(
        &self,
        client: &CrmClient,
        select: &[&str],
        filter: Value,
        order: Value,
        start: u32,
    ) -> Result<ListPage, CrmClientError> {
        let body = client
            .call_envelope(
                "crm.deal.list",
                json!({ "select": select, "filter": filter, "order": order, "start": start }),
            )
            .await?;
        Ok(list_page_from_body(body))
    }
}

pub struct LeadAdapter;

#[async_trait]
impl EntityAdapter for LeadAdapter {
    fn kind(&self) -> EntityKind {
        EntityKind::Lead
    }

    fn create_schema(&self, fields: Value) -> Value {
        json!({ "fields": fields })
    }

    fn update_schema(&self, external_id: i64, fields: Value) -> Value {
        json!({ "id": external_id, "fields": fields })
    }

    fn get_default(&self, external_id: i64) -> Value {
        json!({ "ID": external_id, "IS_DELETED_IN_BITRIX": true })
    }

    async fn get(&self, client: &CrmClient, external_id: i64) -> Result<Value, CrmClientError> {
        match client.call("crm.lead.get", json!({ "id": external_id })).await {
            Err(e) if e.is_not_found() => Ok(self.get_default(external_id)),
            other => other,
        }
    }

    async fn list(
        &self,
        client: &CrmClient,
        select: &[&str],
        filter: Value,
        order: Value,
        start: u32,
    ) -> Result<ListPage, CrmClientError> {
        let body = client
            .call_envelope(
                "crm.lead.list",
                json!({ "select": select, "filter": filter, "order": order, "start": start }),
            )
            .await?;
        Ok(list_page_from_body(body))
    }
}

/// `crm.item.*` family used by entity types addressed through the dynamic
/// item API rather than a fixed `crm.<entity>.*` namespace (e.g. product
/// rows' parent deal lookups go through `crm.item`, but here we model the
/// generic item shape for any `entityTypeId`-bearing kind).
pub struct ItemAdapter {
    kind: EntityKind,
    entity_type_id: i64,
}

impl ItemAdapter {
    pub fn new(kind: EntityKind, entity_type_id: i64) -> Self {
        ItemAdapter { kind, entity_type_id }
    }
}

#[async_trait]
impl EntityAdapter for ItemAdapter {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    fn create_schema(&self, fields: Value) -> Value {
        json!({ "entityTypeId": self.entity_type_id, "fields": fields })
    }

    fn update_schema(&self, external_id: i64, fields: Value) -> Value {
        json!({ "entityTypeId": self.entity_type_id, "id": external_id, "fields": fields })
    }

    fn get_default(&self, external_id: i64) -> Value {
        json!({ "id": external_id, "isDeletedInBitrix": true })
    }

    async fn get(&self, client: &CrmClient, external_id: i64) -> Result<Value, CrmClientError> {
        let body = json!({ "entityTypeId": self.entity_type_id, "id": external_id });
        match client.call("crm.item.get", body).await {
            Err(e) if e.is_not_found() => Ok(self.get_default(external_id)),
            other => other,
        }
    }

    async fn list(
        &self,
        client: &CrmClient,
        select: &[&str],
        filter: Value,
        order: Value,
        start: u32,
    ) -> Result<ListPage, CrmClientError> {
        let body = client
            .call_envelope(
                "crm.item.list",
                json!({
                    "entityTypeId": self.entity_type_id,
                    "select": select,
                    "filter": filter,
                    "order": order,
                    "start": start,
                }),
            )
            .await?;
        Ok(list_page_from_body(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deal_create_schema_wraps_fields() {
        let adapter = DealAdapter;
        let schema = adapter.create_schema(json!({ "TITLE": "New deal" }));
        assert_eq!(schema["fields"]["TITLE"], "New deal");
    }

    #[test]
    fn deal_get_default_is_tombstoned() {
        let adapter = DealAdapter;
        let default = adapter.get_default(42);
        assert_eq!(default["ID"], 42);
        assert_eq!(default["IS_DELETED_IN_BITRIX"], true);
    }

    #[test]
    fn item_adapter_carries_entity_type_id() {
        let adapter = ItemAdapter::new(EntityKind::Product, 1058);
        let schema = adapter.update_schema(7, json!({ "name": "x" }));
        assert_eq!(schema["entityTypeId"], 1058);
        assert_eq!(schema["id"], 7);
    }
}
