use sqlx::PgPool;
use tracing::info;

use crm_client::CrmClient;
use crm_client::wire::id_from_wire;
use db::models::department::{Department, DepartmentData};

use crate::error::IngestError;

/// Pull-all department import (spec §4.11): no existence gating, every CRM
/// department is upserted locally on each run.
pub async fn import_all(pool: &PgPool, crm: &CrmClient) -> Result<usize, IngestError> {
    let body = crm.call("department.get", serde_json::json!({})).await?;
    let rows = body.as_array().cloned().unwrap_or_default();

    let mut imported = 0;
    for row in &rows {
        let Some(external_id) = row.get("ID").and_then(id_from_wire) else { continue };
        let name = row.get("NAME").and_then(serde_json::Value::as_str).unwrap_or_default().to_string();
        let parent_external_id = row.get("PARENT").and_then(id_from_wire);

        Department::upsert(pool, external_id, DepartmentData { name, parent_external_id }).await?;
        imported += 1;
    }

    info!(imported, "department import complete");
    Ok(imported)
}
