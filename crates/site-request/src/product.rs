use serde_json::{Value, json};
use sqlx::PgPool;
use tracing::warn;

use crm_client::CrmClient;
use crm_client::wire::id_from_wire;
use db::models::product::Product;
use db::models::product_line::{ProductLine, ProductLineRow};

/// Owner-type code `crm.item.productrow.set` expects for a deal (spec §6).
const OWNER_TYPE_DEAL: &str = "D";

/// Attaches a single product row to a deal by catalog `XML_ID` (spec §4.9
/// step 4). Returns the attached product's display name on success so the
/// caller can fold it into the timeline note; any failure — missing
/// catalog row, CRM rejection — is swallowed and reported as `None` rather
/// than aborting the request.
pub async fn attach_product(
    pool: &PgPool,
    crm: &CrmClient,
    deal_external_id: i64,
    xml_id: &str,
    discount: Option<f64>,
) -> Option<String> {
    let product = match Product::find_by_xml_id(pool, xml_id).await {
        Ok(product) => product,
        Err(e) => {
            warn!(xml_id, deal_external_id, error = %e, "product not found in catalog, skipping attach");
            return None;
        }
    };

    let mut row = json!({
        "productId": product.external_id,
        "productName": product.name,
        "quantity": 0,
        "price": product.price,
    });
    if let Some(discount) = discount {
        row["discountSum"] = json!(discount);
    }

    let response = match crm
        .call(
            "crm.item.productrow.set",
            json!({ "ownerId": deal_external_id, "ownerType": OWNER_TYPE_DEAL, "productRows": [row] }),
        )
        .await
    {
        Ok(response) => response,
        Err(e) => {
            warn!(xml_id, deal_external_id, error = %e, "CRM rejected product row attach");
            return None;
        }
    };

    let Some(rows) = response.get("productRows").and_then(Value::as_array) else {
        warn!(xml_id, deal_external_id, "product row response carried no productRows");
        return None;
    };

    let saved: Vec<ProductLineRow> = rows
        .iter()
        .filter_map(|row| {
            Some(ProductLineRow {
                external_id: row.get("id").and_then(id_from_wire)?,
                product_external_id: product.external_id,
                product_name: product.name.clone(),
                price: row.get("price").and_then(Value::as_f64).unwrap_or(product.price),
                quantity: row.get("quantity").and_then(Value::as_f64).unwrap_or(0.0),
                discount_rate: discount,
            })
        })
        .collect();

    if let Err(e) = ProductLine::replace_for_deal(pool, deal_external_id, saved).await {
        warn!(deal_external_id, error = %e, "failed to persist product line locally");
    }

    Some(product.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_type_is_deal_code() {
        assert_eq!(OWNER_TYPE_DEAL, "D");
    }
}
