use serde_json::json;

use crm_client::CrmClient;

/// Combines the submitted comment with the attached (or missing) product
/// name into one line, matching the order the original handler writes
/// (comment first, product line last).
pub fn complex_comment(product_name: &str, comment: Option<&str>) -> String {
    let mut lines = Vec::new();
    if let Some(comment) = comment
        && !comment.is_empty()
    {
        lines.push(comment.to_string());
    }
    lines.push(format!("Товар: {product_name}"));
    lines.join("\n")
}

/// Posts a timeline note on the newly created deal (spec §4.9 step 5).
/// Failure here is non-fatal — the deal and product attach already
/// succeeded independently.
pub async fn post_note(crm: &CrmClient, deal_external_id: i64, message: &str) -> bool {
    let result = crm
        .call(
            "crm.timeline.comment.add",
            json!({ "fields": { "ENTITY_ID": deal_external_id, "ENTITY_TYPE": "deal", "COMMENT": message } }),
        )
        .await;
    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complex_comment_puts_product_last() {
        let text = complex_comment("Насос X", Some("срочно нужна цена"));
        assert_eq!(text, "срочно нужна цена\nТовар: Насос X");
    }

    #[test]
    fn complex_comment_without_user_comment() {
        let text = complex_comment("Насос X", None);
        assert_eq!(text, "Товар: Насос X");
    }
}
