//! Parses the fixed Russian-label template used by the price-request emails
//! (`"Товар: ... (ID: ...)"`, `"Имя: ..."`, `"Телефон: ..."`, `"Комментарий: ..."`)
//! into a typed record, grounded in the original's `RequestParserService`.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedRequest {
    pub product: Option<String>,
    pub product_id: Option<i64>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub comment: Option<String>,
    pub raw_text: String,
}

static COMPREHENSIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)Товар:\s*(.+?)\s*\(ID:\s*(\d+)\s*\)\s*\r?\n\
           Имя:\s*([^\r\n]*)\s*\r?\n\
           Телефон:\s*([\d\s+()\-]+)\s*\r?\n\
           Комментарий:\s*([^\r\n]*)",
    )
    .expect("static pattern")
});

static PRODUCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Товар:\s*(.+?)(?:\s*\(|$)").expect("static pattern"));
static PRODUCT_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)ID:\s*(\d+)").expect("static pattern"));
static NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Имя:\s*([^\r\n]*)").expect("static pattern"));
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Телефон:\s*([\d\s+()\-]+)").expect("static pattern"));
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Комментарий:\s*([^\r\n]*)").expect("static pattern"));

/// Normalizes a Russian phone number to a bare `7XXXXXXXXXX` digit string.
fn clean_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();
    if let Some(rest) = digits.strip_prefix('8') {
        format!("7{rest}")
    } else if let Some(rest) = digits.strip_prefix("+7") {
        format!("7{rest}")
    } else {
        digits
    }
}

/// Tries the full four-field template first, falling back to extracting
/// whichever individual fields are present when the body doesn't match the
/// exact line order (e.g. extra blank lines from a quoted-reply client).
pub fn parse_request(text: &str) -> Option<ParsedRequest> {
    if text.trim().is_empty() {
        return None;
    }
    let raw_text = text.trim().to_string();

    if let Some(caps) = COMPREHENSIVE.captures(text) {
        return Some(ParsedRequest {
            product: Some(caps[1].trim().to_string()),
            product_id: caps[2].trim().parse().ok(),
            name: Some(caps[3].trim().to_string()),
            phone: Some(clean_phone(caps[4].trim())),
            comment: Some(caps[5].trim().to_string()),
            raw_text,
        });
    }

    let mut parsed = ParsedRequest { raw_text, ..Default::default() };

    if let Some(caps) = PRODUCT.captures(text) {
        parsed.product = Some(caps[1].trim().to_string());
    }
    if let Some(caps) = PRODUCT_ID.captures(text) {
        parsed.product_id = caps[1].trim().parse().ok();
    }
    if let Some(caps) = NAME.captures(text) {
        let value = caps[1].trim().to_string();
        if !value.is_empty() && !value.starts_with("Телефон:") {
            parsed.name = Some(value);
        }
    }
    if let Some(caps) = PHONE.captures(text) {
        let value = caps[1].trim();
        if !value.is_empty() && !value.starts_with("Комментарий:") {
            parsed.phone = Some(clean_phone(value));
        }
    }
    if let Some(caps) = COMMENT.captures(text) {
        let value = caps[1].trim().to_string();
        if !value.is_empty() {
            parsed.comment = Some(value);
        }
    }

    Some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_full_template_in_order() {
        let body = "Товар: Насос Grundfos (ID: 4821)\r\nИмя: Иван\r\nТелефон: +7 (912) 345-67-89\r\nКомментарий: нужен срочно";
        let parsed = parse_request(body).unwrap();
        assert_eq!(parsed.product.as_deref(), Some("Насос Grundfos"));
        assert_eq!(parsed.product_id, Some(4821));
        assert_eq!(parsed.name.as_deref(), Some("Иван"));
        assert_eq!(parsed.phone.as_deref(), Some("79123456789"));
        assert_eq!(parsed.comment.as_deref(), Some("нужен срочно"));
    }

    #[test]
    fn falls_back_to_individual_fields_out_of_order() {
        let body = "Комментарий: перезвоните\nТовар: Клапан (ID: 12)\nТелефон: 89261234567";
        let parsed = parse_request(body).unwrap();
        assert_eq!(parsed.product.as_deref(), Some("Клапан"));
        assert_eq!(parsed.product_id, Some(12));
        assert_eq!(parsed.phone.as_deref(), Some("79261234567"));
        assert_eq!(parsed.comment.as_deref(), Some("перезвоните"));
        assert_eq!(parsed.name, None);
    }

    #[test]
    fn empty_body_parses_to_none() {
        assert_eq!(parse_request("   "), None);
    }

    #[test]
    fn cleans_phone_prefixes() {
        assert_eq!(clean_phone("8 (912) 345-67-89"), "79123456789");
        assert_eq!(clean_phone("+7-912-345-67-89"), "79123456789");
    }
}
