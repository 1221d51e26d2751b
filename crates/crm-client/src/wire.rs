//! CRM field wire-encoding (spec §6), grounded in the original's
//! `schemas/fields.py` constant tables. Kept in the adapter layer so the
//! rest of the system sees one canonical record shape (spec §9 design note).

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

pub fn bool_to_wire_normal(value: bool) -> &'static str {
    if value { "Y" } else { "N" }
}

pub fn bool_to_wire_uf(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Inbound truthiness per spec §6: `{"Y","1",1,true}` all mean true.
pub fn bool_from_wire(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s == "Y" || s == "1",
        _ => false,
    }
}

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";
const RU_DATETIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

pub fn datetime_to_wire(value: DateTime<Utc>) -> String {
    value.format(ISO_FORMAT).to_string()
}

/// The one documented exception (spec §6): last-communication-time uses
/// `DD.MM.YYYY HH:MM:SS` instead of ISO-8601.
pub fn datetime_to_wire_ru(value: DateTime<Utc>) -> String {
    value.format(RU_DATETIME_FORMAT).to_string()
}

pub fn datetime_from_wire(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_str(raw, ISO_FORMAT) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, RU_DATETIME_FORMAT) {
        return Some(naive.and_utc());
    }
    None
}

/// Dual-alias fields use ALL-CAPS for `alias_choice = 1` and camelCase for
/// `= 2`; default to the first alias on any other input (spec §6).
pub fn dual_alias_to_wire<'a>(alias_choice: u8, alias_one: &'a str, alias_two: &'a str) -> &'a str {
    match alias_choice {
        2 => alias_two,
        _ => alias_one,
    }
}

pub fn money_to_wire(amount: f64, currency: &str) -> String {
    format!("{amount}|{currency}")
}

pub fn money_from_wire(raw: &str) -> Option<(f64, String)> {
    let (amount, currency) = raw.split_once('|')?;
    let amount: f64 = amount.parse().ok()?;
    Some((amount, currency.to_string()))
}

/// Field-value wrapper used by some multi-value CRM fields:
/// `{valueId, value}` where `value` is a scalar or `{TEXT, TYPE}`.
pub fn field_value_text(wrapped: &Value) -> Option<String> {
    match wrapped.get("value") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(obj)) => obj.get("TEXT").and_then(Value::as_str).map(str::to_string),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Normalizes an inbound scalar: empty strings become null, numeric-looking
/// strings become numbers (used for ID fields per spec §6).
pub fn normalize_inbound(value: Value) -> Value {
    match value {
        Value::String(s) if s.is_empty() => Value::Null,
        Value::String(s) => {
            if let Ok(n) = s.parse::<i64>() {
                Value::Number(n.into())
            } else {
                Value::String(s)
            }
        }
        other => other,
    }
}

pub fn id_from_wire(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) if !s.is_empty() => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bool_wire_round_trips_for_normal_fields() {
        assert_eq!(bool_to_wire_normal(true), "Y");
        assert_eq!(bool_to_wire_normal(false), "N");
        assert!(bool_from_wire(&Value::String("Y".into())));
        assert!(!bool_from_wire(&Value::String("N".into())));
    }

    #[test]
    fn bool_wire_accepts_uf_style_and_numeric_true() {
        assert!(bool_from_wire(&Value::String("1".into())));
        assert!(bool_from_wire(&Value::Number(1.into())));
        assert!(bool_from_wire(&Value::Bool(true)));
        assert!(!bool_from_wire(&Value::Number(0.into())));
    }

    #[test]
    fn datetime_round_trips_iso() {
        let dt = Utc.with_ymd_and_hms(2025, 11, 20, 10, 30, 0).unwrap();
        let wire = datetime_to_wire(dt);
        let back = datetime_from_wire(&wire).unwrap();
        assert_eq!(back, dt);
    }

    #[test]
    fn datetime_parses_ru_format() {
        let parsed = datetime_from_wire("20.11.2025 10:30:00").unwrap();
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2025-11-20");
    }

    #[test]
    fn dual_alias_picks_by_choice_and_defaults_to_first() {
        assert_eq!(dual_alias_to_wire(1, "NEW", "new"), "NEW");
        assert_eq!(dual_alias_to_wire(2, "NEW", "new"), "new");
        assert_eq!(dual_alias_to_wire(99, "NEW", "new"), "NEW");
    }

    #[test]
    fn money_round_trips() {
        let wire = money_to_wire(1_953_500.0, "KZT");
        assert_eq!(wire, "1953500|KZT");
        let (amount, currency) = money_from_wire(&wire).unwrap();
        assert_eq!(amount, 1_953_500.0);
        assert_eq!(currency, "KZT");
    }

    #[test]
    fn normalize_inbound_empty_string_becomes_null() {
        assert_eq!(normalize_inbound(Value::String(String::new())), Value::Null);
    }

    #[test]
    fn normalize_inbound_numeric_string_becomes_number() {
        assert_eq!(normalize_inbound(Value::String("42".into())), Value::Number(42.into()));
    }

    #[test]
    fn id_from_wire_parses_both_shapes() {
        assert_eq!(id_from_wire(&Value::String("42".into())), Some(42));
        assert_eq!(id_from_wire(&Value::Number(42.into())), Some(42));
        assert_eq!(id_from_wire(&Value::String(String::new())), None);
    }
}
