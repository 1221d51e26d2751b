use chrono::Utc;
use serde_json::Value;
use tracing::warn;

use config::WebhookConfig;

use crate::error::WebhookError;

#[derive(Debug, Clone)]
pub struct WebhookAuth {
    pub application_token: String,
    pub domain: String,
}

#[derive(Debug, Clone)]
pub struct WebhookPayload {
    pub event: String,
    pub ts: i64,
    pub auth: WebhookAuth,
    pub data: Value,
}

pub fn parse_payload(tree: &Value) -> Result<WebhookPayload, WebhookError> {
    let event = tree
        .get("event")
        .and_then(Value::as_str)
        .ok_or_else(|| WebhookError::Validation("missing `event`".into()))?
        .to_string();

    let ts = tree
        .get("ts")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| WebhookError::Validation("missing or non-numeric `ts`".into()))?;

    let auth = tree.get("auth").ok_or_else(|| WebhookError::Validation("missing `auth`".into()))?;
    let application_token = auth
        .get("application_token")
        .and_then(Value::as_str)
        .ok_or_else(|| WebhookError::Validation("missing `auth[application_token]`".into()))?
        .to_string();
    let domain = auth
        .get("domain")
        .and_then(Value::as_str)
        .ok_or_else(|| WebhookError::Validation("missing `auth[domain]`".into()))?
        .to_string();

    let data = tree.get("data").cloned().unwrap_or(Value::Null);

    Ok(WebhookPayload { event, ts, auth: WebhookAuth { application_token, domain }, data })
}

/// Validates the event against the allowed set (spec §4.6 step 2).
pub fn validate_event(config: &WebhookConfig, event: &str) -> Result<(), WebhookError> {
    if config.allowed_events.contains(&event.to_uppercase()) {
        Ok(())
    } else {
        warn!(event, "webhook event not in allowed set");
        Err(WebhookError::Validation(format!("event '{event}' is not allowed")))
    }
}

/// Validates the application token maps to exactly the supplied domain, and
/// the timestamp is a non-negative, non-future unix second within `max_age`.
pub fn validate_security(config: &WebhookConfig, auth: &WebhookAuth, ts: i64) -> Result<(), WebhookError> {
    let expected_domain = config.token_to_domain.get(&auth.application_token);
    if expected_domain != Some(&auth.domain) {
        warn!(domain = %auth.domain, "webhook application token did not match the configured domain");
        return Err(WebhookError::Security("invalid webhook token".into()));
    }

    let now = Utc::now().timestamp();
    let age = now - ts;
    if age < 0 || age > config.max_age_secs {
        warn!(ts, age, max_age = config.max_age_secs, "webhook timestamp is invalid or too old");
        return Err(WebhookError::Security("webhook timestamp is invalid or too old".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};

    fn config() -> WebhookConfig {
        let mut token_to_domain = HashMap::new();
        token_to_domain.insert("tok".to_string(), "example.bitrix24.ru".to_string());
        WebhookConfig {
            token_to_domain,
            max_age_secs: 300,
            allowed_events: HashSet::from(["ONCRMDEALUPDATE".to_string()]),
        }
    }

    #[test]
    fn parses_a_well_formed_payload() {
        let tree = json!({
            "event": "ONCRMDEALUPDATE",
            "ts": "1700000000",
            "auth": { "application_token": "tok", "domain": "example.bitrix24.ru" },
            "data": { "FIELDS": { "ID": "42" } },
        });
        let payload = parse_payload(&tree).unwrap();
        assert_eq!(payload.event, "ONCRMDEALUPDATE");
        assert_eq!(payload.ts, 1_700_000_000);
        assert_eq!(payload.data["FIELDS"]["ID"], "42");
    }

    #[test]
    fn rejects_event_outside_allowed_set() {
        let config = config();
        assert!(validate_event(&config, "ONCRMLEADADD").is_err());
        assert!(validate_event(&config, "ONCRMDEALUPDATE").is_ok());
    }

    #[test]
    fn rejects_mismatched_token_domain_pair() {
        let config = config();
        let auth = WebhookAuth { application_token: "tok".to_string(), domain: "other.bitrix24.ru".to_string() };
        assert!(validate_security(&config, &auth, Utc::now().timestamp()).is_err());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let config = config();
        let auth = WebhookAuth { application_token: "tok".to_string(), domain: "example.bitrix24.ru".to_string() };
        let stale = Utc::now().timestamp() - 10_000;
        assert!(validate_security(&config, &auth, stale).is_err());
    }
}
