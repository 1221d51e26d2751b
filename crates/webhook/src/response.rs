use serde_json::{Value, json};

/// Mirrors the §6 response table: every branch carries its own status code
/// and body shape, so the HTTP layer only needs to forward both verbatim.
#[derive(Debug, Clone)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: Value,
}

impl WebhookResponse {
    pub fn success(event: &str, message: &str) -> Self {
        WebhookResponse {
            status: 200,
            body: json!({ "status": "ok", "message": message, "event": event, "timestamp": now() }),
        }
    }

    pub fn skipped(event: &str, message: &str, suggestion: &str) -> Self {
        WebhookResponse {
            status: 409,
            body: json!({
                "status": "skipped",
                "message": message,
                "event": event,
                "timestamp": now(),
                "suggestion": suggestion,
            }),
        }
    }

    pub fn error(status: u16, detail: impl Into<String>) -> Self {
        WebhookResponse { status, body: json!({ "error": status_label(status), "detail": detail.into() }) }
    }
}

fn status_label(status: u16) -> &'static str {
    match status {
        400 => "validation_error",
        401 => "security_error",
        404 => "not_found",
        500 => "internal_error",
        _ => "error",
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
