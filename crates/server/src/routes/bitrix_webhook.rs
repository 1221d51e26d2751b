use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;

use webhook::WebhookGateway;

use crate::AppState;

/// POST /api/bitrix/webhook — Bitrix24 posts `application/x-www-form-urlencoded`
/// bodies with bracket-nested keys; axum's own `Form` extractor collapses
/// duplicate keys, so the raw body is decoded into ordered pairs instead.
pub async fn handle(State(state): State<AppState>, body: Bytes) -> (StatusCode, Json<serde_json::Value>) {
    let form: Vec<(String, String)> = match serde_urlencoded::from_bytes(&body) {
        Ok(pairs) => pairs,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "validation_error", "detail": e.to_string() })),
            );
        }
    };

    let gateway = WebhookGateway { config: &state.config, pool: &state.pool, crm: &state.crm, locks: &state.locks };
    let response = gateway.handle(&form).await;

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body))
}
