use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::json;

use site_request::SiteRequestInput;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SiteRequestParams {
    pub phone: String,
    pub name: Option<String>,
    pub product_id: Option<String>,
    pub product_discount: Option<f64>,
    pub comment: Option<String>,
    pub message_id: Option<String>,
}

/// GET /api/v1/b24/site-request — mirrors the original's query-param API
/// (the site backend calls this synchronously while the customer waits).
pub async fn handle(
    State(state): State<AppState>,
    axum::extract::Query(params): axum::extract::Query<SiteRequestParams>,
) -> (StatusCode, Json<serde_json::Value>) {
    let input = SiteRequestInput {
        phone: params.phone,
        name: params.name,
        product_xml_id: params.product_id,
        product_discount: params.product_discount,
        comment: params.comment,
        message_id: params.message_id,
    };

    match site_request::handle_request(&state.pool, &state.crm, &input).await {
        Ok(result) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "deal_id": result.deal_external_id,
                "product_attached": result.product_attached,
                "timeline_posted": result.timeline_posted,
            })),
        ),
        Err(e) => (StatusCode::OK, Json(json!({ "success": false, "error": e.to_string() }))),
    }
}
