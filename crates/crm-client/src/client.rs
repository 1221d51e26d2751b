use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use config::CrmConfig;
use reqwest::Client;
use serde_json::Value;
use token_store::{TokenKind, TokenStore};
use tracing::{debug, warn};

use crate::error::CrmClientError;

const PROVIDER: &str = "bitrix24";

/// Typed wrapper over the CRM's JSON-RPC surface (spec §4.2). Every call is
/// preceded by `get_valid_token`, and token-expiry errors trigger one
/// internal refresh-and-retry cycle without surfacing to the caller.
#[derive(Clone)]
pub struct CrmClient {
    http: Client,
    tokens: Arc<TokenStore>,
    config: CrmConfig,
    user_id: String,
}

impl CrmClient {
    pub fn new(config: CrmConfig, tokens: Arc<TokenStore>, service_user_id: i64) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client builds with default TLS backend");
        CrmClient { http, tokens, config, user_id: service_user_id.to_string() }
    }

    pub fn authorize_url(&self) -> String {
        format!(
            "{}/oauth/authorize/?client_id={}&redirect_uri={}",
            self.config.portal_url, self.config.client_id, self.config.redirect_uri
        )
    }

    /// Three-step flow from spec §4.2: cached access token, else refresh,
    /// else fail with an authorization URL the caller can hand to the user.
    async fn get_valid_token(&self) -> Result<String, CrmClientError> {
        if let Some(token) = self
            .tokens
            .get(TokenKind::Access, &self.user_id, PROVIDER)
            .await
            .map_err(|e| CrmClientError::Auth { message: e.to_string(), authorize_url: None })?
        {
            return Ok(token);
        }

        if let Some(refresh_token) = self
            .tokens
            .get(TokenKind::Refresh, &self.user_id, PROVIDER)
            .await
            .map_err(|e| CrmClientError::Auth { message: e.to_string(), authorize_url: None })?
        {
            return self.refresh_access_token(&refresh_token).await;
        }

        Err(CrmClientError::Auth {
            message: "no refresh token on file".to_string(),
            authorize_url: Some(self.authorize_url()),
        })
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, CrmClientError> {
        let url = format!("{}/oauth/token/", self.config.portal_url);
        let response = self
            .http
            .post(&url)
            .query(&[
                ("grant_type", "refresh_token"),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CrmClientError::Auth {
                message: format!("token refresh failed with status {}", response.status()),
                authorize_url: Some(self.authorize_url()),
            });
        }

        let body: Value = response.json().await?;
        let access_token = body["access_token"].as_str().unwrap_or_default().to_string();
        let new_refresh_token = body["refresh_token"].as_str().unwrap_or(refresh_token).to_string();
        let expires_in = body["expires_in"].as_u64();

        self.tokens
            .save(&access_token, TokenKind::Access, &self.user_id, PROVIDER, expires_in)
            .await
            .map_err(|e| CrmClientError::Auth { message: e.to_string(), authorize_url: None })?;
        self.tokens
            .save(&new_refresh_token, TokenKind::Refresh, &self.user_id, PROVIDER, None)
            .await
            .map_err(|e| CrmClientError::Auth { message: e.to_string(), authorize_url: None })?;

        Ok(access_token)
    }

    async fn invalidate_access_token(&self) {
        let _ = self.tokens.delete(TokenKind::Access, &self.user_id, PROVIDER).await;
    }

    /// Calls `method` with `params`, retrying up to `config.max_retries`
    /// times when the CRM reports an expired/invalid token (spec §4.2).
    /// Returns the envelope's `result` field.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, CrmClientError> {
        let body = self.call_with_retry(method, params).await?;
        body.get("result")
            .cloned()
            .ok_or_else(|| CrmClientError::Api {
                status: None,
                code: "missing_result".into(),
                description: "CRM response carried no `result` field".into(),
            })
    }

    /// As `call`, but returns the full response envelope so callers that
    /// need pagination metadata (`total`, `next`) alongside `result` can
    /// read them (spec §4.2 component C's `list` contract).
    pub async fn call_envelope(&self, method: &str, params: Value) -> Result<Value, CrmClientError> {
        self.call_with_retry(method, params).await
    }

    async fn call_with_retry(&self, method: &str, params: Value) -> Result<Value, CrmClientError> {
        (|| async { self.call_once(method, params.clone()).await })
            .retry(
                &ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(200))
                    .with_max_times(self.config.max_retries as usize)
                    .with_jitter(),
            )
            .when(|e: &CrmClientError| e.is_token_error())
            .notify(|err: &CrmClientError, dur: Duration| {
                warn!("CRM call failed with {err}, retrying after {:.2}s", dur.as_secs_f64());
            })
            .await
    }

    /// Performs one HTTP round trip and returns the raw JSON envelope
    /// (`{result, total, next}` or `{error, error_description}`).
    async fn call_once(&self, method: &str, params: Value) -> Result<Value, CrmClientError> {
        let token = self.get_valid_token().await?;
        let url = format!("{}/rest/{}", self.config.portal_url, method);

        let response = self.http.post(&url).query(&[("auth", token.as_str())]).json(&params).send().await;
        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_connect() || e.is_timeout() => {
                return Err(CrmClientError::Api { status: None, code: "transport".into(), description: e.to_string() });
            }
            Err(e) => return Err(CrmClientError::Transport(e)),
        };

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(CrmClientError::Auth { message: "CRM rejected credentials".into(), authorize_url: None });
        }

        let body: Value = response.json().await?;

        if let Some(error_code) = body.get("error").and_then(Value::as_str) {
            let description = body
                .get("error_description")
                .and_then(Value::as_str)
                .unwrap_or(error_code)
                .to_string();

            if error_code == "expired_token" || error_code == "invalid_token" {
                debug!(method, "CRM token stale, invalidating cached access token");
                self.invalidate_access_token().await;
            }
            if error_code == "NOT_FOUND" || description.to_lowercase().contains("not found") {
                return Err(CrmClientError::NotFound);
            }
            return Err(CrmClientError::Api {
                status: Some(status.as_u16()),
                code: error_code.to_string(),
                description,
            });
        }

        if body.get("result").is_none() {
            return Err(CrmClientError::Api {
                status: Some(status.as_u16()),
                code: "missing_result".into(),
                description: "CRM response carried no `result` field".into(),
            });
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::CrmConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_against(server: &MockServer) -> CrmClient {
        let config = CrmConfig {
            portal_url: server.uri(),
            client_id: "id".into(),
            client_secret: "secret".into(),
            redirect_uri: "https://example.test/cb".into(),
            max_retries: 2,
        };
        let tokens = Arc::new(TokenStore::new(&[7u8; 32]).unwrap());
        tokens.save("cached-token", TokenKind::Access, "1", PROVIDER, None).await.unwrap();
        CrmClient::new(config, tokens, 1)
    }

    #[tokio::test]
    async fn call_returns_result_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/crm.deal.get"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": { "ID": 42 } })))
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let result = client.call("crm.deal.get", serde_json::json!({ "id": 42 })).await.unwrap();
        assert_eq!(result["ID"], 42);
    }

    #[tokio::test]
    async fn call_surfaces_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/crm.deal.get"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "error": "NOT_FOUND", "error_description": "not found" })),
            )
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let err = client.call("crm.deal.get", serde_json::json!({ "id": 1 })).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn call_retries_on_expired_token_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/crm.deal.get"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "error": "expired_token", "error_description": "stale" })),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/crm.deal.get"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": { "ID": 9 } })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth/token/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh-token",
                "refresh_token": "fresh-refresh",
                "expires_in": 1800,
            })))
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        client
            .tokens
            .save("seed-refresh", TokenKind::Refresh, &client.user_id, PROVIDER, None)
            .await
            .unwrap();

        let result = client.call("crm.deal.get", serde_json::json!({ "id": 9 })).await.unwrap();
        assert_eq!(result["ID"], 9);
    }
}
