use axum::Json;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use kartvisning_shared::{BaseConfig, HealthResponse, ProjectEntry, TokenResponse};
use tracing::warn;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let catalog = state.catalog.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        projects: catalog.entries.len(),
        invalid_projects: catalog.invalid,
        started_at: state.started_at.to_rfc3339(),
    })
}

pub async fn list_projects(State(state): State<AppState>) -> Json<Vec<ProjectEntry>> {
    Json(state.catalog.read().await.entries.clone())
}

pub async fn get_base_config(State(state): State<AppState>) -> Json<BaseConfig> {
    Json(BaseConfig::clone(&state.base_config))
}

/// Proxies the session token from the configured ticket service.
pub async fn get_token(State(state): State<AppState>) -> Response {
    let Some(upstream) = state.token_upstream_url.as_deref() else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    let token = match fetch_token(&state.http_client, upstream).await {
        Ok(token) => token,
        Err(e) => {
            warn!(%upstream, "token upstream failed: {e}");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let mut response = Json(TokenResponse { token }).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

async fn fetch_token(client: &reqwest::Client, upstream: &str) -> Result<String, String> {
    let resp = client
        .get(upstream)
        .send()
        .await
        .map_err(|e| format!("request error: {e}"))?;
    if !resp.status().is_success() {
        return Err(format!("HTTP {}", resp.status()));
    }
    let body = resp
        .text()
        .await
        .map_err(|e| format!("read error: {e}"))?;
    parse_token(&body).ok_or_else(|| "empty token".to_string())
}

/// The ticket service answers with either a JSON string or bare text.
fn parse_token(body: &str) -> Option<String> {
    let trimmed = body.trim();
    let token = match serde_json::from_str::<String>(trimmed) {
        Ok(unquoted) => unquoted.trim().to_string(),
        Err(_) => trimmed.to_string(),
    };
    (!token.is_empty()).then_some(token)
}
