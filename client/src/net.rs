use kartvisning_shared::{
    BaseConfig, MapError, ProjectConfig, ProjectEntry, TokenResponse, TransformedCoordinate,
};

async fn get_text(url: &str) -> Result<String, String> {
    let resp = gloo_net::http::Request::get(url)
        .send()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;

    if !resp.ok() {
        return Err(format!("HTTP {}", resp.status()));
    }

    resp.text().await.map_err(|e| format!("read error: {e}"))
}

async fn get_json<T: serde::de::DeserializeOwned>(url: &str) -> Result<T, String> {
    let resp = gloo_net::http::Request::get(url)
        .send()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;

    if !resp.ok() {
        return Err(format!("HTTP {}", resp.status()));
    }

    resp.json::<T>()
        .await
        .map_err(|e| format!("parse error: {e}"))
}

/// Project descriptor. Network failures and bad statuses become `ConfigFetch`,
/// malformed documents `ConfigParse`.
pub async fn fetch_project(name: &str, url: &str) -> Result<ProjectConfig, MapError> {
    let body = get_text(url)
        .await
        .map_err(|reason| MapError::config_fetch(name, reason))?;
    ProjectConfig::from_json(&body)
}

pub async fn fetch_base_config() -> Result<BaseConfig, String> {
    get_json("/config/baseconfig.json").await
}

pub async fn fetch_projects() -> Result<Vec<ProjectEntry>, String> {
    get_json("/api/projects").await
}

pub async fn fetch_token() -> Result<String, String> {
    get_json::<TokenResponse>("/api/token")
        .await
        .map(|body| body.token)
}

pub async fn fetch_transform(url: &str) -> Result<TransformedCoordinate, MapError> {
    get_json(url).await.map_err(MapError::TransformFetch)
}

/// Raw GeoJSON for a vector overlay.
pub async fn fetch_geojson(url: &str) -> Result<String, String> {
    get_text(url).await
}
