use std::path::PathBuf;
use std::time::Duration;

use kartvisning_shared::BaseConfig;

pub const DEFAULT_SERVER_PORT: u16 = 3000;
pub const DEFAULT_CLIENT_DIST_DIR: &str = "client/dist";
pub const DEFAULT_PROJECTS_DIR: &str = "projects";
pub const DEFAULT_CATALOG_REFRESH_SECS: u64 = 60;
pub const DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 3;

/// Trimmed, non-empty value of `key`.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn server_port() -> u16 {
    std::env::var("SERVER_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

pub fn client_dist_dir() -> PathBuf {
    env_string("CLIENT_DIST_DIR")
        .unwrap_or_else(|| DEFAULT_CLIENT_DIST_DIR.to_string())
        .into()
}

pub fn projects_dir() -> PathBuf {
    env_string("PROJECTS_DIR")
        .unwrap_or_else(|| DEFAULT_PROJECTS_DIR.to_string())
        .into()
}

pub fn catalog_refresh_interval() -> Duration {
    std::env::var("CATALOG_REFRESH_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_CATALOG_REFRESH_SECS))
}

/// Ticket service the session token is fetched from. Unset disables `/api/token`.
pub fn token_upstream_url() -> Option<String> {
    env_string("TOKEN_UPSTREAM_URL")
}

pub fn upstream_http_timeout() -> Duration {
    std::env::var("UPSTREAM_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_HTTP_TIMEOUT_SECS))
}

pub fn upstream_connect_timeout() -> Duration {
    std::env::var("UPSTREAM_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_UPSTREAM_CONNECT_TIMEOUT_SECS))
}

/// Built-in defaults with per-field environment overrides.
pub fn base_config() -> BaseConfig {
    let mut base = BaseConfig::default();
    if let Some(url) = env_string("BASEMAP_URL") {
        base.basemap.url = url;
    }
    if let Some(layer) = env_string("BASEMAP_LAYER") {
        base.basemap.layers = layer;
    }
    if let Some(matrix_set) = env_string("BASEMAP_MATRIX_SET") {
        base.basemap.matrix_set = matrix_set;
    }
    if let Some(format) = env_string("BASEMAP_FORMAT") {
        base.basemap.format = format;
    }
    if let Some(project) = env_string("DEFAULT_PROJECT") {
        base.project.name = project;
    }
    if let Some(url) = env_string("KOORDTRANS_URL") {
        base.koordtrans_url = url;
    }
    base
}
