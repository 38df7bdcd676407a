use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kartvisning_shared::{BaseConfig, ProjectEntry};
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::{
    base_config, client_dist_dir, projects_dir, token_upstream_url, upstream_connect_timeout,
    upstream_http_timeout,
};

/// Result of the last scan of the projects directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectCatalog {
    pub entries: Vec<ProjectEntry>,
    /// Descriptor files that failed to parse on the last scan.
    pub invalid: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<RwLock<ProjectCatalog>>,
    pub base_config: Arc<BaseConfig>,
    pub projects_dir: PathBuf,
    pub client_dist_dir: PathBuf,
    pub token_upstream_url: Option<String>,
    pub http_client: reqwest::Client,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn from_env() -> Self {
        Self::new(
            base_config(),
            projects_dir(),
            client_dist_dir(),
            token_upstream_url(),
        )
    }

    pub fn new(
        base_config: BaseConfig,
        projects_dir: PathBuf,
        client_dist_dir: PathBuf,
        token_upstream_url: Option<String>,
    ) -> Self {
        let request_timeout = upstream_http_timeout();
        let connect_timeout = upstream_connect_timeout();
        let http_client = reqwest::Client::builder()
            .user_agent("kartvisning/0.1")
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(
                    error = %e,
                    "failed to build configured HTTP client, falling back to defaults"
                );
                reqwest::Client::new()
            });
        Self {
            catalog: Arc::new(RwLock::new(ProjectCatalog::default())),
            base_config: Arc::new(base_config),
            projects_dir,
            client_dist_dir,
            token_upstream_url,
            http_client,
            started_at: Utc::now(),
        }
    }
}
