use thiserror::Error;

/// Failures raised while loading configuration and reconciling map state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapError {
    /// Network failure or non-success status while fetching a project descriptor.
    #[error("failed to fetch project '{project}': {reason}")]
    ConfigFetch { project: String, reason: String },

    /// Project descriptor fetched but not a valid configuration document.
    #[error("invalid project configuration: {0}")]
    ConfigParse(String),

    /// Extent string that is not four comma-separated numbers.
    #[error("invalid extent '{0}'")]
    InvalidExtent(String),

    /// Extent with zero (or negative) width; no resolution ladder can be derived from it.
    #[error("degenerate extent for {code}: width {width}")]
    DegenerateExtent { code: String, width: f64 },

    /// Map operation invoked while no live map instance is active.
    #[error("map operation '{operation}' called before the map was initialized")]
    NotInitialized { operation: &'static str },

    /// Async result that belongs to a superseded request or project.
    #[error("discarded stale {kind} response")]
    StaleResponse { kind: &'static str },

    /// Layer id that is not present in the registry.
    #[error("unknown layer '{0}'")]
    UnknownLayer(String),

    /// Tile layer whose distribution protocol the map cannot render.
    #[error("layer '{guid}' uses unsupported protocol '{protocol}'")]
    UnsupportedProtocol { guid: String, protocol: String },

    /// Coordinate transform service failure.
    #[error("coordinate transform failed: {0}")]
    TransformFetch(String),
}

impl MapError {
    pub fn config_fetch(project: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigFetch {
            project: project.into(),
            reason: reason.into(),
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleResponse { .. })
    }

    /// Errors the user should see in the UI rather than only in the console.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::ConfigFetch { .. }
                | Self::ConfigParse(_)
                | Self::InvalidExtent(_)
                | Self::DegenerateExtent { .. }
        )
    }
}

impl From<serde_json::Error> for MapError {
    fn from(e: serde_json::Error) -> Self {
        Self::ConfigParse(e.to_string())
    }
}
