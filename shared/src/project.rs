use serde::{Deserialize, Serialize};

use crate::error::MapError;
use crate::layers::{LayerGroup, TileLayerDescriptor, VectorLayerDescriptor};
use crate::url_state::UrlState;
use crate::view::{Extent, MatrixIds, ViewParameters};
use crate::visibility::Visibility;

/// A project descriptor as served from `projects/{name}.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub config: ProjectSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    #[serde(default)]
    pub project: Option<ProjectMeta>,
    #[serde(default)]
    pub mapepsg: Option<String>,
    #[serde(default)]
    pub mapbounds: MapBounds,
    #[serde(default)]
    pub center: Option<[f64; 2]>,
    #[serde(default)]
    pub zoom: Option<f64>,
    #[serde(default)]
    pub maplayer: Vec<LayerGroup>,
    #[serde(default)]
    pub layer: Vec<TileLayerDescriptor>,
    #[serde(default)]
    pub vector: Option<Vec<VectorLayerDescriptor>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapBounds {
    #[serde(default)]
    pub mapbound: Vec<MapBound>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapBound {
    pub epsg: String,
    pub extent: String,
}

impl MapBounds {
    /// Configured extent for `code`, or the degenerate zero extent when none is listed.
    pub fn extent_for(&self, code: &str) -> Result<Extent, MapError> {
        match self.mapbound.iter().find(|b| b.epsg == code) {
            Some(bound) => Extent::parse(&bound.extent),
            None => Ok(Extent::ZERO),
        }
    }
}

/// Entry in the project catalog (`/api/projects`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    #[serde(rename = "SiteTitle")]
    pub site_title: String,
    #[serde(rename = "ProjectName")]
    pub project_name: String,
}

/// Defaults applied when a project descriptor leaves something out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseConfig {
    pub project: BaseProject,
    pub basemap: BaseMap,
    #[serde(default = "default_koordtrans_url")]
    pub koordtrans_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseProject {
    pub name: String,
    pub mapepsg: String,
    pub center: [f64; 2],
    pub zoom: f64,
}

/// Background WMTS source drawn beneath every project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseMap {
    pub url: String,
    pub layers: String,
    #[serde(rename = "matrixSet")]
    pub matrix_set: String,
    pub format: String,
}

fn default_koordtrans_url() -> String {
    "https://ws.geonorge.no/transformering/v1/transformer".to_string()
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            project: BaseProject {
                name: "norgeskart".to_string(),
                mapepsg: "EPSG:25833".to_string(),
                center: [570_130.0, 7_032_664.0],
                zoom: 4.0,
            },
            basemap: BaseMap {
                url: "https://cache.kartverket.no/v1/wmts/1.0.0/?".to_string(),
                layers: "topograatone".to_string(),
                matrix_set: "utm33n".to_string(),
                format: "image/png".to_string(),
            },
            koordtrans_url: default_koordtrans_url(),
        }
    }
}

/// `{origin}{pathname}projects/{name}.json`.
pub fn project_url(origin: &str, pathname: &str, name: &str) -> String {
    let mut base = format!("{origin}{pathname}");
    if !base.ends_with('/') {
        // "/app/index.html" -> "/app/"
        match base.rfind('/') {
            Some(idx) if idx + 1 > origin.len() => base.truncate(idx + 1),
            _ => base.push('/'),
        }
    }
    format!("{base}projects/{name}.json")
}

impl ProjectConfig {
    pub fn from_json(raw: &str) -> Result<Self, MapError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Project name, falling back to the base project.
    pub fn name<'a>(&'a self, base: &'a BaseConfig) -> &'a str {
        match &self.config.project {
            Some(meta) if !meta.name.is_empty() => &meta.name,
            _ => &base.project.name,
        }
    }

    /// Target projection code. Only honoured when the descriptor carries project metadata.
    pub fn map_epsg<'a>(&'a self, base: &'a BaseConfig) -> &'a str {
        match (&self.config.project, &self.config.mapepsg) {
            (Some(_), Some(code)) if !code.is_empty() => code,
            _ => &base.project.mapepsg,
        }
    }

    pub fn initial_center(&self, base: &BaseConfig) -> (f64, f64) {
        match self.config.center {
            Some([x, y]) if x.is_finite() && y.is_finite() => (x, y),
            _ => (base.project.center[0], base.project.center[1]),
        }
    }

    pub fn initial_zoom(&self, base: &BaseConfig) -> f64 {
        match self.config.zoom {
            Some(z) if z.is_finite() => z,
            _ => base.project.zoom,
        }
    }

    pub fn vector_layers(&self) -> &[VectorLayerDescriptor] {
        self.config.vector.as_deref().unwrap_or(&[])
    }

    pub fn view_parameters(&self, base: &BaseConfig) -> Result<ViewParameters, MapError> {
        let code = self.map_epsg(base);
        let extent = self.config.mapbounds.extent_for(code)?;
        ViewParameters::build(code, extent, MatrixIds::Level)
    }

    /// Overlay URL parameters onto a freshly fetched descriptor.
    ///
    /// With a `layers` parameter every WMTS layer is hidden first and the layer
    /// it names is shown afterwards, so the URL choice always wins. Without one
    /// the configured visibilities are kept.
    pub fn apply_url_overrides(&mut self, url: &UrlState) {
        if let (Some(lon), Some(lat)) = (url.lon, url.lat) {
            self.config.center = Some([lon, lat]);
        }
        if let Some(zoom) = url.zoom {
            self.config.zoom = Some(zoom);
        }
        let Some(selected) = url.layers.as_deref() else {
            return;
        };
        for layer in &mut self.config.layer {
            if layer.is_wmts() {
                layer.options.visibility = Visibility::Hidden;
            }
            if layer.name == selected {
                layer.options.visibility = Visibility::Visible;
            }
        }
    }
}
