use kartvisning_shared::{
    BaseConfig, DistributionProtocol, MapError, MatrixIds, ProjectConfig, TileGrid,
    TileLayerDescriptor, UrlState, VectorLayerDescriptor, ViewParameters,
};

/// Cached WMTS source: one image per grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct WmtsSource {
    pub url: String,
    pub layer: String,
    pub format: String,
    pub matrix_set: String,
    pub grid: TileGrid,
    pub token: Option<String>,
}

/// Untiled WMS source: one GetMap image per view.
#[derive(Debug, Clone, PartialEq)]
pub struct WmsSource {
    pub url: String,
    pub layers: String,
    pub format: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorSource {
    pub url: String,
    pub stroke: String,
    pub fill: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerSource {
    Wmts(WmtsSource),
    Wms(WmsSource),
    Vector(VectorSource),
}

/// A layer as the rendering surface sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceLayer {
    pub guid: String,
    pub source: LayerSource,
    pub visible: bool,
    pub opacity: f64,
    /// Background layers are drawn beneath every overlay.
    pub base: bool,
}

impl SurfaceLayer {
    pub fn tile(
        descriptor: &TileLayerDescriptor,
        view: &ViewParameters,
        token: &str,
    ) -> Result<Self, MapError> {
        let token = (!token.is_empty()).then(|| token.to_string());
        let source = match descriptor.distribution_protocol {
            DistributionProtocol::Wmts => {
                let matrix_set = descriptor
                    .matrixset
                    .clone()
                    .unwrap_or_else(|| view.projection.code.clone());
                LayerSource::Wmts(WmtsSource {
                    url: descriptor.url.clone(),
                    layer: descriptor.params.layers.clone(),
                    format: descriptor.format().to_string(),
                    grid: view.with_matrix_ids(&MatrixIds::for_matrix_set(&matrix_set)),
                    matrix_set,
                    token,
                })
            }
            DistributionProtocol::Wms => LayerSource::Wms(WmsSource {
                url: descriptor.url.clone(),
                layers: descriptor.params.layers.clone(),
                format: descriptor.format().to_string(),
                token,
            }),
            DistributionProtocol::Other => {
                return Err(MapError::UnsupportedProtocol {
                    guid: descriptor.guid.clone(),
                    protocol: "unknown".to_string(),
                });
            }
        };
        Ok(Self {
            guid: descriptor.guid.clone(),
            source,
            visible: true,
            opacity: descriptor.options.opacity.unwrap_or(1.0).clamp(0.0, 1.0),
            base: descriptor.is_base_layer(),
        })
    }

    pub fn vector(descriptor: &VectorLayerDescriptor) -> Self {
        let style = descriptor.style.as_ref();
        Self {
            guid: descriptor.guid.clone(),
            source: LayerSource::Vector(VectorSource {
                url: descriptor.url.clone(),
                stroke: style
                    .and_then(|s| s.stroke.clone())
                    .unwrap_or_else(|| "#d0312d".to_string()),
                fill: style
                    .and_then(|s| s.fill.clone())
                    .unwrap_or_else(|| "rgba(208, 49, 45, 0.2)".to_string()),
            }),
            visible: true,
            opacity: 1.0,
            base: false,
        }
    }
}

/// Inserts `layer` into a bottom-to-top stack, replacing any layer with the same
/// guid. Base layers go above existing base layers and below every overlay.
pub fn place_layer(layers: &mut Vec<SurfaceLayer>, layer: SurfaceLayer) {
    layers.retain(|l| l.guid != layer.guid);
    if layer.base {
        let at = layers.iter().position(|l| !l.base).unwrap_or(layers.len());
        layers.insert(at, layer);
    } else {
        layers.push(layer);
    }
}

/// Everything needed to put a project on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct MapPlan {
    pub view: ViewParameters,
    pub basemap: WmtsSource,
    pub center: (f64, f64),
    pub zoom: f64,
    pub marker: Option<(f64, f64)>,
}

impl MapPlan {
    /// `config` is expected to carry its URL overrides already.
    pub fn new(config: &ProjectConfig, base: &BaseConfig, url: &UrlState) -> Result<Self, MapError> {
        let view = config.view_parameters(base)?;
        let basemap = WmtsSource {
            url: base.basemap.url.clone(),
            layer: base.basemap.layers.clone(),
            format: base.basemap.format.clone(),
            grid: view.with_matrix_ids(&MatrixIds::for_matrix_set(&base.basemap.matrix_set)),
            matrix_set: base.basemap.matrix_set.clone(),
            token: None,
        };
        Ok(Self {
            basemap,
            center: config.initial_center(base),
            zoom: config.initial_zoom(base),
            marker: url.marker(),
            view,
        })
    }
}

/// Seam to the rendering engine. The basemap installed by `mount` belongs to the
/// surface and survives `remove_all_layers`.
pub trait MapSurface {
    fn mount(&mut self, plan: &MapPlan);
    /// Adds `layer`, replacing any layer with the same guid.
    fn add_layer(&mut self, layer: SurfaceLayer);
    fn has_layer(&self, guid: &str) -> bool;
    /// Returns `false` when no layer has that guid.
    fn set_layer_visible(&mut self, guid: &str, visible: bool) -> bool;
    fn remove_all_layers(&mut self);
    fn set_center(&mut self, center: (f64, f64));
    fn set_zoom(&mut self, zoom: f64);
    fn center(&self) -> (f64, f64);
    fn zoom(&self) -> f64;
    fn projection_code(&self) -> &str;
    fn set_marker(&mut self, marker: Option<(f64, f64)>);
}

#[cfg(test)]
pub(crate) mod recording {
    use kartvisning_shared::{
        DistributionProtocol, LayerParams, TileLayerDescriptor, TileLayerOptions,
        VectorLayerDescriptor, VectorLayerOptions, Visibility,
    };

    use super::{MapPlan, MapSurface, SurfaceLayer, place_layer};

    pub fn tile(guid: &str, name: &str, base: bool, visibility: Visibility) -> TileLayerDescriptor {
        TileLayerDescriptor {
            guid: guid.into(),
            name: name.into(),
            groupid: None,
            distribution_protocol: DistributionProtocol::Wmts,
            url: "https://tiles.example/wmts?".into(),
            params: LayerParams {
                layers: name.into(),
                format: None,
            },
            matrixset: None,
            options: TileLayerOptions {
                visibility,
                isbaselayer: base,
                opacity: None,
            },
        }
    }

    pub fn vector(guid: &str, visibility: Visibility) -> VectorLayerDescriptor {
        VectorLayerDescriptor {
            guid: guid.into(),
            name: format!("vector {guid}"),
            groupid: None,
            url: format!("/data/{guid}.geojson"),
            options: VectorLayerOptions { visibility },
            style: None,
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum SurfaceCall {
        Mount(String),
        Add(String),
        Show(String),
        Hide(String),
        RemoveAll,
        SetCenter((f64, f64)),
        SetZoom(f64),
        Marker(Option<(f64, f64)>),
    }

    /// Surface that only remembers what was asked of it.
    #[derive(Debug, Default)]
    pub struct RecordingSurface {
        pub calls: Vec<SurfaceCall>,
        pub layers: Vec<SurfaceLayer>,
        center: (f64, f64),
        zoom: f64,
        code: String,
    }

    impl RecordingSurface {
        pub fn count(&self, call: &SurfaceCall) -> usize {
            self.calls.iter().filter(|c| *c == call).count()
        }

        /// Create and show calls for one layer.
        pub fn shows_of(&self, guid: &str) -> usize {
            self.calls
                .iter()
                .filter(|c| matches!(c, SurfaceCall::Add(g) | SurfaceCall::Show(g) if g == guid))
                .count()
        }

        pub fn hides_of(&self, guid: &str) -> usize {
            self.count(&SurfaceCall::Hide(guid.to_string()))
        }

        pub fn layer(&self, guid: &str) -> Option<&SurfaceLayer> {
            self.layers.iter().find(|l| l.guid == guid)
        }
    }

    impl MapSurface for RecordingSurface {
        fn mount(&mut self, plan: &MapPlan) {
            self.code = plan.view.projection.code.clone();
            self.center = plan.center;
            self.zoom = plan.zoom;
            self.calls.push(SurfaceCall::Mount(self.code.clone()));
        }

        fn add_layer(&mut self, layer: SurfaceLayer) {
            self.calls.push(SurfaceCall::Add(layer.guid.clone()));
            place_layer(&mut self.layers, layer);
        }

        fn has_layer(&self, guid: &str) -> bool {
            self.layers.iter().any(|l| l.guid == guid)
        }

        fn set_layer_visible(&mut self, guid: &str, visible: bool) -> bool {
            let call = if visible {
                SurfaceCall::Show(guid.to_string())
            } else {
                SurfaceCall::Hide(guid.to_string())
            };
            self.calls.push(call);
            match self.layers.iter_mut().find(|l| l.guid == guid) {
                Some(layer) => {
                    layer.visible = visible;
                    true
                }
                None => false,
            }
        }

        fn remove_all_layers(&mut self) {
            self.calls.push(SurfaceCall::RemoveAll);
            self.layers.clear();
        }

        fn set_center(&mut self, center: (f64, f64)) {
            self.calls.push(SurfaceCall::SetCenter(center));
            self.center = center;
        }

        fn set_zoom(&mut self, zoom: f64) {
            self.calls.push(SurfaceCall::SetZoom(zoom));
            self.zoom = zoom;
        }

        fn center(&self) -> (f64, f64) {
            self.center
        }

        fn zoom(&self) -> f64 {
            self.zoom
        }

        fn projection_code(&self) -> &str {
            &self.code
        }

        fn set_marker(&mut self, marker: Option<(f64, f64)>) {
            self.calls.push(SurfaceCall::Marker(marker));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kartvisning_shared::{Extent, Visibility};

    fn view() -> ViewParameters {
        ViewParameters::build(
            "EPSG:25833",
            Extent::new(-2_500_000.0, 3_500_000.0, 3_045_984.0, 9_045_984.0),
            MatrixIds::Level,
        )
        .unwrap()
    }

    fn descriptor(json: &str) -> TileLayerDescriptor {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn wmts_layer_defaults_matrix_set_to_projection() {
        let d = descriptor(
            r#"{"guid":"1","name":"topo","distributionProtocol":"WMTS","url":"https://t.example/wmts?",
                "params":{"layers":"topo"},"options":{"visibility":"true"}}"#,
        );
        let layer = SurfaceLayer::tile(&d, &view(), "abc").unwrap();
        let LayerSource::Wmts(source) = layer.source else {
            panic!("expected wmts source");
        };
        assert_eq!(source.matrix_set, "EPSG:25833");
        assert_eq!(source.grid.matrix_ids[3], "EPSG:25833:3");
        assert_eq!(source.format, "image/png");
        assert_eq!(source.token.as_deref(), Some("abc"));
    }

    #[test]
    fn named_matrix_set_uses_bare_levels() {
        let d = descriptor(
            r#"{"guid":"1","name":"topo","distributionProtocol":"WMTS","url":"u","matrixset":"utm33n",
                "params":{"layers":"topo","format":"image/jpeg"},"options":{"visibility":"false","opacity":0.5}}"#,
        );
        let layer = SurfaceLayer::tile(&d, &view(), "").unwrap();
        assert_eq!(layer.opacity, 0.5);
        let LayerSource::Wmts(source) = layer.source else {
            panic!("expected wmts source");
        };
        assert_eq!(source.grid.matrix_ids[3], "3");
        assert_eq!(source.token, None);
    }

    #[test]
    fn base_layers_stack_below_overlays() {
        let base = |guid: &str| {
            SurfaceLayer::tile(&recording::tile(guid, guid, true, Visibility::Visible), &view(), "")
                .unwrap()
        };
        let overlay = |guid: &str| {
            SurfaceLayer::tile(&recording::tile(guid, guid, false, Visibility::Visible), &view(), "")
                .unwrap()
        };
        let mut layers = Vec::new();
        place_layer(&mut layers, base("b1"));
        place_layer(&mut layers, overlay("w1"));
        place_layer(&mut layers, SurfaceLayer::vector(&recording::vector("v1", Visibility::Visible)));
        place_layer(&mut layers, base("b2"));
        // Re-adding an existing base layer moves it to the top of the base stack.
        place_layer(&mut layers, base("b1"));

        let order: Vec<_> = layers.iter().map(|l| l.guid.as_str()).collect();
        assert_eq!(order, ["b2", "b1", "w1", "v1"]);
    }

    #[test]
    fn unknown_protocol_is_rejected() {
        let d = descriptor(
            r#"{"guid":"9","name":"x","distributionProtocol":"WFS","url":"u","options":{"visibility":"true"}}"#,
        );
        assert_eq!(d.options.visibility, Visibility::Visible);
        assert!(matches!(
            SurfaceLayer::tile(&d, &view(), "t"),
            Err(MapError::UnsupportedProtocol { .. })
        ));
    }
}
