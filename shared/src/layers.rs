use serde::{Deserialize, Serialize};

use crate::error::MapError;
use crate::project::ProjectConfig;
use crate::visibility::{Visibility, string_flag};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerGroup {
    pub groupid: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionProtocol {
    #[serde(rename = "WMTS")]
    Wmts,
    #[serde(rename = "WMS")]
    Wms,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayerParams {
    #[serde(default)]
    pub layers: String,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLayerOptions {
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, with = "string_flag")]
    pub isbaselayer: bool,
    #[serde(default)]
    pub opacity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLayerDescriptor {
    pub guid: String,
    pub name: String,
    #[serde(default)]
    pub groupid: Option<String>,
    #[serde(rename = "distributionProtocol")]
    pub distribution_protocol: DistributionProtocol,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub params: LayerParams,
    /// WMTS matrix set; when present, matrix ids are spelled `"{matrixset}:{z}"`.
    #[serde(default)]
    pub matrixset: Option<String>,
    pub options: TileLayerOptions,
}

impl TileLayerDescriptor {
    pub fn is_wmts(&self) -> bool {
        self.distribution_protocol == DistributionProtocol::Wmts
    }

    pub fn is_base_layer(&self) -> bool {
        self.options.isbaselayer
    }

    pub fn format(&self) -> &str {
        self.params.format.as_deref().unwrap_or("image/png")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorLayerOptions {
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorLayerDescriptor {
    pub guid: String,
    pub name: String,
    #[serde(default)]
    pub groupid: Option<String>,
    /// GeoJSON source.
    pub url: String,
    pub options: VectorLayerOptions,
    #[serde(default)]
    pub style: Option<VectorStyle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStyle {
    #[serde(default)]
    pub stroke: Option<String>,
    #[serde(default)]
    pub fill: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Tile,
    Vector,
}

/// A pending show/hide request from the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleRequest {
    pub kind: LayerKind,
    pub guid: String,
}

/// Flat view of a layer for panels.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSummary {
    pub guid: String,
    pub name: String,
    pub kind: LayerKind,
    pub base: bool,
    pub visibility: Visibility,
    pub groupid: Option<String>,
}

/// Authoritative list of the active project's groups and layers.
///
/// At most one toggle request per layer kind is pending at a time; a newer request
/// replaces an unprocessed one.
#[derive(Debug, Clone, Default)]
pub struct LayerRegistry {
    groups: Vec<LayerGroup>,
    tiles: Vec<TileLayerDescriptor>,
    vectors: Vec<VectorLayerDescriptor>,
    pending_tile: Option<String>,
    pending_vector: Option<String>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, config: &ProjectConfig) {
        self.add_groups(config.config.maplayer.iter().cloned());
        self.add_tile_layers(config.config.layer.iter().cloned());
        self.add_vector_layers(config.vector_layers().iter().cloned());
    }

    pub fn add_groups(&mut self, groups: impl IntoIterator<Item = LayerGroup>) {
        for group in groups {
            if !self.groups.iter().any(|g| g.groupid == group.groupid) {
                self.groups.push(group);
            }
        }
    }

    /// Adds layers, replacing any existing entry with the same guid.
    pub fn add_tile_layers(&mut self, layers: impl IntoIterator<Item = TileLayerDescriptor>) {
        for layer in layers {
            match self.tiles.iter_mut().find(|l| l.guid == layer.guid) {
                Some(existing) => *existing = layer,
                None => self.tiles.push(layer),
            }
        }
    }

    pub fn add_vector_layers(&mut self, layers: impl IntoIterator<Item = VectorLayerDescriptor>) {
        for layer in layers {
            match self.vectors.iter_mut().find(|l| l.guid == layer.guid) {
                Some(existing) => *existing = layer,
                None => self.vectors.push(layer),
            }
        }
    }

    /// Drops every group, layer and pending toggle.
    pub fn remove_all(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty() && self.vectors.is_empty()
    }

    pub fn groups(&self) -> &[LayerGroup] {
        &self.groups
    }

    pub fn tile_layers(&self) -> &[TileLayerDescriptor] {
        &self.tiles
    }

    pub fn vector_layers(&self) -> &[VectorLayerDescriptor] {
        &self.vectors
    }

    pub fn tile_layer(&self, guid: &str) -> Option<&TileLayerDescriptor> {
        self.tiles.iter().find(|l| l.guid == guid)
    }

    pub fn vector_layer(&self, guid: &str) -> Option<&VectorLayerDescriptor> {
        self.vectors.iter().find(|l| l.guid == guid)
    }

    pub fn base_layers(&self) -> impl Iterator<Item = &TileLayerDescriptor> {
        self.tiles.iter().filter(|l| l.is_base_layer())
    }

    pub fn overlay_tile_layers(&self) -> impl Iterator<Item = &TileLayerDescriptor> {
        self.tiles.iter().filter(|l| !l.is_base_layer())
    }

    pub fn visible_base_layer(&self) -> Option<&TileLayerDescriptor> {
        self.base_layers().find(|l| l.options.visibility.is_visible())
    }

    /// Makes `guid` the only visible base layer.
    pub fn select_base_layer(&mut self, guid: &str) -> Result<(), MapError> {
        if !self.base_layers().any(|l| l.guid == guid) {
            return Err(MapError::UnknownLayer(guid.to_string()));
        }
        for layer in self.tiles.iter_mut().filter(|l| l.is_base_layer()) {
            layer.options.visibility = Visibility::from(layer.guid == guid);
        }
        Ok(())
    }

    pub fn set_visibility(
        &mut self,
        kind: LayerKind,
        guid: &str,
        visibility: Visibility,
    ) -> Result<(), MapError> {
        let slot = match kind {
            LayerKind::Tile => self
                .tiles
                .iter_mut()
                .find(|l| l.guid == guid)
                .map(|l| &mut l.options.visibility),
            LayerKind::Vector => self
                .vectors
                .iter_mut()
                .find(|l| l.guid == guid)
                .map(|l| &mut l.options.visibility),
        };
        let slot = slot.ok_or_else(|| MapError::UnknownLayer(guid.to_string()))?;
        *slot = visibility;
        Ok(())
    }

    pub fn visibility(&self, kind: LayerKind, guid: &str) -> Option<Visibility> {
        match kind {
            LayerKind::Tile => self.tile_layer(guid).map(|l| l.options.visibility),
            LayerKind::Vector => self.vector_layer(guid).map(|l| l.options.visibility),
        }
    }

    pub fn request_toggle(&mut self, request: ToggleRequest) -> Result<(), MapError> {
        if self.visibility(request.kind, &request.guid).is_none() {
            return Err(MapError::UnknownLayer(request.guid));
        }
        match request.kind {
            LayerKind::Tile => self.pending_tile = Some(request.guid),
            LayerKind::Vector => self.pending_vector = Some(request.guid),
        }
        Ok(())
    }

    pub fn pending_toggle(&self, kind: LayerKind) -> Option<&str> {
        match kind {
            LayerKind::Tile => self.pending_tile.as_deref(),
            LayerKind::Vector => self.pending_vector.as_deref(),
        }
    }

    /// Takes the pending request so it is processed at most once.
    pub fn take_pending_toggle(&mut self, kind: LayerKind) -> Option<String> {
        match kind {
            LayerKind::Tile => self.pending_tile.take(),
            LayerKind::Vector => self.pending_vector.take(),
        }
    }

    pub fn summaries(&self) -> Vec<LayerSummary> {
        let tiles = self.tiles.iter().map(|l| LayerSummary {
            guid: l.guid.clone(),
            name: l.name.clone(),
            kind: LayerKind::Tile,
            base: l.is_base_layer(),
            visibility: l.options.visibility,
            groupid: l.groupid.clone(),
        });
        let vectors = self.vectors.iter().map(|l| LayerSummary {
            guid: l.guid.clone(),
            name: l.name.clone(),
            kind: LayerKind::Vector,
            base: false,
            visibility: l.options.visibility,
            groupid: l.groupid.clone(),
        });
        tiles.chain(vectors).collect()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

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
}

#[cfg(test)]
mod tests {
    use super::fixtures::{tile, vector};
    use super::*;

    fn registry() -> LayerRegistry {
        let mut registry = LayerRegistry::new();
        registry.add_tile_layers([
            tile("b1", "topo", true, Visibility::Visible),
            tile("b2", "grått", true, Visibility::Hidden),
            tile("o1", "ssr", false, Visibility::Hidden),
        ]);
        registry.add_vector_layers([vector("v1", Visibility::Hidden)]);
        registry
    }

    #[test]
    fn selecting_base_layer_leaves_exactly_one_visible() {
        let mut registry = registry();
        registry.select_base_layer("b2").unwrap();
        let visible: Vec<_> = registry
            .base_layers()
            .filter(|l| l.options.visibility.is_visible())
            .map(|l| l.guid.as_str())
            .collect();
        assert_eq!(visible, vec!["b2"]);
        assert_eq!(registry.visible_base_layer().unwrap().guid, "b2");
        // Overlay layers are not base layers.
        assert!(registry.select_base_layer("o1").is_err());
    }

    #[test]
    fn pending_toggle_is_taken_once() {
        let mut registry = registry();
        registry
            .request_toggle(ToggleRequest {
                kind: LayerKind::Vector,
                guid: "v1".into(),
            })
            .unwrap();
        assert_eq!(registry.pending_toggle(LayerKind::Vector), Some("v1"));
        assert_eq!(
            registry.take_pending_toggle(LayerKind::Vector).as_deref(),
            Some("v1")
        );
        assert_eq!(registry.take_pending_toggle(LayerKind::Vector), None);
        assert_eq!(registry.pending_toggle(LayerKind::Tile), None);
    }

    #[test]
    fn toggle_for_unknown_layer_is_rejected() {
        let mut registry = registry();
        let err = registry
            .request_toggle(ToggleRequest {
                kind: LayerKind::Tile,
                guid: "nope".into(),
            })
            .unwrap_err();
        assert_eq!(err, MapError::UnknownLayer("nope".into()));
    }

    #[test]
    fn re_adding_a_layer_replaces_it() {
        let mut registry = registry();
        registry.add_tile_layers([tile("o1", "ssr v2", false, Visibility::Visible)]);
        assert_eq!(registry.tile_layers().len(), 3);
        assert_eq!(registry.tile_layer("o1").unwrap().name, "ssr v2");
    }

    #[test]
    fn remove_all_clears_layers_and_pending_requests() {
        let mut registry = registry();
        registry
            .request_toggle(ToggleRequest {
                kind: LayerKind::Tile,
                guid: "o1".into(),
            })
            .unwrap();
        registry.remove_all();
        assert!(registry.is_empty());
        assert_eq!(registry.pending_toggle(LayerKind::Tile), None);
    }

    #[test]
    fn summaries_list_tiles_then_vectors() {
        let summaries = registry().summaries();
        assert_eq!(summaries.len(), 4);
        assert!(summaries[0].base);
        assert_eq!(summaries[3].kind, LayerKind::Vector);
    }
}
