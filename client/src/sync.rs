use kartvisning_shared::{
    BaseConfig, GeoPoint, LayerKind, LayerRegistry, MapError, ProjectConfig, ToggleRequest,
    TransformedCoordinate, UrlState, Visibility, koordtrans_url, numeric_epsg, project_url,
};

use crate::map_owner::{Activation, Lifecycle, MapOwner};
use crate::surface::{MapPlan, MapSurface};

/// Zoom below which a requested center also zooms the map in.
const CENTER_MIN_ZOOM: f64 = 10.0;
const CENTER_ZOOM: f64 = 12.0;

/// Identifies one async request. `epoch` changes with every project switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    pub epoch: u64,
    pub seq: u64,
}

/// Where the page was loaded from; project descriptors live next to it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SiteLocation {
    pub origin: String,
    pub pathname: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    ProjectChanged(String),
    ProjectLoaded {
        ticket: RequestTicket,
        result: Result<ProjectConfig, MapError>,
    },
    TokenArrived(String),
    BaseLayerSelected(String),
    ToggleRequested(ToggleRequest),
    MoveEnded,
    CenterRequested(GeoPoint),
    TransformResolved {
        ticket: RequestTicket,
        result: Result<TransformedCoordinate, MapError>,
    },
    /// The page became visible again.
    Resumed,
}

/// Side effects for the app shell to carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    FetchProject {
        ticket: RequestTicket,
        name: String,
        url: String,
    },
    FetchToken,
    FetchTransform {
        ticket: RequestTicket,
        url: String,
    },
    ArmListeners,
    PublishView {
        center: (f64, f64),
        zoom: f64,
    },
    /// Location hash to write back, without the leading `#`.
    WriteUrl(String),
    ClearLayerState,
    LayersChanged,
}

/// Reconciles project selection, session token, layer toggles and map movement
/// into map and registry state. Every input arrives through [`SyncController::handle`].
pub struct SyncController<S> {
    owner: MapOwner<S>,
    create_surface: Box<dyn FnMut() -> S>,
    registry: LayerRegistry,
    site: SiteLocation,
    base: BaseConfig,
    url: UrlState,
    project: Option<String>,
    token: Option<String>,
    epoch: u64,
    transform_seq: u64,
}

impl<S: MapSurface> SyncController<S> {
    pub fn new(
        site: SiteLocation,
        base: BaseConfig,
        url: UrlState,
        create_surface: Box<dyn FnMut() -> S>,
    ) -> Self {
        Self {
            owner: MapOwner::new(),
            create_surface,
            registry: LayerRegistry::new(),
            site,
            base,
            url,
            project: None,
            token: None,
            epoch: 0,
            transform_seq: 0,
        }
    }

    pub fn owner(&self) -> &MapOwner<S> {
        &self.owner
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    pub fn url(&self) -> &UrlState {
        &self.url
    }

    pub fn base(&self) -> &BaseConfig {
        &self.base
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.owner.lifecycle()
    }

    /// Drops the surface; used when the app unmounts.
    pub fn dispose(&mut self) {
        self.owner.dispose();
        self.registry.remove_all();
    }

    pub fn handle(&mut self, event: SyncEvent) -> Result<Vec<Command>, MapError> {
        match event {
            SyncEvent::ProjectChanged(name) => Ok(self.project_changed(name)),
            SyncEvent::ProjectLoaded { ticket, result } => self.project_loaded(ticket, result),
            SyncEvent::TokenArrived(token) => self.token_arrived(token),
            SyncEvent::BaseLayerSelected(guid) => self.base_layer_selected(&guid),
            SyncEvent::ToggleRequested(request) => self.toggle_requested(request),
            SyncEvent::MoveEnded => self.move_ended(),
            SyncEvent::CenterRequested(point) => self.center_requested(point),
            SyncEvent::TransformResolved { ticket, result } => {
                self.transform_resolved(ticket, result)
            }
            SyncEvent::Resumed => Ok(self.resumed()),
        }
    }

    fn project_changed(&mut self, name: String) -> Vec<Command> {
        let mut commands = Vec::new();
        if self.project.is_some() {
            // The URL position belongs to the previous project's projection.
            self.url.lat = None;
            self.url.lon = None;
            self.url.zoom = None;
        }
        if self.owner.teardown() {
            self.registry.remove_all();
            commands.push(Command::ClearLayerState);
        }
        self.epoch += 1;
        let url = project_url(&self.site.origin, &self.site.pathname, &name);
        self.url.project = Some(name.clone());
        self.project = Some(name.clone());
        commands.push(Command::FetchProject {
            ticket: RequestTicket {
                epoch: self.epoch,
                seq: 0,
            },
            name,
            url,
        });
        commands
    }

    fn project_loaded(
        &mut self,
        ticket: RequestTicket,
        result: Result<ProjectConfig, MapError>,
    ) -> Result<Vec<Command>, MapError> {
        if ticket.epoch != self.epoch || self.owner.is_active() {
            return Err(MapError::StaleResponse { kind: "project" });
        }
        let mut config = result?;
        config.apply_url_overrides(&self.url);
        let plan = MapPlan::new(&config, &self.base, &self.url)?;

        self.registry.remove_all();
        self.registry.load(&config);
        let create = &mut self.create_surface;
        self.owner.initialize(&plan, || create());

        let mut commands = vec![Command::ArmListeners];
        let visible_vectors: Vec<_> = self
            .registry
            .vector_layers()
            .iter()
            .filter(|layer| layer.options.visibility.is_visible())
            .cloned()
            .collect();
        for layer in &visible_vectors {
            self.owner.create_vector_layer(layer)?;
        }

        if self.token.is_some() {
            self.reconcile_tiles()?;
        } else {
            commands.push(Command::FetchToken);
        }
        commands.extend(self.publish_view()?);
        commands.push(Command::LayersChanged);
        Ok(commands)
    }

    fn token_arrived(&mut self, token: String) -> Result<Vec<Command>, MapError> {
        self.token = Some(token);
        if !self.owner.is_active() {
            return Ok(Vec::new());
        }
        self.reconcile_tiles()?;
        Ok(vec![Command::LayersChanged])
    }

    fn base_layer_selected(&mut self, guid: &str) -> Result<Vec<Command>, MapError> {
        self.registry.select_base_layer(guid)?;
        if self.owner.is_active() && self.token.is_some() {
            self.reconcile_base_layer()?;
        }
        Ok(vec![Command::LayersChanged])
    }

    fn toggle_requested(&mut self, request: ToggleRequest) -> Result<Vec<Command>, MapError> {
        let kind = request.kind;
        self.registry.request_toggle(request)?;
        let ready = match kind {
            LayerKind::Vector => self.owner.is_active(),
            LayerKind::Tile => self.owner.is_active() && self.token.is_some(),
        };
        if !ready {
            return Ok(Vec::new());
        }
        self.process_toggle(kind)?;
        Ok(vec![Command::LayersChanged])
    }

    fn move_ended(&mut self) -> Result<Vec<Command>, MapError> {
        self.publish_view()
    }

    fn center_requested(&mut self, point: GeoPoint) -> Result<Vec<Command>, MapError> {
        let target = self.owner.projection_code()?.to_string();
        if numeric_epsg(&point.epsg) == numeric_epsg(&target) {
            return self.apply_center(TransformedCoordinate {
                x: point.lon,
                y: point.lat,
            });
        }
        self.transform_seq += 1;
        Ok(vec![Command::FetchTransform {
            ticket: RequestTicket {
                epoch: self.epoch,
                seq: self.transform_seq,
            },
            url: koordtrans_url(&self.base.koordtrans_url, &point, &target),
        }])
    }

    fn transform_resolved(
        &mut self,
        ticket: RequestTicket,
        result: Result<TransformedCoordinate, MapError>,
    ) -> Result<Vec<Command>, MapError> {
        if ticket.epoch != self.epoch || ticket.seq != self.transform_seq {
            return Err(MapError::StaleResponse { kind: "transform" });
        }
        self.apply_center(result?)
    }

    fn apply_center(&mut self, coord: TransformedCoordinate) -> Result<Vec<Command>, MapError> {
        let (_, zoom) = self.owner.view_state()?;
        let zoom = (zoom < CENTER_MIN_ZOOM).then_some(CENTER_ZOOM);
        self.owner.set_center((coord.x, coord.y), zoom)?;
        self.publish_view()
    }

    /// Only a live map is reactivated; between projects the pending load mounts it.
    fn resumed(&mut self) -> Vec<Command> {
        if !self.owner.is_active() {
            return Vec::new();
        }
        let Some(plan) = self.owner.plan().cloned() else {
            return Vec::new();
        };
        let create = &mut self.create_surface;
        match self.owner.initialize(&plan, || create()) {
            Activation::Reactivated => vec![Command::FetchToken, Command::ArmListeners],
            Activation::Constructed | Activation::Reattached => Vec::new(),
        }
    }

    fn publish_view(&mut self) -> Result<Vec<Command>, MapError> {
        let (center, zoom) = self.owner.view_state()?;
        self.url.set_view(center, zoom);
        Ok(vec![
            Command::PublishView { center, zoom },
            Command::WriteUrl(self.url.to_query()),
        ])
    }

    fn reconcile_tiles(&mut self) -> Result<(), MapError> {
        self.reconcile_base_layer()?;
        let Some(token) = self.token.clone() else {
            return Ok(());
        };
        let overlays: Vec<_> = self
            .registry
            .overlay_tile_layers()
            .filter(|layer| layer.options.visibility.is_visible())
            .cloned()
            .collect();
        for layer in &overlays {
            if !self.owner.has_layer(&layer.guid)? {
                self.owner.create_tile_layer(layer, &token)?;
            }
        }
        self.process_toggle(LayerKind::Tile)
    }

    /// Hides every base layer, then recreates the visible one with the current token.
    fn reconcile_base_layer(&mut self) -> Result<(), MapError> {
        let Some(token) = self.token.clone() else {
            return Ok(());
        };
        let Some(visible) = self.registry.visible_base_layer().cloned() else {
            return Ok(());
        };
        let bases: Vec<String> = self.registry.base_layers().map(|l| l.guid.clone()).collect();
        for guid in &bases {
            self.owner.hide_layer(guid)?;
        }
        self.owner.create_tile_layer(&visible, &token)
    }

    /// Flips the pending layer of `kind`, if any. The request is consumed first so a
    /// failure cannot replay it.
    fn process_toggle(&mut self, kind: LayerKind) -> Result<(), MapError> {
        let Some(guid) = self.registry.take_pending_toggle(kind) else {
            return Ok(());
        };
        let current = self
            .registry
            .visibility(kind, &guid)
            .ok_or_else(|| MapError::UnknownLayer(guid.clone()))?;
        if current == Visibility::Hidden {
            match kind {
                LayerKind::Tile => {
                    let token = self.token.clone().unwrap_or_default();
                    let layer = self
                        .registry
                        .tile_layer(&guid)
                        .cloned()
                        .ok_or_else(|| MapError::UnknownLayer(guid.clone()))?;
                    self.owner.create_tile_layer(&layer, &token)?;
                }
                LayerKind::Vector => {
                    let layer = self
                        .registry
                        .vector_layer(&guid)
                        .cloned()
                        .ok_or_else(|| MapError::UnknownLayer(guid.clone()))?;
                    self.owner.create_vector_layer(&layer)?;
                }
            }
        } else {
            self.owner.hide_layer(&guid)?;
        }
        self.registry.set_visibility(kind, &guid, current.toggled())
    }
}
