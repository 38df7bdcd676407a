use kartvisning_shared::{MapError, TileLayerDescriptor, VectorLayerDescriptor};

use crate::surface::{MapPlan, MapSurface, SurfaceLayer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Active,
    TornDown,
}

/// What `initialize` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// First activation: the surface was created and mounted.
    Constructed,
    /// The kept surface was remounted for a new project.
    Reattached,
    /// Already live; the caller should refresh its session token and listeners.
    Reactivated,
}

/// Sole owner of the rendering surface.
///
/// The surface is created once and survives teardown; a project switch clears its
/// layers and remounts it instead of building a new one. Only `dispose` drops it.
pub struct MapOwner<S> {
    lifecycle: Lifecycle,
    surface: Option<S>,
    plan: Option<MapPlan>,
}

impl<S> Default for MapOwner<S> {
    fn default() -> Self {
        Self {
            lifecycle: Lifecycle::Uninitialized,
            surface: None,
            plan: None,
        }
    }
}

impl<S: MapSurface> MapOwner<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn plan(&self) -> Option<&MapPlan> {
        self.plan.as_ref()
    }

    /// `create` runs only when no surface exists yet.
    pub fn initialize(&mut self, plan: &MapPlan, create: impl FnOnce() -> S) -> Activation {
        match self.lifecycle {
            Lifecycle::Active => Activation::Reactivated,
            Lifecycle::Uninitialized | Lifecycle::TornDown => {
                let activation = if self.surface.is_some() {
                    Activation::Reattached
                } else {
                    Activation::Constructed
                };
                let surface = self.surface.get_or_insert_with(create);
                surface.mount(plan);
                surface.set_marker(plan.marker);
                self.plan = Some(plan.clone());
                self.lifecycle = Lifecycle::Active;
                activation
            }
        }
    }

    /// Clears every project layer while keeping the surface. Returns `false` when
    /// there was nothing live to tear down.
    pub fn teardown(&mut self) -> bool {
        if self.lifecycle != Lifecycle::Active {
            return false;
        }
        if let Some(surface) = self.surface.as_mut() {
            surface.remove_all_layers();
        }
        self.lifecycle = Lifecycle::TornDown;
        true
    }

    /// Drops the surface for good; the next `initialize` constructs a new one.
    pub fn dispose(&mut self) -> Option<S> {
        self.lifecycle = Lifecycle::Uninitialized;
        self.plan = None;
        self.surface.take()
    }

    fn live(&mut self, operation: &'static str) -> Result<&mut S, MapError> {
        match (self.lifecycle, self.surface.as_mut()) {
            (Lifecycle::Active, Some(surface)) => Ok(surface),
            _ => Err(MapError::NotInitialized { operation }),
        }
    }

    fn live_ref(&self, operation: &'static str) -> Result<&S, MapError> {
        match (self.lifecycle, self.surface.as_ref()) {
            (Lifecycle::Active, Some(surface)) => Ok(surface),
            _ => Err(MapError::NotInitialized { operation }),
        }
    }

    pub fn set_center(&mut self, center: (f64, f64), zoom: Option<f64>) -> Result<(), MapError> {
        let surface = self.live("set_center")?;
        surface.set_center(center);
        if let Some(zoom) = zoom {
            surface.set_zoom(zoom);
        }
        Ok(())
    }

    pub fn set_zoom(&mut self, zoom: f64) -> Result<(), MapError> {
        self.live("set_zoom")?.set_zoom(zoom);
        Ok(())
    }

    pub fn add_layer(&mut self, layer: SurfaceLayer) -> Result<(), MapError> {
        self.live("add_layer")?.add_layer(layer);
        Ok(())
    }

    pub fn remove_all_layers(&mut self) -> Result<(), MapError> {
        self.live("remove_all_layers")?.remove_all_layers();
        Ok(())
    }

    /// Hiding a layer that was never created is not an error.
    pub fn hide_layer(&mut self, guid: &str) -> Result<(), MapError> {
        let surface = self.live("hide_layer")?;
        if surface.has_layer(guid) {
            surface.set_layer_visible(guid, false);
        }
        Ok(())
    }

    pub fn has_layer(&self, guid: &str) -> Result<bool, MapError> {
        Ok(self.live_ref("has_layer")?.has_layer(guid))
    }

    /// (Re)creates the layer with `token` baked into its requests and shows it.
    pub fn create_tile_layer(
        &mut self,
        descriptor: &TileLayerDescriptor,
        token: &str,
    ) -> Result<(), MapError> {
        let view = self
            .plan
            .as_ref()
            .map(|plan| plan.view.clone())
            .ok_or(MapError::NotInitialized {
                operation: "create_tile_layer",
            })?;
        let surface = self.live("create_tile_layer")?;
        surface.add_layer(SurfaceLayer::tile(descriptor, &view, token)?);
        Ok(())
    }

    /// GeoJSON layers are fetched once; later calls only show them again.
    pub fn create_vector_layer(&mut self, descriptor: &VectorLayerDescriptor) -> Result<(), MapError> {
        let surface = self.live("create_vector_layer")?;
        if surface.has_layer(&descriptor.guid) {
            surface.set_layer_visible(&descriptor.guid, true);
        } else {
            surface.add_layer(SurfaceLayer::vector(descriptor));
        }
        Ok(())
    }

    pub fn set_marker(&mut self, marker: Option<(f64, f64)>) -> Result<(), MapError> {
        self.live("set_marker")?.set_marker(marker);
        Ok(())
    }

    /// Live center and zoom.
    pub fn view_state(&self) -> Result<((f64, f64), f64), MapError> {
        let surface = self.live_ref("view_state")?;
        Ok((surface.center(), surface.zoom()))
    }

    pub fn projection_code(&self) -> Result<&str, MapError> {
        Ok(self.live_ref("projection_code")?.projection_code())
    }
}
