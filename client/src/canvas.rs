use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::f64::consts::TAU;
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use kartvisning_shared::Extent;
use leptos::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, PointerEvent, WheelEvent};

use crate::app::dispatch;
use crate::geojson::{self, Shape};
use crate::render_loop::RenderScheduler;
use crate::surface::{
    LayerSource, MapPlan, MapSurface, SurfaceLayer, VectorSource, WmtsSource, place_layer,
};
use crate::sync::SyncEvent;
use crate::tiles::{self, ImageCache};
use crate::viewport::MapViewport;

const BACKGROUND: &str = "#eef1f3";
/// Quiet period after the last wheel or pinch step before the move counts as ended.
const ZOOM_SETTLE_MS: u32 = 250;
const DRAG_THRESHOLD_PX: f64 = 3.0;
/// Above this the view is zoomed too far out for the level; skip the layer.
const MAX_TILES_PER_LAYER: usize = 400;
const POINT_RADIUS: f64 = 4.0;
const MARKER_RADIUS: f64 = 7.0;

enum Features {
    Loading,
    Ready(Vec<Shape>),
    Failed,
}

#[derive(Default)]
struct Scene {
    viewport: Option<MapViewport>,
    basemap: Option<WmtsSource>,
    layers: Vec<SurfaceLayer>,
    marker: Option<(f64, f64)>,
    /// Parsed overlays keyed by source URL.
    features: HashMap<String, Features>,
    images: ImageCache,
    /// View the WMS images are requested for; refreshed when a move ends.
    settled: Option<(Extent, u32, u32)>,
    code: String,
    interactive: bool,
}

impl Scene {
    fn settle(&mut self) {
        self.settled = self.viewport.as_ref().and_then(|vp| {
            (vp.width >= 1.0 && vp.height >= 1.0).then(|| {
                (
                    vp.visible_extent(),
                    vp.width.round() as u32,
                    vp.height.round() as u32,
                )
            })
        });
    }
}

thread_local! {
    static SCENE: RefCell<Scene> = RefCell::new(Scene::default());
    static SCHEDULER: RefCell<Option<RenderScheduler>> = RefCell::new(None);
    static ZOOM_SETTLE: RefCell<Option<Timeout>> = RefCell::new(None);
}

pub(crate) fn request_redraw() {
    SCHEDULER.with(|slot| {
        if let Some(scheduler) = slot.borrow().as_ref() {
            scheduler.request();
        }
    });
}

/// Pan and zoom input is ignored until the controller arms it.
pub(crate) fn set_interactive(interactive: bool) {
    SCENE.with(|scene| scene.borrow_mut().interactive = interactive);
}

fn is_interactive() -> bool {
    SCENE.with(|scene| {
        let scene = scene.borrow();
        scene.interactive && scene.viewport.is_some()
    })
}

fn finish_move() {
    SCENE.with(|scene| scene.borrow_mut().settle());
    request_redraw();
    dispatch(SyncEvent::MoveEnded);
}

fn schedule_move_end() {
    // Replacing the timeout cancels the previous one.
    ZOOM_SETTLE.with(|slot| {
        *slot.borrow_mut() = Some(Timeout::new(ZOOM_SETTLE_MS, finish_move));
    });
}

fn load_features(url: &str) {
    let url = url.to_string();
    wasm_bindgen_futures::spawn_local(async move {
        let state = match crate::net::fetch_geojson(&url).await {
            Ok(raw) => match geojson::parse_shapes(&raw) {
                Ok(shapes) => Features::Ready(shapes),
                Err(e) => {
                    web_sys::console::warn_1(&format!("invalid GeoJSON at {url}: {e}").into());
                    Features::Failed
                }
            },
            Err(e) => {
                web_sys::console::warn_1(&format!("vector layer {url}: {e}").into());
                Features::Failed
            }
        };
        SCENE.with(|scene| {
            scene.borrow_mut().features.insert(url, state);
        });
        request_redraw();
    });
}

/// Canvas 2D rendering surface. Scene state lives in a thread-local so the
/// paint callback and input handlers can reach it without the controller.
#[derive(Default)]
pub struct CanvasSurface {
    code: String,
}

impl CanvasSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MapSurface for CanvasSurface {
    fn mount(&mut self, plan: &MapPlan) {
        self.code = plan.view.projection.code.clone();
        let base_resolution = plan.view.resolutions().first().copied().unwrap_or(1.0);
        SCENE.with(|scene| {
            let mut scene = scene.borrow_mut();
            let mut viewport = MapViewport::new(base_resolution, plan.center, plan.zoom);
            if let Some(previous) = scene.viewport.as_ref() {
                viewport.resize(previous.width, previous.height);
            }
            scene.viewport = Some(viewport);
            scene.basemap = Some(plan.basemap.clone());
            scene.marker = plan.marker;
            scene.code = self.code.clone();
            scene.settle();
        });
        request_redraw();
    }

    fn add_layer(&mut self, layer: SurfaceLayer) {
        SCENE.with(|scene| {
            let mut scene = scene.borrow_mut();
            if let LayerSource::Vector(source) = &layer.source
                && !scene.features.contains_key(&source.url)
            {
                scene.features.insert(source.url.clone(), Features::Loading);
                load_features(&source.url);
            }
            place_layer(&mut scene.layers, layer);
        });
        request_redraw();
    }

    fn has_layer(&self, guid: &str) -> bool {
        SCENE.with(|scene| scene.borrow().layers.iter().any(|l| l.guid == guid))
    }

    fn set_layer_visible(&mut self, guid: &str, visible: bool) -> bool {
        let found = SCENE.with(|scene| {
            let mut scene = scene.borrow_mut();
            match scene.layers.iter_mut().find(|l| l.guid == guid) {
                Some(layer) => {
                    layer.visible = visible;
                    true
                }
                None => false,
            }
        });
        request_redraw();
        found
    }

    fn remove_all_layers(&mut self) {
        SCENE.with(|scene| {
            let mut scene = scene.borrow_mut();
            scene.layers.clear();
            scene.features.clear();
        });
        request_redraw();
    }

    fn set_center(&mut self, center: (f64, f64)) {
        SCENE.with(|scene| {
            let mut scene = scene.borrow_mut();
            if let Some(vp) = scene.viewport.as_mut() {
                vp.center = center;
            }
            scene.settle();
        });
        request_redraw();
    }

    fn set_zoom(&mut self, zoom: f64) {
        SCENE.with(|scene| {
            let mut scene = scene.borrow_mut();
            if let Some(vp) = scene.viewport.as_mut() {
                vp.set_zoom(zoom);
            }
            scene.settle();
        });
        request_redraw();
    }

    fn center(&self) -> (f64, f64) {
        SCENE.with(|scene| {
            scene
                .borrow()
                .viewport
                .as_ref()
                .map(|vp| vp.center)
                .unwrap_or_default()
        })
    }

    fn zoom(&self) -> f64 {
        SCENE.with(|scene| {
            scene
                .borrow()
                .viewport
                .as_ref()
                .map(|vp| vp.zoom)
                .unwrap_or_default()
        })
    }

    fn projection_code(&self) -> &str {
        &self.code
    }

    fn set_marker(&mut self, marker: Option<(f64, f64)>) {
        SCENE.with(|scene| scene.borrow_mut().marker = marker);
        request_redraw();
    }
}

impl Drop for CanvasSurface {
    fn drop(&mut self) {
        SCENE.with(|scene| {
            if let Ok(mut scene) = scene.try_borrow_mut() {
                scene.images.clear();
                *scene = Scene::default();
            }
        });
    }
}

fn context_2d(canvas: &HtmlCanvasElement) -> Option<CanvasRenderingContext2d> {
    canvas
        .get_context("2d")
        .ok()
        .flatten()
        .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
}

fn paint(canvas: &HtmlCanvasElement, scene: &mut Scene) {
    let Some(ctx) = context_2d(canvas) else {
        return;
    };
    let dpr = web_sys::window()
        .map(|w| w.device_pixel_ratio())
        .unwrap_or(1.0)
        .max(1.0);
    let css_w = canvas.client_width() as f64;
    let css_h = canvas.client_height() as f64;
    let px_w = (css_w * dpr).round() as u32;
    let px_h = (css_h * dpr).round() as u32;
    if canvas.width() != px_w || canvas.height() != px_h {
        canvas.set_width(px_w);
        canvas.set_height(px_h);
    }
    ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0).ok();
    ctx.set_fill_style_str(BACKGROUND);
    ctx.fill_rect(0.0, 0.0, css_w, css_h);

    let Some(vp) = scene.viewport.as_mut() else {
        return;
    };
    let resized = vp.width != css_w || vp.height != css_h;
    if resized {
        vp.resize(css_w, css_h);
    }
    if resized || scene.settled.is_none() {
        scene.settle();
    }
    let Some(vp) = scene.viewport.clone() else {
        return;
    };

    scene.images.begin_frame();
    if let Some(basemap) = scene.basemap.as_ref() {
        draw_wmts(&ctx, basemap, &vp, &mut scene.images, 1.0);
    }
    for layer in scene.layers.iter().filter(|l| l.visible) {
        match &layer.source {
            LayerSource::Wmts(source) => {
                draw_wmts(&ctx, source, &vp, &mut scene.images, layer.opacity)
            }
            LayerSource::Wms(source) => {
                let Some((extent, width, height)) = scene.settled.as_ref() else {
                    continue;
                };
                let url = tiles::wms_map_url(source, extent, *width, *height, &scene.code);
                if let Some(image) = scene.images.ready(&url) {
                    ctx.set_global_alpha(layer.opacity);
                    draw_image_over(&ctx, &vp, &image, extent);
                    ctx.set_global_alpha(1.0);
                }
            }
            LayerSource::Vector(_) => {}
        }
    }
    for layer in scene.layers.iter().filter(|l| l.visible) {
        if let LayerSource::Vector(source) = &layer.source
            && let Some(Features::Ready(shapes)) = scene.features.get(&source.url)
        {
            draw_shapes(&ctx, &vp, source, shapes);
        }
    }
    if let Some((x, y)) = scene.marker {
        draw_marker(&ctx, &vp, x, y);
    }
    scene.images.prune();
}

fn draw_image_over(
    ctx: &CanvasRenderingContext2d,
    vp: &MapViewport,
    image: &web_sys::HtmlImageElement,
    extent: &Extent,
) {
    let (x0, y0) = vp.world_to_screen(extent.min_x, extent.max_y);
    let (x1, y1) = vp.world_to_screen(extent.max_x, extent.min_y);
    // Snap outward so neighbouring tiles leave no hairline gaps.
    let (left, top) = (x0.floor(), y0.floor());
    ctx.draw_image_with_html_image_element_and_dw_and_dh(
        image,
        left,
        top,
        x1.ceil() - left,
        y1.ceil() - top,
    )
    .ok();
}

fn draw_wmts(
    ctx: &CanvasRenderingContext2d,
    source: &WmtsSource,
    vp: &MapViewport,
    images: &mut ImageCache,
    opacity: f64,
) {
    let level = vp.tile_level(source.grid.max_zoom());
    let cells = source.grid.tiles_in(&vp.visible_extent(), level);
    if cells.len() > MAX_TILES_PER_LAYER {
        return;
    }
    ctx.set_global_alpha(opacity);
    for coord in cells {
        let url = tiles::wmts_tile_url(source, coord);
        if let Some(image) = images.ready(&url) {
            draw_image_over(ctx, vp, &image, &source.grid.tile_extent(coord));
        }
    }
    ctx.set_global_alpha(1.0);
}

fn trace(ctx: &CanvasRenderingContext2d, vp: &MapViewport, path: &[(f64, f64)]) {
    for (i, (x, y)) in path.iter().enumerate() {
        let (sx, sy) = vp.world_to_screen(*x, *y);
        if i == 0 {
            ctx.move_to(sx, sy);
        } else {
            ctx.line_to(sx, sy);
        }
    }
}

fn draw_shapes(
    ctx: &CanvasRenderingContext2d,
    vp: &MapViewport,
    style: &VectorSource,
    shapes: &[Shape],
) {
    ctx.set_stroke_style_str(&style.stroke);
    ctx.set_fill_style_str(&style.fill);
    ctx.set_line_width(2.0);
    for shape in shapes {
        ctx.begin_path();
        match shape {
            Shape::Point((x, y)) => {
                let (sx, sy) = vp.world_to_screen(*x, *y);
                ctx.arc(sx, sy, POINT_RADIUS, 0.0, TAU).ok();
                ctx.fill();
            }
            Shape::Line(path) => trace(ctx, vp, path),
            Shape::Polygon(rings) => {
                for ring in rings {
                    trace(ctx, vp, ring);
                    ctx.close_path();
                }
                ctx.fill();
            }
        }
        ctx.stroke();
    }
}

fn draw_marker(ctx: &CanvasRenderingContext2d, vp: &MapViewport, x: f64, y: f64) {
    let (sx, sy) = vp.world_to_screen(x, y);
    ctx.begin_path();
    ctx.arc(sx, sy, MARKER_RADIUS, 0.0, TAU).ok();
    ctx.set_fill_style_str("#e4002b");
    ctx.fill();
    ctx.set_stroke_style_str("#ffffff");
    ctx.set_line_width(2.5);
    ctx.stroke();
}

fn local_point(canvas: Option<HtmlCanvasElement>, client_x: f64, client_y: f64) -> (f64, f64) {
    match canvas {
        Some(el) => {
            let rect = el.get_bounding_client_rect();
            (client_x - rect.left(), client_y - rect.top())
        }
        None => (client_x, client_y),
    }
}

#[component]
pub fn MapCanvas() -> impl IntoView {
    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();

    let scheduler = RenderScheduler::new(move || {
        let Some(canvas) = canvas_ref.get_untracked() else {
            return;
        };
        SCENE.with(|scene| {
            if let Ok(mut scene) = scene.try_borrow_mut() {
                paint(&canvas, &mut scene);
            }
        });
    });
    SCHEDULER.with(|slot| *slot.borrow_mut() = Some(scheduler));

    Effect::new(move || {
        if canvas_ref.get().is_some() {
            request_redraw();
        }
    });

    let resize = window_event_listener(leptos::ev::resize, move |_| request_redraw());
    on_cleanup(move || {
        resize.remove();
        ZOOM_SETTLE.with(|slot| slot.borrow_mut().take());
        SCHEDULER.with(|slot| slot.borrow_mut().take());
    });

    let dragging = Rc::new(Cell::new(false));
    let travelled = Rc::new(Cell::new(0.0f64));
    let last = Rc::new(Cell::new((0.0f64, 0.0f64)));
    let pinch_dist = Rc::new(Cell::new(0.0f64));

    let on_wheel = move |e: WheelEvent| {
        e.prevent_default();
        if !is_interactive() {
            return;
        }
        let delta = e.delta_y();
        let (x, y) = (e.offset_x() as f64, e.offset_y() as f64);
        SCENE.with(|scene| {
            if let Some(vp) = scene.borrow_mut().viewport.as_mut() {
                vp.zoom_at(delta, x, y);
            }
        });
        request_redraw();
        schedule_move_end();
    };

    let on_pointer_down = {
        let dragging = dragging.clone();
        let travelled = travelled.clone();
        let last = last.clone();
        move |e: PointerEvent| {
            if !is_interactive() {
                return;
            }
            dragging.set(true);
            travelled.set(0.0);
            last.set((e.client_x() as f64, e.client_y() as f64));
            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.set_pointer_capture(e.pointer_id()).ok();
                el.style().set_property("cursor", "grabbing").ok();
            }
        }
    };

    let on_pointer_move = {
        let dragging = dragging.clone();
        let travelled = travelled.clone();
        let last = last.clone();
        move |e: PointerEvent| {
            if !dragging.get() {
                return;
            }
            let (x, y) = (e.client_x() as f64, e.client_y() as f64);
            let (lx, ly) = last.get();
            let (dx, dy) = (x - lx, y - ly);
            last.set((x, y));
            travelled.set(travelled.get() + dx.abs() + dy.abs());
            SCENE.with(|scene| {
                if let Some(vp) = scene.borrow_mut().viewport.as_mut() {
                    vp.pan(dx, dy);
                }
            });
            request_redraw();
        }
    };

    let end_drag = {
        let dragging = dragging.clone();
        let travelled = travelled.clone();
        move |e: PointerEvent| {
            if !dragging.replace(false) {
                return;
            }
            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.style().set_property("cursor", "grab").ok();
            }
            if travelled.get() > DRAG_THRESHOLD_PX {
                finish_move();
            }
        }
    };
    let on_pointer_up = end_drag.clone();
    let on_pointer_cancel = end_drag;

    let on_touch_start = {
        let pinch_dist = pinch_dist.clone();
        move |e: web_sys::TouchEvent| {
            let touches = e.touches();
            if touches.length() == 2 {
                e.prevent_default();
                let (Some(t0), Some(t1)) = (touches.get(0), touches.get(1)) else {
                    return;
                };
                let dx = (t1.client_x() - t0.client_x()) as f64;
                let dy = (t1.client_y() - t0.client_y()) as f64;
                pinch_dist.set((dx * dx + dy * dy).sqrt());
            }
        }
    };

    let on_touch_move = {
        let pinch_dist = pinch_dist.clone();
        move |e: web_sys::TouchEvent| {
            let touches = e.touches();
            if touches.length() != 2 || !is_interactive() {
                return;
            }
            e.prevent_default();
            let (Some(t0), Some(t1)) = (touches.get(0), touches.get(1)) else {
                return;
            };
            let dx = (t1.client_x() - t0.client_x()) as f64;
            let dy = (t1.client_y() - t0.client_y()) as f64;
            let new_dist = (dx * dx + dy * dy).sqrt();
            let old_dist = pinch_dist.get();
            if old_dist > 0.0 {
                let (mx, my) = local_point(
                    canvas_ref.get_untracked(),
                    (t0.client_x() + t1.client_x()) as f64 / 2.0,
                    (t0.client_y() + t1.client_y()) as f64 / 2.0,
                );
                let delta = -(new_dist - old_dist) * 2.0;
                SCENE.with(|scene| {
                    if let Some(vp) = scene.borrow_mut().viewport.as_mut() {
                        vp.zoom_at(delta, mx, my);
                    }
                });
                request_redraw();
                schedule_move_end();
            }
            pinch_dist.set(new_dist);
        }
    };

    view! {
        <div
            class="map-canvas"
            style="position: absolute; inset: 0; overflow: hidden;"
            on:wheel=on_wheel
            on:pointerdown=on_pointer_down
            on:pointermove=on_pointer_move
            on:pointerup=on_pointer_up
            on:pointercancel=on_pointer_cancel
            on:touchstart=on_touch_start
            on:touchmove=on_touch_move
        >
            <canvas
                node_ref=canvas_ref
                style="position: absolute; inset: 0; width: 100%; height: 100%; touch-action: none; cursor: grab;"
            />
        </div>
    }
}
