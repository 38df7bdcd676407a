use kartvisning_shared::Extent;

pub const MIN_ZOOM: f64 = 3.0;
pub const MAX_ZOOM: f64 = 18.0;
/// Zoom levels per pixel of wheel delta.
const WHEEL_ZOOM_STEP: f64 = 0.004;

/// Pan/zoom state mapping projected map coordinates to canvas pixels.
/// Screen y grows downward, map y grows upward.
#[derive(Debug, Clone, PartialEq)]
pub struct MapViewport {
    pub center: (f64, f64),
    pub zoom: f64,
    /// Resolution at zoom 0, in map units per pixel.
    pub base_resolution: f64,
    pub width: f64,
    pub height: f64,
}

impl MapViewport {
    pub fn new(base_resolution: f64, center: (f64, f64), zoom: f64) -> Self {
        Self {
            center,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            base_resolution,
            width: 0.0,
            height: 0.0,
        }
    }

    pub fn resolution(&self) -> f64 {
        self.base_resolution / 2f64.powf(self.zoom)
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width.max(0.0);
        self.height = height.max(0.0);
    }

    pub fn world_to_screen(&self, x: f64, y: f64) -> (f64, f64) {
        let res = self.resolution();
        (
            self.width / 2.0 + (x - self.center.0) / res,
            self.height / 2.0 - (y - self.center.1) / res,
        )
    }

    pub fn screen_to_world(&self, sx: f64, sy: f64) -> (f64, f64) {
        let res = self.resolution();
        (
            self.center.0 + (sx - self.width / 2.0) * res,
            self.center.1 - (sy - self.height / 2.0) * res,
        )
    }

    pub fn visible_extent(&self) -> Extent {
        let (min_x, max_y) = self.screen_to_world(0.0, 0.0);
        let (max_x, min_y) = self.screen_to_world(self.width, self.height);
        Extent::new(min_x, min_y, max_x, max_y)
    }

    /// Drag by a screen-space delta; the map follows the pointer.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        let res = self.resolution();
        self.center.0 -= dx * res;
        self.center.1 += dy * res;
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Wheel zoom that keeps the map point under `(sx, sy)` in place.
    pub fn zoom_at(&mut self, delta: f64, sx: f64, sy: f64) {
        let anchor = self.screen_to_world(sx, sy);
        self.set_zoom(self.zoom - delta * WHEEL_ZOOM_STEP);
        let moved = self.screen_to_world(sx, sy);
        self.center.0 += anchor.0 - moved.0;
        self.center.1 += anchor.1 - moved.1;
    }

    /// Integer tile level to fetch for the current zoom.
    pub fn tile_level(&self, max_level: u8) -> u8 {
        self.zoom.round().clamp(0.0, max_level as f64) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> MapViewport {
        let mut vp = MapViewport::new(21_664.0, (570_130.0, 7_032_664.0), 4.0);
        vp.resize(800.0, 600.0);
        vp
    }

    fn close(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-6 && (a.1 - b.1).abs() < 1e-6
    }

    #[test]
    fn center_maps_to_canvas_middle() {
        let vp = viewport();
        assert_eq!(vp.world_to_screen(570_130.0, 7_032_664.0), (400.0, 300.0));
        assert_eq!(vp.resolution(), 21_664.0 / 16.0);
    }

    #[test]
    fn screen_and_world_round_trip() {
        let vp = viewport();
        let world = vp.screen_to_world(123.0, 456.0);
        assert!(close(vp.world_to_screen(world.0, world.1), (123.0, 456.0)));
        // North is up.
        assert!(vp.screen_to_world(400.0, 0.0).1 > vp.center.1);
    }

    #[test]
    fn visible_extent_spans_canvas() {
        let vp = viewport();
        let extent = vp.visible_extent();
        assert!((extent.width() - 800.0 * vp.resolution()).abs() < 1e-6);
        assert!((extent.height() - 600.0 * vp.resolution()).abs() < 1e-6);
        assert!(close(extent.center(), vp.center));
    }

    #[test]
    fn dragging_right_moves_center_west() {
        let mut vp = viewport();
        let before = vp.center;
        vp.pan(10.0, 10.0);
        assert!(vp.center.0 < before.0);
        assert!(vp.center.1 > before.1);
    }

    #[test]
    fn wheel_zoom_keeps_anchor_fixed() {
        let mut vp = viewport();
        let anchor = vp.screen_to_world(100.0, 80.0);
        vp.zoom_at(-250.0, 100.0, 80.0);
        assert_eq!(vp.zoom, 5.0);
        assert!(close(vp.world_to_screen(anchor.0, anchor.1), (100.0, 80.0)));
    }

    #[test]
    fn zoom_is_clamped() {
        let mut vp = viewport();
        vp.set_zoom(40.0);
        assert_eq!(vp.zoom, MAX_ZOOM);
        vp.set_zoom(0.0);
        assert_eq!(vp.zoom, MIN_ZOOM);
        assert_eq!(MapViewport::new(1.0, (0.0, 0.0), 1.0).zoom, MIN_ZOOM);
    }

    #[test]
    fn tile_level_rounds_and_caps() {
        let mut vp = viewport();
        vp.set_zoom(6.6);
        assert_eq!(vp.tile_level(20), 7);
        assert_eq!(vp.tile_level(5), 5);
    }
}
