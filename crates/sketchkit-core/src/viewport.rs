//! Viewport for world/screen coordinate transforms.

use kurbo::{Affine, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// The visible window onto the world.
///
/// World to screen is `screen = (world - pan) * zoom`; screen to world is
/// `world = screen / zoom + pan`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Scale factor, always > 0.
    pub zoom: f64,
    /// World point shown at the screen origin.
    pub pan: Point,
    /// Screen-space rectangle the canvas occupies.
    pub bounds: Rect,
    /// Minimum allowed zoom level
    pub min_zoom: f64,
    /// Maximum allowed zoom level
    pub max_zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Point::ZERO,
            bounds: Rect::new(0.0, 0.0, 1280.0, 800.0),
            min_zoom: 0.1,
            max_zoom: 10.0,
        }
    }
}

impl Viewport {
    /// Create a viewport at zoom 1 with no pan for a screen of `bounds`.
    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds,
            ..Self::default()
        }
    }

    /// Transform converting world coordinates to screen coordinates.
    pub fn transform(&self) -> Affine {
        Affine::scale(self.zoom) * Affine::translate(-self.pan.to_vec2())
    }

    /// Transform converting screen coordinates to world coordinates.
    pub fn inverse_transform(&self) -> Affine {
        Affine::translate(self.pan.to_vec2()) * Affine::scale(1.0 / self.zoom)
    }

    /// Map a world point to screen space.
    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// Map a screen point to world space.
    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    /// Convert a screen-space length (pixels) into world units.
    pub fn screen_to_world_distance(&self, pixels: f64) -> f64 {
        pixels / self.zoom
    }

    /// Pan by a delta in screen coordinates (dragging the canvas).
    pub fn pan_by(&mut self, screen_delta: Vec2) {
        self.pan -= screen_delta / self.zoom;
    }

    /// Zoom, keeping the world point under `screen_point` fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }

        let anchor = self.screen_to_world(screen_point);
        self.zoom = new_zoom;
        self.pan = anchor - screen_point.to_vec2() / self.zoom;
    }

    /// The world-space rectangle currently visible.
    pub fn visible_world_rect(&self) -> Rect {
        Rect::from_points(
            self.screen_to_world(Point::new(self.bounds.x0, self.bounds.y0)),
            self.screen_to_world(Point::new(self.bounds.x1, self.bounds.y1)),
        )
    }

    /// Fit the viewport to show `world_bounds` with `padding` screen pixels around it.
    pub fn fit_to_bounds(&mut self, world_bounds: Rect, padding: f64) {
        if world_bounds.width() <= f64::EPSILON || world_bounds.height() <= f64::EPSILON {
            self.zoom = 1.0;
            self.pan = world_bounds.center() - self.bounds.center().to_vec2();
            return;
        }

        let available_w = (self.bounds.width() - padding * 2.0).max(1.0);
        let available_h = (self.bounds.height() - padding * 2.0).max(1.0);
        let scale_x = available_w / world_bounds.width();
        let scale_y = available_h / world_bounds.height();
        self.zoom = scale_x.min(scale_y).clamp(self.min_zoom, self.max_zoom);

        // Center the bounds in the viewport
        self.pan = world_bounds.center() - self.bounds.center().to_vec2() / self.zoom;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_viewport() {
        let viewport = Viewport::default();
        assert_eq!(viewport.pan, Point::ZERO);
        assert!((viewport.zoom - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_world_to_screen_formula() {
        let mut viewport = Viewport::default();
        viewport.pan = Point::new(50.0, 100.0);
        viewport.zoom = 2.0;
        let screen = viewport.world_to_screen(Point::new(60.0, 110.0));
        assert!((screen.x - 20.0).abs() < 1e-10);
        assert!((screen.y - 20.0).abs() < 1e-10);
    }

    #[test]
    fn test_screen_to_world_formula() {
        let mut viewport = Viewport::default();
        viewport.pan = Point::new(50.0, 100.0);
        viewport.zoom = 2.0;
        let world = viewport.screen_to_world(Point::new(100.0, 200.0));
        assert!((world.x - 100.0).abs() < 1e-10);
        assert!((world.y - 200.0).abs() < 1e-10);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let mut viewport = Viewport::default();
        viewport.pan = Point::new(30.0, -20.0);
        viewport.zoom = 1.5;

        let original = Point::new(123.0, 456.0);
        let back = viewport.world_to_screen(viewport.screen_to_world(original));
        assert!((back.x - original.x).abs() < 1e-10);
        assert!((back.y - original.y).abs() < 1e-10);
    }

    #[test]
    fn test_zoom_at_keeps_anchor_fixed() {
        let mut viewport = Viewport::default();
        viewport.pan = Point::new(10.0, 10.0);
        let anchor_screen = Point::new(200.0, 150.0);
        let before = viewport.screen_to_world(anchor_screen);
        viewport.zoom_at(anchor_screen, 2.5);
        let after = viewport.screen_to_world(anchor_screen);
        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
        assert!((viewport.zoom - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zoom_clamp() {
        let mut viewport = Viewport::default();
        viewport.zoom_at(Point::ZERO, 0.001);
        assert!((viewport.zoom - viewport.min_zoom).abs() < f64::EPSILON);

        viewport.zoom_at(Point::ZERO, 1000.0);
        assert!((viewport.zoom - viewport.max_zoom).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pan_by_moves_world_opposite() {
        let mut viewport = Viewport::default();
        viewport.zoom = 2.0;
        viewport.pan_by(Vec2::new(20.0, -10.0));
        assert!((viewport.pan.x + 10.0).abs() < f64::EPSILON);
        assert!((viewport.pan.y - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fit_to_bounds_centers_content() {
        let mut viewport = Viewport::new(Rect::new(0.0, 0.0, 800.0, 600.0));
        let world = Rect::new(100.0, 100.0, 300.0, 200.0);
        viewport.fit_to_bounds(world, 0.0);
        assert!((viewport.zoom - 4.0).abs() < 1e-9);
        let center = viewport.world_to_screen(world.center());
        assert!((center.x - 400.0).abs() < 1e-9);
        assert!((center.y - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_visible_world_rect() {
        let mut viewport = Viewport::new(Rect::new(0.0, 0.0, 100.0, 100.0));
        viewport.zoom = 2.0;
        viewport.pan = Point::new(10.0, 20.0);
        assert_eq!(viewport.visible_world_rect(), Rect::new(10.0, 20.0, 60.0, 70.0));
    }
}
