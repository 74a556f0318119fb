//! Treat a multi-selection as one rigid box for resize and rotation.
//!
//! All operations read a [`TransformSnapshot`] captured at gesture start, so a
//! long drag never accumulates float drift.

use crate::element::{Element, ElementId, ElementPatch};
use crate::snap::snap_angle;
use crate::transform::{Handle, HandleKind, HandleMetrics, MIN_ELEMENT_SIZE, resize_box};
use kurbo::{Affine, Point, Rect, Vec2};
use std::f64::consts::{PI, TAU};

/// Group rotation snaps to this increment (15°).
pub const GROUP_ROTATION_INCREMENT: f64 = PI / 12.0;

const DIMENSION_EPSILON: f64 = 1e-9;

/// Bounding box over the unrotated boxes of `elements`, or `None` when empty.
pub fn get_multi_selection_bounds(elements: &[Element]) -> Option<Rect> {
    elements.iter().map(Element::local_rect).reduce(|acc, r| acc.union(r))
}

/// Eight resize handles (corners and edge midpoints) plus a rotation grip.
pub fn get_multi_selection_handles(bounds: Rect, zoom: f64) -> Vec<Handle> {
    get_multi_selection_handles_with(bounds, zoom, &HandleMetrics::default())
}

/// [`get_multi_selection_handles`] with explicit handle metrics.
pub fn get_multi_selection_handles_with(
    bounds: Rect,
    zoom: f64,
    metrics: &HandleMetrics,
) -> Vec<Handle> {
    let c = bounds.center();
    let grip = Point::new(c.x, bounds.y0 - metrics.rotation_offset / zoom);
    vec![
        Handle::new(HandleKind::TopLeft, Point::new(bounds.x0, bounds.y0)),
        Handle::new(HandleKind::TopRight, Point::new(bounds.x1, bounds.y0)),
        Handle::new(HandleKind::BottomLeft, Point::new(bounds.x0, bounds.y1)),
        Handle::new(HandleKind::BottomRight, Point::new(bounds.x1, bounds.y1)),
        Handle::new(HandleKind::Top, Point::new(c.x, bounds.y0)),
        Handle::new(HandleKind::Right, Point::new(bounds.x1, c.y)),
        Handle::new(HandleKind::Bottom, Point::new(c.x, bounds.y1)),
        Handle::new(HandleKind::Left, Point::new(bounds.x0, c.y)),
        Handle::new(HandleKind::Rotation, grip),
    ]
}

/// Find the multi-selection handle under a world point.
pub fn find_multi_selection_handle(point: Point, bounds: Rect, zoom: f64) -> Option<HandleKind> {
    find_multi_selection_handle_with(point, bounds, zoom, &HandleMetrics::default())
}

/// [`find_multi_selection_handle`] with explicit handle metrics.
pub fn find_multi_selection_handle_with(
    point: Point,
    bounds: Rect,
    zoom: f64,
    metrics: &HandleMetrics,
) -> Option<HandleKind> {
    let tolerance = metrics.hit_tolerance / zoom;
    get_multi_selection_handles_with(bounds, zoom, metrics)
        .into_iter()
        .find(|handle| handle.hit_test(point, tolerance))
        .map(|handle| handle.kind)
}

/// New group box for dragging `handle` from `start_point` to `current_point`.
///
/// Uses the single-element corner/edge math with the default minimum size.
/// No snapping is applied.
pub fn apply_multi_selection_resize(
    start_bounds: Rect,
    handle: HandleKind,
    start_point: Point,
    current_point: Point,
) -> Rect {
    apply_multi_selection_resize_with(
        start_bounds,
        handle,
        start_point,
        current_point,
        MIN_ELEMENT_SIZE,
    )
}

/// [`apply_multi_selection_resize`] with an explicit minimum size.
pub fn apply_multi_selection_resize_with(
    start_bounds: Rect,
    handle: HandleKind,
    start_point: Point,
    current_point: Point,
    min_size: f64,
) -> Rect {
    resize_box(start_bounds, handle, current_point - start_point, false, min_size)
}

/// Scale every member from `start_bounds` into `new_bounds`.
///
/// Each element's offset from the group origin and its size are multiplied by
/// the same `(sx, sy)`, preserving relative layout. A degenerate start axis is
/// left unscaled.
pub fn apply_group_resize(
    start_elements: &[Element],
    start_bounds: Rect,
    new_bounds: Rect,
) -> Vec<ElementPatch> {
    let sx = if start_bounds.width() > DIMENSION_EPSILON {
        new_bounds.width() / start_bounds.width()
    } else {
        1.0
    };
    let sy = if start_bounds.height() > DIMENSION_EPSILON {
        new_bounds.height() / start_bounds.height()
    } else {
        1.0
    };
    let map = |p: Point| {
        Point::new(
            new_bounds.x0 + (p.x - start_bounds.x0) * sx,
            new_bounds.y0 + (p.y - start_bounds.y0) * sy,
        )
    };

    start_elements
        .iter()
        .map(|element| {
            let origin = map(Point::new(element.x, element.y));
            let mut patch = ElementPatch::geometry(
                element.id.clone(),
                origin.x,
                origin.y,
                element.width * sx,
                element.height * sy,
            );
            if !element.points.is_empty() {
                patch.points = Some(element.points.iter().map(|&p| map(p)).collect());
            }
            patch
        })
        .collect()
}

/// Rotate every member by `delta_angle` around the shared `center`.
///
/// Each element's own center orbits the pivot and its angle grows by the same
/// delta, normalized to `[0, 2π)`.
pub fn apply_group_rotation(
    start_elements: &[Element],
    center: Point,
    delta_angle: f64,
) -> Vec<ElementPatch> {
    let orbit = Affine::rotate_about(delta_angle, center);
    start_elements
        .iter()
        .map(|element| {
            let own_center = element.center();
            let shift = orbit * own_center - own_center;
            let mut patch = ElementPatch::new(element.id.clone())
                .with_position(Point::new(element.x + shift.x, element.y + shift.y))
                .with_angle((element.angle + delta_angle).rem_euclid(TAU));
            if !element.points.is_empty() {
                patch.points = Some(element.points.iter().map(|&p| p + shift).collect());
            }
            patch
        })
        .collect()
}

/// Angle swept from `grab` to `pointer` around `center`, wrapped to `(-π, π]`
/// and snapped to `increment` (no snap when `increment <= 0`).
pub fn group_rotation_delta(center: Point, grab: Point, pointer: Point, increment: f64) -> f64 {
    let start = (grab - center).atan2();
    let current = (pointer - center).atan2();
    let mut delta = (current - start).rem_euclid(TAU);
    if delta > PI {
        delta -= TAU;
    }
    snap_angle(delta, increment)
}

/// Start state of a transform gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSnapshot {
    /// Elements as they were when the gesture began.
    pub elements: Vec<Element>,
    /// Group bounds at gesture start.
    pub bounds: Rect,
    pub start_point: Point,
    pub current_point: Point,
}

impl TransformSnapshot {
    /// Capture `elements`; returns `None` for an empty selection.
    pub fn new(elements: Vec<Element>, start_point: Point) -> Option<Self> {
        let bounds = get_multi_selection_bounds(&elements)?;
        Some(Self {
            elements,
            bounds,
            start_point,
            current_point: start_point,
        })
    }

    /// Center of the start bounds; the group rotation pivot.
    pub fn center(&self) -> Point {
        self.bounds.center()
    }

    /// Get the drag delta.
    pub fn delta(&self) -> Vec2 {
        self.current_point - self.start_point
    }

    /// Ids of the captured elements, in capture order.
    pub fn ids(&self) -> Vec<ElementId> {
        self.elements.iter().map(|e| e.id.clone()).collect()
    }

    /// Patches translating every member by `delta`.
    pub fn translate(&self, delta: Vec2) -> Vec<ElementPatch> {
        self.elements
            .iter()
            .map(|element| {
                let mut moved = element.clone();
                moved.translate(delta);
                let mut patch = ElementPatch::new(element.id.clone())
                    .with_position(Point::new(moved.x, moved.y));
                if !moved.points.is_empty() {
                    patch.points = Some(moved.points);
                }
                patch
            })
            .collect()
    }

    /// Patches resizing the group by dragging `handle` to `current`.
    pub fn resize(&self, handle: HandleKind, current: Point, min_size: f64) -> Vec<ElementPatch> {
        let new_bounds = apply_multi_selection_resize_with(
            self.bounds,
            handle,
            self.start_point,
            current,
            min_size,
        );
        apply_group_resize(&self.elements, self.bounds, new_bounds)
    }

    /// Patches rotating the group around its start center toward `current`.
    pub fn rotate(&self, current: Point, increment: f64) -> Vec<ElementPatch> {
        let center = self.center();
        let delta = group_rotation_delta(center, self.start_point, current, increment);
        apply_group_rotation(&self.elements, center, delta)
    }
}
