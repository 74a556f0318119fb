//! Resize and rotation handles for single elements.
//!
//! Every function here proposes an [`ElementPatch`] computed from a start
//! state; nothing is mutated in place.

use crate::element::{Element, ElementKind, ElementPatch};
use kurbo::{Affine, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Handle size in screen pixels.
pub const HANDLE_SIZE: f64 = 16.0;
/// Handle hit tolerance in screen pixels.
pub const HANDLE_HIT_TOLERANCE: f64 = 24.0;
/// Distance from the top edge to the rotation handle, in screen pixels.
pub const ROTATE_HANDLE_OFFSET: f64 = 25.0;
/// Smallest width/height a resize may produce, in world units.
pub const MIN_ELEMENT_SIZE: f64 = 10.0;

const DIMENSION_EPSILON: f64 = 1e-9;

/// Type of transform handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandleKind {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    /// Edge midpoints (multi-selection boxes).
    Top,
    Right,
    Bottom,
    Left,
    /// Line/arrow origin.
    StartPoint,
    /// Line/arrow far end.
    EndPoint,
    /// Rotation grip above the top edge.
    Rotation,
}

impl HandleKind {
    /// One of the four box corners.
    pub fn is_corner(self) -> bool {
        matches!(
            self,
            HandleKind::TopLeft
                | HandleKind::TopRight
                | HandleKind::BottomLeft
                | HandleKind::BottomRight
        )
    }

    /// One of the four edge midpoints.
    pub fn is_edge(self) -> bool {
        matches!(self, HandleKind::Top | HandleKind::Right | HandleKind::Bottom | HandleKind::Left)
    }

    /// A line or arrow endpoint.
    pub fn is_endpoint(self) -> bool {
        matches!(self, HandleKind::StartPoint | HandleKind::EndPoint)
    }

    /// Which box edges follow the pointer: `(left, right, top, bottom)`.
    fn moving_edges(self) -> (bool, bool, bool, bool) {
        match self {
            HandleKind::TopLeft => (true, false, true, false),
            HandleKind::TopRight => (false, true, true, false),
            HandleKind::BottomLeft => (true, false, false, true),
            HandleKind::BottomRight => (false, true, false, true),
            HandleKind::Top => (false, false, true, false),
            HandleKind::Right => (false, true, false, false),
            HandleKind::Bottom => (false, false, false, true),
            HandleKind::Left => (true, false, false, false),
            HandleKind::StartPoint | HandleKind::EndPoint | HandleKind::Rotation => {
                (false, false, false, false)
            }
        }
    }
}

/// A handle with its world-space position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    pub kind: HandleKind,
    pub position: Point,
}

impl Handle {
    /// Create a handle at a world position.
    pub fn new(kind: HandleKind, position: Point) -> Self {
        Self { kind, position }
    }

    /// Check if a world point lies within `tolerance` (world units) of this handle.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        (point - self.position).hypot2() <= tolerance * tolerance
    }
}

/// Screen-space handle metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandleMetrics {
    pub hit_tolerance: f64,
    pub rotation_offset: f64,
}

impl Default for HandleMetrics {
    fn default() -> Self {
        Self {
            hit_tolerance: HANDLE_HIT_TOLERANCE,
            rotation_offset: ROTATE_HANDLE_OFFSET,
        }
    }
}

/// Handles for an element at the given zoom.
pub fn get_resize_handles(element: &Element, zoom: f64) -> Vec<Handle> {
    get_resize_handles_with(element, zoom, &HandleMetrics::default())
}

/// Handles for an element with explicit metrics.
///
/// Lines and arrows get their two endpoints. Box types and pen strokes get four
/// corners plus a rotation grip; all of them follow the element's rotation.
pub fn get_resize_handles_with(
    element: &Element,
    zoom: f64,
    metrics: &HandleMetrics,
) -> Vec<Handle> {
    if element.kind.is_linear() {
        let (start, end) = element.endpoints();
        return vec![
            Handle::new(HandleKind::StartPoint, start),
            Handle::new(HandleKind::EndPoint, end),
        ];
    }

    let r = element.local_rect();
    let grip = Point::new(r.center().x, r.y0 - metrics.rotation_offset / zoom);
    vec![
        Handle::new(HandleKind::TopLeft, element.to_world(Point::new(r.x0, r.y0))),
        Handle::new(HandleKind::TopRight, element.to_world(Point::new(r.x1, r.y0))),
        Handle::new(HandleKind::BottomLeft, element.to_world(Point::new(r.x0, r.y1))),
        Handle::new(HandleKind::BottomRight, element.to_world(Point::new(r.x1, r.y1))),
        Handle::new(HandleKind::Rotation, element.to_world(grip)),
    ]
}

/// Find which handle (if any) is under a world point.
pub fn find_resize_handle(point: Point, element: &Element, zoom: f64) -> Option<HandleKind> {
    find_resize_handle_with(point, element, zoom, &HandleMetrics::default())
}

/// [`find_resize_handle`] with explicit handle metrics.
pub fn find_resize_handle_with(
    point: Point,
    element: &Element,
    zoom: f64,
    metrics: &HandleMetrics,
) -> Option<HandleKind> {
    let tolerance = metrics.hit_tolerance / zoom;
    get_resize_handles_with(element, zoom, metrics)
        .into_iter()
        .find(|handle| handle.hit_test(point, tolerance))
        .map(|handle| handle.kind)
}

/// Options for [`apply_resize`].
#[derive(Clone, Copy)]
pub struct ResizeOptions<'a> {
    /// Element state captured at gesture start; geometry is computed from it
    /// instead of the live element when present.
    pub start: Option<&'a Element>,
    /// Applied to the pointer before the delta is computed.
    pub snap: Option<&'a dyn Fn(Point) -> Point>,
    /// Lock the aspect ratio of box types on corner handles.
    pub proportional: bool,
    pub min_size: f64,
}

impl Default for ResizeOptions<'_> {
    fn default() -> Self {
        Self {
            start: None,
            snap: None,
            proportional: false,
            min_size: MIN_ELEMENT_SIZE,
        }
    }
}

impl<'a> ResizeOptions<'a> {
    /// Resize from this start snapshot instead of the live element.
    pub fn with_start(mut self, start: &'a Element) -> Self {
        self.start = Some(start);
        self
    }

    /// Snap the dragged point through `snap`.
    pub fn with_snap(mut self, snap: &'a dyn Fn(Point) -> Point) -> Self {
        self.snap = Some(snap);
        self
    }

    /// Lock the aspect ratio on corner handles.
    pub fn proportional(mut self, proportional: bool) -> Self {
        self.proportional = proportional;
        self
    }

    /// Clamp moved axes to at least `min_size`.
    pub fn with_min_size(mut self, min_size: f64) -> Self {
        self.min_size = min_size;
        self
    }
}

/// Resize a box by moving the edges `handle` controls by `delta`.
///
/// Dimensions on moving axes are clamped to `min_size` while the opposite
/// edges stay fixed. Proportional mode only applies to corner handles.
pub(crate) fn resize_box(
    rect: Rect,
    handle: HandleKind,
    delta: Vec2,
    proportional: bool,
    min_size: f64,
) -> Rect {
    let (left, right, top, bottom) = handle.moving_edges();
    let (w, h) = (rect.width(), rect.height());

    let mut new_w = w + if right { delta.x } else if left { -delta.x } else { 0.0 };
    let mut new_h = h + if bottom { delta.y } else if top { -delta.y } else { 0.0 };

    if proportional && handle.is_corner() && w > DIMENSION_EPSILON && h > DIMENSION_EPSILON {
        let sx = new_w / w;
        let sy = new_h / h;
        let scale = if (sx - 1.0).abs() >= (sy - 1.0).abs() { sx } else { sy };
        let scale = scale.max(min_size / w).max(min_size / h);
        new_w = w * scale;
        new_h = h * scale;
    }

    if left || right {
        new_w = new_w.max(min_size);
    }
    if top || bottom {
        new_h = new_h.max(min_size);
    }

    let x0 = if left { rect.x1 - new_w } else { rect.x0 };
    let y0 = if top { rect.y1 - new_h } else { rect.y0 };
    Rect::new(x0, y0, x0 + new_w, y0 + new_h)
}

/// Compute the geometry patch for dragging `handle` from `start` to `current`.
///
/// Handles that do not apply to the element's type yield an empty patch.
pub fn apply_resize(
    element: &Element,
    handle: HandleKind,
    current: Point,
    start: Point,
    options: &ResizeOptions<'_>,
) -> ElementPatch {
    let base = options.start.unwrap_or(element);
    let current = options.snap.map_or(current, |snap| snap(current));
    let delta = current - start;

    match handle {
        HandleKind::Rotation => apply_rotation(base, current),
        HandleKind::StartPoint | HandleKind::EndPoint if base.kind.is_linear() => {
            resize_endpoint(base, handle, delta)
        }
        _ if base.kind.is_linear() || handle.is_endpoint() => ElementPatch::new(base.id.clone()),
        _ => resize_frame(base, handle, delta, options),
    }
}

fn resize_endpoint(base: &Element, handle: HandleKind, delta: Vec2) -> ElementPatch {
    if !base.is_rotated() {
        return match handle {
            HandleKind::StartPoint => ElementPatch::geometry(
                base.id.clone(),
                base.x + delta.x,
                base.y + delta.y,
                base.width - delta.x,
                base.height - delta.y,
            ),
            _ => ElementPatch::geometry(
                base.id.clone(),
                base.x,
                base.y,
                base.width + delta.x,
                base.height + delta.y,
            ),
        };
    }

    // Move the world endpoint, then re-express both ends around the new midpoint.
    let (mut start, mut end) = base.endpoints();
    if handle == HandleKind::StartPoint {
        start += delta;
    } else {
        end += delta;
    }
    let mid = start.midpoint(end);
    let unrotate = Affine::rotate_about(-base.angle, mid);
    let (start, end) = (unrotate * start, unrotate * end);
    ElementPatch::geometry(base.id.clone(), start.x, start.y, end.x - start.x, end.y - start.y)
}

fn resize_frame(
    base: &Element,
    handle: HandleKind,
    delta: Vec2,
    options: &ResizeOptions<'_>,
) -> ElementPatch {
    // The pointer delta is measured in the element's unrotated frame.
    let local_delta = if base.is_rotated() {
        (Affine::rotate(-base.angle) * delta.to_point()).to_vec2()
    } else {
        delta
    };

    let old = base.local_rect();
    let proportional = options.proportional && base.kind.is_box();
    let resized = resize_box(old, handle, local_delta, proportional, options.min_size);

    // Place the new box so its untouched edges keep their world position.
    let center = base.to_world(resized.center());
    let origin = center - resized.size().to_vec2() / 2.0;

    let mut patch = ElementPatch::geometry(
        base.id.clone(),
        origin.x,
        origin.y,
        resized.width(),
        resized.height(),
    );
    if base.kind == ElementKind::Pen && !base.points.is_empty() {
        let scale = |to: f64, from: f64| if from > DIMENSION_EPSILON { to / from } else { 1.0 };
        let sx = scale(resized.width(), old.width());
        let sy = scale(resized.height(), old.height());
        patch.points = Some(
            base.points
                .iter()
                .map(|p| Point::new(origin.x + (p.x - old.x0) * sx, origin.y + (p.y - old.y0) * sy))
                .collect(),
        );
    }
    patch
}

/// Rotate an element to face the pointer: `angle = atan2(dy, dx)` about its center.
pub fn apply_rotation(element: &Element, pointer: Point) -> ElementPatch {
    let center = element.center();
    let angle = (pointer.y - center.y).atan2(pointer.x - center.x);
    ElementPatch::new(element.id.clone()).with_angle(angle)
}
