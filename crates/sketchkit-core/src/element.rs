//! Drawable elements and the geometry patches proposed against them.
//!
//! Elements are plain data owned by the caller. The engine reads them, hit-tests
//! them and proposes [`ElementPatch`]es; it never creates or destroys elements.

use crate::group::GroupId;
use kurbo::{Affine, Point, Rect, Vec2};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Rotations smaller than this (radians) are treated as axis-aligned.
pub const ANGLE_EPSILON: f64 = 1e-9;

/// Stable, caller-generated element identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ElementId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Element type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Rectangle,
    Circle,
    Diamond,
    Line,
    Arrow,
    Pen,
    Text,
    Image,
}

impl ElementKind {
    /// Line and arrow store `width`/`height` as a signed vector to the far endpoint.
    pub fn is_linear(self) -> bool {
        matches!(self, ElementKind::Line | ElementKind::Arrow)
    }

    /// Types that resize through four corner handles and treat their geometry as a filled box.
    pub fn is_box(self) -> bool {
        matches!(
            self,
            ElementKind::Rectangle
                | ElementKind::Circle
                | ElementKind::Diamond
                | ElementKind::Text
                | ElementKind::Image
        )
    }
}

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    /// Create a color from RGBA components.
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque black.
    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }
}

/// Style attributes. Geometry only ever reads `stroke_width`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementStyle {
    pub stroke_color: SerializableColor,
    pub stroke_width: f64,
    /// Fill color (None = no fill).
    pub fill_color: Option<SerializableColor>,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub roughness: f64,
    #[serde(default)]
    pub font_size: Option<f64>,
}

fn default_opacity() -> f64 {
    1.0
}

impl Default for ElementStyle {
    fn default() -> Self {
        Self {
            stroke_color: SerializableColor::black(),
            stroke_width: 2.0,
            fill_color: None,
            opacity: 1.0,
            roughness: 1.0,
            font_size: None,
        }
    }
}

/// The fundamental drawable unit.
///
/// `x, y` is the top-left of the unrotated box and `angle` rotates around the
/// box center. For [`ElementKind::Line`] and [`ElementKind::Arrow`], `width` and
/// `height` are the signed vector from `(x, y)` to the far endpoint. Pen points
/// are absolute world coordinates in the element's unrotated frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub kind: ElementKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Rotation in radians around the box center.
    #[serde(default)]
    pub angle: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<Point>,
    #[serde(default)]
    pub style: ElementStyle,
    /// Locked elements are skipped by hit-testing, selection and transforms.
    #[serde(default)]
    pub locked: bool,
    /// Weak back-reference to the owning group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
}

impl Element {
    /// Create an unrotated, unlocked element with the default style.
    pub fn new(
        id: impl Into<ElementId>,
        kind: ElementKind,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            x,
            y,
            width,
            height,
            angle: 0.0,
            points: Vec::new(),
            style: ElementStyle::default(),
            locked: false,
            group_id: None,
        }
    }

    /// Create a pen stroke; the box is derived from the points.
    pub fn pen(id: impl Into<ElementId>, points: Vec<Point>) -> Self {
        let bounds = points_bounds(&points).unwrap_or(Rect::ZERO);
        let mut element = Self::new(
            id,
            ElementKind::Pen,
            bounds.x0,
            bounds.y0,
            bounds.width(),
            bounds.height(),
        );
        element.points = points;
        element
    }

    /// Set the rotation in radians.
    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    /// Set the stroke width.
    pub fn with_stroke_width(mut self, stroke_width: f64) -> Self {
        self.style.stroke_width = stroke_width;
        self
    }

    /// Set the locked flag.
    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Stroke width in world units.
    pub fn stroke_width(&self) -> f64 {
        self.style.stroke_width
    }

    /// Center of the (unrotated) box; the rotation pivot.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// The unrotated box with non-negative extent.
    pub fn local_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height).abs()
    }

    /// Whether the rotation is non-negligible.
    pub fn is_rotated(&self) -> bool {
        self.angle.abs() > ANGLE_EPSILON
    }

    /// Transform from the element's local (unrotated) frame to world space.
    pub fn rotation(&self) -> Affine {
        Affine::rotate_about(self.angle, self.center())
    }

    /// Express a world point in the element's unrotated frame.
    pub fn to_local(&self, point: Point) -> Point {
        if self.is_rotated() {
            Affine::rotate_about(-self.angle, self.center()) * point
        } else {
            point
        }
    }

    /// Map a point from the element's unrotated frame into world space.
    pub fn to_world(&self, point: Point) -> Point {
        if self.is_rotated() {
            self.rotation() * point
        } else {
            point
        }
    }

    /// World-space corners in order top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [Point; 4] {
        let r = self.local_rect();
        [
            self.to_world(Point::new(r.x0, r.y0)),
            self.to_world(Point::new(r.x1, r.y0)),
            self.to_world(Point::new(r.x1, r.y1)),
            self.to_world(Point::new(r.x0, r.y1)),
        ]
    }

    /// Start and far endpoint of a line/arrow in world space.
    pub fn endpoints(&self) -> (Point, Point) {
        (
            self.to_world(Point::new(self.x, self.y)),
            self.to_world(Point::new(self.x + self.width, self.y + self.height)),
        )
    }

    /// Axis-aligned box containing the element as drawn (rotation applied).
    pub fn aabb(&self) -> Rect {
        if self.kind == ElementKind::Pen && !self.points.is_empty() {
            if !self.is_rotated() {
                return points_bounds(&self.points).unwrap_or_else(|| self.local_rect());
            }
            let rotation = self.rotation();
            let rotated: Vec<Point> = self.points.iter().map(|&p| rotation * p).collect();
            return points_bounds(&rotated).unwrap_or_else(|| self.local_rect());
        }
        if !self.is_rotated() {
            return self.local_rect();
        }
        points_bounds(&self.corners()).unwrap_or_else(|| self.local_rect())
    }

    /// Move the element (and its pen points) by `delta`.
    pub fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
        for point in &mut self.points {
            *point += delta;
        }
    }

    /// Flip negative extents so `width, height >= 0`; line/arrow vectors are kept signed.
    pub fn normalized(mut self) -> Self {
        if self.kind.is_linear() {
            return self;
        }
        if self.width < 0.0 {
            self.x += self.width;
            self.width = -self.width;
        }
        if self.height < 0.0 {
            self.y += self.height;
            self.height = -self.height;
        }
        self
    }
}

/// Axis-aligned bounds of a point set, or `None` when empty.
pub fn points_bounds(points: &[Point]) -> Option<Rect> {
    let first = points.first()?;
    Some(
        points
            .iter()
            .skip(1)
            .fold(Rect::from_points(*first, *first), |acc, &p| acc.union_pt(p)),
    )
}

/// Partial geometry update for a single element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementPatch {
    pub id: ElementId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<Point>>,
    /// `Some(None)` clears the group; serialized as `"group_id": null`.
    #[serde(
        default,
        deserialize_with = "deserialize_clearable",
        skip_serializing_if = "Option::is_none"
    )]
    pub group_id: Option<Option<GroupId>>,
}

/// Read a present `null` as `Some(None)`; an absent field stays `None` via `default`.
fn deserialize_clearable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ElementPatch {
    /// Empty patch for `id`; applying it changes nothing.
    pub fn new(id: ElementId) -> Self {
        Self {
            id,
            x: None,
            y: None,
            width: None,
            height: None,
            angle: None,
            points: None,
            group_id: None,
        }
    }

    /// Patch setting the full box geometry.
    pub fn geometry(id: ElementId, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            width: Some(width),
            height: Some(height),
            ..Self::new(id)
        }
    }

    /// Set the box origin.
    pub fn with_position(mut self, position: Point) -> Self {
        self.x = Some(position.x);
        self.y = Some(position.y);
        self
    }

    /// Set the rotation in radians.
    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = Some(angle);
        self
    }

    /// Set or clear (`None`) the group back-reference.
    pub fn with_group(mut self, group_id: Option<GroupId>) -> Self {
        self.group_id = Some(group_id);
        self
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.x.is_none()
            && self.y.is_none()
            && self.width.is_none()
            && self.height.is_none()
            && self.angle.is_none()
            && self.points.is_none()
            && self.group_id.is_none()
    }

    /// Write this patch into `element`.
    ///
    /// Pen points follow the box when the patch moves or resizes a pen stroke
    /// without supplying explicit points.
    pub fn apply_to(&self, element: &mut Element) {
        let old_box = (element.x, element.y, element.width, element.height);
        if let Some(x) = self.x {
            element.x = x;
        }
        if let Some(y) = self.y {
            element.y = y;
        }
        if let Some(width) = self.width {
            element.width = width;
        }
        if let Some(height) = self.height {
            element.height = height;
        }
        if let Some(angle) = self.angle {
            element.angle = angle;
        }
        if let Some(group_id) = &self.group_id {
            element.group_id = group_id.clone();
        }
        match &self.points {
            Some(points) => element.points = points.clone(),
            None if element.kind == ElementKind::Pen => {
                let new_box = (element.x, element.y, element.width, element.height);
                remap_points(&mut element.points, old_box, new_box);
            }
            None => {}
        }
    }
}

/// Move points from one box into another, scaling offsets from the top-left.
fn remap_points(points: &mut [Point], from: (f64, f64, f64, f64), to: (f64, f64, f64, f64)) {
    let (x0, y0, w0, h0) = from;
    let (x1, y1, w1, h1) = to;
    let sx = if w0.abs() > f64::EPSILON { w1 / w0 } else { 1.0 };
    let sy = if h0.abs() > f64::EPSILON { h1 / h0 } else { 1.0 };
    for point in points {
        point.x = x1 + (point.x - x0) * sx;
        point.y = y1 + (point.y - y0) * sy;
    }
}

/// Apply geometry patches to an element array, returning the committed array.
///
/// Patches are matched by id and applied in order; patches for unknown ids are
/// ignored. The result is normalized so box extents are non-negative.
pub fn apply_update(elements: &[Element], patches: &[ElementPatch]) -> Vec<Element> {
    let mut by_id: HashMap<&ElementId, Vec<&ElementPatch>> = HashMap::new();
    for patch in patches {
        by_id.entry(&patch.id).or_default().push(patch);
    }

    elements
        .iter()
        .map(|element| match by_id.get(&element.id) {
            Some(element_patches) => {
                let mut updated = element.clone();
                for patch in element_patches {
                    patch.apply_to(&mut updated);
                }
                updated.normalized()
            }
            None => element.clone(),
        })
        .collect()
}
