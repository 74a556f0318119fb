//! Snap functionality for aligning points to the grid and to other elements.
//!
//! Grid snap and object snap are deliberately different policies: grid snap
//! rounds unconditionally whenever it is enabled, while object snap only fires
//! when a feature lies within the threshold.

use crate::element::{Element, ElementId};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Grid size for snapping (matches the visual grid).
pub const GRID_SIZE: f64 = 20.0;

/// Distance threshold for object snapping (in world units).
pub const SNAP_THRESHOLD: f64 = 10.0;

/// Coordinates closer than this are considered aligned when generating guides.
const GUIDE_EPSILON: f64 = 1e-6;

/// Grid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSettings {
    pub enabled: bool,
    /// Cell size in world units.
    pub size: f64,
    /// Per-axis gate used by [`snap_point_to_grid_within`].
    pub snap_distance: f64,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            size: GRID_SIZE,
            snap_distance: 5.0,
        }
    }
}

/// Snap a point to the nearest grid intersection.
///
/// Rounding is unconditional: every point moves to its nearest intersection
/// regardless of `snap_distance`. Disabled grids return the point unchanged.
pub fn snap_point_to_grid(point: Point, grid: &GridSettings) -> Point {
    if !grid.enabled || grid.size <= 0.0 {
        return point;
    }
    Point::new(
        (point.x / grid.size).round() * grid.size,
        (point.y / grid.size).round() * grid.size,
    )
}

/// Snap each axis to the grid only when it is within `snap_distance` of a grid line.
pub fn snap_point_to_grid_within(point: Point, grid: &GridSettings) -> Point {
    let rounded = snap_point_to_grid(point, grid);
    Point::new(
        if (rounded.x - point.x).abs() <= grid.snap_distance { rounded.x } else { point.x },
        if (rounded.y - point.y).abs() <= grid.snap_distance { rounded.y } else { point.y },
    )
}

/// Snap an angle (radians) to the nearest multiple of `increment`.
pub fn snap_angle(angle: f64, increment: f64) -> f64 {
    if increment <= 0.0 {
        return angle;
    }
    (angle / increment).round() * increment
}

/// Snap mode for aligning elements to the grid or to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SnapMode {
    /// No snapping.
    #[default]
    None,
    /// Snap to grid intersections.
    Grid,
    /// Snap to other elements' centers, edges and corners.
    Objects,
    /// Object snap first, falling back to the grid.
    All,
}

impl SnapMode {
    /// Cycle to the next snap mode.
    pub fn next(self) -> Self {
        match self {
            SnapMode::None => SnapMode::Grid,
            SnapMode::Grid => SnapMode::Objects,
            SnapMode::Objects => SnapMode::All,
            SnapMode::All => SnapMode::None,
        }
    }

    /// Whether grid snapping is active.
    pub fn snaps_to_grid(self) -> bool {
        matches!(self, SnapMode::Grid | SnapMode::All)
    }

    /// Whether object snapping is active.
    pub fn snaps_to_objects(self) -> bool {
        matches!(self, SnapMode::Objects | SnapMode::All)
    }

    /// Whether any snapping is active.
    pub fn is_enabled(self) -> bool {
        self != SnapMode::None
    }
}

/// Which feature of the source element was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapType {
    Center,
    Edge,
    Corner,
}

/// Which axes a snap overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapDirection {
    /// A top/bottom edge: only Y is overridden.
    Horizontal,
    /// A left/right edge: only X is overridden.
    Vertical,
    /// Center or corner: both axes are overridden.
    Both,
}

/// Orientation of a guide line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuideOrientation {
    /// A horizontal line at `y = position`.
    Horizontal,
    /// A vertical line at `x = position`.
    Vertical,
}

/// A transient alignment line for rendering. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapGuide {
    pub orientation: GuideOrientation,
    /// World coordinate of the line (y for horizontal, x for vertical).
    pub position: f64,
    /// Element the guide aligns to.
    pub element: ElementId,
    pub snap_type: SnapType,
}

/// Result of a snap operation.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapResult {
    /// The snapped point (the input point when nothing snapped).
    pub point: Point,
    pub snapped: bool,
    pub direction: Option<SnapDirection>,
    pub snap_type: Option<SnapType>,
    /// Source element of an object snap.
    pub element: Option<ElementId>,
    /// Distance from the input point to the matched feature.
    pub distance: f64,
}

impl SnapResult {
    /// Create a result with no snapping.
    pub fn none(point: Point) -> Self {
        Self {
            point,
            snapped: false,
            direction: None,
            snap_type: None,
            element: None,
            distance: 0.0,
        }
    }

    fn grid(original: Point, snapped: Point) -> Self {
        Self {
            point: snapped,
            snapped: true,
            direction: Some(SnapDirection::Both),
            snap_type: None,
            element: None,
            distance: (snapped - original).hypot(),
        }
    }
}

/// Closest feature found so far.
struct Candidate<'a> {
    distance: f64,
    point: Point,
    direction: SnapDirection,
    snap_type: SnapType,
    element: &'a ElementId,
}

/// Snap `target` to the single closest feature among `elements`.
///
/// Every candidate element's edges, center and corners are checked in that
/// order and one global minimum is kept; on exact ties the first feature found
/// (array order, then check order) wins. Edge hits override only one axis.
pub fn snap_to_objects(
    target: Point,
    elements: &[Element],
    exclude: &[ElementId],
    threshold: f64,
) -> SnapResult {
    let mut best: Option<Candidate<'_>> = None;

    for element in elements.iter().filter(|e| !exclude.contains(&e.id)) {
        let b = element.aabb();
        let center = b.center();
        let (tl, tr) = (Point::new(b.x0, b.y0), Point::new(b.x1, b.y0));
        let (bl, br) = (Point::new(b.x0, b.y1), Point::new(b.x1, b.y1));

        // Edges only count where the target projects onto them; past the ends
        // the nearest feature is a corner.
        let within_x = (b.x0..=b.x1).contains(&target.x);
        let within_y = (b.y0..=b.y1).contains(&target.y);
        let edge = |within: bool, point: Point, direction: SnapDirection| {
            let distance = if within { (target - point).hypot() } else { f64::INFINITY };
            (distance, point, direction, SnapType::Edge)
        };
        let feature = |point: Point, snap_type: SnapType| {
            ((target - point).hypot(), point, SnapDirection::Both, snap_type)
        };

        let checks = [
            edge(within_x, Point::new(target.x, b.y0), SnapDirection::Horizontal),
            edge(within_x, Point::new(target.x, b.y1), SnapDirection::Horizontal),
            edge(within_y, Point::new(b.x0, target.y), SnapDirection::Vertical),
            edge(within_y, Point::new(b.x1, target.y), SnapDirection::Vertical),
            feature(center, SnapType::Center),
            feature(tl, SnapType::Corner),
            feature(tr, SnapType::Corner),
            feature(bl, SnapType::Corner),
            feature(br, SnapType::Corner),
        ];

        for (distance, point, direction, snap_type) in checks {
            let closer = match &best {
                Some(current) => distance < current.distance,
                None => distance <= threshold,
            };
            if closer {
                best = Some(Candidate {
                    distance,
                    point,
                    direction,
                    snap_type,
                    element: &element.id,
                });
            }
        }
    }

    match best {
        Some(candidate) => {
            log::trace!(
                "Snapped {:?} to {:?} of {} ({:?})",
                target,
                candidate.snap_type,
                candidate.element,
                candidate.point
            );
            SnapResult {
                point: candidate.point,
                snapped: true,
                direction: Some(candidate.direction),
                snap_type: Some(candidate.snap_type),
                element: Some(candidate.element.clone()),
                distance: candidate.distance,
            }
        }
        None => SnapResult::none(target),
    }
}

/// Guides showing how `point` aligns with `source`'s features.
///
/// At most one vertical guide (left, center or right) and one horizontal guide
/// (top, center or bottom) are produced. Two edge matches form a corner.
pub fn generate_snap_guides(point: Point, source: &Element) -> Vec<SnapGuide> {
    let b = source.aabb();
    let center = b.center();
    let x_features = [(b.x0, SnapType::Edge), (center.x, SnapType::Center), (b.x1, SnapType::Edge)];
    let y_features = [(b.y0, SnapType::Edge), (center.y, SnapType::Center), (b.y1, SnapType::Edge)];

    let matched_x = x_features.into_iter().find(|(x, _)| (point.x - x).abs() < GUIDE_EPSILON);
    let matched_y = y_features.into_iter().find(|(y, _)| (point.y - y).abs() < GUIDE_EPSILON);

    let corner = matches!(
        (matched_x, matched_y),
        (Some((_, SnapType::Edge)), Some((_, SnapType::Edge)))
    );
    let tag = |snap_type: SnapType| if corner { SnapType::Corner } else { snap_type };

    let mut guides = Vec::with_capacity(2);
    if let Some((y, snap_type)) = matched_y {
        guides.push(SnapGuide {
            orientation: GuideOrientation::Horizontal,
            position: y,
            element: source.id.clone(),
            snap_type: tag(snap_type),
        });
    }
    if let Some((x, snap_type)) = matched_x {
        guides.push(SnapGuide {
            orientation: GuideOrientation::Vertical,
            position: x,
            element: source.id.clone(),
            snap_type: tag(snap_type),
        });
    }
    guides
}

/// Outcome of snapping a whole element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSnap {
    /// The element, moved so its center sits on the snap point when snapped.
    pub element: Element,
    pub guides: Vec<SnapGuide>,
    pub snapped: bool,
}

/// Snap an element's center to the other elements' features.
pub fn snap_element_position(
    element: &Element,
    elements: &[Element],
    threshold: f64,
) -> ElementSnap {
    snap_element_position_excluding(element, elements, std::slice::from_ref(&element.id), threshold)
}

/// Like [`snap_element_position`], also ignoring `exclude` (e.g. the rest of a moving selection).
pub fn snap_element_position_excluding(
    element: &Element,
    elements: &[Element],
    exclude: &[ElementId],
    threshold: f64,
) -> ElementSnap {
    let center = element.center();
    let result = snap_to_objects(center, elements, exclude, threshold);
    if !result.snapped {
        return ElementSnap {
            element: element.clone(),
            guides: Vec::new(),
            snapped: false,
        };
    }

    let mut moved = element.clone();
    moved.translate(result.point - center);
    let guides = result
        .element
        .as_ref()
        .and_then(|id| elements.iter().find(|e| &e.id == id))
        .map(|source| generate_snap_guides(result.point, source))
        .unwrap_or_default();

    ElementSnap {
        element: moved,
        guides,
        snapped: true,
    }
}

/// Every candidate guide for every other element: center, four edges and
/// four corners, with no threshold. Only for diagnostic overlays; the count
/// grows with the element count, so callers should cap what they draw.
pub fn generate_debug_snap_guides(
    target: &Element,
    elements: &[Element],
    exclude: &[ElementId],
) -> Vec<SnapGuide> {
    let mut guides = Vec::new();
    for element in elements
        .iter()
        .filter(|e| e.id != target.id && !exclude.contains(&e.id))
    {
        push_debug_guides(element.aabb(), &element.id, &mut guides);
    }
    guides
}

fn push_debug_guides(b: Rect, id: &ElementId, guides: &mut Vec<SnapGuide>) {
    let center = b.center();
    let mut push = |orientation, position, snap_type| {
        guides.push(SnapGuide {
            orientation,
            position,
            element: id.clone(),
            snap_type,
        })
    };

    push(GuideOrientation::Vertical, center.x, SnapType::Center);
    push(GuideOrientation::Horizontal, center.y, SnapType::Center);

    push(GuideOrientation::Horizontal, b.y0, SnapType::Edge);
    push(GuideOrientation::Horizontal, b.y1, SnapType::Edge);
    push(GuideOrientation::Vertical, b.x0, SnapType::Edge);
    push(GuideOrientation::Vertical, b.x1, SnapType::Edge);

    let corners = [
        Point::new(b.x0, b.y0),
        Point::new(b.x1, b.y0),
        Point::new(b.x0, b.y1),
        Point::new(b.x1, b.y1),
    ];
    for corner in corners {
        push(GuideOrientation::Vertical, corner.x, SnapType::Corner);
        push(GuideOrientation::Horizontal, corner.y, SnapType::Corner);
    }
}

/// Snap a point according to `mode`: object snap takes priority, then the grid.
pub fn snap_point(
    point: Point,
    mode: SnapMode,
    grid: &GridSettings,
    elements: &[Element],
    exclude: &[ElementId],
    threshold: f64,
) -> SnapResult {
    if mode.snaps_to_objects() {
        let result = snap_to_objects(point, elements, exclude, threshold);
        if result.snapped {
            return result;
        }
    }
    if mode.snaps_to_grid() && grid.enabled {
        return SnapResult::grid(point, snap_point_to_grid(point, grid));
    }
    SnapResult::none(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementKind;

    fn rect(id: &str, x: f64, y: f64, w: f64, h: f64) -> Element {
        Element::new(id, ElementKind::Rectangle, x, y, w, h)
    }

    #[test]
    fn test_snap_to_grid() {
        let grid = GridSettings::default();
        assert_eq!(snap_point_to_grid(Point::new(23.0, 47.0), &grid), Point::new(20.0, 40.0));
        assert_eq!(snap_point_to_grid(Point::new(31.0, 51.0), &grid), Point::new(40.0, 60.0));
        assert_eq!(snap_point_to_grid(Point::new(40.0, 60.0), &grid), Point::new(40.0, 60.0));
    }

    #[test]
    fn test_grid_snap_is_unconditional() {
        let grid = GridSettings {
            enabled: true,
            size: 100.0,
            snap_distance: 1.0,
        };
        assert_eq!(snap_point_to_grid(Point::new(140.0, -30.0), &grid), Point::new(100.0, 0.0));
    }

    #[test]
    fn test_grid_snap_is_idempotent() {
        for size in [1.0, 7.5, 20.0, 33.3] {
            let grid = GridSettings {
                enabled: true,
                size,
                snap_distance: 3.0,
            };
            for i in -20..20 {
                let p = Point::new(i as f64 * 3.17, i as f64 * -11.9 + 0.4);
                let once = snap_point_to_grid(p, &grid);
                assert_eq!(snap_point_to_grid(once, &grid), once);
            }
        }
    }

    #[test]
    fn test_disabled_grid_is_identity() {
        let grid = GridSettings {
            enabled: false,
            ..GridSettings::default()
        };
        assert_eq!(snap_point_to_grid(Point::new(23.0, 47.0), &grid), Point::new(23.0, 47.0));
    }

    #[test]
    fn test_gated_grid_snap() {
        let grid = GridSettings {
            enabled: true,
            size: 20.0,
            snap_distance: 4.0,
        };
        assert_eq!(
            snap_point_to_grid_within(Point::new(23.0, 49.0), &grid),
            Point::new(20.0, 49.0)
        );
    }

    #[test]
    fn test_snap_mode_cycle() {
        assert_eq!(SnapMode::None.next(), SnapMode::Grid);
        assert_eq!(SnapMode::Grid.next(), SnapMode::Objects);
        assert_eq!(SnapMode::Objects.next(), SnapMode::All);
        assert_eq!(SnapMode::All.next(), SnapMode::None);
    }

    #[test]
    fn test_snap_mode_flags() {
        assert!(!SnapMode::None.snaps_to_grid());
        assert!(SnapMode::Grid.snaps_to_grid());
        assert!(!SnapMode::Objects.snaps_to_grid());
        assert!(SnapMode::All.snaps_to_grid());

        assert!(!SnapMode::Grid.snaps_to_objects());
        assert!(SnapMode::Objects.snaps_to_objects());
        assert!(SnapMode::All.snaps_to_objects());
        assert!(!SnapMode::None.is_enabled());
    }

    #[test]
    fn test_snap_angle() {
        let step = 15f64.to_radians();
        assert!((snap_angle(7f64.to_radians(), step)).abs() < 1e-12);
        assert!((snap_angle(8f64.to_radians(), step) - step).abs() < 1e-12);
        assert!((snap_angle(-23f64.to_radians(), step) + 2.0 * step).abs() < 1e-12);
        assert!((snap_angle(1.0, 0.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_edge_snap_overrides_one_axis() {
        let elements = vec![rect("a", 100.0, 100.0, 100.0, 100.0)];
        let result = snap_to_objects(Point::new(130.0, 96.0), &elements, &[], SNAP_THRESHOLD);
        assert!(result.snapped);
        assert_eq!(result.point, Point::new(130.0, 100.0));
        assert_eq!(result.direction, Some(SnapDirection::Horizontal));
        assert_eq!(result.snap_type, Some(SnapType::Edge));

        let result = snap_to_objects(Point::new(207.0, 130.0), &elements, &[], SNAP_THRESHOLD);
        assert_eq!(result.point, Point::new(200.0, 130.0));
        assert_eq!(result.direction, Some(SnapDirection::Vertical));
    }

    #[test]
    fn test_center_and_corner_snap_override_both_axes() {
        let elements = vec![rect("a", 0.0, 0.0, 100.0, 100.0)];
        let center = snap_to_objects(Point::new(53.0, 46.0), &elements, &[], SNAP_THRESHOLD);
        assert_eq!(center.point, Point::new(50.0, 50.0));
        assert_eq!(center.snap_type, Some(SnapType::Center));
        assert_eq!(center.direction, Some(SnapDirection::Both));

        let corner = snap_to_objects(Point::new(106.0, 107.0), &elements, &[], SNAP_THRESHOLD);
        assert_eq!(corner.point, Point::new(100.0, 100.0));
        assert_eq!(corner.snap_type, Some(SnapType::Corner));
    }

    #[test]
    fn test_edges_win_exact_ties() {
        let elements = vec![rect("a", 0.0, 0.0, 100.0, 20.0)];
        // 5 units from both the top edge and the center.
        let result = snap_to_objects(Point::new(50.0, 5.0), &elements, &[], SNAP_THRESHOLD);
        assert_eq!(result.snap_type, Some(SnapType::Edge));
        assert_eq!(result.point, Point::new(50.0, 0.0));
    }

    #[test]
    fn test_first_element_wins_exact_ties() {
        let elements = vec![
            rect("first", 0.0, 0.0, 50.0, 50.0),
            rect("second", 0.0, 0.0, 50.0, 50.0),
        ];
        let result = snap_to_objects(Point::new(25.0, 27.0), &elements, &[], SNAP_THRESHOLD);
        assert_eq!(result.element, Some(ElementId::from("first")));
    }

    #[test]
    fn test_nothing_within_threshold() {
        let elements = vec![rect("a", 0.0, 0.0, 100.0, 100.0)];
        let result = snap_to_objects(Point::new(300.0, 300.0), &elements, &[], SNAP_THRESHOLD);
        assert!(!result.snapped);
        assert_eq!(result.point, Point::new(300.0, 300.0));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let elements = vec![rect("a", 0.0, 0.0, 100.0, 100.0)];
        assert!(snap_to_objects(Point::new(50.0, -10.0), &elements, &[], 10.0).snapped);
        assert!(!snap_to_objects(Point::new(50.0, -10.5), &elements, &[], 10.0).snapped);
    }

    #[test]
    fn test_excluded_elements_are_ignored() {
        let elements = vec![rect("a", 0.0, 0.0, 100.0, 100.0)];
        let exclude = [ElementId::from("a")];
        let result = snap_to_objects(Point::new(50.0, 50.0), &elements, &exclude, SNAP_THRESHOLD);
        assert!(!result.snapped);
    }

    #[test]
    fn test_snap_element_to_neighbor_right_edge() {
        let a = rect("a", 100.0, 100.0, 100.0, 100.0);
        // B dragged so its center sits at (204, 150), 4 units right of A's right edge midpoint.
        let b = rect("b", 154.0, 100.0, 100.0, 100.0);
        let elements = vec![a, b.clone()];

        let snap = snap_element_position(&b, &elements, SNAP_THRESHOLD);
        assert!(snap.snapped);
        assert_eq!(snap.element.center(), Point::new(200.0, 150.0));
        assert_eq!(snap.guides.len(), 2);
        assert!(snap.guides.iter().all(|g| g.element == ElementId::from("a")));
        let guide = |orientation: GuideOrientation| {
            snap.guides.iter().find(|g| g.orientation == orientation).unwrap()
        };
        let horizontal = guide(GuideOrientation::Horizontal);
        let vertical = guide(GuideOrientation::Vertical);
        assert!((horizontal.position - 150.0).abs() < f64::EPSILON);
        assert!((vertical.position - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snap_element_not_snapped_keeps_element() {
        let a = rect("a", 0.0, 0.0, 10.0, 10.0);
        let b = rect("b", 500.0, 500.0, 10.0, 10.0);
        let snap = snap_element_position(&b, &[a, b.clone()], SNAP_THRESHOLD);
        assert!(!snap.snapped);
        assert_eq!(snap.element, b);
        assert!(snap.guides.is_empty());
    }

    #[test]
    fn test_snap_moves_pen_points_with_element() {
        let a = rect("a", 0.0, 0.0, 100.0, 100.0);
        let pen = Element::pen("p", vec![Point::new(43.0, 44.0), Point::new(63.0, 64.0)]);
        let snap = snap_element_position(&pen, &[a, pen.clone()], SNAP_THRESHOLD);
        assert!(snap.snapped);
        assert_eq!(snap.element.points, vec![Point::new(40.0, 40.0), Point::new(60.0, 60.0)]);
    }

    #[test]
    fn test_corner_guides() {
        let a = rect("a", 0.0, 0.0, 100.0, 100.0);
        let guides = generate_snap_guides(Point::new(100.0, 0.0), &a);
        assert_eq!(guides.len(), 2);
        assert!(guides.iter().all(|g| g.snap_type == SnapType::Corner));
    }

    #[test]
    fn test_debug_guides_cover_every_candidate() {
        let target = rect("t", 0.0, 0.0, 10.0, 10.0);
        let elements = vec![
            target.clone(),
            rect("a", 100.0, 0.0, 10.0, 10.0),
            rect("b", 200.0, 0.0, 10.0, 10.0),
            rect("c", 300.0, 0.0, 10.0, 10.0),
        ];
        let guides = generate_debug_snap_guides(&target, &elements, &["c".into()]);
        assert_eq!(guides.len(), 2 * 14);
        assert_eq!(guides.iter().filter(|g| g.snap_type == SnapType::Center).count(), 4);
        assert_eq!(guides.iter().filter(|g| g.snap_type == SnapType::Corner).count(), 16);
    }

    #[test]
    fn test_snap_point_prefers_objects_then_grid() {
        let elements = vec![rect("a", 0.0, 0.0, 100.0, 100.0)];
        let grid = GridSettings::default();

        let snap = |point, mode| snap_point(point, mode, &grid, &elements, &[], SNAP_THRESHOLD);

        let on_object = snap(Point::new(103.0, 47.0), SnapMode::All);
        assert_eq!(on_object.point, Point::new(100.0, 47.0));

        let on_grid = snap(Point::new(303.0, 47.0), SnapMode::All);
        assert_eq!(on_grid.point, Point::new(300.0, 40.0));
        assert!(on_grid.element.is_none());

        let off = snap(Point::new(303.0, 47.0), SnapMode::None);
        assert!(!off.snapped);
    }
}
