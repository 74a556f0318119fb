//! Quad-tree spatial index over element bounding boxes.
//!
//! The index holds `(id, bbox)` references, never element copies, and is
//! rebuilt wholesale whenever the element set changes. Elements whose box
//! straddles a split line stay at the parent node, so every element lives in
//! exactly one node and queries never return duplicates.

use crate::element::{Element, ElementId, ElementKind};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Partitioning limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialIndexConfig {
    /// A leaf splits once it holds more than this many entries.
    pub max_elements: usize,
    /// Nodes at this depth never split.
    pub max_depth: usize,
}

impl Default for SpatialIndexConfig {
    fn default() -> Self {
        Self {
            max_elements: 8,
            max_depth: 8,
        }
    }
}

/// Inclusive point containment (`x0 <= x <= x1`), unlike `kurbo::Rect::contains`.
pub fn rect_contains_point(rect: Rect, point: Point) -> bool {
    point.x >= rect.x0 && point.x <= rect.x1 && point.y >= rect.y0 && point.y <= rect.y1
}

/// Inclusive overlap test; rectangles sharing only an edge overlap.
pub fn rects_overlap(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

fn rect_contains_rect(outer: Rect, inner: Rect) -> bool {
    inner.x0 >= outer.x0 && inner.x1 <= outer.x1 && inner.y0 >= outer.y0 && inner.y1 <= outer.y1
}

#[derive(Debug, Clone)]
struct Entry {
    /// Position of the element in the array passed to `rebuild` (paint order).
    order: usize,
    id: ElementId,
    bounds: Rect,
}

#[derive(Debug, Clone)]
struct Node {
    bounds: Rect,
    depth: usize,
    entries: Vec<Entry>,
    children: Option<Box<[Node; 4]>>,
}

impl Node {
    fn new(bounds: Rect, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            entries: Vec::new(),
            children: None,
        }
    }

    fn insert(&mut self, entry: Entry, config: &SpatialIndexConfig) {
        if let Some(children) = &mut self.children {
            match children.iter_mut().find(|c| rect_contains_rect(c.bounds, entry.bounds)) {
                Some(child) => child.insert(entry, config),
                None => self.entries.push(entry),
            }
            return;
        }

        self.entries.push(entry);
        if self.entries.len() > config.max_elements && self.depth < config.max_depth {
            self.split(config);
        }
    }

    fn split(&mut self, config: &SpatialIndexConfig) {
        let b = self.bounds;
        let c = b.center();
        let depth = self.depth + 1;
        let mut children = Box::new([
            Node::new(Rect::new(b.x0, b.y0, c.x, c.y), depth),
            Node::new(Rect::new(c.x, b.y0, b.x1, c.y), depth),
            Node::new(Rect::new(b.x0, c.y, c.x, b.y1), depth),
            Node::new(Rect::new(c.x, c.y, b.x1, b.y1), depth),
        ]);

        for entry in std::mem::take(&mut self.entries) {
            match children.iter_mut().find(|child| rect_contains_rect(child.bounds, entry.bounds)) {
                Some(child) => child.insert(entry, config),
                None => self.entries.push(entry),
            }
        }
        self.children = Some(children);
    }

    fn query_point<'a>(&'a self, point: Point, out: &mut Vec<&'a Entry>) {
        if !rect_contains_point(self.bounds, point) {
            return;
        }
        out.extend(self.entries.iter().filter(|e| rect_contains_point(e.bounds, point)));
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query_point(point, out);
            }
        }
    }

    fn query_rect<'a>(&'a self, rect: Rect, out: &mut Vec<&'a Entry>) {
        if !rects_overlap(self.bounds, rect) {
            return;
        }
        out.extend(self.entries.iter().filter(|e| rects_overlap(e.bounds, rect)));
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query_rect(rect, out);
            }
        }
    }

    fn depth(&self) -> usize {
        match &self.children {
            Some(children) => children.iter().map(Node::depth).max().unwrap_or(self.depth),
            None => self.depth,
        }
    }
}

/// Quad-tree over element bounding boxes supporting point and rectangle queries.
#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    config: SpatialIndexConfig,
    root: Option<Node>,
    len: usize,
    max_linear_stroke: f64,
}

impl SpatialIndex {
    /// Create an empty index with the given limits.
    pub fn new(config: SpatialIndexConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Limits this index was built with.
    pub fn config(&self) -> &SpatialIndexConfig {
        &self.config
    }

    /// Number of indexed elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the index holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Deepest level reached by the tree (0 for a single root node).
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, Node::depth)
    }

    /// Widest stroke among line, arrow and pen elements, for padding hit queries.
    pub fn max_linear_stroke_width(&self) -> f64 {
        self.max_linear_stroke
    }

    /// Discard the tree and re-insert every element's rotated bounding box.
    ///
    /// Locked elements are indexed too; hit-testing is where they are skipped.
    pub fn rebuild(&mut self, elements: &[Element]) {
        self.root = None;
        self.len = 0;
        self.max_linear_stroke = 0.0;

        let entries: Vec<Entry> = elements
            .iter()
            .enumerate()
            .map(|(order, element)| Entry {
                order,
                id: element.id.clone(),
                bounds: element.aabb(),
            })
            .filter(|entry| entry.bounds.is_finite())
            .collect();

        for element in elements {
            if element.kind.is_linear() || element.kind == ElementKind::Pen {
                self.max_linear_stroke = self.max_linear_stroke.max(element.stroke_width());
            }
        }

        let Some(world) = entries.iter().map(|e| e.bounds).reduce(|a, b| a.union(b)) else {
            log::trace!("Spatial index rebuilt empty");
            return;
        };

        let mut root = Node::new(world, 0);
        self.len = entries.len();
        for entry in entries {
            root.insert(entry, &self.config);
        }
        self.root = Some(root);
        log::debug!("Spatial index rebuilt: {} elements, depth {}", self.len, self.depth());
    }

    /// Ids of every element whose bounding box contains `point`, in paint order.
    pub fn query(&self, point: Point) -> Vec<ElementId> {
        self.query_point_entries(point).into_iter().map(|e| e.id.clone()).collect()
    }

    /// Ids of every element whose bounding box overlaps `rect`, in paint order.
    pub fn query_rect(&self, rect: Rect) -> Vec<ElementId> {
        self.query_rect_entries(rect).into_iter().map(|e| e.id.clone()).collect()
    }

    /// Like [`query_rect`](Self::query_rect) but yields `(paint position, id)` pairs.
    pub(crate) fn query_rect_positions(&self, rect: Rect) -> Vec<(usize, &ElementId)> {
        self.query_rect_entries(rect).into_iter().map(|e| (e.order, &e.id)).collect()
    }

    fn query_point_entries(&self, point: Point) -> Vec<&Entry> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            root.query_point(point, &mut out);
        }
        sort_and_dedup(&mut out);
        out
    }

    fn query_rect_entries(&self, rect: Rect) -> Vec<&Entry> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            root.query_rect(rect.abs(), &mut out);
        }
        sort_and_dedup(&mut out);
        out
    }
}

fn sort_and_dedup(entries: &mut Vec<&Entry>) {
    entries.sort_by_key(|e| e.order);
    entries.dedup_by_key(|e| e.order);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(id: impl Into<ElementId>, x: f64, y: f64, size: f64) -> Element {
        Element::new(id, ElementKind::Rectangle, x, y, size, size)
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let mut index = SpatialIndex::default();
        index.rebuild(&[]);
        assert!(index.is_empty());
        assert!(index.query(Point::new(0.0, 0.0)).is_empty());
        assert!(index.query_rect(Rect::new(-10.0, -10.0, 10.0, 10.0)).is_empty());
    }

    #[test]
    fn test_boundary_points_are_inclusive() {
        let mut index = SpatialIndex::default();
        index.rebuild(&[square("a", 0.0, 0.0, 10.0)]);
        assert_eq!(index.query(Point::new(0.0, 0.0)), vec![ElementId::from("a")]);
        assert_eq!(index.query(Point::new(10.0, 10.0)), vec![ElementId::from("a")]);
        assert!(index.query(Point::new(10.01, 10.0)).is_empty());
    }

    #[test]
    fn test_results_in_paint_order_without_duplicates() {
        let elements: Vec<Element> = (0..40)
            .map(|i| square(format!("e{i}"), (i % 10) as f64 * 5.0, 0.0, 20.0))
            .collect();
        let mut index = SpatialIndex::new(SpatialIndexConfig {
            max_elements: 2,
            max_depth: 6,
        });
        index.rebuild(&elements);

        let hits = index.query(Point::new(20.0, 10.0));
        let expected: Vec<ElementId> = elements
            .iter()
            .filter(|e| rect_contains_point(e.aabb(), Point::new(20.0, 10.0)))
            .map(|e| e.id.clone())
            .collect();
        assert_eq!(hits, expected);
    }

    #[test]
    fn test_point_on_split_line_is_not_lost() {
        let elements = vec![
            square("left", 0.0, 0.0, 50.0),
            square("right", 50.0, 0.0, 50.0),
            square("a", 0.0, 50.0, 50.0),
            square("b", 50.0, 50.0, 50.0),
        ];
        let mut index = SpatialIndex::new(SpatialIndexConfig {
            max_elements: 1,
            max_depth: 4,
        });
        index.rebuild(&elements);
        assert!(index.depth() >= 1);
        let hits = index.query(Point::new(50.0, 50.0));
        assert_eq!(hits.len(), 4);
    }

    #[test]
    fn test_rotated_element_uses_containing_box() {
        let el = square("r", 0.0, 0.0, 100.0).with_angle(std::f64::consts::FRAC_PI_4);
        let mut index = SpatialIndex::default();
        index.rebuild(&[el]);
        // Outside the unrotated box but inside the rotated AABB.
        assert_eq!(index.query(Point::new(-15.0, 50.0)).len(), 1);
    }

    #[test]
    fn test_locked_elements_are_indexed() {
        let mut index = SpatialIndex::default();
        index.rebuild(&[square("l", 0.0, 0.0, 10.0).with_locked(true)]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.query(Point::new(5.0, 5.0)).len(), 1);
    }

    #[test]
    fn test_rebuild_discards_previous_state() {
        let mut index = SpatialIndex::default();
        index.rebuild(&[square("a", 0.0, 0.0, 10.0)]);
        index.rebuild(&[square("b", 100.0, 100.0, 10.0)]);
        assert!(index.query(Point::new(5.0, 5.0)).is_empty());
        assert_eq!(index.query(Point::new(105.0, 105.0)), vec![ElementId::from("b")]);
    }

    #[test]
    fn test_query_rect() {
        let elements = vec![
            square("a", 0.0, 0.0, 10.0),
            square("b", 30.0, 0.0, 10.0),
            square("c", 60.0, 0.0, 10.0),
        ];
        let mut index = SpatialIndex::default();
        index.rebuild(&elements);
        let hits = index.query_rect(Rect::new(5.0, 5.0, 35.0, 6.0));
        assert_eq!(hits, vec![ElementId::from("a"), ElementId::from("b")]);
    }

    #[test]
    fn test_tracks_widest_linear_stroke() {
        let elements = vec![
            square("a", 0.0, 0.0, 10.0).with_stroke_width(30.0),
            Element::new("l", ElementKind::Line, 0.0, 0.0, 10.0, 10.0).with_stroke_width(6.0),
        ];
        let mut index = SpatialIndex::default();
        index.rebuild(&elements);
        assert!((index.max_linear_stroke_width() - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scattered_grid_of_elements() {
        // 500 non-overlapping 10x10 squares across a 10000x10000 world.
        let elements: Vec<Element> = (0..500)
            .map(|i| {
                let col = (i % 25) as f64;
                let row = (i / 25) as f64;
                square(format!("e{i}"), col * 400.0 + 37.0, row * 500.0 + 91.0, 10.0)
            })
            .collect();
        let mut index = SpatialIndex::default();
        index.rebuild(&elements);
        assert_eq!(index.len(), 500);

        for element in &elements {
            let hits = index.query(element.center());
            assert_eq!(hits, vec![element.id.clone()]);
        }

        for element in &elements {
            let far = Point::new(element.x + 200.0, element.y + 250.0);
            assert!(index.query(far).is_empty());
            let near_miss = Point::new(element.x - 5.5, element.center().y);
            assert!(index.query(near_miss).is_empty());
        }
    }
}
