//! Editor session: the explicit owner of elements, selection, viewport and index.
//!
//! Gestures follow a compute, commit, rebuild pipeline. While a gesture is in
//! flight only its start snapshot and latest proposal change; committed
//! elements are untouched until [`EditorSession::commit_gesture`].

use crate::config::EngineConfig;
use crate::element::{Element, ElementId, ElementPatch, apply_update};
use crate::error::{EngineError, EngineResult};
use crate::group::{Group, GroupId, GroupRegistry};
use crate::group_transform::{
    TransformSnapshot, find_multi_selection_handle_with, get_multi_selection_bounds,
    group_rotation_delta,
};
use crate::hit_test::{elements_in_rect, find_text_at_with, hit_test_with};
use crate::snap::{
    SnapGuide, generate_snap_guides, snap_element_position_excluding, snap_point,
    snap_point_to_grid, snap_to_objects,
};
use crate::spatial::SpatialIndex;
use crate::transform::{HandleKind, ResizeOptions, apply_resize, find_resize_handle_with};
use crate::viewport::Viewport;
use kurbo::{Point, Rect, Vec2};
use std::collections::HashSet;
use std::f64::consts::TAU;

/// What an in-flight gesture does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    /// Translate the selection.
    Move,
    /// Drag a handle of a single element.
    Resize(HandleKind),
    /// Rotate a single element around its own center.
    Rotate,
    /// Drag a handle of the multi-selection box.
    GroupResize(HandleKind),
    /// Rotate the multi-selection around its shared center.
    GroupRotate,
}

/// An in-flight transform gesture.
#[derive(Debug, Clone)]
pub struct Gesture {
    pub kind: GestureKind,
    pub snapshot: TransformSnapshot,
    /// Latest proposed patches, not yet committed.
    pub proposal: Vec<ElementPatch>,
    /// Snap guides for the latest proposal.
    pub guides: Vec<SnapGuide>,
}

/// Explicit editor state passed to whichever component needs it.
#[derive(Debug, Clone)]
pub struct EditorSession {
    pub viewport: Viewport,
    elements: Vec<Element>,
    selection: Vec<ElementId>,
    index: SpatialIndex,
    groups: GroupRegistry,
    config: EngineConfig,
    gesture: Option<Gesture>,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::with_valid_config(EngineConfig::default())
    }
}

impl EditorSession {
    /// Create an empty session with a validated configuration.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: EngineConfig) -> Self {
        Self {
            viewport: Viewport::default(),
            elements: Vec::new(),
            selection: Vec::new(),
            index: SpatialIndex::new(config.spatial),
            groups: GroupRegistry::new(),
            config,
            gesture: None,
        }
    }

    /// Committed elements in paint order.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Look up a committed element by id.
    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| &e.id == id)
    }

    /// Selected ids in selection order.
    pub fn selection(&self) -> &[ElementId] {
        &self.selection
    }

    /// Spatial index over the committed elements.
    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Groups known to the session.
    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The in-flight gesture, if any.
    pub fn gesture(&self) -> Option<&Gesture> {
        self.gesture.as_ref()
    }

    /// Replace the configuration and rebuild the index with its limits.
    pub fn set_config(&mut self, config: EngineConfig) -> EngineResult<()> {
        config.validate()?;
        self.index = SpatialIndex::new(config.spatial);
        self.config = config;
        self.index.rebuild(&self.elements);
        Ok(())
    }

    /// Replace every element (e.g. after loading a document).
    ///
    /// Groups are rebuilt from the elements' `group_id` back-references; names
    /// of groups the session already knows are kept. Drops any gesture, prunes
    /// the selection and rebuilds the index.
    pub fn set_elements(&mut self, elements: Vec<Element>) {
        self.replace_elements(elements);
        self.groups.rebuild_from_elements(&self.elements);
        self.index.rebuild(&self.elements);
    }

    /// Replace the elements together with a stored group registry.
    ///
    /// The registry is authoritative: stale members are pruned and every
    /// element's `group_id` is rewritten to match it.
    pub fn set_document(&mut self, elements: Vec<Element>, groups: GroupRegistry) {
        self.replace_elements(elements);
        self.groups = groups;
        self.groups.prune(&self.elements);
        let patches = self.groups.back_reference_patches(&self.elements);
        if !patches.is_empty() {
            log::debug!("Repaired {} group back-references", patches.len());
            self.elements = apply_update(&self.elements, &patches);
        }
        self.index.rebuild(&self.elements);
    }

    fn replace_elements(&mut self, elements: Vec<Element>) {
        self.elements = elements.into_iter().map(Element::normalized).collect();
        self.gesture = None;
        self.retain_live_selection();
    }

    /// Apply patches to the committed elements and resynchronize the index.
    pub fn commit(&mut self, patches: &[ElementPatch]) {
        if patches.is_empty() {
            return;
        }
        self.elements = apply_update(&self.elements, patches);
        self.index.rebuild(&self.elements);
        log::debug!("Committed {} patches", patches.len());
    }

    /// Topmost unlocked element under a world point.
    pub fn hit_test_world(&self, point: Point) -> Option<&Element> {
        hit_test_with(
            &self.index,
            point,
            &self.elements,
            self.viewport.zoom,
            &self.config.hit_tolerance,
        )
    }

    /// Topmost unlocked element under a screen point.
    pub fn hit_test_screen(&self, screen_point: Point) -> Option<&Element> {
        self.hit_test_world(self.viewport.screen_to_world(screen_point))
    }

    /// Topmost text element under a screen point, for double-click editing.
    pub fn text_at_screen(&self, screen_point: Point) -> Option<&Element> {
        let point = self.viewport.screen_to_world(screen_point);
        find_text_at_with(
            &self.index,
            point,
            &self.elements,
            self.viewport.zoom,
            &self.config.hit_tolerance,
        )
    }

    /// Click selection at a screen point. Hitting a grouped element selects the
    /// whole group. With `additive`, hits are added to the selection and a miss
    /// keeps it; otherwise the selection is replaced or cleared.
    pub fn select_at(&mut self, screen_point: Point, additive: bool) -> Option<ElementId> {
        let hit = self.hit_test_screen(screen_point).map(|e| e.id.clone());
        match &hit {
            Some(id) => {
                let ids = self.expand_groups(std::slice::from_ref(id));
                if !additive {
                    self.selection.clear();
                }
                self.extend_selection(ids);
            }
            None if !additive => self.selection.clear(),
            None => {}
        }
        hit
    }

    /// Marquee selection over a world rectangle, expanded to whole groups.
    pub fn select_in_rect(&mut self, rect: Rect, additive: bool) -> &[ElementId] {
        let hits: Vec<ElementId> = elements_in_rect(&self.index, rect.abs(), &self.elements)
            .into_iter()
            .map(|e| e.id.clone())
            .collect();
        let ids = self.expand_groups(&hits);
        if !additive {
            self.selection.clear();
        }
        self.extend_selection(ids);
        &self.selection
    }

    /// Replace the selection, ignoring unknown and locked ids.
    pub fn select(&mut self, ids: &[ElementId]) {
        self.selection.clear();
        let ids = ids.to_vec();
        self.extend_selection(ids);
    }

    /// Select every unlocked element.
    pub fn select_all(&mut self) {
        self.selection = self.elements.iter().filter(|e| !e.locked).map(|e| e.id.clone()).collect();
    }

    /// Deselect everything.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Lock or unlock an element. Locked elements leave the selection.
    pub fn set_locked(&mut self, id: &ElementId, locked: bool) -> EngineResult<()> {
        let element = self
            .elements
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| EngineError::UnknownElement(id.clone()))?;
        element.locked = locked;
        if locked {
            self.selection.retain(|selected| selected != id);
        }
        Ok(())
    }

    /// Selected, unlocked elements in paint order.
    pub fn selected_elements(&self) -> Vec<&Element> {
        let selected: HashSet<&ElementId> = self.selection.iter().collect();
        self.elements
            .iter()
            .filter(|e| !e.locked && selected.contains(&e.id))
            .collect()
    }

    /// Box around the unrotated boxes of the selection.
    pub fn selection_bounds(&self) -> Option<Rect> {
        let selected: Vec<Element> = self.selected_elements().into_iter().cloned().collect();
        get_multi_selection_bounds(&selected)
    }

    /// Group the selection under a fresh id.
    pub fn group_selection(&mut self, name: impl Into<String>) -> EngineResult<GroupId> {
        let ids: Vec<ElementId> = self.selected_elements().iter().map(|e| e.id.clone()).collect();
        if ids.is_empty() {
            return Err(EngineError::EmptySelection);
        }
        let id = GroupId::generate();
        let patches = self.groups.create(Group::new(id.clone(), name, ids));
        self.commit(&patches);
        Ok(id)
    }

    /// Dissolve a group, returning its former members.
    pub fn ungroup(&mut self, id: &GroupId) -> EngineResult<Vec<ElementId>> {
        let (group, patches) = self
            .groups
            .delete(id)
            .ok_or_else(|| EngineError::UnknownGroup(id.clone()))?;
        self.commit(&patches);
        Ok(group.element_ids)
    }

    /// Handle under a screen point for the current selection.
    ///
    /// A single selected element exposes its own handles; larger selections
    /// expose the multi-selection box.
    pub fn find_handle(&self, screen_point: Point) -> Option<HandleKind> {
        let point = self.viewport.screen_to_world(screen_point);
        let zoom = self.viewport.zoom;
        match self.selected_elements().as_slice() {
            [] => None,
            [element] => find_resize_handle_with(point, element, zoom, &self.config.handles),
            _ => {
                let bounds = self.selection_bounds()?;
                find_multi_selection_handle_with(point, bounds, zoom, &self.config.handles)
            }
        }
    }

    /// Start a gesture on the current selection.
    ///
    /// `handle` is the grabbed handle (from [`find_handle`](Self::find_handle))
    /// or `None` to move. The start state is captured here.
    pub fn begin_gesture(
        &mut self,
        handle: Option<HandleKind>,
        screen_point: Point,
    ) -> EngineResult<GestureKind> {
        let elements: Vec<Element> = self.selected_elements().into_iter().cloned().collect();
        let single = elements.len() == 1;
        let start = self.viewport.screen_to_world(screen_point);
        let snapshot = TransformSnapshot::new(elements, start).ok_or(EngineError::EmptySelection)?;

        let kind = match (handle, single) {
            (None, _) => GestureKind::Move,
            (Some(HandleKind::Rotation), true) => GestureKind::Rotate,
            (Some(HandleKind::Rotation), false) => GestureKind::GroupRotate,
            (Some(handle), true) => GestureKind::Resize(handle),
            (Some(handle), false) => GestureKind::GroupResize(handle),
        };
        log::debug!("Begin {:?} on {} elements", kind, snapshot.elements.len());

        self.gesture = Some(Gesture {
            kind,
            snapshot,
            proposal: Vec::new(),
            guides: Vec::new(),
        });
        Ok(kind)
    }

    /// Recompute the proposal for a new pointer position.
    ///
    /// `proportional` locks the aspect ratio of single box resizes.
    pub fn update_gesture(
        &mut self,
        screen_point: Point,
        proportional: bool,
    ) -> EngineResult<&[ElementPatch]> {
        let current = self.viewport.screen_to_world(screen_point);
        let mut gesture = self.gesture.take().ok_or(EngineError::NoActiveGesture)?;
        gesture.snapshot.current_point = current;

        let (proposal, guides) = match gesture.kind {
            GestureKind::Move => self.propose_move(&gesture.snapshot),
            GestureKind::Resize(handle) => (
                self.propose_resize(&gesture.snapshot, handle, proportional),
                Vec::new(),
            ),
            GestureKind::Rotate => (propose_rotation(&gesture.snapshot), Vec::new()),
            // No snapping during group resize.
            GestureKind::GroupResize(handle) => (
                gesture.snapshot.resize(handle, current, self.config.min_element_size),
                Vec::new(),
            ),
            GestureKind::GroupRotate => (
                gesture.snapshot.rotate(current, self.config.rotation_increment),
                Vec::new(),
            ),
        };
        log::trace!(
            "{:?} proposal: {} patches, {} guides",
            gesture.kind,
            proposal.len(),
            guides.len()
        );

        gesture.proposal = proposal;
        gesture.guides = guides;
        let gesture = self.gesture.insert(gesture);
        Ok(gesture.proposal.as_slice())
    }

    /// Snap guides for the current proposal.
    pub fn gesture_guides(&self) -> &[SnapGuide] {
        self.gesture.as_ref().map(|g| g.guides.as_slice()).unwrap_or_default()
    }

    /// Committed elements with the current proposal applied, for rendering.
    pub fn preview(&self) -> Vec<Element> {
        match &self.gesture {
            Some(gesture) => apply_update(&self.elements, &gesture.proposal),
            None => self.elements.clone(),
        }
    }

    /// Commit the latest proposal and return it (e.g. for an undo log).
    pub fn commit_gesture(&mut self) -> EngineResult<Vec<ElementPatch>> {
        let gesture = self.gesture.take().ok_or(EngineError::NoActiveGesture)?;
        log::debug!("Commit {:?}", gesture.kind);
        self.commit(&gesture.proposal);
        Ok(gesture.proposal)
    }

    /// Abandon the gesture. Nothing was mutated, so this only drops the snapshot.
    pub fn cancel_gesture(&mut self) -> bool {
        let cancelled = self.gesture.take();
        if let Some(gesture) = &cancelled {
            log::debug!("Cancel {:?}", gesture.kind);
        }
        cancelled.is_some()
    }

    fn propose_move(&self, snapshot: &TransformSnapshot) -> (Vec<ElementPatch>, Vec<SnapGuide>) {
        let mut delta = snapshot.delta();
        let mut guides = Vec::new();
        let exclude = snapshot.ids();
        let mode = self.config.snap_mode;
        let threshold = self.config.snap_threshold;

        let mut object_snapped = false;
        if mode.snaps_to_objects() {
            if let [element] = snapshot.elements.as_slice() {
                let mut moved = element.clone();
                moved.translate(delta);
                let snap =
                    snap_element_position_excluding(&moved, &self.elements, &exclude, threshold);
                if snap.snapped {
                    delta = Vec2::new(snap.element.x - element.x, snap.element.y - element.y);
                    guides = snap.guides;
                    object_snapped = true;
                }
            } else {
                let center = snapshot.center() + delta;
                let result = snap_to_objects(center, &self.elements, &exclude, threshold);
                if result.snapped {
                    delta += result.point - center;
                    guides = result
                        .element
                        .as_ref()
                        .and_then(|id| self.element(id))
                        .map(|source| generate_snap_guides(result.point, source))
                        .unwrap_or_default();
                    object_snapped = true;
                }
            }
        }

        if !object_snapped && mode.snaps_to_grid() && self.config.grid.enabled {
            let origin = Point::new(snapshot.bounds.x0, snapshot.bounds.y0) + delta;
            delta += snap_point_to_grid(origin, &self.config.grid) - origin;
        }

        (snapshot.translate(delta), guides)
    }

    fn propose_resize(
        &self,
        snapshot: &TransformSnapshot,
        handle: HandleKind,
        proportional: bool,
    ) -> Vec<ElementPatch> {
        let Some(element) = snapshot.elements.first() else {
            return Vec::new();
        };
        let exclude = snapshot.ids();
        let config = &self.config;
        let snap = |p: Point| {
            snap_point(
                p,
                config.snap_mode,
                &config.grid,
                &self.elements,
                &exclude,
                config.snap_threshold,
            )
            .point
        };
        let mut options = ResizeOptions::default()
            .with_start(element)
            .proportional(proportional)
            .with_min_size(config.min_element_size);
        if config.snap_mode.is_enabled() {
            options = options.with_snap(&snap);
        }
        vec![apply_resize(element, handle, snapshot.current_point, snapshot.start_point, &options)]
    }
}

/// Single-element rotation relative to the grab point, without snapping.
fn propose_rotation(snapshot: &TransformSnapshot) -> Vec<ElementPatch> {
    let Some(element) = snapshot.elements.first() else {
        return Vec::new();
    };
    let delta =
        group_rotation_delta(element.center(), snapshot.start_point, snapshot.current_point, 0.0);
    vec![ElementPatch::new(element.id.clone()).with_angle((element.angle + delta).rem_euclid(TAU))]
}

impl EditorSession {
    /// Expand ids to whole groups, skipping locked and unknown elements.
    fn expand_groups(&self, ids: &[ElementId]) -> Vec<ElementId> {
        let mut out: Vec<ElementId> = Vec::new();
        for id in ids {
            let members = match self.groups.group_of(id) {
                Some(group) => group.element_ids.clone(),
                None => vec![id.clone()],
            };
            for member in members {
                if !out.contains(&member) {
                    out.push(member);
                }
            }
        }
        out
    }

    fn extend_selection(&mut self, ids: Vec<ElementId>) {
        for id in ids {
            let selectable = self.element(&id).is_some_and(|e| !e.locked);
            if selectable && !self.selection.contains(&id) {
                self.selection.push(id);
            }
        }
    }

    fn retain_live_selection(&mut self) {
        let live: HashSet<&ElementId> = self
            .elements
            .iter()
            .filter(|e| !e.locked)
            .map(|e| &e.id)
            .collect();
        self.selection.retain(|id| live.contains(id));
    }
}
