//! SketchKit Core Library
//!
//! Geometric interaction engine for a vector canvas editor: spatial indexing,
//! hit-testing, grid and object snapping, and resize/rotate transforms for
//! single elements and multi-selections.

pub mod config;
pub mod element;
pub mod error;
pub mod group;
pub mod group_transform;
pub mod session;
pub mod snap;
pub mod spatial;
pub mod transform;
pub mod viewport;

pub use config::EngineConfig;
pub use element::{Element, ElementId, ElementKind, ElementPatch, ElementStyle, apply_update};
pub use error::{EngineError, EngineResult};
pub use group::{Group, GroupId, GroupRegistry};
pub use group_transform::{
    TransformSnapshot, apply_group_resize, apply_group_rotation, apply_multi_selection_resize,
    find_multi_selection_handle, get_multi_selection_bounds, get_multi_selection_handles,
    group_rotation_delta,
};
pub use hit_test::{HitTolerance, elements_in_rect, find_text_at, hit_test, hit_test_element};
pub use session::{EditorSession, Gesture, GestureKind};
pub use snap::{
    GRID_SIZE, GridSettings, SNAP_THRESHOLD, SnapDirection, SnapGuide, SnapMode, SnapResult,
    SnapType, generate_debug_snap_guides, generate_snap_guides, snap_element_position, snap_point,
    snap_point_to_grid, snap_to_objects,
};
pub use spatial::{SpatialIndex, SpatialIndexConfig};
pub use transform::{
    Handle, HandleKind, ResizeOptions, apply_resize, apply_rotation, find_resize_handle,
    get_resize_handles,
};
pub use viewport::Viewport;
