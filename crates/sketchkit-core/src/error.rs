//! Errors raised by the session and configuration surfaces.
//!
//! Geometry functions never fail; malformed input yields "no hit" or "not
//! snapped" results instead.

use crate::element::ElementId;
use crate::group::GroupId;
use thiserror::Error;

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Element not found: {0}")]
    UnknownElement(ElementId),
    #[error("Group not found: {0}")]
    UnknownGroup(GroupId),
    #[error("Selection is empty")]
    EmptySelection,
    #[error("No gesture in progress")]
    NoActiveGesture,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
