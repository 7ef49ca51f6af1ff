// error.rs — configuration errors
//
// Every error here is fatal and surfaced before any output is produced:
// `evaluate` either returns a fully-populated grid or one of these. A stale
// cache is never an error (it is simply overwritten), and grid indexing is
// in-bounds by construction, so there is no runtime failure mode beyond
// misconfiguration.

use crate::layer::NodeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayerError {
    /// A node's mask/child reference chain resolves back to itself.
    #[error("layer {0} is part of a reference cycle")]
    CycleDetected(NodeId),

    /// Aggregation weights must sum to a positive value.
    #[error("aggregation {0} has non-positive weight sum {1}")]
    ZeroWeightSum(NodeId, f32),

    /// Voronoi order selects among the 9 sites of the 3×3 neighborhood.
    #[error("voronoi order {order} out of range 0..=8 on layer {node}")]
    OrderOutOfRange { node: NodeId, order: u32 },

    /// Noise scale divides sample coordinates and must be positive.
    #[error("noise scale must be positive, got {scale} on layer {node}")]
    InvalidScale { node: NodeId, scale: i32 },

    /// Mask remap intervals must satisfy lo ≤ hi.
    #[error("mask remap interval ({0}, {1}) is inverted")]
    InvalidRemap(f32, f32),

    /// A `NodeId` that does not address a node in this `LayerSet`.
    #[error("no layer with id {0}")]
    NodeOutOfRange(NodeId),

    /// Zone dimensions must both be positive.
    #[error("zone dimensions must be positive, got {0}x{1}")]
    InvalidZone(u32, u32),

    /// A config entry references a layer id that was never declared.
    #[error("unknown layer reference '{0}'")]
    UnknownRef(String),

    /// Two config entries declare the same layer id.
    #[error("duplicate layer id '{0}'")]
    DuplicateId(String),

    /// Malformed JSON on the configuration surface.
    #[error("invalid layer config: {0}")]
    Config(#[from] serde_json::Error),
}
