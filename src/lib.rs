//! noisefield — layered procedural 2D scalar fields.
//!
//! Generates height/density grids from composable noise layers: Perlin and
//! Voronoi generators built on a deterministic integer-mixing hash, composed
//! through an arena of layer nodes (weighted aggregation, masking,
//! inversion) with per-node change-detection caching and rayon-parallel
//! grid evaluation.
//!
//! Typical use:
//!
//! ```
//! use noisefield::{LayerSet, PerlinParams, Zone};
//!
//! let mut set = LayerSet::new();
//! let height = set.add_perlin(PerlinParams {
//!     noise_scale: 8,
//!     gradient_offset: 42,
//!     ..PerlinParams::default()
//! });
//!
//! let grid = set.evaluate(height, Zone::new(64, 64)).unwrap();
//! assert_eq!(grid.values().len(), 64 * 64);
//!
//! // Nothing changed: the second call hands back the cached buffer.
//! let again = set.evaluate(height, Zone::new(64, 64)).unwrap();
//! assert!(std::sync::Arc::ptr_eq(&grid, &again));
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod grid;
pub mod hash;
pub mod layer;
pub mod perlin;
pub mod voronoi;

pub use config::{build_layer_set, from_json, FieldConfig};
pub use error::LayerError;
pub use grid::{Grid, Zone};
pub use layer::{LayerSet, MaskBinding, NodeId, NoiseParams};
pub use perlin::PerlinParams;
pub use voronoi::VoronoiParams;
