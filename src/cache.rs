// cache.rs — per-node change-detection cache
//
// Each layer node owns exactly one cache entry: the zone and parameter
// snapshot of its last full regeneration plus the grid it produced. The
// entry is written only at the end of a successful evaluation, which keeps
// the evaluation functions themselves pure; staleness is never an error,
// just a reason to regenerate.
//
// Grids are stored behind `Arc` so an unchanged `evaluate` call returns the
// cached buffer as a reference-count bump rather than a copy.

use crate::grid::{Grid, Zone};
use crate::layer::{MaskBinding, NodeId, NoiseParams};
use std::sync::Arc;

/// Parameters a node last fully regenerated with.
///
/// Equality is checked opaquely across every field; the noise `inverse`
/// flag is the one "soft" exception, compared separately so a lone toggle
/// can take the cheap in-place flip path instead of a regeneration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Snapshot {
    Noise {
        params: NoiseParams,
        mask: Option<MaskBinding>,
    },
    Aggregation {
        children: Vec<(NodeId, f32)>,
    },
}

impl Snapshot {
    /// Equality over every regeneration-relevant field, ignoring the soft
    /// `inverse` flag.
    pub(crate) fn hard_eq(&self, other: &Snapshot) -> bool {
        match (self, other) {
            (
                Snapshot::Noise { params: a, mask: am },
                Snapshot::Noise { params: b, mask: bm },
            ) => am == bm && a.hard_eq(b),
            (
                Snapshot::Aggregation { children: a },
                Snapshot::Aggregation { children: b },
            ) => a == b,
            _ => false,
        }
    }

    /// The cached soft `inverse` flag, for noise snapshots.
    pub(crate) fn inverse(&self) -> Option<bool> {
        match self {
            Snapshot::Noise { params, .. } => Some(params.inverse()),
            Snapshot::Aggregation { .. } => None,
        }
    }

    pub(crate) fn set_inverse(&mut self, value: bool) {
        if let Snapshot::Noise { params, .. } = self {
            params.set_inverse(value);
        }
    }
}

/// Cache entry owned by one layer node.
#[derive(Debug, Default)]
pub struct NodeCache {
    pub(crate) zone: Option<Zone>,
    pub(crate) snapshot: Option<Snapshot>,
    pub(crate) grid: Option<Arc<Grid>>,
    regen_count: u64,
}

impl NodeCache {
    pub(crate) fn new() -> Self {
        NodeCache::default()
    }

    /// True until the first successful full regeneration (or after
    /// [`clear`](Self::clear)).
    pub(crate) fn is_empty(&self) -> bool {
        self.grid.is_none()
    }

    /// Replace the entry atomically with the zone/snapshot/grid actually
    /// used, so an immediately following call observes "unchanged".
    pub(crate) fn store(&mut self, zone: Zone, snapshot: Snapshot, grid: Arc<Grid>) {
        self.zone = Some(zone);
        self.snapshot = Some(snapshot);
        self.grid = Some(grid);
        self.regen_count += 1;
    }

    /// Drop the cached result, forcing the next evaluation to regenerate.
    /// The regeneration counter is an observation hook and survives.
    pub(crate) fn clear(&mut self) {
        self.zone = None;
        self.snapshot = None;
        self.grid = None;
    }

    /// Number of full regenerations this node has performed.
    pub fn regen_count(&self) -> u64 {
        self.regen_count
    }
}
