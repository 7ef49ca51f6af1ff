// layer.rs — layer node arena: evaluation, masking, aggregation
//
// Nodes live in a flat arena (`LayerSet`) and reference each other by
// `NodeId` index, never by owning pointer, so a mask can be shared between
// any number of siblings and cycle detection is a plain traversal. Node
// behavior is a closed tagged variant: new noise kinds are new enum cases
// dispatched through `evaluate`/`has_changed`, not subclasses.
//
// One `evaluate` call resolves its dependencies depth-first and
// sequentially, then runs its own cell-parallel phase; the node's cache is
// written only at the end of a successful evaluation. Evaluating the same
// set concurrently from multiple threads is out of contract.

use crate::cache::{NodeCache, Snapshot};
use crate::error::LayerError;
use crate::grid::{Grid, Zone};
use crate::perlin::{self, PerlinParams};
use crate::voronoi::{self, VoronoiParams};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Stable arena index of a layer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Mask binding on a noise node.
///
/// The mask node's grid value is remapped through `remap` (0 at or below
/// `lo`, 1 at or above `hi`, linear between), optionally flipped, and
/// multiplied into the owning node's output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskBinding {
    pub node: NodeId,
    #[serde(default)]
    pub inverse: bool,
    #[serde(default = "default_remap")]
    pub remap: (f32, f32),
}

fn default_remap() -> (f32, f32) {
    (0.0, 1.0)
}

impl MaskBinding {
    /// Identity remap, no inversion.
    pub fn new(node: NodeId) -> Self {
        MaskBinding {
            node,
            inverse: false,
            remap: (0.0, 1.0),
        }
    }
}

/// Noise generator parameters, one variant per field kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NoiseParams {
    Perlin(PerlinParams),
    Voronoi(VoronoiParams),
}

impl NoiseParams {
    pub(crate) fn inverse(&self) -> bool {
        match self {
            NoiseParams::Perlin(p) => p.inverse,
            NoiseParams::Voronoi(p) => p.inverse,
        }
    }

    pub(crate) fn set_inverse(&mut self, value: bool) {
        match self {
            NoiseParams::Perlin(p) => p.inverse = value,
            NoiseParams::Voronoi(p) => p.inverse = value,
        }
    }

    /// Equality across every field except the soft `inverse` flag.
    pub(crate) fn hard_eq(&self, other: &NoiseParams) -> bool {
        let mut a = self.clone();
        let mut b = other.clone();
        a.set_inverse(false);
        b.set_inverse(false);
        a == b
    }

    fn noise_scale(&self) -> i32 {
        match self {
            NoiseParams::Perlin(p) => p.noise_scale,
            NoiseParams::Voronoi(p) => p.noise_scale,
        }
    }

    fn generate(&self, zone: Zone) -> Grid {
        match self {
            NoiseParams::Perlin(p) => perlin::generate(p, zone),
            NoiseParams::Voronoi(p) => voronoi::generate(p, zone),
        }
    }
}

#[derive(Debug)]
enum LayerKind {
    Noise {
        params: NoiseParams,
        mask: Option<MaskBinding>,
    },
    Aggregation {
        children: Vec<(NodeId, f32)>,
    },
}

#[derive(Debug)]
struct LayerNode {
    kind: LayerKind,
    cache: NodeCache,
}

// ── Mask remap ──────────────────────────────────────────────────────

/// 0 at or below `lo`, 1 at or above `hi`, linear between. `lo == hi`
/// degenerates to a step with the `≤ lo` clause winning at the boundary.
fn inverse_lerp(lo: f32, hi: f32, v: f32) -> f32 {
    if v <= lo {
        0.0
    } else if v >= hi {
        1.0
    } else {
        (v - lo) / (hi - lo)
    }
}

/// Multiplicative factor a mask value contributes to the owning node.
pub(crate) fn mask_factor(value: f32, remap: (f32, f32), inverse: bool) -> f32 {
    let f = inverse_lerp(remap.0, remap.1, value);
    if inverse {
        1.0 - f
    } else {
        f
    }
}

// ── Layer set ───────────────────────────────────────────────────────

/// Arena of layer nodes forming a composition DAG.
///
/// Nodes are added once and addressed by the returned [`NodeId`];
/// parameters stay mutable in place and the per-node caches notice the
/// difference on the next [`evaluate`](Self::evaluate).
#[derive(Default, Debug)]
pub struct LayerSet {
    nodes: Vec<LayerNode>,
}

impl LayerSet {
    pub fn new() -> Self {
        LayerSet::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, kind: LayerKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(LayerNode {
            kind,
            cache: NodeCache::new(),
        });
        id
    }

    pub fn add_perlin(&mut self, params: PerlinParams) -> NodeId {
        self.add_noise(NoiseParams::Perlin(params))
    }

    pub fn add_voronoi(&mut self, params: VoronoiParams) -> NodeId {
        self.add_noise(NoiseParams::Voronoi(params))
    }

    pub fn add_noise(&mut self, params: NoiseParams) -> NodeId {
        self.push(LayerKind::Noise { params, mask: None })
    }

    pub fn add_aggregation(&mut self, children: Vec<(NodeId, f32)>) -> NodeId {
        self.push(LayerKind::Aggregation { children })
    }

    /// Attach (or detach) a mask on a noise node. No effect on aggregations.
    pub fn set_mask(&mut self, id: NodeId, mask: Option<MaskBinding>) {
        if let Some(LayerNode {
            kind: LayerKind::Noise { mask: slot, .. },
            ..
        }) = self.nodes.get_mut(id.0)
        {
            *slot = mask;
        }
    }

    pub fn perlin_params_mut(&mut self, id: NodeId) -> Option<&mut PerlinParams> {
        match self.nodes.get_mut(id.0) {
            Some(LayerNode {
                kind:
                    LayerKind::Noise {
                        params: NoiseParams::Perlin(p),
                        ..
                    },
                ..
            }) => Some(p),
            _ => None,
        }
    }

    pub fn voronoi_params_mut(&mut self, id: NodeId) -> Option<&mut VoronoiParams> {
        match self.nodes.get_mut(id.0) {
            Some(LayerNode {
                kind:
                    LayerKind::Noise {
                        params: NoiseParams::Voronoi(p),
                        ..
                    },
                ..
            }) => Some(p),
            _ => None,
        }
    }

    pub fn children_mut(&mut self, id: NodeId) -> Option<&mut Vec<(NodeId, f32)>> {
        match self.nodes.get_mut(id.0) {
            Some(LayerNode {
                kind: LayerKind::Aggregation { children },
                ..
            }) => Some(children),
            _ => None,
        }
    }

    /// Number of full regenerations a node has performed. Observation hook
    /// for tests and tooling; 0 for unknown ids.
    pub fn regen_count(&self, id: NodeId) -> u64 {
        self.nodes
            .get(id.0)
            .map(|n| n.cache.regen_count())
            .unwrap_or(0)
    }

    /// Drop a node's cached grid, forcing full regeneration on the next
    /// evaluation.
    pub fn invalidate(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.cache.clear();
        }
    }

    // ── Evaluation ──────────────────────────────────────────────────

    /// Produce the node's grid for `zone`, reusing or incrementally
    /// updating the cached result when nothing relevant changed.
    ///
    /// The returned buffer is shared with the cache: treat it as read-only.
    /// On the unchanged path it is pointer-identical to the previous call's
    /// result.
    pub fn evaluate(&mut self, id: NodeId, zone: Zone) -> Result<Arc<Grid>, LayerError> {
        if zone.width == 0 || zone.height == 0 {
            return Err(LayerError::InvalidZone(zone.width, zone.height));
        }
        let mut visiting = Vec::new();
        self.evaluate_inner(id, zone, &mut visiting)
    }

    /// Would `evaluate(zone)` regenerate or incrementally update this node?
    /// Pure: consults caches and parameters without touching either.
    pub fn has_changed(&self, id: NodeId, zone: Zone) -> bool {
        let mut visiting = Vec::new();
        self.has_changed_inner(id, zone, &mut visiting)
    }

    fn evaluate_inner(
        &mut self,
        id: NodeId,
        zone: Zone,
        visiting: &mut Vec<NodeId>,
    ) -> Result<Arc<Grid>, LayerError> {
        if visiting.contains(&id) {
            return Err(LayerError::CycleDetected(id));
        }
        let node = self.nodes.get(id.0).ok_or(LayerError::NodeOutOfRange(id))?;

        visiting.push(id);
        let result = match &node.kind {
            LayerKind::Noise { params, mask } => {
                let params = params.clone();
                let mask = *mask;
                self.validate_noise(id, &params, mask)
                    .and_then(|_| self.evaluate_noise(id, zone, params, mask, visiting))
            }
            LayerKind::Aggregation { children } => {
                let children = children.clone();
                self.evaluate_aggregation(id, zone, children, visiting)
            }
        };
        visiting.pop();
        result
    }

    fn validate_noise(
        &self,
        id: NodeId,
        params: &NoiseParams,
        mask: Option<MaskBinding>,
    ) -> Result<(), LayerError> {
        let scale = params.noise_scale();
        if scale <= 0 {
            return Err(LayerError::InvalidScale { node: id, scale });
        }
        if let NoiseParams::Voronoi(p) = params {
            if p.order > 8 {
                return Err(LayerError::OrderOutOfRange {
                    node: id,
                    order: p.order,
                });
            }
        }
        if let Some(m) = mask {
            if m.remap.0 > m.remap.1 {
                return Err(LayerError::InvalidRemap(m.remap.0, m.remap.1));
            }
            if self.nodes.get(m.node.0).is_none() {
                return Err(LayerError::NodeOutOfRange(m.node));
            }
        }
        Ok(())
    }

    fn evaluate_noise(
        &mut self,
        id: NodeId,
        zone: Zone,
        params: NoiseParams,
        mask: Option<MaskBinding>,
        visiting: &mut Vec<NodeId>,
    ) -> Result<Arc<Grid>, LayerError> {
        // The mask's changed state must be read before regenerating it.
        let mask_changed = match mask {
            Some(m) => {
                let mut seen = visiting.clone();
                self.has_changed_inner(m.node, zone, &mut seen)
            }
            None => false,
        };

        let snapshot = Snapshot::Noise {
            params: params.clone(),
            mask,
        };

        let hard_match = {
            let cache = &self.nodes[id.0].cache;
            cache.zone == Some(zone)
                && cache
                    .snapshot
                    .as_ref()
                    .is_some_and(|s| s.hard_eq(&snapshot))
                && !mask_changed
        };

        if hard_match {
            let cache = &mut self.nodes[id.0].cache;
            if let Some(mut arc) = cache.grid.take() {
                if cache.snapshot.as_ref().and_then(Snapshot::inverse) != Some(params.inverse()) {
                    // Only the inverse flag moved: flip in place rather than
                    // regenerate. Copy-on-write when a caller still holds
                    // the previous buffer.
                    Arc::make_mut(&mut arc).map_inplace(|v| 1.0 - v);
                    if let Some(s) = cache.snapshot.as_mut() {
                        s.set_inverse(params.inverse());
                    }
                    debug!(node = %id, "incremental inversion");
                } else {
                    trace!(node = %id, "cache hit");
                }
                cache.grid = Some(arc.clone());
                return Ok(arc);
            }
        }

        // Full regeneration: resolve the mask grid first, then the node's
        // own cell-parallel phase, then mask multiplication.
        let mask_grid = match mask {
            Some(m) => Some((m, self.evaluate_inner(m.node, zone, visiting)?)),
            None => None,
        };

        let mut grid = params.generate(zone);
        if let Some((m, mg)) = mask_grid {
            grid.zip_inplace(&mg, |v, mv| v * mask_factor(mv, m.remap, m.inverse));
        }

        let arc = Arc::new(grid);
        debug!(node = %id, zone.width, zone.height, "full regeneration");
        self.nodes[id.0].cache.store(zone, snapshot, arc.clone());
        Ok(arc)
    }

    fn evaluate_aggregation(
        &mut self,
        id: NodeId,
        zone: Zone,
        children: Vec<(NodeId, f32)>,
        visiting: &mut Vec<NodeId>,
    ) -> Result<Arc<Grid>, LayerError> {
        // Weight normalization divides by the sum, computed once per
        // evaluation, never per cell.
        let weight_sum: f32 = children.iter().map(|(_, w)| w).sum();
        if weight_sum <= 0.0 {
            return Err(LayerError::ZeroWeightSum(id, weight_sum));
        }

        let snapshot = Snapshot::Aggregation {
            children: children.clone(),
        };

        let unchanged = {
            let cache = &self.nodes[id.0].cache;
            cache.zone == Some(zone)
                && cache
                    .snapshot
                    .as_ref()
                    .is_some_and(|s| s.hard_eq(&snapshot))
                && !children.iter().any(|(child, _)| {
                    let mut seen = visiting.clone();
                    self.has_changed_inner(*child, zone, &mut seen)
                })
        };
        if unchanged {
            if let Some(arc) = self.nodes[id.0].cache.grid.clone() {
                trace!(node = %id, "cache hit");
                return Ok(arc);
            }
        }

        let mut acc = Grid::filled(zone, 0.0);
        for (child, weight) in &children {
            let child_grid = self.evaluate_inner(*child, zone, visiting)?;
            let w = weight / weight_sum;
            acc.zip_inplace(&child_grid, |a, c| a + c * w);
        }

        let arc = Arc::new(acc);
        debug!(node = %id, children = children.len(), "full regeneration");
        self.nodes[id.0].cache.store(zone, snapshot, arc.clone());
        Ok(arc)
    }

    fn has_changed_inner(&self, id: NodeId, zone: Zone, visiting: &mut Vec<NodeId>) -> bool {
        if visiting.contains(&id) {
            // Cyclic configuration: report changed; evaluate surfaces the
            // actual error.
            return true;
        }
        let Some(node) = self.nodes.get(id.0) else {
            return true;
        };

        visiting.push(id);
        let changed = match &node.kind {
            LayerKind::Noise { params, mask } => {
                let snapshot = Snapshot::Noise {
                    params: params.clone(),
                    mask: *mask,
                };
                let cache = &node.cache;
                cache.zone != Some(zone)
                    || !cache
                        .snapshot
                        .as_ref()
                        .is_some_and(|s| s.hard_eq(&snapshot))
                    || cache.snapshot.as_ref().and_then(Snapshot::inverse)
                        != Some(params.inverse())
                    || mask
                        .as_ref()
                        .map(|m| self.has_changed_inner(m.node, zone, visiting))
                        .unwrap_or(false)
            }
            LayerKind::Aggregation { children } => {
                let snapshot = Snapshot::Aggregation {
                    children: children.clone(),
                };
                let cache = &node.cache;
                cache.zone != Some(zone)
                    || !cache
                        .snapshot
                        .as_ref()
                        .is_some_and(|s| s.hard_eq(&snapshot))
                    || children
                        .iter()
                        .any(|(child, _)| self.has_changed_inner(*child, zone, visiting))
            }
        };
        visiting.pop();
        changed
    }
}
