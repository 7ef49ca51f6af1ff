// config.rs — layer-tree configuration surface
//
// Deserializes a flat node list with string ids into a `LayerSet`. Ids are
// resolved in two passes so masks and aggregation children can reference
// layers declared later in the file. Static parameter errors (bad order,
// bad scale, inverted remap) are reported here, at load time, with the
// offending layer named; graph-shape errors that need evaluation context
// (cycles, weight sums) surface on the first `evaluate`.

use crate::error::LayerError;
use crate::layer::{LayerSet, MaskBinding, NodeId};
use crate::perlin::PerlinParams;
use crate::voronoi::VoronoiParams;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::trace;

/// Root of a layer-tree description.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldConfig {
    pub nodes: Vec<NodeConfig>,
    /// Id of the layer integration code evaluates.
    pub root: String,
}

/// One declared layer. The `type` tag selects the variant; noise parameter
/// fields sit beside it and fall back to their defaults when omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKindConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKindConfig {
    Perlin {
        #[serde(flatten)]
        params: PerlinParams,
        mask: Option<MaskConfig>,
    },
    Voronoi {
        #[serde(flatten)]
        params: VoronoiParams,
        mask: Option<MaskConfig>,
    },
    Aggregation {
        layers: Vec<LayerWeightConfig>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaskConfig {
    pub layer: String,
    #[serde(default)]
    pub inverse: bool,
    #[serde(default = "default_remap")]
    pub remap: (f32, f32),
}

fn default_remap() -> (f32, f32) {
    (0.0, 1.0)
}

#[derive(Debug, Clone, Deserialize)]
pub struct LayerWeightConfig {
    pub layer: String,
    pub weight: f32,
}

/// Parse a JSON layer-tree description and build it.
pub fn from_json(json: &str) -> Result<(LayerSet, NodeId), LayerError> {
    let config: FieldConfig = serde_json::from_str(json)?;
    build_layer_set(&config)
}

/// Build a `LayerSet` from a parsed description. Returns the set and the
/// resolved root id.
pub fn build_layer_set(config: &FieldConfig) -> Result<(LayerSet, NodeId), LayerError> {
    let mut set = LayerSet::new();
    let mut ids: FxHashMap<&str, NodeId> = FxHashMap::default();

    // Pass 1: declare every node so later passes can reference forward.
    for node in &config.nodes {
        let id = match &node.kind {
            NodeKindConfig::Perlin { params, .. } => {
                validate_scale(&set, params.noise_scale)?;
                set.add_perlin(params.clone())
            }
            NodeKindConfig::Voronoi { params, .. } => {
                validate_scale(&set, params.noise_scale)?;
                if params.order > 8 {
                    return Err(LayerError::OrderOutOfRange {
                        node: NodeId(set.len()),
                        order: params.order,
                    });
                }
                set.add_voronoi(params.clone())
            }
            NodeKindConfig::Aggregation { .. } => set.add_aggregation(Vec::new()),
        };
        if ids.insert(node.id.as_str(), id).is_some() {
            return Err(LayerError::DuplicateId(node.id.clone()));
        }
        trace!(name = %node.id, node = %id, "declared layer");
    }

    // Pass 2: resolve mask and child references.
    for node in &config.nodes {
        let id = ids[node.id.as_str()];
        match &node.kind {
            NodeKindConfig::Perlin { mask, .. } | NodeKindConfig::Voronoi { mask, .. } => {
                if let Some(m) = mask {
                    if m.remap.0 > m.remap.1 {
                        return Err(LayerError::InvalidRemap(m.remap.0, m.remap.1));
                    }
                    let target = resolve(&ids, &m.layer)?;
                    set.set_mask(
                        id,
                        Some(MaskBinding {
                            node: target,
                            inverse: m.inverse,
                            remap: m.remap,
                        }),
                    );
                }
            }
            NodeKindConfig::Aggregation { layers } => {
                let mut children = Vec::with_capacity(layers.len());
                for entry in layers {
                    children.push((resolve(&ids, &entry.layer)?, entry.weight));
                }
                if let Some(slot) = set.children_mut(id) {
                    *slot = children;
                }
            }
        }
    }

    let root = resolve(&ids, &config.root)?;
    Ok((set, root))
}

fn resolve(ids: &FxHashMap<&str, NodeId>, name: &str) -> Result<NodeId, LayerError> {
    ids.get(name)
        .copied()
        .ok_or_else(|| LayerError::UnknownRef(name.to_string()))
}

fn validate_scale(set: &LayerSet, scale: i32) -> Result<(), LayerError> {
    if scale <= 0 {
        return Err(LayerError::InvalidScale {
            node: NodeId(set.len()),
            scale,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Zone;

    #[test]
    fn minimal_perlin_with_defaults() {
        let (mut set, root) = from_json(
            r#"{
                "nodes": [{"id": "height", "type": "perlin", "noise_scale": 4}],
                "root": "height"
            }"#,
        )
        .unwrap();
        assert_eq!(set.len(), 1);

        // Defaults: pow = 1, mul = 1, offset = 0 → finished layer in [0,1].
        let grid = set.evaluate(root, Zone::new(8, 8)).unwrap();
        assert!(grid.values().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn full_tree_with_mask_and_aggregation() {
        let (mut set, root) = from_json(
            r#"{
                "nodes": [
                    {"id": "continents", "type": "perlin", "noise_scale": 16, "gradient_offset": 7},
                    {"id": "cells", "type": "voronoi", "noise_scale": 8, "order": 1,
                     "mask": {"layer": "continents", "inverse": true, "remap": [0.2, 0.8]}},
                    {"id": "terrain", "type": "aggregation", "layers": [
                        {"layer": "continents", "weight": 2.0},
                        {"layer": "cells", "weight": 1.0}
                    ]}
                ],
                "root": "terrain"
            }"#,
        )
        .unwrap();
        assert_eq!(set.len(), 3);
        let grid = set.evaluate(root, Zone::new(16, 16)).unwrap();
        assert_eq!(grid.values().len(), 256);
        assert!(grid.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn forward_references_resolve() {
        // The mask target is declared after its user.
        let (mut set, root) = from_json(
            r#"{
                "nodes": [
                    {"id": "a", "type": "perlin", "noise_scale": 4,
                     "mask": {"layer": "b"}},
                    {"id": "b", "type": "perlin", "noise_scale": 8}
                ],
                "root": "a"
            }"#,
        )
        .unwrap();
        assert!(set.evaluate(root, Zone::new(4, 4)).is_ok());
    }

    #[test]
    fn duplicate_id_rejected() {
        let err = from_json(
            r#"{
                "nodes": [
                    {"id": "a", "type": "perlin", "noise_scale": 4},
                    {"id": "a", "type": "perlin", "noise_scale": 8}
                ],
                "root": "a"
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, LayerError::DuplicateId(id) if id == "a"));
    }

    #[test]
    fn unknown_mask_reference_rejected() {
        let err = from_json(
            r#"{
                "nodes": [
                    {"id": "a", "type": "perlin", "noise_scale": 4,
                     "mask": {"layer": "missing"}}
                ],
                "root": "a"
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, LayerError::UnknownRef(name) if name == "missing"));
    }

    #[test]
    fn unknown_root_rejected() {
        let err = from_json(
            r#"{
                "nodes": [{"id": "a", "type": "perlin", "noise_scale": 4}],
                "root": "b"
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, LayerError::UnknownRef(name) if name == "b"));
    }

    #[test]
    fn bad_voronoi_order_rejected_at_load() {
        let err = from_json(
            r#"{
                "nodes": [{"id": "v", "type": "voronoi", "noise_scale": 4, "order": 12}],
                "root": "v"
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, LayerError::OrderOutOfRange { order: 12, .. }));
    }

    #[test]
    fn inverted_remap_rejected_at_load() {
        let err = from_json(
            r#"{
                "nodes": [
                    {"id": "m", "type": "perlin", "noise_scale": 4},
                    {"id": "a", "type": "perlin", "noise_scale": 4,
                     "mask": {"layer": "m", "remap": [0.9, 0.1]}}
                ],
                "root": "a"
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, LayerError::InvalidRemap(_, _)));
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(matches!(
            from_json("{not json"),
            Err(LayerError::Config(_))
        ));
    }
}
