// voronoi.rs — cellular (Voronoi) field generator
//
// Each lattice cell owns one site, jittered inside the cell by two
// sequential draws from the cell's seed. A sample considers the 9 sites of
// its 3×3 cell neighborhood, sorts them by squared distance, and reads out
// the `order`-th entry. Because only 9 candidates are ever examined, `order`
// is an approximation of the true n-th-nearest-site statistic, a bounded
// and intentional one that downstream tuning depends on numerically.

use crate::grid::{Grid, Zone};
use crate::hash;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Parameters of one Voronoi layer.
///
/// The shared fields mirror [`PerlinParams`](crate::perlin::PerlinParams);
/// `smoother_step` is carried (and participates in change detection) even
/// though cellular sampling never interpolates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoronoiParams {
    pub noise_scale: i32,
    pub gradient_offset: i32,
    pub smoother_step: bool,
    pub inverse: bool,
    pub pow: f32,
    pub mul: f32,
    pub offset: f32,
    /// Which of the 9 sorted candidate distances to read (0 = nearest).
    pub order: u32,
    /// Zero out cells whose adjacent sorted distances are nearly tied.
    pub mark_seams: bool,
    pub seam_width: f32,
    /// Flat color per winning cell instead of a distance field.
    pub same_cell_same_value: bool,
}

impl Default for VoronoiParams {
    fn default() -> Self {
        VoronoiParams {
            noise_scale: 1,
            gradient_offset: 0,
            smoother_step: false,
            inverse: false,
            pow: 1.0,
            mul: 1.0,
            offset: 0.0,
            order: 0,
            mark_seams: false,
            seam_width: 0.0,
            same_cell_same_value: false,
        }
    }
}

/// Site of a lattice cell: the cell corner plus one [0,1] jitter per axis,
/// drawn sequentially (x first) from the cell seed.
fn site(cx: i32, cy: i32, cell_seed: u32) -> (f32, f32) {
    let (jx, s1) = hash::random_float01(cell_seed);
    let (jy, _) = hash::random_float01(s1);
    (cx as f32 + jx, cy as f32 + jy)
}

fn finish(v: f32, p: &VoronoiParams) -> f32 {
    let v = if p.inverse { 1.0 - v } else { v };
    v.max(0.0).powf(p.pow) * p.mul + p.offset
}

/// Evaluate one cell at grid coordinate `(ix, iy)`.
///
/// The layer tree validates `order ≤ 8` and `noise_scale > 0` before any
/// sampling starts.
pub fn sample(p: &VoronoiParams, ix: u32, iy: u32) -> f32 {
    debug_assert!(p.order <= 8);

    let x = ix as f32 / p.noise_scale as f32;
    let y = iy as f32 / p.noise_scale as f32;
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;

    // Squared distance to each neighborhood site, with the originating cell
    // seed kept alongside for same-cell coloring.
    let mut candidates: SmallVec<[(f32, u32); 9]> = SmallVec::new();
    for jx in -1..=1 {
        for jy in -1..=1 {
            let cx = x0 + jx;
            let cy = y0 + jy;
            let cell_seed = hash::cell_seed_2d(cx, cy, p.gradient_offset);
            let (px, py) = site(cx, cy, cell_seed);
            let dx = x - px;
            let dy = y - py;
            candidates.push((dx * dx + dy * dy, cell_seed));
        }
    }
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

    let order = p.order as usize;
    let (dist, winner_seed) = candidates[order];

    let mut v = if p.same_cell_same_value {
        hash::random_float01(winner_seed).0
    } else {
        // Range-normalization heuristic: nearest distances peak lower than
        // higher-order ones. The divisors are part of the output contract.
        dist / if p.order == 0 { 2.0 } else { 4.0 }
    };

    if p.mark_seams {
        let near_tie = |other: f32| (dist - other).abs() < p.seam_width;
        let lower = order > 0 && near_tie(candidates[order - 1].0);
        let upper = order + 1 < candidates.len() && near_tie(candidates[order + 1].0);
        if lower || upper {
            v = 0.0;
        }
    }

    finish(v, p)
}

/// Generate a full zone, cells in parallel.
pub fn generate(p: &VoronoiParams, zone: Zone) -> Grid {
    Grid::from_fn(zone, |x, y| sample(p, x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn base(scale: i32, seed: i32) -> VoronoiParams {
        VoronoiParams {
            noise_scale: scale,
            gradient_offset: seed,
            ..VoronoiParams::default()
        }
    }

    #[test]
    fn deterministic() {
        let p = base(8, 77);
        assert_eq!(generate(&p, Zone::new(32, 32)), generate(&p, Zone::new(32, 32)));
    }

    #[test]
    fn order_distances_sorted() {
        // Recover the raw squared distance by undoing the divisor; the
        // underlying candidate list is sorted ascending, so across every
        // order 0..=8 the recovered distances must be non-decreasing. Only
        // the 9 sites of the 3×3 neighborhood are considered; this is the
        // documented bound on the order statistic, not exact Voronoi order.
        for (x, y) in [(0u32, 0u32), (13, 5), (30, 30)] {
            let mut prev = f32::NEG_INFINITY;
            for order in 0..=8u32 {
                let p = VoronoiParams {
                    order,
                    ..base(8, 3)
                };
                let divisor = if order == 0 { 2.0 } else { 4.0 };
                let raw = sample(&p, x, y) * divisor;
                assert!(raw >= prev - 1e-6, "order {order} at ({x},{y})");
                prev = raw;
            }
        }
    }

    #[test]
    fn higher_order_nonnegative_and_finite() {
        for order in 0..=8u32 {
            let p = VoronoiParams {
                order,
                ..base(6, 11)
            };
            let g = generate(&p, Zone::new(24, 24));
            assert!(g.values().iter().all(|v| v.is_finite() && *v >= 0.0));
        }
    }

    #[test]
    fn same_cell_same_value_is_piecewise_flat() {
        // Flat-color mode emits one value per winning cell, so a zone can
        // only contain about as many distinct values as there are lattice
        // cells in reach, far fewer than the distance field produces.
        let flat = VoronoiParams {
            same_cell_same_value: true,
            ..base(8, 5)
        };
        let g = generate(&flat, Zone::new(64, 64));
        let distinct: HashSet<u32> = g.values().iter().map(|v| v.to_bits()).collect();
        assert!(distinct.len() < 200, "expected flat regions, got {} values", distinct.len());

        let field = generate(&base(8, 5), Zone::new(64, 64));
        let field_distinct: HashSet<u32> = field.values().iter().map(|v| v.to_bits()).collect();
        assert!(field_distinct.len() > distinct.len());
    }

    #[test]
    fn same_cell_value_in_unit_range() {
        let p = VoronoiParams {
            same_cell_same_value: true,
            ..base(4, 9)
        };
        let g = generate(&p, Zone::new(32, 32));
        assert!(g.values().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn giant_seam_width_marks_everything() {
        let p = VoronoiParams {
            mark_seams: true,
            seam_width: f32::MAX,
            ..base(8, 2)
        };
        let g = generate(&p, Zone::new(16, 16));
        assert!(g.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn zero_seam_width_marks_nothing() {
        let marked = VoronoiParams {
            mark_seams: true,
            seam_width: 0.0,
            ..base(8, 2)
        };
        let plain = base(8, 2);
        assert_eq!(generate(&marked, Zone::new(16, 16)), generate(&plain, Zone::new(16, 16)));
    }

    #[test]
    fn post_chain_applies_after_seams() {
        // A marked seam cell is forced to 0 before shaping, so with offset 3
        // it surfaces as exactly 3.
        let p = VoronoiParams {
            mark_seams: true,
            seam_width: f32::MAX,
            offset: 3.0,
            ..base(8, 2)
        };
        let g = generate(&p, Zone::new(8, 8));
        assert!(g.values().iter().all(|&v| v == 3.0));
    }

    #[test]
    fn inverse_flips_flat_color_mode() {
        // Flat-color values stay in [0,1], so the pre-pow flip is exact.
        let b = VoronoiParams {
            same_cell_same_value: true,
            ..base(8, 31)
        };
        let inv = VoronoiParams {
            inverse: true,
            ..b.clone()
        };
        for (x, y) in [(0, 0), (7, 12), (15, 3)] {
            assert_eq!(sample(&inv, x, y), 1.0 - sample(&b, x, y));
        }
    }

    #[test]
    fn different_seeds_differ() {
        let a = generate(&base(8, 0), Zone::new(16, 16));
        let b = generate(&base(8, 1), Zone::new(16, 16));
        assert_ne!(a, b);
    }
}
