// grid.rs — sample zones, dense float grids, rayon-parallel fill
//
// A `Grid` is the sole output type of the crate: a row-major `Vec<f32>`
// covering a `Zone`. Generation partitions the flat buffer into rows with
// `par_chunks_mut`, so every worker owns a disjoint slice and writes are
// race-free by construction, with no locks in the parallel phase.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Rectangular integer-coordinate sample region. Coordinates `(x, y)` run
/// `0 ≤ x < width`, `0 ≤ y < height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub width: u32,
    pub height: u32,
}

impl Zone {
    pub fn new(width: u32, height: u32) -> Self {
        Zone { width, height }
    }

    /// Total cell count.
    pub fn cells(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Dense row-major `width × height` matrix of f32.
///
/// Finished layer output conventionally lands in [0, 1], but the range is
/// not enforced; pow/mul/offset post-processing can exceed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl Grid {
    /// Allocate a grid with every cell set to `value`.
    pub fn filled(zone: Zone, value: f32) -> Self {
        Grid {
            width: zone.width,
            height: zone.height,
            values: vec![value; zone.cells()],
        }
    }

    /// Fill a grid by evaluating `f(x, y)` for every cell, rows in parallel.
    ///
    /// `f` must be pure with respect to its arguments: workers share nothing
    /// and may run in any order or interleaving.
    pub fn from_fn(zone: Zone, f: impl Fn(u32, u32) -> f32 + Sync) -> Self {
        let width = zone.width as usize;
        let mut values = vec![0.0f32; zone.cells()];
        values
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, cell) in row.iter_mut().enumerate() {
                    *cell = f(x as u32, y as u32);
                }
            });
        Grid {
            width: zone.width,
            height: zone.height,
            values,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn zone(&self) -> Zone {
        Zone::new(self.width, self.height)
    }

    /// Row-major backing slice, length `width × height`.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Value at `(x, y)`. Callers index within the grid's own zone, so the
    /// lookup cannot go out of bounds in correct use.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[y as usize * self.width as usize + x as usize]
    }

    /// Apply `f` to every cell in place, rows in parallel.
    pub fn map_inplace(&mut self, f: impl Fn(f32) -> f32 + Sync) {
        let width = self.width as usize;
        self.values.par_chunks_mut(width).for_each(|row| {
            for cell in row {
                *cell = f(*cell);
            }
        });
    }

    /// Combine with another grid of the same zone cell-wise, in place:
    /// `self[c] = f(self[c], other[c])`. Rows in parallel.
    pub fn zip_inplace(&mut self, other: &Grid, f: impl Fn(f32, f32) -> f32 + Sync) {
        debug_assert_eq!(self.zone(), other.zone());
        let width = self.width as usize;
        self.values
            .par_chunks_mut(width)
            .zip(other.values.par_chunks(width))
            .for_each(|(row, other_row)| {
                for (cell, &o) in row.iter_mut().zip(other_row) {
                    *cell = f(*cell, o);
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_cells() {
        assert_eq!(Zone::new(4, 3).cells(), 12);
        assert_eq!(Zone::new(1, 1).cells(), 1);
    }

    #[test]
    fn from_fn_row_major_layout() {
        let g = Grid::from_fn(Zone::new(3, 2), |x, y| (y * 10 + x) as f32);
        assert_eq!(g.values(), &[0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        assert_eq!(g.get(2, 1), 12.0);
        assert_eq!(g.get(0, 0), 0.0);
    }

    #[test]
    fn from_fn_matches_sequential_fill() {
        // The parallel fill must be indistinguishable from a plain loop.
        let zone = Zone::new(64, 33);
        let f = |x: u32, y: u32| ((x * 31 + y * 7) % 13) as f32 * 0.5;
        let parallel = Grid::from_fn(zone, f);
        for y in 0..zone.height {
            for x in 0..zone.width {
                assert_eq!(parallel.get(x, y), f(x, y));
            }
        }
    }

    #[test]
    fn filled_is_constant() {
        let g = Grid::filled(Zone::new(5, 5), 0.25);
        assert!(g.values().iter().all(|&v| v == 0.25));
    }

    #[test]
    fn map_inplace_inverts() {
        let mut g = Grid::from_fn(Zone::new(8, 8), |x, y| (x + y) as f32 / 14.0);
        let before = g.clone();
        g.map_inplace(|v| 1.0 - v);
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(g.get(x, y), 1.0 - before.get(x, y));
            }
        }
    }

    #[test]
    fn zip_inplace_accumulates() {
        let mut acc = Grid::filled(Zone::new(4, 4), 1.0);
        let other = Grid::filled(Zone::new(4, 4), 0.5);
        acc.zip_inplace(&other, |a, b| a + b * 2.0);
        assert!(acc.values().iter().all(|&v| v == 2.0));
    }

    #[test]
    fn single_cell_grid() {
        let g = Grid::from_fn(Zone::new(1, 1), |_, _| 0.75);
        assert_eq!(g.values(), &[0.75]);
    }
}
