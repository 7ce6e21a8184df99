//! Depth grids — fixed layer-top discretizations for smooth 1D inversion.
//!
//! Purpose
//! -------
//! Represent the ordered layer-top depths of a layered-earth model as a
//! validated, immutable value. A smooth inversion fixes these depths up front
//! and only estimates the per-layer parameters; the grid therefore defines
//! the number of layers of every model vector bound to it.
//!
//! Key behaviors
//! -------------
//! - Validate explicit grids ([`DepthGrid::new`]): non-empty, finite,
//!   non-negative, strictly increasing.
//! - Build grids from the two discretization presets used by survey scripts:
//!   constant thickness ([`DepthGrid::linear`]) and piecewise-constant
//!   thickness from `(from_depth, thickness)` breakpoints
//!   ([`DepthGrid::from_breakpoints`]).
//! - Produce the replicated depth vector used by the complex-resistivity
//!   parameterization ([`DepthGrid::replicated`]), where each of the `n`
//!   parameter blocks of the flat model vector is paired with a full copy of
//!   the grid.
//!
//! Invariants & assumptions
//! ------------------------
//! - `depths[0] >= 0` and `depths[i] < depths[i + 1]`.
//! - The deepest layer is a half-space; its top is the last entry.
//! - A grid never changes after construction; callers clone it into each
//!   forward operator.
//!
//! Conventions
//! -----------
//! - Units are metres below surface.
//! - Builders emit tops strictly below `max_depth`.
//!
//! Testing notes
//! -------------
//! - Unit tests cover validation failures, the two presets, and the
//!   replication layout. Property tests for replication live in
//!   `tests/prop_parameterization.rs`.
use crate::model::errors::{ConfigError, ConfigResult};
use ndarray::{Array1, ArrayView1};

/// Validated, strictly increasing layer-top depths (metres).
#[derive(Debug, Clone, PartialEq)]
pub struct DepthGrid {
    depths: Array1<f64>,
}

impl DepthGrid {
    /// Validate an explicit depth vector.
    ///
    /// # Errors
    /// - [`ConfigError::EmptyDepthGrid`] for an empty vector.
    /// - [`ConfigError::NonFiniteDepth`] / [`ConfigError::NegativeDepth`] for the
    ///   first offending entry.
    /// - [`ConfigError::NonIncreasingDepth`] when a top does not exceed its
    ///   predecessor.
    pub fn new(depths: Array1<f64>) -> ConfigResult<Self> {
        if depths.is_empty() {
            return Err(ConfigError::EmptyDepthGrid);
        }
        for (index, &value) in depths.iter().enumerate() {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteDepth { index, value });
            }
            if value < 0.0 {
                return Err(ConfigError::NegativeDepth { index, value });
            }
            if index > 0 {
                let previous = depths[index - 1];
                if value <= previous {
                    return Err(ConfigError::NonIncreasingDepth { index, previous, value });
                }
            }
        }
        Ok(Self { depths })
    }

    /// Convenience constructor from a slice.
    pub fn from_slice(depths: &[f64]) -> ConfigResult<Self> {
        Self::new(Array1::from(depths.to_vec()))
    }

    /// Constant-thickness grid: tops `0, h, 2h, …` strictly below `max_depth`.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidLayerThickness`] if `thickness` is not finite and > 0.
    /// - [`ConfigError::InvalidMaxDepth`] if `max_depth` is not finite and > 0.
    pub fn linear(thickness: f64, max_depth: f64) -> ConfigResult<Self> {
        validate_max_depth(max_depth)?;
        if !thickness.is_finite() || thickness <= 0.0 {
            return Err(ConfigError::InvalidLayerThickness { index: 0, value: thickness });
        }
        // Tops are generated by index to avoid accumulating rounding error.
        let n = (max_depth / thickness).ceil() as usize;
        let depths: Vec<f64> =
            (0..n).map(|i| i as f64 * thickness).filter(|&top| top < max_depth).collect();
        Self::new(Array1::from(depths))
    }

    /// Piecewise-constant thickness grid.
    ///
    /// `breakpoints` is a list of `(from_depth, thickness)` pairs sorted by
    /// `from_depth`, the first starting at the surface. Walking down from 0,
    /// each new layer uses the thickness of the last breakpoint whose
    /// `from_depth` does not exceed the current top; tops are emitted while
    /// strictly below `max_depth`.
    ///
    /// Example: `[(0, 2), (9, 5), (30, 10)]` with `max_depth = 51` yields
    /// `0, 2, 4, 6, 8, 10, 15, 20, 25, 30, 40, 50`.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidBreakpoints`] if the list is empty, does not
    ///   start at 0, or is not strictly increasing in `from_depth`.
    /// - [`ConfigError::InvalidLayerThickness`] for non-finite or non-positive
    ///   thicknesses.
    /// - [`ConfigError::InvalidMaxDepth`] for an invalid `max_depth`.
    pub fn from_breakpoints(breakpoints: &[(f64, f64)], max_depth: f64) -> ConfigResult<Self> {
        validate_max_depth(max_depth)?;
        let Some(&(first_from, _)) = breakpoints.first() else {
            return Err(ConfigError::InvalidBreakpoints { reason: "At least one breakpoint is required." });
        };
        if first_from != 0.0 {
            return Err(ConfigError::InvalidBreakpoints {
                reason: "The first breakpoint must start at depth 0.",
            });
        }
        for (index, &(from, thickness)) in breakpoints.iter().enumerate() {
            if !thickness.is_finite() || thickness <= 0.0 {
                return Err(ConfigError::InvalidLayerThickness { index, value: thickness });
            }
            if !from.is_finite() || (index > 0 && from <= breakpoints[index - 1].0) {
                return Err(ConfigError::InvalidBreakpoints {
                    reason: "Breakpoint depths must be finite and strictly increasing.",
                });
            }
        }

        let mut depths = Vec::new();
        let mut top = 0.0;
        while top < max_depth {
            depths.push(top);
            let thickness = breakpoints
                .iter()
                .rev()
                .find(|(from, _)| *from <= top)
                .map(|&(_, thickness)| thickness)
                .unwrap_or(breakpoints[0].1);
            top += thickness;
        }
        Self::new(Array1::from(depths))
    }

    /// Number of layers (half-space included).
    pub fn n_layers(&self) -> usize {
        self.depths.len()
    }

    /// Read-only view of the layer tops.
    pub fn depths(&self) -> ArrayView1<'_, f64> {
        self.depths.view()
    }

    /// Top of the deepest layer (the half-space).
    pub fn deepest(&self) -> f64 {
        self.depths[self.depths.len() - 1]
    }

    /// Thicknesses of the `n_layers - 1` finite layers.
    pub fn thicknesses(&self) -> Array1<f64> {
        Array1::from_iter(self.depths.windows(2).into_iter().map(|w| w[1] - w[0]))
    }

    /// Grid repeated `n` times back to back (length `n * n_layers`).
    ///
    /// The result pairs every entry of a parameter-major model vector with
    /// the top of its layer: block `k` holds a full copy of the grid.
    pub fn replicated(&self, n: usize) -> Array1<f64> {
        let len = self.depths.len();
        Array1::from_iter((0..n * len).map(|i| self.depths[i % len]))
    }

    /// Consume the grid and return the underlying vector.
    pub fn into_inner(self) -> Array1<f64> {
        self.depths
    }
}

pub(crate) fn validate_max_depth(max_depth: f64) -> ConfigResult<()> {
    if !max_depth.is_finite() || max_depth <= 0.0 {
        return Err(ConfigError::InvalidMaxDepth { value: max_depth });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Validation of explicit depth vectors.
    // - The constant-thickness and breakpoint presets.
    // - Replication for the parameter-major layout.
    //
    // They intentionally DO NOT cover:
    // - How grids are consumed by forward operators (see `forward::operator`).
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify that a strictly increasing, non-negative grid is accepted as-is.
    //
    // Given
    // -----
    // - Depths `0, 1, …, 11`.
    //
    // Expect
    // ------
    // - `DepthGrid::new` succeeds with 12 layers and the deepest top at 11.
    fn depth_grid_accepts_increasing_depths() {
        let grid = DepthGrid::new(Array1::range(0.0, 12.0, 1.0)).expect("valid grid");

        assert_eq!(grid.n_layers(), 12);
        assert_eq!(grid.deepest(), 11.0);
        assert_eq!(grid.thicknesses(), Array1::from_elem(11, 1.0));
    }

    #[test]
    // Purpose
    // -------
    // Ensure empty, negative, non-finite and non-increasing grids are rejected
    // with the first offending index.
    fn depth_grid_rejects_malformed_inputs() {
        assert_eq!(DepthGrid::new(Array1::zeros(0)).unwrap_err(), ConfigError::EmptyDepthGrid);
        assert_eq!(
            DepthGrid::new(array![-1.0, 2.0]).unwrap_err(),
            ConfigError::NegativeDepth { index: 0, value: -1.0 }
        );
        assert!(matches!(
            DepthGrid::new(array![0.0, f64::NAN]).unwrap_err(),
            ConfigError::NonFiniteDepth { index: 1, .. }
        ));
        assert_eq!(
            DepthGrid::new(array![0.0, 2.0, 2.0]).unwrap_err(),
            ConfigError::NonIncreasingDepth { index: 2, previous: 2.0, value: 2.0 }
        );
    }

    #[test]
    // Purpose
    // -------
    // Check the constant-thickness preset used by the numerical Pelton survey.
    //
    // Given
    // -----
    // - `thickness = 1.5`, `max_depth = 11`.
    //
    // Expect
    // ------
    // - Eight tops `0, 1.5, …, 10.5`.
    fn linear_preset_emits_tops_below_max_depth() {
        let grid = DepthGrid::linear(1.5, 11.0).expect("valid preset");

        assert_eq!(grid.n_layers(), 8);
        assert_eq!(grid.depths()[0], 0.0);
        assert!((grid.deepest() - 10.5).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Check the breakpoint preset walks down with the thickness of the last
    // breakpoint that starts above the current top.
    fn breakpoint_preset_switches_thickness() {
        let grid = DepthGrid::from_breakpoints(&[(0.0, 2.0), (9.0, 5.0), (30.0, 10.0)], 51.0)
            .expect("valid preset");

        assert_eq!(
            grid.depths().to_vec(),
            vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0, 15.0, 20.0, 25.0, 30.0, 40.0, 50.0]
        );
    }

    #[test]
    fn breakpoint_preset_requires_surface_start() {
        let err = DepthGrid::from_breakpoints(&[(1.0, 2.0)], 10.0).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBreakpoints { .. }));

        let err = DepthGrid::from_breakpoints(&[(0.0, 0.0)], 10.0).unwrap_err();
        assert_eq!(err, ConfigError::InvalidLayerThickness { index: 0, value: 0.0 });
    }

    #[test]
    // Purpose
    // -------
    // The replicated vector must be the grid repeated back to back, never
    // interleaved.
    fn replicated_repeats_grid_blockwise() {
        let grid = DepthGrid::from_slice(&[0.0, 2.0, 5.0]).expect("valid grid");

        let rep = grid.replicated(4);

        assert_eq!(rep.len(), 12);
        assert_eq!(
            rep.to_vec(),
            vec![0.0, 2.0, 5.0, 0.0, 2.0, 5.0, 0.0, 2.0, 5.0, 0.0, 2.0, 5.0]
        );
    }
}
