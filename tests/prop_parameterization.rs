//! Property-based tests for model layouts, transforms and forward
//! preparation.
mod common;

use common::{Counters, counting_factory, receiver_times};
use ndarray::{Array1, Array2};
use proptest::prelude::*;
use tem_inversion::{
    forward::DeviceSetup,
    inversion::TemSmoothInversion,
    model::{ConfigError, DepthGrid, flatten_grouped, reshape_grouped},
    optimization::transforms::Transform,
};

proptest! {
    /// Grouped reshape puts entry `k * n_layers + i` at row `i`, column `k`.
    #[test]
    fn grouped_layout_is_parameter_major(
        n_layers in 1usize..24,
        four in any::<bool>(),
    ) {
        let n_params = if four { 4 } else { 1 };
        let model = Array1::from_iter((0..n_layers * n_params).map(|v| v as f64));

        let matrix = reshape_grouped(model.view(), n_layers, n_params).unwrap();

        prop_assert_eq!(matrix.dim(), (n_layers, n_params));
        for i in 0..n_layers {
            for k in 0..n_params {
                prop_assert_eq!(matrix[[i, k]], (k * n_layers + i) as f64);
            }
        }
        prop_assert_eq!(flatten_grouped(matrix.view()), model);
    }

    /// Replicating a grid `k` times gives `k` back-to-back copies, so every
    /// entry of a parameter-major vector meets the top of its own layer.
    #[test]
    fn replicated_grid_repeats_tops_blockwise(
        thicknesses in prop::collection::vec(0.1f64..5.0, 0..20),
        k in 1usize..6,
    ) {
        let mut top = 0.0;
        let mut tops = vec![0.0];
        for t in &thicknesses {
            top += t;
            tops.push(top);
        }
        let grid = DepthGrid::new(Array1::from(tops)).unwrap();
        let n = grid.n_layers();

        let out = grid.replicated(k);

        prop_assert_eq!(out.len(), k * n);
        for i in 0..out.len() {
            prop_assert_eq!(out[i], grid.depths()[i % n]);
        }
    }

    /// Any other length is rejected, never truncated or padded.
    #[test]
    fn grouped_layout_rejects_wrong_lengths(
        n_layers in 1usize..24,
        len in 0usize..120,
    ) {
        prop_assume!(len != n_layers);
        let model = Array1::zeros(len);

        let err = reshape_grouped(model.view(), n_layers, 1).unwrap_err();

        prop_assert_eq!(err, ConfigError::ModelLengthMismatch { expected: n_layers, found: len });
    }

    /// The bounded-log transform is finite on the closed interval and
    /// inverts interior values.
    #[test]
    fn bounded_log_inverts_inside_bounds(
        lower in 0.1f64..10.0,
        width in 1.0f64..1e4,
        frac in 0.001f64..0.999,
    ) {
        let upper = lower + width;
        let t = Transform::bounded_log(lower, upper).unwrap();
        let x = lower + frac * width;

        prop_assert!(t.forward(lower).is_finite());
        prop_assert!(t.forward(upper).is_finite());
        prop_assert!(t.deriv(x) > 0.0);
        let back = t.inverse(t.forward(x));
        prop_assert!((back - x).abs() <= 1e-6 * x.max(1.0), "x = {x}, back = {back}");
    }

    /// Matching grids prepare deterministically with one sample per gate;
    /// mismatches fail before any solver is built.
    #[test]
    fn prepare_fwd_checks_lengths_first(
        n_layers in 1usize..16,
        n_start in 1usize..16,
        rho in 1.0f64..1000.0,
    ) {
        let counters = Counters::default();
        let driver = TemSmoothInversion::new(DeviceSetup::default(), counting_factory(&counters));
        let grid = DepthGrid::new(Array1::from_iter((0..n_layers).map(|i| i as f64))).unwrap();
        let start = Array1::from_elem(n_start, rho);

        let result = driver.prepare_fwd(&grid, start.view(), None, 30.0, &receiver_times());

        if n_layers == n_start {
            let first = result.unwrap();
            let again = driver.prepare_fwd(&grid, start.view(), None, 30.0, &receiver_times()).unwrap();
            prop_assert_eq!(first.test_response().len(), receiver_times().len());
            prop_assert_eq!(first.test_response(), again.test_response());
            prop_assert_eq!(counters.builds(), 2);
        } else {
            prop_assert!(result.unwrap_err().is_configuration());
            prop_assert_eq!(counters.builds(), 0);
        }
    }

    /// IP preparation requires exactly four columns.
    #[test]
    fn prepare_fwd_ip_requires_four_columns(n_cols in 1usize..7) {
        let counters = Counters::default();
        let driver = TemSmoothInversion::new(DeviceSetup::default(), counting_factory(&counters));
        let grid = DepthGrid::linear(1.0, 6.0).unwrap();
        let mut start = Array2::from_elem((grid.n_layers(), n_cols), 0.1);
        start.column_mut(0).fill(50.0);

        let result = driver.prepare_fwd_ip(&grid, start.view(), None, 30.0, &receiver_times());

        if n_cols == 4 {
            prop_assert_eq!(result.unwrap().parameter_count(), 4);
        } else {
            prop_assert!(result.unwrap_err().is_configuration());
            prop_assert_eq!(counters.builds(), 0);
        }
    }
}
