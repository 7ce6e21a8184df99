//! Forward adapter — layer-matrix assembly and solver invocation.
//!
//! The adapter owns one [`ForwardConfig`] and the solver built for it. It
//! prepends the depth column to a `[n_layers, n_params]` parameter matrix,
//! checks the resulting shape against the configuration, calls the solver and
//! checks the response length. It never inspects response values: NaN or
//! infinite samples reach the caller unchanged.
use crate::forward::{
    config::ForwardConfig,
    errors::{ForwardError, ForwardResult},
    solver::ForwardSolver,
};
use crate::model::errors::ConfigError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, concatenate};

/// Binds a forward configuration to a solver.
#[derive(Debug)]
pub struct ForwardAdapter<S> {
    config: ForwardConfig,
    solver: S,
}

impl<S: ForwardSolver> ForwardAdapter<S> {
    pub fn new(config: ForwardConfig, solver: S) -> Self {
        Self { config, solver }
    }

    pub fn config(&self) -> &ForwardConfig {
        &self.config
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Whether the wrapped solver tolerates concurrent calls.
    pub fn thread_safe(&self) -> bool {
        self.solver.thread_safe()
    }

    /// Assemble the solver input `[depth | params]`.
    ///
    /// # Errors
    /// - [`ConfigError::DepthModelLengthMismatch`] (wrapped) if `depths` and
    ///   `params` disagree on the number of layers.
    /// - [`ForwardError::LayerMatrixShape`] if the matrix does not match
    ///   `(n_layers, n_params + 1)` of the configuration.
    pub fn layer_matrix(
        &self, depths: ArrayView1<'_, f64>, params: ArrayView2<'_, f64>,
    ) -> ForwardResult<Array2<f64>> {
        if depths.len() != params.nrows() {
            return Err(ConfigError::DepthModelLengthMismatch {
                depths: depths.len(),
                model: params.nrows(),
            }
            .into());
        }
        let expected = (self.config.n_layers, self.config.n_columns());
        let found = (params.nrows(), params.ncols() + 1);
        if found != expected {
            return Err(ForwardError::LayerMatrixShape { expected, found });
        }
        let depth_col = depths.insert_axis(Axis(1));
        concatenate(Axis(1), &[depth_col.view(), params.view()])
            .map_err(|_| ForwardError::LayerMatrixShape { expected, found })
    }

    /// Simulate the response of `params` on the layer tops `depths`.
    ///
    /// # Errors
    /// - As [`ForwardAdapter::layer_matrix`].
    /// - Any solver failure, unchanged.
    /// - [`ForwardError::ResponseLengthMismatch`] if the solver returns a
    ///   response whose length differs from the number of receiver times.
    pub fn calc_response(
        &self, depths: ArrayView1<'_, f64>, params: ArrayView2<'_, f64>,
    ) -> ForwardResult<Array1<f64>> {
        let layers = self.layer_matrix(depths, params)?;
        let response = self.solver.calc_response(
            layers.view(),
            self.config.ip_model,
            self.config.return_rhoa,
            &self.config.resp_trafo,
        )?;
        let expected = self.config.n_times();
        if response.len() != expected {
            return Err(ForwardError::ResponseLengthMismatch { expected, found: response.len() });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::{
        config::{DeviceSetup, IpModel, ResponseTransform},
        solver::mock::KernelSolver,
    };
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Depth-column assembly for resistivity and IP matrices.
    // - Shape and response-length checks.
    // - Pass-through of non-finite responses.
    // -------------------------------------------------------------------------

    fn adapter(n_layers: usize, n_params: usize, ip: IpModel) -> ForwardAdapter<KernelSolver> {
        let times = array![1e-5, 1e-4, 1e-3];
        let cfg = ForwardConfig::new(
            DeviceSetup::default(),
            times.clone(),
            n_layers,
            n_params,
            ip,
            ResponseTransform::Identity,
            false,
        )
        .expect("valid config");
        ForwardAdapter::new(cfg, KernelSolver::new(times))
    }

    struct FixedSolver(Array1<f64>);

    impl ForwardSolver for FixedSolver {
        fn calc_response(
            &self, _layers: ArrayView2<'_, f64>, _ip: IpModel, _rhoa: bool, _trafo: &ResponseTransform,
        ) -> ForwardResult<Array1<f64>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    // Purpose
    // -------
    // The depth column is prepended in front of every parameter column.
    //
    // Given
    // -----
    // - Two layers with tops `[0, 3]` and Pelton parameters.
    //
    // Expect
    // ------
    // - A `2 × 5` matrix whose first column is the depth vector.
    fn layer_matrix_prepends_depth_column() {
        let fwd = adapter(2, 4, IpModel::Pelton);
        let params = array![[50.0, 0.1, 1e-4, 0.5], [80.0, 0.2, 1e-3, 0.6]];

        let layers = fwd.layer_matrix(array![0.0, 3.0].view(), params.view()).expect("shape ok");

        assert_eq!(layers.dim(), (2, 5));
        assert_eq!(layers.column(0).to_vec(), vec![0.0, 3.0]);
        assert_eq!(layers.row(1).to_vec(), vec![3.0, 80.0, 0.2, 1e-3, 0.6]);
    }

    #[test]
    fn layer_matrix_rejects_wrong_shapes() {
        let fwd = adapter(3, 1, IpModel::None);

        let err = fwd.layer_matrix(array![0.0, 1.0].view(), array![[1.0], [2.0], [3.0]].view());
        assert!(matches!(
            err,
            Err(ForwardError::Configuration(ConfigError::DepthModelLengthMismatch { depths: 2, model: 3 }))
        ));

        let err = fwd.layer_matrix(array![0.0, 1.0].view(), array![[1.0], [2.0]].view()).unwrap_err();
        assert_eq!(err, ForwardError::LayerMatrixShape { expected: (3, 2), found: (2, 2) });
    }

    #[test]
    fn calc_response_matches_receiver_times() {
        let fwd = adapter(3, 1, IpModel::None);

        let resp = fwd
            .calc_response(array![0.0, 2.0, 6.0].view(), array![[20.0], [20.0], [20.0]].view())
            .expect("solver succeeds");

        assert_eq!(resp.len(), 3);
        assert!(resp.iter().all(|v| (v - 20.0).abs() < 1e-9));
    }

    #[test]
    // Purpose
    // -------
    // A solver that returns too few samples is an error; NaN samples are not.
    fn response_length_checked_but_values_passed_through() {
        let cfg = adapter(1, 1, IpModel::None).config().clone();

        let short = ForwardAdapter::new(cfg.clone(), FixedSolver(array![1.0]));
        let err = short.calc_response(array![0.0].view(), array![[1.0]].view()).unwrap_err();
        assert_eq!(err, ForwardError::ResponseLengthMismatch { expected: 3, found: 1 });

        let nan = ForwardAdapter::new(cfg, FixedSolver(array![1.0, f64::NAN, 2.0]));
        let resp = nan.calc_response(array![0.0].view(), array![[1.0]].view()).expect("no value check");
        assert!(resp[1].is_nan());
    }
}
