//! Forward operators — model vector in, simulated response out.
//!
//! Purpose
//! -------
//! Bind a forward adapter to a parameterization so the optimization engine
//! can treat forward modelling as a function `response(model) -> data` of a
//! flat model vector.
//!
//! Key behaviors
//! -------------
//! - [`SmoothForward`]: fixed depth grid, parameter-major model vector of
//!   length `n_layers * n_params`.
//! - [`BlockForward`]: few layers with free thicknesses, model vector
//!   `[thk(0..L-1), params…]`.
//! - [`ForwardModel`]: runtime choice between the two.
//!
//! Invariants & assumptions
//! ------------------------
//! - The model-vector length is checked on every call; a mismatch is a fatal
//!   configuration error wrapped in
//!   [`crate::forward::ForwardError::Configuration`].
//! - A non-positive or non-finite thickness in a block model is reported as
//!   [`crate::forward::ForwardError::NonPhysicalThickness`], a failure of
//!   that evaluation only.
//! - `response` takes `&self`; the only interior state is an atomic
//!   evaluation counter, so operators are safe to share across threads.
//! - In IP mode the smooth operator keeps the grid replicated once per
//!   parameter block; the solver's depth column uses the first block.
//!
//! Downstream usage
//! ----------------
//! - The inversion driver builds one operator per prepare call.
//! - The engine only sees the [`ForwardOperator`] trait.
use crate::forward::{
    adapter::ForwardAdapter,
    errors::{ForwardError, ForwardResult},
    solver::ForwardSolver,
};
use crate::model::{
    depth::DepthGrid,
    errors::ConfigError,
    layout::{Parameterization, reshape_block, reshape_grouped},
};
use log::trace;
use ndarray::{Array1, ArrayView1, s};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Model-to-data map consumed by the optimization engine.
pub trait ForwardOperator: Send + Sync {
    /// Simulated response for a flat model vector.
    fn response(&self, model: ArrayView1<'_, f64>) -> ForwardResult<Array1<f64>>;

    /// Required model-vector length.
    fn model_len(&self) -> usize;

    /// Response length (number of receiver times).
    fn data_len(&self) -> usize;

    fn n_layers(&self) -> usize;

    fn n_params(&self) -> usize;

    /// Whether `response` may be called concurrently.
    fn multi_threaded(&self) -> bool {
        false
    }
}

fn check_len(model: ArrayView1<'_, f64>, expected: usize) -> ForwardResult<()> {
    if model.len() != expected {
        return Err(ConfigError::ModelLengthMismatch { expected, found: model.len() }.into());
    }
    Ok(())
}

/// Fixed-depth forward operator (smooth inversion).
#[derive(Debug)]
pub struct SmoothForward<S> {
    adapter: ForwardAdapter<S>,
    depths: Array1<f64>,
    n_layers: usize,
    n_params: usize,
    evaluations: AtomicUsize,
}

impl<S: ForwardSolver> SmoothForward<S> {
    /// Bind `adapter` to the fixed grid `grid`.
    ///
    /// # Errors
    /// - [`ConfigError::DepthModelLengthMismatch`] if the grid and the
    ///   adapter's configuration disagree on the number of layers.
    pub fn new(adapter: ForwardAdapter<S>, grid: &DepthGrid) -> ForwardResult<Self> {
        let n_layers = adapter.config().n_layers;
        let n_params = adapter.config().n_params;
        if grid.n_layers() != n_layers {
            return Err(ConfigError::DepthModelLengthMismatch {
                depths: grid.n_layers(),
                model: n_layers,
            }
            .into());
        }
        let depths = if n_params > 1 { grid.replicated(n_params) } else { grid.depths().to_owned() };
        Ok(Self { adapter, depths, n_layers, n_params, evaluations: AtomicUsize::new(0) })
    }

    /// Depth vector kept by the operator (`n_params * n_layers` long in IP mode).
    pub fn depths(&self) -> &Array1<f64> {
        &self.depths
    }

    pub fn adapter(&self) -> &ForwardAdapter<S> {
        &self.adapter
    }

    /// Number of `response` calls so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }
}

impl<S: ForwardSolver> ForwardOperator for SmoothForward<S> {
    fn response(&self, model: ArrayView1<'_, f64>) -> ForwardResult<Array1<f64>> {
        check_len(model, self.model_len())?;
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let params = reshape_grouped(model, self.n_layers, self.n_params)?;
        let response = self.adapter.calc_response(self.depths.slice(s![..self.n_layers]), params.view())?;
        trace!("smooth response: {} samples from {} parameters", response.len(), model.len());
        Ok(response)
    }

    fn model_len(&self) -> usize {
        Parameterization::Smooth.model_len(self.n_layers, self.n_params)
    }

    fn data_len(&self) -> usize {
        self.adapter.config().n_times()
    }

    fn n_layers(&self) -> usize {
        self.n_layers
    }

    fn n_params(&self) -> usize {
        self.n_params
    }

    fn multi_threaded(&self) -> bool {
        self.adapter.thread_safe()
    }
}

/// Free-thickness forward operator (block inversion).
#[derive(Debug)]
pub struct BlockForward<S> {
    adapter: ForwardAdapter<S>,
    n_layers: usize,
    n_params: usize,
    evaluations: AtomicUsize,
}

impl<S: ForwardSolver> BlockForward<S> {
    pub fn new(adapter: ForwardAdapter<S>) -> Self {
        let n_layers = adapter.config().n_layers;
        let n_params = adapter.config().n_params;
        Self { adapter, n_layers, n_params, evaluations: AtomicUsize::new(0) }
    }

    pub fn adapter(&self) -> &ForwardAdapter<S> {
        &self.adapter
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }
}

impl<S: ForwardSolver> ForwardOperator for BlockForward<S> {
    fn response(&self, model: ArrayView1<'_, f64>) -> ForwardResult<Array1<f64>> {
        check_len(model, self.model_len())?;
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let (tops, params) =
            reshape_block(model, self.n_layers, self.n_params).map_err(ForwardError::from_proposed)?;
        let response = self.adapter.calc_response(tops.view(), params.view())?;
        trace!("block response: {} samples from {} parameters", response.len(), model.len());
        Ok(response)
    }

    fn model_len(&self) -> usize {
        Parameterization::Block.model_len(self.n_layers, self.n_params)
    }

    fn data_len(&self) -> usize {
        self.adapter.config().n_times()
    }

    fn n_layers(&self) -> usize {
        self.n_layers
    }

    fn n_params(&self) -> usize {
        self.n_params
    }

    fn multi_threaded(&self) -> bool {
        self.adapter.thread_safe()
    }
}

/// Either parameterization behind one type.
#[derive(Debug)]
pub enum ForwardModel<S> {
    Smooth(SmoothForward<S>),
    Block(BlockForward<S>),
}

impl<S: ForwardSolver> ForwardModel<S> {
    pub fn parameterization(&self) -> Parameterization {
        match self {
            ForwardModel::Smooth(_) => Parameterization::Smooth,
            ForwardModel::Block(_) => Parameterization::Block,
        }
    }

    pub fn evaluations(&self) -> usize {
        match self {
            ForwardModel::Smooth(op) => op.evaluations(),
            ForwardModel::Block(op) => op.evaluations(),
        }
    }

    pub fn adapter(&self) -> &ForwardAdapter<S> {
        match self {
            ForwardModel::Smooth(op) => op.adapter(),
            ForwardModel::Block(op) => op.adapter(),
        }
    }
}

impl<S: ForwardSolver> ForwardOperator for ForwardModel<S> {
    fn response(&self, model: ArrayView1<'_, f64>) -> ForwardResult<Array1<f64>> {
        match self {
            ForwardModel::Smooth(op) => op.response(model),
            ForwardModel::Block(op) => op.response(model),
        }
    }

    fn model_len(&self) -> usize {
        match self {
            ForwardModel::Smooth(op) => op.model_len(),
            ForwardModel::Block(op) => op.model_len(),
        }
    }

    fn data_len(&self) -> usize {
        match self {
            ForwardModel::Smooth(op) => op.data_len(),
            ForwardModel::Block(op) => op.data_len(),
        }
    }

    fn n_layers(&self) -> usize {
        match self {
            ForwardModel::Smooth(op) => op.n_layers(),
            ForwardModel::Block(op) => op.n_layers(),
        }
    }

    fn n_params(&self) -> usize {
        match self {
            ForwardModel::Smooth(op) => op.n_params(),
            ForwardModel::Block(op) => op.n_params(),
        }
    }

    fn multi_threaded(&self) -> bool {
        match self {
            ForwardModel::Smooth(op) => op.multi_threaded(),
            ForwardModel::Block(op) => op.multi_threaded(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::{
        config::{DeviceSetup, ForwardConfig, IpModel, ResponseTransform},
        errors::ForwardError,
        solver::mock::KernelSolver,
    };
    use ndarray::{Array1, array};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Length checking on every call for both parameterizations.
    // - IP-mode depth replication kept by the smooth operator.
    // - Determinism and the evaluation counter.
    // -------------------------------------------------------------------------

    fn times() -> Array1<f64> {
        Array1::from_iter((0..10).map(|i| 1e-5 * 10f64.powf(i as f64 * 0.25)))
    }

    fn smooth(grid: &DepthGrid, n_params: usize) -> SmoothForward<KernelSolver> {
        let ip = if n_params == 1 { IpModel::None } else { IpModel::Pelton };
        let cfg = ForwardConfig::new(
            DeviceSetup::default(),
            times(),
            grid.n_layers(),
            n_params,
            ip,
            ResponseTransform::Identity,
            false,
        )
        .expect("valid config");
        SmoothForward::new(ForwardAdapter::new(cfg, KernelSolver::new(times())), grid).expect("valid grid")
    }

    #[test]
    // Purpose
    // -------
    // Matching lengths give one sample per receiver time, deterministically.
    //
    // Given
    // -----
    // - Depths `0..=11`, constant 50 Ω·m.
    //
    // Expect
    // ------
    // - Two evaluations are identical and have `times().len()` samples.
    fn smooth_response_is_deterministic() {
        let grid = DepthGrid::new(Array1::range(0.0, 12.0, 1.0)).expect("valid grid");
        let op = smooth(&grid, 1);
        let model = Array1::from_elem(12, 50.0);

        let a = op.response(model.view()).expect("forward ok");
        let b = op.response(model.view()).expect("forward ok");

        assert_eq!(a.len(), op.data_len());
        assert_eq!(a, b);
        assert_eq!(op.evaluations(), 2);
    }

    #[test]
    fn smooth_response_rejects_wrong_length_without_calling_solver() {
        let grid = DepthGrid::from_slice(&[0.0, 1.0, 2.0]).expect("valid grid");
        let op = smooth(&grid, 1);

        let err = op.response(array![1.0, 2.0].view()).unwrap_err();

        assert_eq!(err, ForwardError::Configuration(ConfigError::ModelLengthMismatch { expected: 3, found: 2 }));
        assert_eq!(op.evaluations(), 0);
    }

    #[test]
    // Purpose
    // -------
    // In IP mode the operator keeps the grid repeated once per parameter
    // block and accepts a `4 * L` model vector.
    fn ip_operator_replicates_depths() {
        let grid = DepthGrid::from_slice(&[0.0, 2.0, 5.0]).expect("valid grid");
        let op = smooth(&grid, 4);
        let model = array![50.0, 60.0, 70.0, 0.1, 0.1, 0.1, 1e-4, 1e-4, 1e-4, 0.5, 0.5, 0.5];

        let resp = op.response(model.view()).expect("forward ok");

        assert_eq!(op.depths().len(), 12);
        assert_eq!(op.depths().slice(s![3..6]).to_vec(), vec![0.0, 2.0, 5.0]);
        assert_eq!(op.model_len(), 12);
        assert_eq!(resp.len(), 10);
    }

    #[test]
    fn smooth_operator_rejects_grid_of_other_size() {
        let grid = DepthGrid::from_slice(&[0.0, 1.0]).expect("valid grid");
        let cfg = ForwardConfig::new(
            DeviceSetup::default(),
            times(),
            3,
            1,
            IpModel::None,
            ResponseTransform::Identity,
            false,
        )
        .expect("valid config");

        let err = SmoothForward::new(ForwardAdapter::new(cfg, KernelSolver::new(times())), &grid).unwrap_err();

        assert_eq!(
            err,
            ForwardError::Configuration(ConfigError::DepthModelLengthMismatch { depths: 2, model: 3 })
        );
    }

    #[test]
    // Purpose
    // -------
    // The block operator recovers tops from leading thicknesses. A
    // non-positive proposed thickness is a per-run forward failure, while a
    // wrong model length stays a configuration fault.
    fn block_operator_uses_free_thicknesses() {
        let cfg = ForwardConfig::new(
            DeviceSetup::default(),
            times(),
            3,
            1,
            IpModel::None,
            ResponseTransform::Identity,
            false,
        )
        .expect("valid config");
        let op = ForwardModel::Block(BlockForward::new(ForwardAdapter::new(cfg, KernelSolver::new(times()))));

        let resp = op.response(array![4.0, 6.0, 30.0, 30.0, 30.0].view()).expect("forward ok");
        assert!(resp.iter().all(|v| (v - 30.0).abs() < 1e-9));

        let err = op.response(array![-1.0, 6.0, 30.0, 30.0, 30.0].view()).unwrap_err();
        assert_eq!(err, ForwardError::NonPhysicalThickness { index: 0, value: -1.0 });
        assert!(matches!(
            op.response(array![4.0, 6.0, 30.0].view()).unwrap_err(),
            ForwardError::Configuration(ConfigError::ModelLengthMismatch { .. })
        ));
        assert_eq!(op.parameterization(), Parameterization::Block);
        assert_eq!(op.model_len(), 5);
    }
}
