//! inversion::driver — smooth fixed-depth TEM inversion setup and runs.
//!
//! Purpose
//! -------
//! Tie the pieces together: validate a depth grid against a start model,
//! build a forward solver through a [`SolverFactory`], wrap it in a forward
//! operator, sanity-check it with one evaluation, and run the regularized
//! inversion against measured data.
//!
//! Key behaviors
//! -------------
//! - [`TemSmoothInversion::prepare_fwd`]: resistivity-only smooth operator.
//! - [`TemSmoothInversion::prepare_fwd_ip`]: four-parameter IP operator on a
//!   4× replicated depth grid.
//! - [`TemSmoothInversion::prepare_fwd_block`]: block operator with free
//!   thicknesses.
//! - [`TemSmoothInversion::prepare_inv`]: immutable [`InversionSettings`]
//!   (iteration cap, bounded-log resistivity transform, log data transform).
//! - [`TemSmoothInversion::invert`] / [`TemSmoothInversion::lambda_sweep`]:
//!   one run, or one freshly prepared run per lambda.
//!
//! Invariants & assumptions
//! ------------------------
//! - Grid/start length checks happen before the factory is called, so a
//!   mismatch never builds or calls a solver.
//! - Every prepare call builds a new solver and operator; nothing is shared
//!   between runs.
//! - The driver itself is immutable; all per-run state lives in
//!   [`PreparedForward`] and [`InversionConfig`].
//!
//! Conventions
//! -----------
//! - Receiver times in seconds, time windows in microseconds, depths in
//!   metres.
//! - Diagnostics are logged at `info` when verbose, else `debug`. A grid
//!   reaching below `max_depth` is only a warning.
//!
//! Downstream usage
//! ----------------
//! - Batch callers build one driver per device setup, then call
//!   `prepare_*` → `prepare_inv` → `invert` per sounding, or
//!   `lambda_sweep` followed by `LCurve::select`.
use crate::forward::{
    adapter::ForwardAdapter,
    config::{DeviceSetup, ForwardConfig, IpModel, ResponseTransform, TimeWindow, validate_receiver_times},
    errors::ForwardError,
    operator::{BlockForward, ForwardModel, ForwardOperator, SmoothForward},
    solver::{ForwardSolver, SolverFactory},
};
use crate::inversion::{
    data::Sounding,
    errors::InvResult,
    lambda::{LCurve, LambdaSweep, explore},
    outcome::InversionOutcome,
};
use crate::model::{
    depth::{DepthGrid, validate_max_depth},
    errors::{ConfigError, ConfigResult},
    layout::{IP_PARAMS, Parameterization, flatten_block, reshape_block, reshape_grouped, tops_from_thicknesses},
    start::StartModel,
};
use crate::optimization::{
    engine::{
        EngineOptions, LeastSquaresProblem, RegularizedObjective, SolverKind, Tolerances, minimize,
        traits::{DEFAULT_TARGET_CHI2, DEFAULT_TOL_COST},
    },
    regularization::{Regularization, RegularizationKind},
    transforms::{CumulativeTransform, ParameterTransforms, Transform},
};
use log::{Level, log, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Default resistivity bounds of the bounded-log model transform (Ω·m).
pub const DEFAULT_RHO_BOUNDS: (f64, f64) = (1.0, 1000.0);

/// Default maximum grid depth (m).
pub const DEFAULT_MAX_DEPTH: f64 = 30.0;

// ---- Driver ----

/// Immutable driver configuration plus the solver factory.
#[derive(Debug, Clone)]
pub struct TemSmoothInversion<F> {
    device: DeviceSetup,
    factory: F,
    ip_model: IpModel,
    resp_trafo: ResponseTransform,
    return_rhoa: bool,
    rho_bounds: (f64, f64),
    verbose: bool,
}

impl<F: SolverFactory> TemSmoothInversion<F> {
    /// Driver with Pelton IP, identity response transform, voltage output
    /// and resistivity bounds [`DEFAULT_RHO_BOUNDS`].
    pub fn new(device: DeviceSetup, factory: F) -> Self {
        Self {
            device,
            factory,
            ip_model: IpModel::Pelton,
            resp_trafo: ResponseTransform::Identity,
            return_rhoa: false,
            rho_bounds: DEFAULT_RHO_BOUNDS,
            verbose: false,
        }
    }

    /// IP model used by four-parameter operators.
    ///
    /// # Errors
    /// - [`ConfigError::IpModelMismatch`] for [`IpModel::None`].
    pub fn with_ip_model(mut self, ip_model: IpModel) -> ConfigResult<Self> {
        if ip_model.n_params() != IP_PARAMS {
            return Err(ConfigError::IpModelMismatch { ip_model: ip_model.to_string(), n_params: IP_PARAMS });
        }
        self.ip_model = ip_model;
        Ok(self)
    }

    pub fn with_response_transform(mut self, resp_trafo: ResponseTransform) -> Self {
        self.resp_trafo = resp_trafo;
        self
    }

    pub fn with_return_rhoa(mut self, return_rhoa: bool) -> Self {
        self.return_rhoa = return_rhoa;
        self
    }

    /// # Errors
    /// - [`ConfigError::InvalidTransformBounds`] unless finite `lower < upper`.
    pub fn with_resistivity_bounds(mut self, lower: f64, upper: f64) -> ConfigResult<Self> {
        Transform::bounded_log(lower, upper)?;
        self.rho_bounds = (lower, upper);
        Ok(self)
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn device(&self) -> &DeviceSetup {
        &self.device
    }

    pub fn ip_model(&self) -> IpModel {
        self.ip_model
    }

    pub fn resistivity_bounds(&self) -> (f64, f64) {
        self.rho_bounds
    }

    // ---- Forward preparation ----

    /// Prepare whatever `request` describes.
    pub fn prepare(&self, request: &ForwardRequest) -> InvResult<PreparedForward<F::Solver>> {
        let (window, max_depth, times) = (request.filter_times, request.max_depth, &request.times_rx);
        match &request.layout {
            StartLayout::Resistivity { grid, start } => {
                self.prepare_fwd(grid, start.view(), window, max_depth, times)
            }
            StartLayout::Ip { grid, start } => self.prepare_fwd_ip(grid, start.view(), window, max_depth, times),
            StartLayout::Block { thicknesses, start } => {
                self.prepare_fwd_block(thicknesses.view(), start.view(), window, max_depth, times)
            }
        }
    }

    /// Resistivity-only smooth operator on a fixed depth grid.
    ///
    /// # Errors
    /// - [`ConfigError::DepthModelLengthMismatch`] if `start_model` does not
    ///   have one entry per layer (checked before the factory is called).
    /// - Start-model, max-depth, receiver-time and time-window errors.
    /// - Factory and forward failures, including the test evaluation.
    pub fn prepare_fwd(
        &self, depths: &DepthGrid, start_model: ArrayView1<'_, f64>, filter_times: Option<TimeWindow>,
        max_depth: f64, times_rx: &Array1<f64>,
    ) -> InvResult<PreparedForward<F::Solver>> {
        if depths.n_layers() != start_model.len() {
            return Err(ConfigError::DepthModelLengthMismatch {
                depths: depths.n_layers(),
                model: start_model.len(),
            }
            .into());
        }
        let start = StartModel::resistivity(start_model.to_owned())?;
        self.prepare_smooth(depths, start, IpModel::None, filter_times, max_depth, times_rx)
    }

    /// Four-parameter IP operator on a fixed depth grid.
    ///
    /// The parameter count is taken from the start model's columns and must
    /// be 4; the operator pairs each parameter block with a copy of the grid.
    ///
    /// # Errors
    /// - [`ConfigError::DepthModelLengthMismatch`] if the start model does not
    ///   have one row per layer.
    /// - [`ConfigError::ParameterCountMismatch`] unless it has 4 columns.
    /// - As [`TemSmoothInversion::prepare_fwd`] otherwise.
    pub fn prepare_fwd_ip(
        &self, depths: &DepthGrid, start_model: ArrayView2<'_, f64>, filter_times: Option<TimeWindow>,
        max_depth: f64, times_rx: &Array1<f64>,
    ) -> InvResult<PreparedForward<F::Solver>> {
        if depths.n_layers() != start_model.nrows() {
            return Err(ConfigError::DepthModelLengthMismatch {
                depths: depths.n_layers(),
                model: start_model.nrows(),
            }
            .into());
        }
        if start_model.ncols() != IP_PARAMS {
            return Err(ConfigError::ParameterCountMismatch { expected: IP_PARAMS, found: start_model.ncols() }
                .into());
        }
        let start = StartModel::from_matrix(start_model.to_owned())?;
        self.prepare_smooth(depths, start, self.ip_model, filter_times, max_depth, times_rx)
    }

    /// Block operator: `n_layers - 1` free thicknesses plus per-layer
    /// parameters (1 or 4 columns).
    ///
    /// # Errors
    /// - [`ConfigError::DepthModelLengthMismatch`] unless
    ///   `thicknesses.len() + 1 == start_params.nrows()`.
    /// - [`ConfigError::InvalidLayerThickness`] for non-positive thicknesses.
    /// - As [`TemSmoothInversion::prepare_fwd`] otherwise.
    pub fn prepare_fwd_block(
        &self, thicknesses: ArrayView1<'_, f64>, start_params: ArrayView2<'_, f64>,
        filter_times: Option<TimeWindow>, max_depth: f64, times_rx: &Array1<f64>,
    ) -> InvResult<PreparedForward<F::Solver>> {
        let n_layers = start_params.nrows();
        if thicknesses.len() + 1 != n_layers {
            return Err(ConfigError::DepthModelLengthMismatch { depths: thicknesses.len() + 1, model: n_layers }
                .into());
        }
        let start = StartModel::from_matrix(start_params.to_owned())?;
        let tops = tops_from_thicknesses(thicknesses)?;
        self.check_max_depth(tops[n_layers - 1], max_depth)?;
        let ip_model = if start.n_params() == IP_PARAMS { self.ip_model } else { IpModel::None };
        let adapter = self.build_adapter(n_layers, start.n_params(), ip_model, filter_times, times_rx)?;
        let model = flatten_block(thicknesses, start.params())?;
        self.finish(ForwardModel::Block(BlockForward::new(adapter)), model, tops, max_depth)
    }

    // ---- Inversion ----

    /// Inversion settings with the driver's resistivity bounds.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidMaxIter`] if `max_iter == 0`.
    pub fn prepare_inv(&self, max_iter: usize, verbose: bool) -> InvResult<InversionSettings> {
        let (lower, upper) = self.rho_bounds;
        let transforms = ParameterTransforms::with_resistivity_bounds(lower, upper)?;
        Ok(InversionSettings::new(max_iter, verbose)?.with_model_transforms(transforms)?)
    }

    /// Run one inversion of `sounding` with a prepared operator.
    ///
    /// # Errors
    /// - [`ConfigError::DataLengthMismatch`] /
    ///   [`ConfigError::InvalidReceiverTimes`] if the sounding does not match
    ///   the operator's receiver times.
    /// - Forward failures and engine failures, unchanged.
    pub fn invert(
        &self, prepared: &PreparedForward<F::Solver>, config: &InversionConfig, sounding: &Sounding,
    ) -> InvResult<InversionOutcome> {
        let operator = prepared.operator();
        check_sounding(prepared.times(), sounding)?;
        let settings = config.settings();
        let level = log_level(settings.verbose);
        let parameterization = operator.parameterization();
        let (n_layers, n_params) = (operator.n_layers(), operator.n_params());

        let model_trans =
            CumulativeTransform::for_layout(parameterization, n_layers, n_params, &settings.model_transforms)?;
        let kind = settings.regularization.unwrap_or_else(|| RegularizationKind::default_for(parameterization));
        let regularization = Regularization::new(kind, parameterization, n_layers, n_params)?;
        let objective = RegularizedObjective::new(
            operator,
            model_trans,
            settings.data_transform,
            sounding.observed().view(),
            sounding.rel_error().view(),
            regularization,
            prepared.start_model().view(),
            config.lambda(),
        )?;
        let theta0 = objective.to_transformed(prepared.start_model().view())?;
        let opts = settings.engine_options()?;
        log!(
            level,
            "invert: lambda = {}, {} data, {} model parameters, {:?}, {:?}",
            config.lambda(),
            sounding.len(),
            operator.model_len(),
            kind,
            opts.solver
        );

        let run = minimize(&objective, theta0, &opts)?;
        let fit = objective.misfit(&run.theta_hat)?;
        let model = objective.to_physical(&run.theta_hat)?;
        let (depths, layers) = match parameterization {
            Parameterization::Smooth => {
                (prepared.depths().clone(), reshape_grouped(model.view(), n_layers, n_params)?)
            }
            Parameterization::Block => {
                reshape_block(model.view(), n_layers, n_params).map_err(ForwardError::from_proposed)?
            }
        };
        log!(
            level,
            "invert: {} after {} iterations; chi2 = {:.3}, rrms = {:.2}%",
            run.status,
            run.iterations,
            fit.chi2,
            fit.rrms
        );

        Ok(InversionOutcome {
            model,
            layers,
            depths,
            response: fit.response,
            phi_d: fit.phi_d,
            phi_m: fit.phi_m,
            chi2: fit.chi2,
            rrms: fit.rrms,
            lambda: config.lambda(),
            iterations: run.iterations,
            converged: run.converged,
            status: run.status,
            fn_evals: run.fn_evals,
            history: run.history,
        })
    }

    /// Prepare and invert in one call.
    pub fn run(
        &self, request: &ForwardRequest, settings: &InversionSettings, lambda: f64, sounding: &Sounding,
    ) -> InvResult<InversionOutcome> {
        let prepared = self.prepare(request)?;
        let config = InversionConfig::new(settings.clone(), lambda)?;
        self.invert(&prepared, &config, sounding)
    }

    /// One freshly prepared inversion per lambda of `sweep`.
    ///
    /// # Errors
    /// - The first configuration error; other failures are collected in
    ///   [`LCurve::failures`].
    pub fn lambda_sweep(
        &self, request: &ForwardRequest, settings: &InversionSettings, sounding: &Sounding, sweep: &LambdaSweep,
    ) -> InvResult<LCurve> {
        log!(log_level(settings.verbose), "lambda sweep over {} values", sweep.len());
        explore(sweep, |lambda| self.run(request, settings, lambda, sounding))
    }

    // ---- Helper Methods ----

    fn prepare_smooth(
        &self, grid: &DepthGrid, start: StartModel, ip_model: IpModel, filter_times: Option<TimeWindow>,
        max_depth: f64, times_rx: &Array1<f64>,
    ) -> InvResult<PreparedForward<F::Solver>> {
        self.check_max_depth(grid.deepest(), max_depth)?;
        let adapter = self.build_adapter(grid.n_layers(), start.n_params(), ip_model, filter_times, times_rx)?;
        let operator = ForwardModel::Smooth(SmoothForward::new(adapter, grid)?);
        self.finish(operator, start.to_model_vector(), grid.depths().to_owned(), max_depth)
    }

    fn build_adapter(
        &self, n_layers: usize, n_params: usize, ip_model: IpModel, filter_times: Option<TimeWindow>,
        times_rx: &Array1<f64>,
    ) -> InvResult<ForwardAdapter<F::Solver>> {
        validate_receiver_times(times_rx)?;
        let times = match filter_times {
            Some(window) => window.apply(times_rx)?,
            None => times_rx.clone(),
        };
        let config = ForwardConfig::new(
            self.device.clone(),
            times,
            n_layers,
            n_params,
            ip_model,
            self.resp_trafo.clone(),
            self.return_rhoa,
        )?;
        let solver = self.factory.build(&config)?;
        Ok(ForwardAdapter::new(config, solver))
    }

    fn finish(
        &self, operator: ForwardModel<F::Solver>, start: Array1<f64>, depths: Array1<f64>, max_depth: f64,
    ) -> InvResult<PreparedForward<F::Solver>> {
        let level = log_level(self.verbose);
        log!(
            level,
            "prepare: {} depths, start model of length {} ({:?})",
            depths.len(),
            start.len(),
            operator.parameterization()
        );
        let test_response = operator.response(start.view())?;
        log!(
            level,
            "prepare: parameterCount = {}, test response of length {}",
            operator.n_params(),
            test_response.len()
        );
        Ok(PreparedForward { operator, start, depths, test_response, max_depth })
    }

    fn check_max_depth(&self, deepest: f64, max_depth: f64) -> ConfigResult<()> {
        validate_max_depth(max_depth)?;
        if deepest > max_depth {
            warn!("deepest layer top {deepest} m lies below max_depth {max_depth} m");
        }
        Ok(())
    }
}

fn log_level(verbose: bool) -> Level {
    if verbose { Level::Info } else { Level::Debug }
}

fn check_sounding(times: &Array1<f64>, sounding: &Sounding) -> ConfigResult<()> {
    if sounding.len() != times.len() {
        return Err(ConfigError::DataLengthMismatch { expected: times.len(), found: sounding.len() });
    }
    for (index, (&t, &s)) in times.iter().zip(sounding.times().iter()).enumerate() {
        if (t - s).abs() > 1e-9 * t.abs() {
            return Err(ConfigError::InvalidReceiverTimes {
                index,
                value: s,
                reason: "Sounding times differ from the forward operator's receiver times.",
            });
        }
    }
    Ok(())
}

// ---- Requests and prepared operators ----

/// Start model together with the geometry it lives on.
#[derive(Debug, Clone, PartialEq)]
pub enum StartLayout {
    /// Resistivity per layer on a fixed grid.
    Resistivity { grid: DepthGrid, start: Array1<f64> },
    /// `[n_layers, 4]` IP parameters on a fixed grid.
    Ip { grid: DepthGrid, start: Array2<f64> },
    /// `n_layers - 1` thicknesses and `[n_layers, n_params]` parameters.
    Block { thicknesses: Array1<f64>, start: Array2<f64> },
}

/// Everything a `prepare_*` call needs, so sweeps can re-prepare per run.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardRequest {
    pub layout: StartLayout,
    pub filter_times: Option<TimeWindow>,
    pub max_depth: f64,
    pub times_rx: Array1<f64>,
}

impl ForwardRequest {
    /// Request without a time window and with [`DEFAULT_MAX_DEPTH`].
    pub fn new(layout: StartLayout, times_rx: Array1<f64>) -> Self {
        Self { layout, filter_times: None, max_depth: DEFAULT_MAX_DEPTH, times_rx }
    }

    pub fn with_filter_times(mut self, window: TimeWindow) -> Self {
        self.filter_times = Some(window);
        self
    }

    pub fn with_max_depth(mut self, max_depth: f64) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// A forward operator checked with one evaluation of its start model.
#[derive(Debug)]
pub struct PreparedForward<S> {
    operator: ForwardModel<S>,
    start: Array1<f64>,
    depths: Array1<f64>,
    test_response: Array1<f64>,
    max_depth: f64,
}

impl<S> PreparedForward<S> {
    pub fn operator(&self) -> &ForwardModel<S> {
        &self.operator
    }

    /// Physical start model in the operator's layout.
    pub fn start_model(&self) -> &Array1<f64> {
        &self.start
    }

    /// Layer tops of the grid (start tops in block mode).
    pub fn depths(&self) -> &Array1<f64> {
        &self.depths
    }

    /// Response of the start model.
    pub fn test_response(&self) -> &Array1<f64> {
        &self.test_response
    }

    pub fn max_depth(&self) -> f64 {
        self.max_depth
    }
}

impl<S: ForwardSolver> PreparedForward<S> {
    /// Receiver times after filtering.
    pub fn times(&self) -> &Array1<f64> {
        &self.operator.adapter().config().times_rx
    }

    /// Parameters per layer (1 or 4).
    pub fn parameter_count(&self) -> usize {
        self.operator.n_params()
    }
}

// ---- Settings ----

/// Immutable inversion settings produced by `prepare_inv`.
///
/// `regularization == None` picks the layout default (smoothness for smooth
/// operators, damping for block operators).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InversionSettings {
    pub max_iter: usize,
    pub verbose: bool,
    pub model_transforms: ParameterTransforms,
    pub data_transform: Transform,
    pub regularization: Option<RegularizationKind>,
    pub tol_cost: Option<f64>,
    pub target_chi2: Option<f64>,
    pub solver: SolverKind,
}

impl InversionSettings {
    /// # Errors
    /// - [`ConfigError::InvalidMaxIter`] if `max_iter == 0`.
    pub fn new(max_iter: usize, verbose: bool) -> ConfigResult<Self> {
        if max_iter == 0 {
            return Err(ConfigError::InvalidMaxIter { value: max_iter });
        }
        Ok(Self {
            max_iter,
            verbose,
            model_transforms: ParameterTransforms::default(),
            data_transform: Transform::log(),
            regularization: None,
            tol_cost: Some(DEFAULT_TOL_COST),
            target_chi2: Some(DEFAULT_TARGET_CHI2),
            solver: SolverKind::GaussNewton,
        })
    }

    /// # Errors
    /// - Transform validation errors.
    pub fn with_model_transforms(mut self, transforms: ParameterTransforms) -> ConfigResult<Self> {
        transforms.validate()?;
        self.model_transforms = transforms;
        Ok(self)
    }

    pub fn with_regularization(mut self, kind: RegularizationKind) -> Self {
        self.regularization = Some(kind);
        self
    }

    /// Stopping rules besides `max_iter`; validated by [`InversionSettings::engine_options`].
    pub fn with_stopping(mut self, tol_cost: Option<f64>, target_chi2: Option<f64>) -> Self {
        self.tol_cost = tol_cost;
        self.target_chi2 = target_chi2;
        self
    }

    pub fn with_solver(mut self, solver: SolverKind) -> Self {
        self.solver = solver;
        self
    }

    /// Engine options for these settings.
    ///
    /// # Errors
    /// - Tolerance validation errors from the engine.
    pub fn engine_options(&self) -> InvResult<EngineOptions> {
        let tols = Tolerances::new(self.tol_cost, self.target_chi2, Some(self.max_iter))?;
        Ok(EngineOptions::new(tols, self.solver, self.verbose, None)?)
    }
}

/// Settings plus the regularization weight of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct InversionConfig {
    settings: InversionSettings,
    lambda: f64,
}

impl InversionConfig {
    /// # Errors
    /// - [`ConfigError::InvalidLambda`] unless `lambda` is finite and > 0.
    pub fn new(settings: InversionSettings, lambda: f64) -> ConfigResult<Self> {
        if !lambda.is_finite() || lambda <= 0.0 {
            return Err(ConfigError::InvalidLambda { value: lambda });
        }
        Ok(Self { settings, lambda })
    }

    pub fn settings(&self) -> &InversionSettings {
        &self.settings
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }
}
