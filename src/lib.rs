//! tem_inversion — smooth fixed-depth 1D inversion of TEM soundings.
//!
//! Purpose
//! -------
//! Serve as the crate root for Rust callers and as the PyO3 bridge that
//! exposes the inversion driver to Python via the `_tem_inversion` extension
//! module. The crate does not simulate electromagnetics itself: forward
//! responses come from an external solver behind [`forward::ForwardSolver`].
//!
//! Key behaviors
//! -------------
//! - [`model`]: depth grids, model-vector layouts and start models.
//! - [`forward`]: solver configuration and the forward operators that turn a
//!   flat model vector into a simulated decay curve.
//! - [`optimization`]: transforms, regularization and the Gauss–Newton /
//!   L-BFGS engine minimizing `Φ_d + λ Φ_m`.
//! - [`inversion`]: the driver (`prepare_fwd`, `prepare_fwd_ip`,
//!   `prepare_inv`, `invert`) and lambda exploration.
//! - With `python-bindings`, a `TemSmoothInversion` class whose forward
//!   solver is built by a Python factory callable.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every configuration fault is reported before any solver work where
//!   possible and is never repaired silently.
//! - A forward operator is built fresh for every prepare call and discarded
//!   after the run.
//!
//! Conventions
//! -----------
//! - Depths in metres, resistivities in Ω·m, receiver times in seconds,
//!   time windows in microseconds.
//! - Errors from core Rust code are rich error types internally and are
//!   converted to `ValueError` (configuration) or `RuntimeError` (everything
//!   else) at the PyO3 boundary.
//!
//! Testing notes
//! -------------
//! - Unit tests live beside each module; end-to-end scenarios with mock
//!   solvers live under `tests/`.

pub mod forward;
pub mod inversion;
pub mod model;
pub mod optimization;
pub mod utils;

#[cfg(feature = "python-bindings")]
use pyo3::{
    exceptions::{PyRuntimeError, PyValueError},
    prelude::*,
    types::{PyAny, PyDict},
};

#[cfg(feature = "python-bindings")]
use numpy::{IntoPyArray, PyArray1, PyArray2};

#[cfg(feature = "python-bindings")]
use crate::{
    forward::config::{IpModel, ResponseTransform, TimeWindow},
    inversion::{
        InversionConfig, InversionOutcome, InversionSettings, PreparedForward, Sounding,
        TemSmoothInversion as Driver,
    },
    model::DepthGrid,
    utils::{
        PySolver, PySolverFactory, extract_device_setup, extract_matrix, extract_vector,
    },
};

/// TemSmoothInversion — Python-facing wrapper for the inversion driver.
///
/// Purpose
/// -------
/// Expose `prepare_fwd`, `prepare_fwd_ip`, `prepare_inv` and `run` to Python
/// with the forward solver built by a Python factory.
///
/// Parameters
/// ----------
/// Constructed from Python via
/// `TemSmoothInversion(setup_device, solver_factory, ip_model="pelton",
/// resp_trafo=None, return_rhoa=False, rho_bounds=(1.0, 1000.0), verbose=False)`:
/// - `setup_device`: `dict`
///   Instrument keys (`device`, `tx_loop`, `rx_loop`, `timekey`,
///   `currentkey`, `current_inj`, `filter_powerline`); missing keys keep
///   their defaults.
/// - `solver_factory`: callable
///   `factory(setup_device, times_rx, nlayer, nparam)` returning an object
///   with `calc_response(matrix, ip_modeltype=…, return_rhoa=…, resp_trafo=…)`.
///   `nparam` is 2 for `prepare_fwd` and 4 for `prepare_fwd_ip`.
///
/// Invariants
/// ----------
/// - `prepared` and `settings` are replaced wholesale by each prepare call; a
///   failed prepare clears `prepared` so no partial state survives.
///
/// Notes
/// -----
/// - Native Rust callers should use [`inversion::TemSmoothInversion`]
///   directly; its methods are free of hidden state.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "tem_inversion", name = "TemSmoothInversion", unsendable)]
pub struct PyTemSmoothInversion {
    inner: Driver<PySolverFactory>,
    prepared: Option<PreparedForward<PySolver>>,
    settings: Option<InversionSettings>,
}

#[cfg(feature = "python-bindings")]
impl PyTemSmoothInversion {
    fn store(&mut self, prepared: inversion::InvResult<PreparedForward<PySolver>>) -> PyResult<Py<PyArray1<f64>>> {
        self.prepared = None;
        let prepared = prepared?;
        let response = Python::with_gil(|py| prepared.test_response().clone().into_pyarray(py).unbind());
        self.prepared = Some(prepared);
        Ok(response)
    }
}

#[cfg(feature = "python-bindings")]
fn window(filter_times: Option<(f64, f64)>) -> PyResult<Option<TimeWindow>> {
    filter_times
        .map(|(t_min, t_max)| TimeWindow::new(t_min, t_max))
        .transpose()
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl PyTemSmoothInversion {
    #[new]
    #[pyo3(
        signature = (
            setup_device,
            solver_factory,
            ip_model = "pelton",
            resp_trafo = None,
            return_rhoa = false,
            rho_bounds = (1.0, 1000.0),
            verbose = false,
        ),
        text_signature = "(setup_device, solver_factory, /, ip_model='pelton', resp_trafo=None, \
                          return_rhoa=False, rho_bounds=(1.0, 1000.0), verbose=False)"
    )]
    pub fn new(
        setup_device: &Bound<'_, PyDict>, solver_factory: &Bound<'_, PyAny>, ip_model: &str,
        resp_trafo: Option<String>, return_rhoa: bool, rho_bounds: (f64, f64), verbose: bool,
    ) -> PyResult<Self> {
        let device = extract_device_setup(setup_device)?;
        let factory = PySolverFactory::new(solver_factory)?;
        let ip_model: IpModel = ip_model.parse().map_err(|e: model::ConfigError| PyValueError::new_err(e.to_string()))?;
        let inner = Driver::new(device, factory)
            .with_ip_model(ip_model)
            .and_then(|d| d.with_resistivity_bounds(rho_bounds.0, rho_bounds.1))
            .map_err(|e| PyValueError::new_err(e.to_string()))?
            .with_response_transform(ResponseTransform::from(resp_trafo))
            .with_return_rhoa(return_rhoa)
            .with_verbose(verbose);
        Ok(Self { inner, prepared: None, settings: None })
    }

    /// Prepare a resistivity-only operator; returns the start-model response.
    #[pyo3(signature = (depth_vector, start_model, times_rx, filter_times = None, max_depth = 30.0))]
    pub fn prepare_fwd<'py>(
        &mut self, py: Python<'py>, depth_vector: &Bound<'py, PyAny>, start_model: &Bound<'py, PyAny>,
        times_rx: &Bound<'py, PyAny>, filter_times: Option<(f64, f64)>, max_depth: f64,
    ) -> PyResult<Py<PyArray1<f64>>> {
        let grid = DepthGrid::new(extract_vector(py, depth_vector)?).map_err(|e| PyValueError::new_err(e.to_string()))?;
        let start = extract_vector(py, start_model)?;
        let times = extract_vector(py, times_rx)?;
        let window = window(filter_times)?;
        let prepared = self.inner.prepare_fwd(&grid, start.view(), window, max_depth, &times);
        self.store(prepared)
    }

    /// Prepare a four-parameter IP operator; returns the start-model response.
    #[pyo3(signature = (depth_vector, start_model, times_rx, filter_times = None, max_depth = 30.0))]
    pub fn prepare_fwd_ip<'py>(
        &mut self, py: Python<'py>, depth_vector: &Bound<'py, PyAny>, start_model: &Bound<'py, PyAny>,
        times_rx: &Bound<'py, PyAny>, filter_times: Option<(f64, f64)>, max_depth: f64,
    ) -> PyResult<Py<PyArray1<f64>>> {
        let grid = DepthGrid::new(extract_vector(py, depth_vector)?).map_err(|e| PyValueError::new_err(e.to_string()))?;
        let start = extract_matrix(start_model)?;
        let times = extract_vector(py, times_rx)?;
        let window = window(filter_times)?;
        let prepared = self.inner.prepare_fwd_ip(&grid, start.view(), window, max_depth, &times);
        self.store(prepared)
    }

    #[pyo3(signature = (max_iter = 20, verbose = true))]
    pub fn prepare_inv(&mut self, max_iter: usize, verbose: bool) -> PyResult<()> {
        self.settings = Some(self.inner.prepare_inv(max_iter, verbose)?);
        Ok(())
    }

    /// Invert `data` with relative errors `rel_error` at weight `lam`.
    #[pyo3(signature = (data, rel_error = 0.03, lam = 100.0))]
    pub fn run<'py>(
        &self, py: Python<'py>, data: &Bound<'py, PyAny>, rel_error: f64, lam: f64,
    ) -> PyResult<TemInversionResult> {
        let prepared = self
            .prepared
            .as_ref()
            .ok_or_else(|| PyRuntimeError::new_err("call prepare_fwd or prepare_fwd_ip first"))?;
        let settings = self
            .settings
            .clone()
            .ok_or_else(|| PyRuntimeError::new_err("call prepare_inv first"))?;
        let observed = extract_vector(py, data)?;
        let sounding = Sounding::with_constant_error(prepared.times().clone(), observed, rel_error)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        let config = InversionConfig::new(settings, lam).map_err(|e| PyValueError::new_err(e.to_string()))?;
        let inner = py.allow_threads(|| self.inner.invert(prepared, &config, &sounding))?;
        Ok(TemInversionResult { inner })
    }

    #[getter]
    #[allow(non_snake_case)]
    pub fn parameterCount(&self) -> Option<usize> {
        self.prepared.as_ref().map(PreparedForward::parameter_count)
    }

    #[getter]
    pub fn test_response<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyArray1<f64>>> {
        self.prepared.as_ref().map(|p| p.test_response().clone().into_pyarray(py))
    }
}

/// TemInversionResult — read-only view of one inversion outcome.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "tem_inversion")]
pub struct TemInversionResult {
    pub inner: InversionOutcome,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl TemInversionResult {
    #[getter]
    pub fn model<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.inner.model.clone().into_pyarray(py)
    }

    #[getter]
    pub fn layers<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        self.inner.layers.clone().into_pyarray(py)
    }

    #[getter]
    pub fn depths<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.inner.depths.clone().into_pyarray(py)
    }

    #[getter]
    pub fn response<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.inner.response.clone().into_pyarray(py)
    }

    #[getter]
    pub fn phi_d(&self) -> f64 {
        self.inner.phi_d
    }

    #[getter]
    pub fn phi_m(&self) -> f64 {
        self.inner.phi_m
    }

    #[getter]
    pub fn chi2(&self) -> f64 {
        self.inner.chi2
    }

    #[getter]
    pub fn rrms(&self) -> f64 {
        self.inner.rrms
    }

    #[getter]
    pub fn converged(&self) -> bool {
        self.inner.converged
    }

    #[getter]
    pub fn status(&self) -> String {
        self.inner.status.clone()
    }

    #[getter]
    pub fn iterations(&self) -> usize {
        self.inner.iterations
    }

    #[getter]
    pub fn fn_evals(&self) -> Vec<(String, u64)> {
        self.inner.fn_evals.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }
}

#[cfg(feature = "python-bindings")]
#[pymodule]
fn _tem_inversion<'py>(_py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    m.add_class::<PyTemSmoothInversion>()?;
    m.add_class::<TemInversionResult>()?;
    Ok(())
}
