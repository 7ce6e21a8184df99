//! Python conversion helpers and the bridge to Python forward solvers.
//!
//! Everything here is compiled only with the `python-bindings` feature.
//! [`PySolverFactory`] calls a Python factory
//! `factory(setup_device, times_rx, nlayer, nparam)` once per prepare call;
//! the returned object must provide
//! `calc_response(matrix, ip_modeltype=…, return_rhoa=…, resp_trafo=…)`.
#[cfg(feature = "python-bindings")]
use ndarray::{Array1, Array2, ArrayView2};

#[cfg(feature = "python-bindings")]
use pyo3::{
    exceptions::{PyTypeError, PyValueError},
    prelude::*,
    types::{PyAny, PyDict},
};

#[cfg(feature = "python-bindings")]
use numpy::{
    IntoPyArray,    // Array → PyArray
    PyArrayMethods, // .readonly()
    PyReadonlyArray1, PyReadonlyArray2,
};

#[cfg(feature = "python-bindings")]
use crate::forward::{
    config::{DeviceSetup, ForwardConfig, IpModel, ResponseTransform},
    errors::{ForwardError, ForwardResult},
    solver::{ForwardSolver, SolverFactory},
};

#[cfg(feature = "python-bindings")]
#[inline]
pub fn extract_f64_array<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<PyReadonlyArray1<'py, f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray1<f64>>() {
        if arr_ro.as_slice().is_ok() {
            return Ok(arr_ro);
        }
    }

    let vec: Vec<f64> = raw_data.extract().map_err(|_| {
        PyTypeError::new_err("expected a 1-D numpy.ndarray or sequence of float64")
    })?;
    Ok(vec.into_pyarray(py).readonly())
}

/// 1-D float input copied into an owned `Array1`.
#[cfg(feature = "python-bindings")]
pub fn extract_vector<'py>(py: Python<'py>, raw_data: &Bound<'py, PyAny>) -> PyResult<Array1<f64>> {
    let arr = extract_f64_array(py, raw_data)?;
    Ok(arr.as_array().to_owned())
}

/// 2-D float input (ndarray or nested sequences) copied into an owned `Array2`.
#[cfg(feature = "python-bindings")]
pub fn extract_matrix(raw_data: &Bound<'_, PyAny>) -> PyResult<Array2<f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray2<f64>>() {
        return Ok(arr_ro.as_array().to_owned());
    }
    let rows: Vec<Vec<f64>> = raw_data.extract().map_err(|_| {
        PyTypeError::new_err("expected a 2-D numpy.ndarray or nested sequence of float64")
    })?;
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != n_cols) {
        return Err(PyValueError::new_err("rows of the start model must all have the same length"));
    }
    Array2::from_shape_vec((n_rows, n_cols), rows.into_iter().flatten().collect())
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Device setup from a Python dict; missing keys keep their defaults.
#[cfg(feature = "python-bindings")]
pub fn extract_device_setup(setup: &Bound<'_, PyDict>) -> PyResult<DeviceSetup> {
    let mut device = DeviceSetup::default();
    if let Some(v) = setup.get_item("device")? {
        device.name = v.extract()?;
    }
    if let Some(v) = setup.get_item("tx_loop")? {
        device.tx_loop = v.extract()?;
    }
    if let Some(v) = setup.get_item("rx_loop")? {
        device.rx_loop = v.extract()?;
    }
    if let Some(v) = setup.get_item("timekey")? {
        device.time_key = v.extract()?;
    }
    if let Some(v) = setup.get_item("currentkey")? {
        device.current_key = v.extract()?;
    }
    if let Some(v) = setup.get_item("current_inj")? {
        device.current_inj = v.extract()?;
    }
    if let Some(v) = setup.get_item("filter_powerline")? {
        device.filter_powerline = v.extract()?;
    }
    Ok(device)
}

/// Inverse of [`extract_device_setup`], handed to the Python factory.
#[cfg(feature = "python-bindings")]
pub fn device_setup_to_dict<'py>(py: Python<'py>, device: &DeviceSetup) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("device", &device.name)?;
    dict.set_item("tx_loop", device.tx_loop)?;
    dict.set_item("rx_loop", device.rx_loop)?;
    dict.set_item("timekey", device.time_key)?;
    dict.set_item("currentkey", device.current_key)?;
    dict.set_item("current_inj", device.current_inj)?;
    dict.set_item("filter_powerline", device.filter_powerline)?;
    Ok(dict)
}

/// Python object exposing `calc_response`.
#[cfg(feature = "python-bindings")]
#[derive(Debug)]
pub struct PySolver {
    inner: Py<PyAny>,
}

#[cfg(feature = "python-bindings")]
impl ForwardSolver for PySolver {
    fn calc_response(
        &self, layers: ArrayView2<'_, f64>, ip_model: IpModel, return_rhoa: bool,
        resp_trafo: &ResponseTransform,
    ) -> ForwardResult<Array1<f64>> {
        Python::with_gil(|py| {
            let call = || -> PyResult<Array1<f64>> {
                let matrix = layers.to_owned().into_pyarray(py);
                let kwargs = PyDict::new(py);
                kwargs.set_item("ip_modeltype", ip_model.solver_name())?;
                kwargs.set_item("return_rhoa", return_rhoa)?;
                kwargs.set_item("resp_trafo", resp_trafo.solver_name())?;
                let response = self.inner.bind(py).call_method("calc_response", (matrix,), Some(&kwargs))?;
                extract_vector(py, &response)
            };
            call().map_err(|e| ForwardError::solver(e.to_string()))
        })
    }
}

/// Python callable `factory(setup_device, times_rx, nlayer, nparam)`.
///
/// `nparam` is [`ForwardConfig::solver_nparam`]: 2 for resistivity-only
/// operators, 4 for IP operators.
#[cfg(feature = "python-bindings")]
#[derive(Debug)]
pub struct PySolverFactory {
    callable: Py<PyAny>,
}

#[cfg(feature = "python-bindings")]
impl PySolverFactory {
    /// # Errors
    /// - `TypeError` if `callable` is not callable.
    pub fn new(callable: &Bound<'_, PyAny>) -> PyResult<Self> {
        if !callable.is_callable() {
            return Err(PyTypeError::new_err("solver_factory must be callable"));
        }
        Ok(Self { callable: callable.clone().unbind() })
    }
}

#[cfg(feature = "python-bindings")]
impl SolverFactory for PySolverFactory {
    type Solver = PySolver;

    fn build(&self, config: &ForwardConfig) -> ForwardResult<PySolver> {
        Python::with_gil(|py| {
            let call = || -> PyResult<PySolver> {
                let setup = device_setup_to_dict(py, &config.device)?;
                let times = config.times_rx.clone().into_pyarray(py);
                let solver = self.callable.bind(py).call1((setup, times, config.n_layers, config.solver_nparam()))?;
                Ok(PySolver { inner: solver.unbind() })
            };
            call().map_err(|e| ForwardError::SolverSetup { message: e.to_string() })
        })
    }
}
