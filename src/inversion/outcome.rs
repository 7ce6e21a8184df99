//! Result of one inversion run, in physical units.
use crate::optimization::engine::{FnEvalMap, IterationRecord};
use ndarray::{Array1, Array2};

/// Final model and misfit summaries of a run.
///
/// `converged == false` means the run stopped at `max_iter` or could not
/// decrease the objective; `model` is still the best model found.
#[derive(Debug, Clone, PartialEq)]
pub struct InversionOutcome {
    /// Flat physical model vector in the operator's layout.
    pub model: Array1<f64>,
    /// `[n_layers, n_params]` parameter matrix.
    pub layers: Array2<f64>,
    /// Layer-top depths in metres.
    pub depths: Array1<f64>,
    /// Simulated response of `model`.
    pub response: Array1<f64>,
    pub phi_d: f64,
    pub phi_m: f64,
    pub chi2: f64,
    /// Relative RMS misfit, percent.
    pub rrms: f64,
    pub lambda: f64,
    pub iterations: usize,
    pub converged: bool,
    pub status: String,
    pub fn_evals: FnEvalMap,
    pub history: Vec<IterationRecord>,
}

impl InversionOutcome {
    /// Resistivity column of [`InversionOutcome::layers`].
    pub fn resistivities(&self) -> Array1<f64> {
        self.layers.column(0).to_owned()
    }
}
