//! Shared fixtures for integration tests.
//!
//! Purpose
//! -------
//! Provide a deterministic stand-in for the external EM solver plus a
//! factory that counts how often solvers are built and evaluated, so tests
//! can assert both results and the absence of solver work on bad input.
//!
//! Conventions
//! -----------
//! - The synthetic decay is `ρ_eff(t) · t^{-5/2}` scaled to volts, where
//!   `ρ_eff` is a Gaussian-weighted geometric mean of layer resistivities
//!   around a diffusion depth `~ sqrt(t)`. It is smooth and positive, not
//!   physical.
#![allow(dead_code)]

use ndarray::{Array, Array1, ArrayView2};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tem_inversion::forward::{
    ForwardConfig, ForwardError, ForwardResult, ForwardSolver, IpModel, ResponseTransform,
};

const DEPTH_SCALE: f64 = 400.0;
const KERNEL_WIDTH: f64 = 2.0;

#[derive(Debug)]
pub struct DecaySolver {
    times: Array1<f64>,
    evaluations: Arc<AtomicUsize>,
}

impl ForwardSolver for DecaySolver {
    fn calc_response(
        &self, layers: ArrayView2<'_, f64>, ip_model: IpModel, _return_rhoa: bool,
        _resp_trafo: &ResponseTransform,
    ) -> ForwardResult<Array1<f64>> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        if layers.ncols() != ip_model.n_params() + 1 {
            return Err(ForwardError::solver("column count does not match the IP model"));
        }
        Ok(self.times.mapv(|t| {
            let centre = DEPTH_SCALE * t.sqrt();
            let (mut num, mut den, mut damping) = (0.0, 0.0, 0.0);
            for row in layers.rows() {
                let w = (-(row[0] - centre).powi(2) / (2.0 * KERNEL_WIDTH.powi(2))).exp() + 1e-6;
                num += w * row[1].ln();
                den += w;
                if row.len() > 2 {
                    damping += w * row[2];
                }
            }
            let rho_eff = (num / den).exp();
            1e-16 * rho_eff * t.powf(-2.5) * (1.0 - 0.5 * damping / den)
        }))
    }
}

/// Counts solver constructions and forward evaluations.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub builds: Arc<AtomicUsize>,
    pub evaluations: Arc<AtomicUsize>,
}

impl Counters {
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }
}

/// Closure factory wired to `counters`.
pub fn counting_factory(counters: &Counters) -> impl Fn(&ForwardConfig) -> ForwardResult<DecaySolver> {
    let counters = counters.clone();
    move |cfg: &ForwardConfig| {
        counters.builds.fetch_add(1, Ordering::SeqCst);
        Ok(DecaySolver { times: cfg.times_rx.clone(), evaluations: Arc::clone(&counters.evaluations) })
    }
}

/// 16 log-spaced receiver gates between 10 µs and 1 ms.
pub fn receiver_times() -> Array1<f64> {
    Array::geomspace(1e-5, 1e-3, 16).expect("positive bounds")
}
