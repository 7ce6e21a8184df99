//! External forward-solver contract.
//!
//! Purpose
//! -------
//! The EM forward physics live outside this crate. [`ForwardSolver`] is the
//! seam: given a `[n_layers, 1 + n_params]` layer matrix (depth column first)
//! it returns one simulated value per receiver time. [`SolverFactory`] builds
//! a fresh solver for every prepared forward operator, mirroring how survey
//! scripts instantiate one solver per depth grid.
//!
//! Invariants & assumptions
//! ------------------------
//! - Solvers are pure with respect to the layer matrix: the same matrix
//!   yields the same response.
//! - `thread_safe()` advertises whether concurrent `calc_response` calls are
//!   safe; the inversion engine only parallelizes Jacobian columns when it
//!   returns `true`.
//!
//! Downstream usage
//! ----------------
//! - [`crate::forward::adapter::ForwardAdapter`] is the only caller of
//!   `calc_response`.
//! - Closures `Fn(&ForwardConfig) -> ForwardResult<S>` are factories.
use crate::forward::{
    config::{ForwardConfig, IpModel, ResponseTransform},
    errors::ForwardResult,
};
use ndarray::{Array1, ArrayView2};
use std::sync::Arc;

/// Low-level TEM forward solver.
pub trait ForwardSolver: Send + Sync {
    /// Simulate the response of a layered earth.
    ///
    /// `layers` has one row per layer; column 0 holds the layer-top depth,
    /// the remaining columns the physical parameters in
    /// [`crate::model::ParamKind`] order.
    fn calc_response(
        &self, layers: ArrayView2<'_, f64>, ip_model: IpModel, return_rhoa: bool,
        resp_trafo: &ResponseTransform,
    ) -> ForwardResult<Array1<f64>>;

    /// Whether concurrent `calc_response` calls are safe.
    fn thread_safe(&self) -> bool {
        false
    }
}

impl<T: ForwardSolver + ?Sized> ForwardSolver for Arc<T> {
    fn calc_response(
        &self, layers: ArrayView2<'_, f64>, ip_model: IpModel, return_rhoa: bool,
        resp_trafo: &ResponseTransform,
    ) -> ForwardResult<Array1<f64>> {
        (**self).calc_response(layers, ip_model, return_rhoa, resp_trafo)
    }

    fn thread_safe(&self) -> bool {
        (**self).thread_safe()
    }
}

impl<T: ForwardSolver + ?Sized> ForwardSolver for Box<T> {
    fn calc_response(
        &self, layers: ArrayView2<'_, f64>, ip_model: IpModel, return_rhoa: bool,
        resp_trafo: &ResponseTransform,
    ) -> ForwardResult<Array1<f64>> {
        (**self).calc_response(layers, ip_model, return_rhoa, resp_trafo)
    }

    fn thread_safe(&self) -> bool {
        (**self).thread_safe()
    }
}

/// Builds one solver per forward configuration.
pub trait SolverFactory {
    type Solver: ForwardSolver;

    /// Construct a solver for `config`.
    ///
    /// # Errors
    /// Implementations return [`crate::forward::ForwardError::SolverSetup`]
    /// when the device or geometry is not supported.
    fn build(&self, config: &ForwardConfig) -> ForwardResult<Self::Solver>;
}

impl<F, S> SolverFactory for F
where
    F: Fn(&ForwardConfig) -> ForwardResult<S>,
    S: ForwardSolver,
{
    type Solver = S;

    fn build(&self, config: &ForwardConfig) -> ForwardResult<S> {
        self(config)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Synthetic smooth-kernel solver for unit tests.
    //!
    //! The response at gate `k` is a weighted geometric mean of layer
    //! resistivities, with Gaussian weights centred on a depth that grows as
    //! `sqrt(t_k)`. IP columns damp the response by a chargeability-weighted
    //! factor. This is not physics; it is a smooth, well-conditioned map.
    use super::*;
    use crate::forward::errors::ForwardError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) const DEPTH_SCALE: f64 = 400.0;
    pub(crate) const KERNEL_WIDTH: f64 = 2.0;

    #[derive(Debug)]
    pub(crate) struct KernelSolver {
        pub times: Array1<f64>,
        pub calls: Arc<AtomicUsize>,
        pub parallel: bool,
    }

    impl KernelSolver {
        pub(crate) fn new(times: Array1<f64>) -> Self {
            Self { times, calls: Arc::new(AtomicUsize::new(0)), parallel: false }
        }
    }

    impl ForwardSolver for KernelSolver {
        fn calc_response(
            &self, layers: ArrayView2<'_, f64>, _ip_model: IpModel, _return_rhoa: bool,
            _resp_trafo: &ResponseTransform,
        ) -> ForwardResult<Array1<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if layers.ncols() < 2 {
                return Err(ForwardError::solver("layer matrix needs a depth column"));
            }
            let response = self.times.mapv(|t| {
                let centre = DEPTH_SCALE * t.sqrt();
                let mut num = 0.0;
                let mut den = 0.0;
                let mut damping = 0.0;
                for row in layers.rows() {
                    let w = (-(row[0] - centre).powi(2) / (2.0 * KERNEL_WIDTH.powi(2))).exp() + 1e-6;
                    num += w * row[1].ln();
                    den += w;
                    if row.len() > 2 {
                        damping += w * row[2];
                    }
                }
                (num / den).exp() * (1.0 - 0.5 * damping / den)
            });
            Ok(response)
        }

        fn thread_safe(&self) -> bool {
            self.parallel
        }
    }
}
