//! Adapter that exposes an [`Objective`] as an `argmin` problem.
//!
//! The inversion objective `Φ(θ)` is already a cost, so it is passed to
//! argmin unchanged. Analytic gradients are validated and forwarded; when an
//! objective has none, the cost closure is finite-differenced.
use std::cell::RefCell;

use crate::optimization::{
    engine::{
        finite_diff::run_fd_diff,
        traits::Objective,
        types::{Cost, Grad, Theta},
        validation::validate_grad,
    },
    errors::OptError,
};
use argmin::core::{CostFunction, Error, Gradient};
use finitediff::FiniteDiff;

/// Bridges an [`Objective`] to `argmin`'s `CostFunction` and `Gradient`.
#[derive(Debug, Clone)]
pub struct ArgMinAdapter<'a, F: Objective> {
    pub f: &'a F,
}

impl<'a, F: Objective> ArgMinAdapter<'a, F> {
    pub fn new(f: &'a F) -> Self {
        Self { f }
    }
}

impl<'a, F: Objective> CostFunction for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Output = Cost;

    /// Evaluate `Φ(θ)`.
    ///
    /// # Errors
    /// - Any `OptError` raised by the objective (forward failures included).
    /// - `NonFiniteCost` if the value is not finite.
    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        let output = self.f.value(theta)?;
        if !output.is_finite() {
            return Err((OptError::NonFiniteCost { value: output }).into());
        }
        Ok(output)
    }
}

impl<'a, F: Objective> Gradient for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Gradient = Grad;

    /// Evaluate `∇Φ(θ)`.
    ///
    /// Uses `Objective::grad` when implemented. Otherwise central differences
    /// of the cost are tried first, with a single forward-difference retry
    /// when an evaluation failed or the result did not validate. The FD
    /// closure returns `f64`, so the first error it meets is parked in
    /// `closure_err` and the closure yields `NaN`.
    ///
    /// # Errors
    /// - Errors from `grad` other than `GradientNotImplemented`.
    /// - Errors from cost evaluations performed during FD.
    /// - Gradient validation errors.
    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        let dim = theta.len();
        match self.f.grad(theta) {
            Ok(g) => {
                validate_grad(&g, dim)?;
                Ok(g)
            }
            Err(OptError::GradientNotImplemented) => {
                let closure_err: RefCell<Option<Error>> = RefCell::new(None);
                let cost_func = |theta: &Theta| -> f64 {
                    match self.cost(theta) {
                        Ok(val) => val,
                        Err(e) => {
                            let mut slot = closure_err.borrow_mut();
                            if slot.is_none() {
                                *slot = Some(e);
                            }
                            f64::NAN
                        }
                    }
                };
                let fd_grad = theta.central_diff(&cost_func);
                if closure_err.borrow().is_some() || validate_grad(&fd_grad, dim).is_err() {
                    return Ok(run_fd_diff(theta, &cost_func, &closure_err)?);
                }
                Ok(fd_grad)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::{engine::validation::validate_theta, errors::OptResult};
    use approx::assert_relative_eq;
    use ndarray::array;

    struct Quadratic {
        analytic: bool,
    }

    impl Objective for Quadratic {
        fn value(&self, theta: &Theta) -> OptResult<Cost> {
            Ok((theta[0] - 1.0).powi(2) + 2.0 * theta[1].powi(2))
        }
        fn check(&self, theta: &Theta) -> OptResult<()> {
            validate_theta(theta, 2)
        }
        fn grad(&self, theta: &Theta) -> OptResult<Grad> {
            if self.analytic {
                Ok(array![2.0 * (theta[0] - 1.0), 4.0 * theta[1]])
            } else {
                Err(OptError::GradientNotImplemented)
            }
        }
    }

    struct Failing;

    impl Objective for Failing {
        fn value(&self, _theta: &Theta) -> OptResult<Cost> {
            Err(OptError::NonFiniteCost { value: f64::INFINITY })
        }
        fn check(&self, _theta: &Theta) -> OptResult<()> {
            Ok(())
        }
    }

    #[test]
    // Purpose
    // -------
    // The cost is passed through unchanged; analytic and FD gradients agree.
    //
    // Given
    // -----
    // - `Φ(a, b) = (a - 1)² + 2b²` at `(3, 1)`.
    //
    // Expect
    // ------
    // - `cost = 6`, gradient `≈ (4, 4)` on both paths.
    fn cost_and_gradients_have_no_sign_flip() {
        let theta = array![3.0, 1.0];
        let analytic = Quadratic { analytic: true };
        let numeric = Quadratic { analytic: false };

        assert_eq!(ArgMinAdapter::new(&analytic).cost(&theta).unwrap(), 6.0);
        let g_a = ArgMinAdapter::new(&analytic).gradient(&theta).unwrap();
        let g_n = ArgMinAdapter::new(&numeric).gradient(&theta).unwrap();

        assert_eq!(g_a, array![4.0, 4.0]);
        assert_relative_eq!(g_n[0], 4.0, max_relative = 1e-5);
        assert_relative_eq!(g_n[1], 4.0, max_relative = 1e-5);
    }

    #[test]
    fn failing_cost_surfaces_through_fd_gradient() {
        let adapter = ArgMinAdapter::new(&Failing);

        let err: OptError = adapter.gradient(&array![0.0]).unwrap_err().into();

        assert_eq!(err, OptError::NonFiniteCost { value: f64::INFINITY });
    }
}
