//! engine::finite_diff — finite-difference Jacobians and gradients.
//!
//! Purpose
//! -------
//! The forward solver is a black box, so sensitivities are approximated by
//! finite differences. This module provides the Jacobian of a vector-valued
//! map (used by Gauss–Newton) and the error-capturing forward-difference
//! gradient used by the L-BFGS adapter.
//!
//! Key behaviors
//! -------------
//! - [`jacobian`]: forward differences with a relative step
//!   `h_j = JACOBIAN_REL_STEP · max(|θ_j|, 1)`, one map evaluation per
//!   column. Columns are evaluated in parallel with rayon when requested;
//!   the first failing evaluation aborts the whole Jacobian.
//! - [`run_fd_diff`]: `finitediff` forward-difference gradient; an error
//!   raised inside the scalar closure is captured and returned instead of
//!   the gradient.
//!
//! Invariants & assumptions
//! ------------------------
//! - Returned Jacobians and gradients pass [`validate_jacobian`] /
//!   [`validate_grad`].
//! - Differences are taken in transformed model space.
//!
//! Testing notes
//! -------------
//! - Unit tests cover accuracy on a smooth map, equality of the serial and
//!   parallel paths, and error propagation from a failing evaluation.
use crate::optimization::{
    engine::{
        types::{Grad, Jacobian, Theta},
        validation::{validate_grad, validate_jacobian},
    },
    errors::{OptError, OptResult},
};
use argmin::core::Error;
use finitediff::FiniteDiff;
use ndarray::Array1;
use rayon::prelude::*;
use std::cell::RefCell;

/// Relative forward-difference step for Jacobian columns.
pub const JACOBIAN_REL_STEP: f64 = 1e-4;

/// Forward-difference Jacobian of `f` at `theta`.
///
/// `f0` must be `f(theta)`; it is reused for every column.
///
/// # Errors
/// - The first error returned by `f`.
/// - [`OptError::JacobianDimMismatch`] if a column has the wrong length.
/// - [`OptError::InvalidJacobian`] for non-finite sensitivities.
pub fn jacobian<F>(f: F, theta: &Theta, f0: &Array1<f64>, parallel: bool) -> OptResult<Jacobian>
where
    F: Fn(&Theta) -> OptResult<Array1<f64>> + Sync,
{
    let n_model = theta.len();
    let n_data = f0.len();
    let column = |j: usize| -> OptResult<Array1<f64>> {
        let h = JACOBIAN_REL_STEP * theta[j].abs().max(1.0);
        let mut shifted = theta.clone();
        shifted[j] += h;
        let fj = f(&shifted)?;
        if fj.len() != n_data {
            return Err(OptError::JacobianDimMismatch {
                expected: (n_data, n_model),
                found: (fj.len(), n_model),
            });
        }
        Ok((fj - f0) / h)
    };

    let columns: Vec<Array1<f64>> = if parallel {
        (0..n_model).into_par_iter().map(column).collect::<OptResult<_>>()?
    } else {
        (0..n_model).map(column).collect::<OptResult<_>>()?
    };

    let mut jac = Jacobian::zeros((n_data, n_model));
    for (j, col) in columns.iter().enumerate() {
        jac.column_mut(j).assign(col);
    }
    validate_jacobian(&jac, n_data, n_model)?;
    Ok(jac)
}

/// Forward-difference gradient of `func` at `theta`, with error capture.
///
/// The FD closure can't return `Result`, so `func` is expected to store the
/// first error it hits into `closure_err` and return `NaN`. This helper
/// clears `closure_err`, runs `forward_diff`, returns any captured error and
/// otherwise validates the gradient.
///
/// # Errors
/// - Any error captured during evaluation of `func`.
/// - [`OptError::GradientDimMismatch`] / [`OptError::InvalidGradient`] from
///   validation.
pub fn run_fd_diff<G: Fn(&Theta) -> f64>(
    theta: &Theta, func: &G, closure_err: &RefCell<Option<Error>>,
) -> OptResult<Grad> {
    closure_err.replace(None);
    let fd_grad = theta.forward_diff(func);
    let dim = theta.len();
    if let Some(err) = closure_err.take() {
        return Err(err.into());
    }
    validate_grad(&fd_grad, dim)?;
    Ok(fd_grad)
}
