//! Validation helpers for the inversion engine.
//!
//! - **Option checks**: [`verify_tol_cost`], [`verify_target_chi2`].
//! - **Derivative checks**: [`validate_grad`], [`validate_jacobian`].
//! - **Parameter checks**: [`validate_theta`], [`validate_theta_hat`].
//! - **Objective values**: [`validate_value`].
//!
//! Every helper reports the first offending element through a dedicated
//! [`OptError`] variant.
use crate::optimization::{
    engine::types::{Grad, Jacobian, Theta},
    errors::{OptError, OptResult},
};

/// Validate the optional relative cost-change tolerance.
///
/// # Errors
/// Returns [`OptError::InvalidTolCost`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_cost(tol: Option<f64>) -> OptResult<()> {
    if let Some(tol) = tol {
        if !tol.is_finite() {
            return Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be finite." });
        }
        if tol <= 0.0 {
            return Err(OptError::InvalidTolCost { tol, reason: "Tolerance must be positive." });
        }
    }
    Ok(())
}

/// Validate the optional chi-square stopping target.
///
/// # Errors
/// Returns [`OptError::InvalidTargetChi2`] if the value is non-finite or ≤ 0.0.
pub fn verify_target_chi2(value: Option<f64>) -> OptResult<()> {
    if let Some(value) = value {
        if !value.is_finite() {
            return Err(OptError::InvalidTargetChi2 { value, reason: "Target must be finite." });
        }
        if value <= 0.0 {
            return Err(OptError::InvalidTargetChi2 { value, reason: "Target must be positive." });
        }
    }
    Ok(())
}

/// Validate a gradient vector against dimension and finiteness.
///
/// # Errors
/// - [`OptError::GradientDimMismatch`] if length does not match `dim`.
/// - [`OptError::InvalidGradient`] for the first non-finite element.
pub fn validate_grad(grad: &Grad, dim: usize) -> OptResult<()> {
    if grad.len() != dim {
        return Err(OptError::GradientDimMismatch { expected: dim, found: grad.len() });
    }
    for (index, &value) in grad.iter().enumerate() {
        if !value.is_finite() {
            return Err(OptError::InvalidGradient {
                index,
                value,
                reason: "Gradient elements must be finite.",
            });
        }
    }
    Ok(())
}

/// Validate the shape and entries of a Jacobian.
///
/// # Errors
/// - [`OptError::JacobianDimMismatch`] unless the shape is `(n_data, n_model)`.
/// - [`OptError::InvalidJacobian`] for the first non-finite entry.
pub fn validate_jacobian(jacobian: &Jacobian, n_data: usize, n_model: usize) -> OptResult<()> {
    if jacobian.dim() != (n_data, n_model) {
        return Err(OptError::JacobianDimMismatch {
            expected: (n_data, n_model),
            found: jacobian.dim(),
        });
    }
    for ((row, col), &value) in jacobian.indexed_iter() {
        if !value.is_finite() {
            return Err(OptError::InvalidJacobian { row, col, value });
        }
    }
    Ok(())
}

/// Validate a parameter vector before it is handed to an objective.
///
/// # Errors
/// - [`OptError::ParameterLengthMismatch`] if `theta.len() != dim`.
/// - [`OptError::InvalidThetaInput`] for the first non-finite element.
pub fn validate_theta(theta: &Theta, dim: usize) -> OptResult<()> {
    if theta.len() != dim {
        return Err(OptError::ParameterLengthMismatch { expected: dim, found: theta.len() });
    }
    for (index, &value) in theta.iter().enumerate() {
        if !value.is_finite() {
            return Err(OptError::InvalidThetaInput { index, value });
        }
    }
    Ok(())
}

/// Validate and unwrap an estimated parameter vector (`theta_hat`).
///
/// # Errors
/// - [`OptError::MissingThetaHat`] if no vector was provided.
/// - [`OptError::InvalidThetaHat`] if any element is non-finite.
pub fn validate_theta_hat(theta_hat: Option<Theta>) -> OptResult<Theta> {
    match theta_hat {
        Some(t) => {
            for (index, &value) in t.iter().enumerate() {
                if !value.is_finite() {
                    return Err(OptError::InvalidThetaHat {
                        index,
                        value,
                        reason: "Parameter estimates must be finite.",
                    });
                }
            }
            Ok(t)
        }
        None => Err(OptError::MissingThetaHat),
    }
}

/// Validate that an objective value is finite.
///
/// # Errors
/// Returns [`OptError::NonFiniteCost`] if the value is `NaN` or infinite.
pub fn validate_value(value: f64) -> OptResult<()> {
    if !value.is_finite() {
        return Err(OptError::NonFiniteCost { value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    #[test]
    fn tolerances_must_be_positive_and_finite() {
        assert!(verify_tol_cost(None).is_ok());
        assert!(matches!(verify_tol_cost(Some(0.0)), Err(OptError::InvalidTolCost { .. })));
        assert!(matches!(verify_target_chi2(Some(f64::NAN)), Err(OptError::InvalidTargetChi2 { .. })));
        assert!(verify_target_chi2(Some(1.0)).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // Jacobian validation reports shape first, then the first non-finite
    // entry in row-major order.
    fn jacobian_validation_reports_shape_then_entries() {
        let mut j = Array2::zeros((2, 3));
        assert!(validate_jacobian(&j, 2, 3).is_ok());
        assert_eq!(
            validate_jacobian(&j, 3, 2),
            Err(OptError::JacobianDimMismatch { expected: (3, 2), found: (2, 3) })
        );

        j[[1, 0]] = f64::NAN;
        assert!(matches!(
            validate_jacobian(&j, 2, 3),
            Err(OptError::InvalidJacobian { row: 1, col: 0, .. })
        ));
    }

    #[test]
    fn theta_checks_cover_length_and_finiteness() {
        assert!(validate_theta(&array![1.0, 2.0], 2).is_ok());
        assert_eq!(
            validate_theta(&array![1.0], 2),
            Err(OptError::ParameterLengthMismatch { expected: 2, found: 1 })
        );
        assert!(matches!(
            validate_theta_hat(Some(array![f64::INFINITY])),
            Err(OptError::InvalidThetaHat { index: 0, .. })
        ));
        assert_eq!(validate_theta_hat(None), Err(OptError::MissingThetaHat));
    }

    #[test]
    fn gradient_checks_match_dimension() {
        assert_eq!(
            validate_grad(&array![1.0], 2),
            Err(OptError::GradientDimMismatch { expected: 2, found: 1 })
        );
        assert!(validate_value(f64::NEG_INFINITY).is_err());
    }
}
