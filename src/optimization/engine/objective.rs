//! engine::objective — the regularized TEM misfit functional.
//!
//! Purpose
//! -------
//! Bind a forward operator, model and data transforms, observed data with
//! their relative errors, a regularization operator and a regularization
//! weight into one objective
//!
//! ```text
//! Φ(y) = Σ_i [w_i (T_d(d_i) - T_d(f_i(T_m⁻¹(y))))]² + λ ||C (y - y_ref)||²
//! ```
//!
//! that both engine solvers can minimize.
//!
//! Key behaviors
//! -------------
//! - Data weights `w_i = 1 / (ε_i · |d_i| · T_d'(d_i))`, i.e. the inverse
//!   relative error propagated through the data transform.
//! - `χ² = Φ_d / N`; relative RMS `100 · sqrt(mean(((d - f)/d)²))`.
//! - The gradient is analytic given the finite-difference Jacobian:
//!   `∇Φ = -2 Jᵀ r + 2 λ Cᵀ r_m`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Observed data, relative errors and the reference model are validated
//!   once at construction; lengths must match the operator.
//! - Forward failures are returned as
//!   [`crate::optimization::errors::OptError::Forward`] unchanged.
//! - Non-finite responses are not rejected here; they make `Φ` non-finite
//!   and the solvers decide what to do with that.
use crate::forward::operator::ForwardOperator;
use crate::model::errors::ConfigError;
use crate::optimization::{
    engine::{
        finite_diff::jacobian,
        traits::{LeastSquaresProblem, Misfit, Objective},
        types::{Cost, Grad, Jacobian, Theta},
        validation::validate_theta,
    },
    errors::OptResult,
    regularization::Regularization,
    transforms::{CumulativeTransform, Transform},
};
use ndarray::{Array1, ArrayView1, ArrayView2};

/// Regularized misfit bound to one forward operator.
#[derive(Debug)]
pub struct RegularizedObjective<'a, O: ?Sized> {
    operator: &'a O,
    model_trans: CumulativeTransform,
    data_trans: Transform,
    observed: Array1<f64>,
    observed_w: Array1<f64>,
    weights: Array1<f64>,
    regularization: Regularization,
    reference: Theta,
    lambda: f64,
}

impl<'a, O: ForwardOperator + ?Sized> RegularizedObjective<'a, O> {
    /// Bind all objective terms.
    ///
    /// `reference` is the physical reference model (usually the start
    /// model); it is stored in transformed space.
    ///
    /// # Errors
    /// - [`ConfigError::DataLengthMismatch`] if `observed` or `rel_error`
    ///   differ in length from the operator's response.
    /// - [`ConfigError::InvalidObservation`] / [`ConfigError::InvalidRelativeError`]
    ///   for the first offending datum.
    /// - [`ConfigError::ModelLengthMismatch`] if the transform, the
    ///   regularization or the reference do not cover the model vector.
    /// - [`ConfigError::InvalidLambda`] unless `lambda` is finite and > 0.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        operator: &'a O, model_trans: CumulativeTransform, data_trans: Transform,
        observed: ArrayView1<'_, f64>, rel_error: ArrayView1<'_, f64>, regularization: Regularization,
        reference: ArrayView1<'_, f64>, lambda: f64,
    ) -> OptResult<Self> {
        let n_data = operator.data_len();
        let n_model = operator.model_len();
        if !lambda.is_finite() || lambda <= 0.0 {
            return Err(ConfigError::InvalidLambda { value: lambda }.into());
        }
        for found in [observed.len(), rel_error.len()] {
            if found != n_data {
                return Err(ConfigError::DataLengthMismatch { expected: n_data, found }.into());
            }
        }
        for found in [model_trans.len(), regularization.model_len(), reference.len()] {
            if found != n_model {
                return Err(ConfigError::ModelLengthMismatch { expected: n_model, found }.into());
            }
        }
        data_trans.validate()?;
        let mut weights = Array1::zeros(n_data);
        for (index, (&d, &e)) in observed.iter().zip(rel_error.iter()).enumerate() {
            if !d.is_finite() {
                return Err(ConfigError::InvalidObservation {
                    index,
                    value: d,
                    reason: "Observations must be finite.",
                }
                .into());
            }
            if !data_trans.in_domain(d) {
                return Err(ConfigError::InvalidObservation {
                    index,
                    value: d,
                    reason: "Observation is outside the domain of the data transform.",
                }
                .into());
            }
            if !e.is_finite() || e <= 0.0 {
                return Err(ConfigError::InvalidRelativeError { index, value: e }.into());
            }
            let w = 1.0 / (e * d.abs() * data_trans.deriv(d));
            if !w.is_finite() || w <= 0.0 {
                return Err(ConfigError::InvalidObservation {
                    index,
                    value: d,
                    reason: "Observation yields a degenerate data weight.",
                }
                .into());
            }
            weights[index] = w;
        }
        let observed_w = observed.mapv(|d| data_trans.forward(d)) * &weights;
        let reference = model_trans.forward(reference)?;
        Ok(Self {
            operator,
            model_trans,
            data_trans,
            observed: observed.to_owned(),
            observed_w,
            weights,
            regularization,
            reference,
            lambda,
        })
    }

    /// Physical model → transformed model.
    pub fn to_transformed(&self, model: ArrayView1<'_, f64>) -> OptResult<Theta> {
        Ok(self.model_trans.forward(model)?)
    }

    /// Transformed model → physical model.
    pub fn to_physical(&self, theta: &Theta) -> OptResult<Array1<f64>> {
        Ok(self.model_trans.inverse(theta.view())?)
    }

    /// Simulated response (data space) of a transformed model.
    pub fn predict(&self, theta: &Theta) -> OptResult<Array1<f64>> {
        let model = self.to_physical(theta)?;
        Ok(self.operator.response(model.view())?)
    }

    /// Weighted transformed response `w ∘ T_d(f)`.
    fn weighted_prediction(&self, theta: &Theta) -> OptResult<Array1<f64>> {
        let response = self.predict(theta)?;
        Ok(self.weight(&response))
    }

    fn weight(&self, response: &Array1<f64>) -> Array1<f64> {
        let mut out = response.mapv(|f| self.data_trans.forward(f));
        out *= &self.weights;
        out
    }

    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    pub fn observed(&self) -> &Array1<f64> {
        &self.observed
    }

    /// Reference model in transformed space.
    pub fn reference(&self) -> &Theta {
        &self.reference
    }

    pub fn regularization(&self) -> &Regularization {
        &self.regularization
    }

    pub fn operator(&self) -> &'a O {
        self.operator
    }
}

/// Relative RMS misfit in percent.
pub fn relative_rms(observed: &Array1<f64>, response: &Array1<f64>) -> f64 {
    let n = observed.len().max(1) as f64;
    let sum: f64 = observed.iter().zip(response.iter()).map(|(d, f)| ((d - f) / d).powi(2)).sum();
    100.0 * (sum / n).sqrt()
}

impl<O: ForwardOperator + ?Sized> Objective for RegularizedObjective<'_, O> {
    fn value(&self, theta: &Theta) -> OptResult<Cost> {
        Ok(self.misfit(theta)?.phi)
    }

    fn check(&self, theta: &Theta) -> OptResult<()> {
        validate_theta(theta, self.operator.model_len())
    }

    fn grad(&self, theta: &Theta) -> OptResult<Grad> {
        let at = self.misfit(theta)?;
        let jac = LeastSquaresProblem::jacobian(self, theta, &at)?;
        let c = self.regularization.matrix();
        Ok(-2.0 * jac.t().dot(&at.residual) + 2.0 * self.lambda * c.t().dot(&at.roughness))
    }
}

impl<O: ForwardOperator + ?Sized> LeastSquaresProblem for RegularizedObjective<'_, O> {
    fn dim(&self) -> usize {
        self.operator.model_len()
    }

    fn misfit(&self, theta: &Theta) -> OptResult<Misfit> {
        let response = self.predict(theta)?;
        let residual = &self.observed_w - &self.weight(&response);
        let roughness = self.regularization.roughness(theta.view(), self.reference.view());
        let rrms = relative_rms(&self.observed, &response);
        Ok(Misfit::new(response, residual, roughness, self.lambda, rrms))
    }

    fn jacobian(&self, theta: &Theta, at: &Misfit) -> OptResult<Jacobian> {
        let f0 = self.weight(&at.response);
        jacobian(|t: &Theta| self.weighted_prediction(t), theta, &f0, self.operator.multi_threaded())
    }

    fn constraint_matrix(&self) -> ArrayView2<'_, f64> {
        self.regularization.matrix()
    }

    fn lambda(&self) -> f64 {
        self.lambda
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::errors::{ForwardError, ForwardResult};
    use crate::model::layout::Parameterization;
    use crate::optimization::errors::OptError;
    use crate::optimization::{
        regularization::RegularizationKind,
        transforms::ParameterTransforms,
    };
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Data weights and the Φ / χ² / rrms bookkeeping.
    // - The analytic gradient against finite differences.
    // - Construction-time validation.
    //
    // A linear toy operator stands in for a forward solver.
    // -------------------------------------------------------------------------

    /// `f(m) = A m` with positive entries, two data per three layers.
    #[derive(Debug)]
    struct LinearOp;

    impl ForwardOperator for LinearOp {
        fn response(&self, model: ArrayView1<'_, f64>) -> ForwardResult<Array1<f64>> {
            if model.len() != 3 {
                return Err(ForwardError::solver("bad length"));
            }
            Ok(array![model[0] + 0.5 * model[1], 0.2 * model[1] + model[2]])
        }
        fn model_len(&self) -> usize {
            3
        }
        fn data_len(&self) -> usize {
            2
        }
        fn n_layers(&self) -> usize {
            3
        }
        fn n_params(&self) -> usize {
            1
        }
    }

    fn objective(op: &LinearOp, lambda: f64) -> RegularizedObjective<'_, LinearOp> {
        let trans = CumulativeTransform::for_layout(Parameterization::Smooth, 3, 1, &ParameterTransforms::default())
            .unwrap();
        let reg = Regularization::new(RegularizationKind::Smoothness, Parameterization::Smooth, 3, 1).unwrap();
        RegularizedObjective::new(
            op,
            trans,
            Transform::log(),
            array![60.0, 45.0].view(),
            array![0.05, 0.05].view(),
            reg,
            array![50.0, 50.0, 50.0].view(),
            lambda,
        )
        .expect("valid objective")
    }

    #[test]
    // Purpose
    // -------
    // With a log data transform the weights reduce to `1 / rel_error`.
    fn log_data_weights_are_inverse_relative_errors() {
        let op = LinearOp;
        let obj = objective(&op, 10.0);

        for &w in obj.weights() {
            assert_relative_eq!(w, 20.0, max_relative = 1e-12);
        }
    }

    #[test]
    // Purpose
    // -------
    // Check the bookkeeping of one evaluation.
    //
    // Given
    // -----
    // - A constant 40 Ω·m model (zero roughness), observed `[60, 45]`.
    //
    // Expect
    // ------
    // - `Φ_m = 0`, `Φ = Φ_d`, `χ² = Φ_d / 2`, rrms from data-space ratios.
    fn misfit_bookkeeping_is_consistent() {
        let op = LinearOp;
        let obj = objective(&op, 10.0);
        let theta = obj.to_transformed(array![40.0, 40.0, 40.0].view()).unwrap();

        let m = obj.misfit(&theta).expect("forward ok");

        assert_relative_eq!(m.response[0], 60.0, max_relative = 1e-9);
        assert_relative_eq!(m.response[1], 48.0, max_relative = 1e-9);
        assert_relative_eq!(m.phi_m, 0.0, epsilon = 1e-18);
        let expected_phi_d = (20.0 * (45.0f64.ln() - 48.0f64.ln())).powi(2);
        assert_relative_eq!(m.phi_d, expected_phi_d, max_relative = 1e-6);
        assert_relative_eq!(m.chi2, expected_phi_d / 2.0, max_relative = 1e-6);
        assert_relative_eq!(m.rrms, 100.0 * ((3.0f64 / 45.0).powi(2) / 2.0).sqrt(), max_relative = 1e-6);
        assert_relative_eq!(obj.value(&theta).unwrap(), m.phi, max_relative = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // The Jacobian-based gradient agrees with a central difference of Φ.
    fn analytic_gradient_matches_numeric() {
        let op = LinearOp;
        let obj = objective(&op, 3.0);
        let theta = obj.to_transformed(array![30.0, 80.0, 20.0].view()).unwrap();

        let g = obj.grad(&theta).expect("gradient");

        let h = 1e-5;
        for j in 0..3 {
            let mut tp = theta.clone();
            let mut tm = theta.clone();
            tp[j] += h;
            tm[j] -= h;
            let numeric = (obj.value(&tp).unwrap() - obj.value(&tm).unwrap()) / (2.0 * h);
            assert_relative_eq!(g[j], numeric, max_relative = 1e-2, epsilon = 1e-4);
        }
    }

    #[test]
    fn construction_rejects_bad_inputs() {
        let op = LinearOp;
        let trans = || {
            CumulativeTransform::for_layout(Parameterization::Smooth, 3, 1, &ParameterTransforms::default())
                .unwrap()
        };
        let reg = || Regularization::new(RegularizationKind::Smoothness, Parameterization::Smooth, 3, 1).unwrap();
        let start = array![50.0, 50.0, 50.0];

        let err = RegularizedObjective::new(
            &op, trans(), Transform::log(), array![1.0].view(), array![0.1].view(), reg(), start.view(), 1.0,
        )
        .unwrap_err();
        assert_eq!(err, OptError::Configuration(ConfigError::DataLengthMismatch { expected: 2, found: 1 }));

        let err = RegularizedObjective::new(
            &op, trans(), Transform::log(), array![1.0, 2.0].view(), array![0.1, 0.0].view(), reg(),
            start.view(), 1.0,
        )
        .unwrap_err();
        assert_eq!(err, OptError::Configuration(ConfigError::InvalidRelativeError { index: 1, value: 0.0 }));

        let err = RegularizedObjective::new(
            &op, trans(), Transform::log(), array![1.0, 2.0].view(), array![0.1, 0.1].view(), reg(),
            start.view(), 0.0,
        )
        .unwrap_err();
        assert_eq!(err, OptError::Configuration(ConfigError::InvalidLambda { value: 0.0 }));

        let err = RegularizedObjective::new(
            &op, trans(), Transform::log(), array![-1.0, 2.0].view(), array![0.1, 0.1].view(), reg(),
            start.view(), 1.0,
        )
        .unwrap_err();
        assert!(matches!(err, OptError::Configuration(ConfigError::InvalidObservation { index: 0, .. })));
    }
}
