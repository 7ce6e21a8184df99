//! Start models — caller-supplied initial layer parameters.
//!
//! A start model is an `[n_layers, n_params]` matrix (one row per layer,
//! columns in [`ParamKind`] order). It seeds the optimizer and is evaluated
//! once to sanity-check a freshly built forward operator; it is never
//! mutated.
use crate::model::{
    errors::{ConfigError, ConfigResult},
    layout::{IP_PARAMS, ParamKind, RESISTIVITY_PARAMS, flatten_grouped},
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Initial per-layer parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct StartModel {
    params: Array2<f64>,
}

impl StartModel {
    /// Resistivity-only start model (`n_params = 1`).
    ///
    /// # Errors
    /// - [`ConfigError::NonFiniteModel`] for NaN/±inf entries.
    pub fn resistivity(rho: Array1<f64>) -> ConfigResult<Self> {
        let n = rho.len();
        let params = rho.insert_axis(Axis(1));
        debug_assert_eq!(params.dim(), (n, RESISTIVITY_PARAMS));
        Self::from_matrix(params)
    }

    /// Start model from a `[n_layers, n_params]` matrix.
    ///
    /// # Errors
    /// - [`ConfigError::UnsupportedParameterCount`] unless `n_params` is 1 or 4.
    /// - [`ConfigError::NonFiniteModel`] for NaN/±inf entries (index in
    ///   parameter-major order).
    pub fn from_matrix(params: Array2<f64>) -> ConfigResult<Self> {
        ParamKind::columns(params.ncols())?;
        let start = Self { params };
        for (index, &value) in start.to_model_vector().iter().enumerate() {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteModel { index, value });
            }
        }
        Ok(start)
    }

    /// Complex-resistivity start model from its four parameter columns.
    ///
    /// # Errors
    /// - [`ConfigError::ModelLengthMismatch`] if the columns differ in length.
    /// - As [`StartModel::from_matrix`].
    pub fn pelton(
        rho: ArrayView1<'_, f64>, chargeability: ArrayView1<'_, f64>, tau: ArrayView1<'_, f64>,
        exponent: ArrayView1<'_, f64>,
    ) -> ConfigResult<Self> {
        let n = rho.len();
        for column in [chargeability.view(), tau.view(), exponent.view()] {
            if column.len() != n {
                return Err(ConfigError::ModelLengthMismatch { expected: n, found: column.len() });
            }
        }
        let mut params = Array2::zeros((n, IP_PARAMS));
        for (j, column) in [rho.view(), chargeability.view(), tau.view(), exponent.view()].into_iter().enumerate() {
            params.column_mut(j).assign(&column);
        }
        Self::from_matrix(params)
    }

    /// Number of layers (rows).
    pub fn n_layers(&self) -> usize {
        self.params.nrows()
    }

    /// Number of parameters per layer (columns).
    pub fn n_params(&self) -> usize {
        self.params.ncols()
    }

    /// `[n_layers, n_params]` view.
    pub fn params(&self) -> ArrayView2<'_, f64> {
        self.params.view()
    }

    /// Resistivity column.
    pub fn resistivities(&self) -> ArrayView1<'_, f64> {
        self.params.column(0)
    }

    /// Parameter-major flat model vector (smooth layout).
    pub fn to_model_vector(&self) -> Array1<f64> {
        flatten_grouped(self.params.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn resistivity_start_model_has_one_column() {
        let start = StartModel::resistivity(Array1::from_elem(12, 50.0)).expect("finite");

        assert_eq!(start.n_layers(), 12);
        assert_eq!(start.n_params(), 1);
        assert_eq!(start.to_model_vector(), Array1::from_elem(12, 50.0));
    }

    #[test]
    // Purpose
    // -------
    // The four Pelton columns are flattened parameter-major.
    fn pelton_start_model_flattens_parameter_major() {
        let start = StartModel::pelton(
            array![50.0, 60.0].view(),
            array![0.0, 0.5].view(),
            array![1e-6, 5e-4].view(),
            array![0.1, 0.8].view(),
        )
        .expect("consistent columns");

        assert_eq!(start.params().row(1).to_vec(), vec![60.0, 0.5, 5e-4, 0.8]);
        assert_eq!(start.to_model_vector(), array![50.0, 60.0, 0.0, 0.5, 1e-6, 5e-4, 0.1, 0.8]);
    }

    #[test]
    fn start_model_rejects_non_finite_and_odd_widths() {
        let err = StartModel::resistivity(array![1.0, f64::INFINITY]).unwrap_err();
        assert!(matches!(err, ConfigError::NonFiniteModel { index: 1, .. }));

        let err = StartModel::from_matrix(Array2::ones((3, 2))).unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedParameterCount { found: 2 });
    }
}
