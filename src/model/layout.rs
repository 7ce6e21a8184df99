//! Model-vector layouts — flat optimizer vectors ↔ per-layer parameter matrices.
//!
//! Purpose
//! -------
//! Make the mapping between the optimizer's flat model vector and the
//! physically meaningful `[n_layers, n_params]` matrix an explicit contract.
//! Two parameterizations are supported and each owns one reshape rule.
//!
//! Key behaviors
//! -------------
//! - **Smooth** (parameter-major, "grouped"): indices `[0, L)` hold parameter
//!   1 of every layer, `[L, 2L)` parameter 2, and so on. Reshaping views the
//!   vector as `[n_params, n_layers]` and transposes it to
//!   `[n_layers, n_params]` ([`reshape_grouped`] / [`flatten_grouped`]).
//! - **Block**: the `L - 1` free layer thicknesses come first, followed by the
//!   grouped parameter blocks ([`reshape_block`] / [`flatten_block`]). Layer
//!   tops are recovered as `[0, cumsum(thicknesses)]`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Lengths are checked exactly; a mismatch is a fatal
//!   [`ConfigError::ModelLengthMismatch`], never truncated or padded.
//! - `n_layers >= 1` and `n_params >= 1`.
//! - Column order of the parameter matrix is fixed by [`ParamKind`]:
//!   resistivity, chargeability, time constant, frequency exponent.
//!
//! Conventions
//! -----------
//! - Matrices are row-per-layer; the depth column is **not** part of these
//!   matrices (the forward adapter prepends it).
//! - Round trips are exact: no arithmetic is applied to values.
use crate::model::errors::{ConfigError, ConfigResult};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, concatenate, s};
use serde::{Deserialize, Serialize};

/// Number of parameters per layer for resistivity-only models.
pub const RESISTIVITY_PARAMS: usize = 1;

/// Number of parameters per layer for complex-resistivity (IP) models.
pub const IP_PARAMS: usize = 4;

/// Physical quantity carried by a model-vector block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    /// Layer thickness (block parameterization only), metres.
    Thickness,
    /// DC resistivity, Ω·m.
    Resistivity,
    /// Chargeability, dimensionless in `[0, 1]`.
    Chargeability,
    /// Relaxation time constant, seconds.
    TimeConstant,
    /// Frequency exponent, dimensionless in `[0, 1]`.
    Exponent,
}

impl ParamKind {
    /// Per-layer parameter kinds for a given parameter count, in column order.
    pub fn columns(n_params: usize) -> ConfigResult<&'static [ParamKind]> {
        match n_params {
            RESISTIVITY_PARAMS => Ok(&[ParamKind::Resistivity]),
            IP_PARAMS => Ok(&[
                ParamKind::Resistivity,
                ParamKind::Chargeability,
                ParamKind::TimeConstant,
                ParamKind::Exponent,
            ]),
            found => Err(ConfigError::UnsupportedParameterCount { found }),
        }
    }
}

/// Depth-handling strategy of a forward operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Parameterization {
    /// Fixed, externally supplied depth grid; parameter-major model vector.
    #[default]
    Smooth,
    /// Few layers with free thicknesses; thickness-prefixed model vector.
    Block,
}

impl Parameterization {
    /// Model-vector length for `n_layers` layers and `n_params` parameters per layer.
    pub fn model_len(self, n_layers: usize, n_params: usize) -> usize {
        match self {
            Parameterization::Smooth => n_layers * n_params,
            Parameterization::Block => n_layers.saturating_sub(1) + n_layers * n_params,
        }
    }
}

/// Reshape a parameter-major vector into a `[n_layers, n_params]` matrix.
///
/// # Errors
/// - [`ConfigError::UnsupportedParameterCount`] if `n_params == 0`.
/// - [`ConfigError::EmptyDepthGrid`] if `n_layers == 0`.
/// - [`ConfigError::ModelLengthMismatch`] if `model.len() != n_layers * n_params`.
pub fn reshape_grouped(
    model: ArrayView1<'_, f64>, n_layers: usize, n_params: usize,
) -> ConfigResult<Array2<f64>> {
    validate_dims(n_layers, n_params)?;
    let expected = Parameterization::Smooth.model_len(n_layers, n_params);
    if model.len() != expected {
        return Err(ConfigError::ModelLengthMismatch { expected, found: model.len() });
    }
    let grouped = model
        .to_owned()
        .into_shape((n_params, n_layers))
        .map_err(|_| ConfigError::ModelLengthMismatch { expected, found: model.len() })?;
    Ok(grouped.reversed_axes().as_standard_layout().to_owned())
}

/// Flatten a `[n_layers, n_params]` matrix into a parameter-major vector.
pub fn flatten_grouped(params: ArrayView2<'_, f64>) -> Array1<f64> {
    Array1::from_iter(params.t().iter().copied())
}

/// Reshape a block model vector into layer tops and a `[n_layers, n_params]` matrix.
///
/// # Errors
/// - As [`reshape_grouped`], with the expected length
///   `(n_layers - 1) + n_layers * n_params`.
/// - [`ConfigError::InvalidLayerThickness`] for non-finite or non-positive
///   thicknesses.
pub fn reshape_block(
    model: ArrayView1<'_, f64>, n_layers: usize, n_params: usize,
) -> ConfigResult<(Array1<f64>, Array2<f64>)> {
    validate_dims(n_layers, n_params)?;
    let expected = Parameterization::Block.model_len(n_layers, n_params);
    if model.len() != expected {
        return Err(ConfigError::ModelLengthMismatch { expected, found: model.len() });
    }
    let n_thk = n_layers - 1;
    let thicknesses = model.slice(s![..n_thk]);
    let depths = tops_from_thicknesses(thicknesses)?;
    let params = reshape_grouped(model.slice(s![n_thk..]), n_layers, n_params)?;
    Ok((depths, params))
}

/// Flatten thicknesses and a `[n_layers, n_params]` matrix into a block model vector.
///
/// # Errors
/// - [`ConfigError::ModelLengthMismatch`] if `thicknesses.len() != n_layers - 1`.
pub fn flatten_block(
    thicknesses: ArrayView1<'_, f64>, params: ArrayView2<'_, f64>,
) -> ConfigResult<Array1<f64>> {
    let n_thk = params.nrows().saturating_sub(1);
    if thicknesses.len() != n_thk {
        return Err(ConfigError::ModelLengthMismatch { expected: n_thk, found: thicknesses.len() });
    }
    let grouped = flatten_grouped(params);
    concatenate(Axis(0), &[thicknesses.view(), grouped.view()])
        .map_err(|_| ConfigError::ModelLengthMismatch { expected: n_thk, found: thicknesses.len() })
}

/// Layer tops `[0, cumsum(thicknesses)]`.
///
/// # Errors
/// - [`ConfigError::InvalidLayerThickness`] for the first non-finite or
///   non-positive thickness.
pub fn tops_from_thicknesses(thicknesses: ArrayView1<'_, f64>) -> ConfigResult<Array1<f64>> {
    let mut tops = Vec::with_capacity(thicknesses.len() + 1);
    let mut top = 0.0;
    tops.push(top);
    for (index, &value) in thicknesses.iter().enumerate() {
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfigError::InvalidLayerThickness { index, value });
        }
        top += value;
        tops.push(top);
    }
    Ok(Array1::from(tops))
}

fn validate_dims(n_layers: usize, n_params: usize) -> ConfigResult<()> {
    if n_params == 0 {
        return Err(ConfigError::UnsupportedParameterCount { found: n_params });
    }
    if n_layers == 0 {
        return Err(ConfigError::EmptyDepthGrid);
    }
    Ok(())
}
