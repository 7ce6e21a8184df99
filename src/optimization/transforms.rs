//! Parameter and data transforms.
//!
//! Purpose
//! -------
//! The engine works in transformed spaces: model parameters are mapped to an
//! unbounded space before optimization and observed/simulated data are
//! compared on a log scale. This module provides the scalar transforms, a
//! blockwise [`CumulativeTransform`] over whole model vectors, and the
//! per-parameter defaults used by the inversion driver.
//!
//! Key behaviors
//! -------------
//! - [`Transform::BoundedLog`]: `y = ln(x - a) - ln(b - x)`, mapping
//!   `(a, b)` onto the real line. Inputs are first clamped into
//!   `[a + ε(b-a), b - ε(b-a)]` with `ε = BOUND_EPS`, so the transform stays
//!   finite at and beyond the bounds. The inverse goes through
//!   [`safe_logistic`].
//! - [`Transform::Log`]: `y = ln(max(x, floor))`.
//! - [`Transform::Identity`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Every transform is monotone non-decreasing and finite for finite input.
//! - `inverse(forward(x)) == x` up to rounding for `x` strictly inside the
//!   domain (and above the floor for `Log`).
//! - `deriv(x)` is `dy/dx` evaluated at the clamped input.
//!
//! Conventions
//! -----------
//! - Transforms are plain `Copy` values and derive serde for configuration
//!   files. Deserialized values should be checked with
//!   [`Transform::validate`].
use crate::model::{
    errors::{ConfigError, ConfigResult},
    layout::{ParamKind, Parameterization},
};
use log::{Level, log};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// Relative distance kept from the bounds of a [`Transform::BoundedLog`].
pub const BOUND_EPS: f64 = 1e-9;

/// Default floor of [`Transform::Log`].
pub const DEFAULT_LOG_FLOOR: f64 = 1e-300;

/// Numerically stable logistic `1 / (1 + exp(-y))`.
///
/// Evaluates the branch that exponentiates a non-positive argument so large
/// `|y|` neither overflows nor loses precision.
pub fn safe_logistic(y: f64) -> f64 {
    if y >= 0.0 {
        1.0 / (1.0 + (-y).exp())
    } else {
        let e = y.exp();
        e / (1.0 + e)
    }
}

/// Scalar monotone transform.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Transform {
    #[default]
    Identity,
    Log { floor: f64 },
    BoundedLog { lower: f64, upper: f64 },
}

impl Transform {
    /// Natural log with the default floor.
    pub fn log() -> Self {
        Transform::Log { floor: DEFAULT_LOG_FLOOR }
    }

    /// Natural log of `max(x, floor)`.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidLogFloor`] unless `floor` is finite and > 0.
    pub fn log_with_floor(floor: f64) -> ConfigResult<Self> {
        let t = Transform::Log { floor };
        t.validate()?;
        Ok(t)
    }

    /// Log-ratio transform onto `(lower, upper)`.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidTransformBounds`] unless both bounds are finite
    ///   and `lower < upper`.
    pub fn bounded_log(lower: f64, upper: f64) -> ConfigResult<Self> {
        let t = Transform::BoundedLog { lower, upper };
        t.validate()?;
        Ok(t)
    }

    /// Check the parameters of a transform built by hand or deserialized.
    pub fn validate(&self) -> ConfigResult<()> {
        match *self {
            Transform::Identity => Ok(()),
            Transform::Log { floor } => {
                if !floor.is_finite() || floor <= 0.0 {
                    return Err(ConfigError::InvalidLogFloor { value: floor });
                }
                Ok(())
            }
            Transform::BoundedLog { lower, upper } => {
                if !lower.is_finite() || !upper.is_finite() || lower >= upper {
                    return Err(ConfigError::InvalidTransformBounds { lower, upper });
                }
                Ok(())
            }
        }
    }

    /// Whether `x` lies in the open domain where the transform is invertible.
    pub fn in_domain(&self, x: f64) -> bool {
        match *self {
            Transform::Identity => x.is_finite(),
            Transform::Log { floor } => x.is_finite() && x > 0.0 && x >= floor,
            Transform::BoundedLog { lower, upper } => x > lower && x < upper,
        }
    }

    /// Physical value → transformed value.
    pub fn forward(&self, x: f64) -> f64 {
        match *self {
            Transform::Identity => x,
            Transform::Log { floor } => x.max(floor).ln(),
            Transform::BoundedLog { lower, upper } => {
                let xc = clamp_inside(x, lower, upper);
                if xc != x && !x.is_nan() {
                    log!(Level::Debug, "bounded-log input {x} clamped to {xc} inside [{lower}, {upper}]");
                }
                (xc - lower).ln() - (upper - xc).ln()
            }
        }
    }

    /// Transformed value → physical value.
    pub fn inverse(&self, y: f64) -> f64 {
        match *self {
            Transform::Identity => y,
            Transform::Log { .. } => y.exp(),
            Transform::BoundedLog { lower, upper } => lower + (upper - lower) * safe_logistic(y),
        }
    }

    /// Derivative `dy/dx` of the forward transform.
    pub fn deriv(&self, x: f64) -> f64 {
        match *self {
            Transform::Identity => 1.0,
            Transform::Log { floor } => 1.0 / x.max(floor),
            Transform::BoundedLog { lower, upper } => {
                let xc = clamp_inside(x, lower, upper);
                (upper - lower) / ((xc - lower) * (upper - xc))
            }
        }
    }
}

fn clamp_inside(x: f64, lower: f64, upper: f64) -> f64 {
    let margin = BOUND_EPS * (upper - lower);
    if x.is_nan() {
        return x;
    }
    x.max(lower + margin).min(upper - margin)
}

/// Default transform for each physical parameter kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterTransforms {
    pub resistivity: Transform,
    pub chargeability: Transform,
    pub time_constant: Transform,
    pub exponent: Transform,
    pub thickness: Transform,
}

impl Default for ParameterTransforms {
    fn default() -> Self {
        Self {
            resistivity: Transform::BoundedLog { lower: 1.0, upper: 1000.0 },
            chargeability: Transform::BoundedLog { lower: 0.0, upper: 1.0 },
            time_constant: Transform::log(),
            exponent: Transform::BoundedLog { lower: 0.0, upper: 1.0 },
            thickness: Transform::log(),
        }
    }
}

impl ParameterTransforms {
    /// Defaults with the resistivity bounds replaced.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidTransformBounds`] for invalid bounds.
    pub fn with_resistivity_bounds(lower: f64, upper: f64) -> ConfigResult<Self> {
        Ok(Self { resistivity: Transform::bounded_log(lower, upper)?, ..Self::default() })
    }

    pub fn for_kind(&self, kind: ParamKind) -> Transform {
        match kind {
            ParamKind::Thickness => self.thickness,
            ParamKind::Resistivity => self.resistivity,
            ParamKind::Chargeability => self.chargeability,
            ParamKind::TimeConstant => self.time_constant,
            ParamKind::Exponent => self.exponent,
        }
    }

    /// Validate every member transform.
    pub fn validate(&self) -> ConfigResult<()> {
        for t in [self.resistivity, self.chargeability, self.time_constant, self.exponent, self.thickness] {
            t.validate()?;
        }
        Ok(())
    }
}

/// Blockwise transform over a flat model vector.
///
/// Block `k` applies `blocks[k].0` to the next `blocks[k].1` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct CumulativeTransform {
    blocks: Vec<(Transform, usize)>,
    len: usize,
}

impl CumulativeTransform {
    /// Build from explicit blocks.
    ///
    /// # Errors
    /// - Any invalid member transform.
    pub fn new(blocks: Vec<(Transform, usize)>) -> ConfigResult<Self> {
        for (t, _) in &blocks {
            t.validate()?;
        }
        let len = blocks.iter().map(|(_, n)| n).sum();
        Ok(Self { blocks, len })
    }

    /// Transform layout matching a model vector of the given parameterization.
    ///
    /// Smooth vectors get one block per parameter kind; block vectors get a
    /// leading thickness block of `n_layers - 1` entries.
    ///
    /// # Errors
    /// - [`ConfigError::UnsupportedParameterCount`] unless `n_params` is 1 or 4.
    pub fn for_layout(
        parameterization: Parameterization, n_layers: usize, n_params: usize,
        transforms: &ParameterTransforms,
    ) -> ConfigResult<Self> {
        let kinds = ParamKind::columns(n_params)?;
        let mut blocks = Vec::with_capacity(kinds.len() + 1);
        if parameterization == Parameterization::Block && n_layers > 1 {
            blocks.push((transforms.thickness, n_layers - 1));
        }
        blocks.extend(kinds.iter().map(|&kind| (transforms.for_kind(kind), n_layers)));
        Self::new(blocks)
    }

    /// Total number of entries covered.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn blocks(&self) -> &[(Transform, usize)] {
        &self.blocks
    }

    pub fn forward(&self, x: ArrayView1<'_, f64>) -> ConfigResult<Array1<f64>> {
        self.apply(x, Transform::forward)
    }

    pub fn inverse(&self, y: ArrayView1<'_, f64>) -> ConfigResult<Array1<f64>> {
        self.apply(y, Transform::inverse)
    }

    pub fn deriv(&self, x: ArrayView1<'_, f64>) -> ConfigResult<Array1<f64>> {
        self.apply(x, Transform::deriv)
    }

    fn apply(
        &self, v: ArrayView1<'_, f64>, f: fn(&Transform, f64) -> f64,
    ) -> ConfigResult<Array1<f64>> {
        if v.len() != self.len {
            return Err(ConfigError::ModelLengthMismatch { expected: self.len, found: v.len() });
        }
        let mut out = Array1::zeros(self.len);
        let mut start = 0;
        for (t, n) in &self.blocks {
            for i in start..start + n {
                out[i] = f(t, v[i]);
            }
            start += n;
        }
        Ok(out)
    }
}
