//! Lambda (regularization weight) exploration and L-curve selection.
//!
//! Purpose
//! -------
//! Run one inversion per candidate lambda, collect `(Φ_d, Φ_m)` pairs and
//! pick a lambda from the resulting L-curve.
//!
//! Key behaviors
//! -------------
//! - [`LambdaSweep::geometric`]: log-spaced candidates; the default sweep is
//!   20 values from 10 to 1000.
//! - [`explore`]: a failed run is logged at `warn` and recorded in
//!   [`LCurve::failures`]; configuration errors abort the sweep because
//!   they would fail for every lambda.
//! - [`LCurve::select`]: maximum Menger curvature of the
//!   `(ln Φ_d, ln Φ_m)` curve, or the χ² closest to a target.
//!
//! Invariants & assumptions
//! ------------------------
//! - Sweeps are non-empty and every lambda is finite and > 0.
//! - Points are kept in sweep order; curvature is evaluated after sorting
//!   by lambda.
use crate::inversion::{
    errors::{InvResult, InversionError},
    outcome::InversionOutcome,
};
use crate::model::errors::{ConfigError, ConfigResult};
use log::warn;
use serde::{Deserialize, Serialize};

/// Default sweep `(start, stop, count)`.
pub const DEFAULT_SWEEP: (f64, f64, usize) = (10.0, 1000.0, 20);

/// Ordered lambda candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct LambdaSweep {
    lambdas: Vec<f64>,
}

impl LambdaSweep {
    /// `count` log-spaced values from `start` to `stop`, both included.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidLambdaSweep`] unless `0 < start < stop`
    ///   (finite) and `count >= 2`.
    pub fn geometric(start: f64, stop: f64, count: usize) -> ConfigResult<Self> {
        if !start.is_finite() || !stop.is_finite() || start <= 0.0 {
            return Err(ConfigError::InvalidLambdaSweep {
                reason: "Sweep bounds must be finite and > 0.",
            });
        }
        if stop <= start {
            return Err(ConfigError::InvalidLambdaSweep { reason: "Sweep stop must exceed start." });
        }
        if count < 2 {
            return Err(ConfigError::InvalidLambdaSweep { reason: "Sweep needs at least two values." });
        }
        Ok(Self { lambdas: geomspace(start, stop, count) })
    }

    /// Explicit candidates, kept in the given order.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidLambdaSweep`] for an empty list.
    /// - [`ConfigError::InvalidLambda`] for the first non-finite or
    ///   non-positive value.
    pub fn from_values(lambdas: Vec<f64>) -> ConfigResult<Self> {
        if lambdas.is_empty() {
            return Err(ConfigError::InvalidLambdaSweep { reason: "Sweep is empty." });
        }
        if let Some(&value) = lambdas.iter().find(|l| !l.is_finite() || **l <= 0.0) {
            return Err(ConfigError::InvalidLambda { value });
        }
        Ok(Self { lambdas })
    }

    pub fn lambdas(&self) -> &[f64] {
        &self.lambdas
    }

    pub fn len(&self) -> usize {
        self.lambdas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lambdas.is_empty()
    }
}

impl Default for LambdaSweep {
    fn default() -> Self {
        let (start, stop, count) = DEFAULT_SWEEP;
        Self { lambdas: geomspace(start, stop, count) }
    }
}

impl TryFrom<Vec<f64>> for LambdaSweep {
    type Error = ConfigError;

    fn try_from(lambdas: Vec<f64>) -> ConfigResult<Self> {
        Self::from_values(lambdas)
    }
}

impl From<LambdaSweep> for Vec<f64> {
    fn from(sweep: LambdaSweep) -> Self {
        sweep.lambdas
    }
}

fn geomspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    let (a, b) = (start.ln(), stop.ln());
    let step = (b - a) / (count - 1) as f64;
    (0..count)
        .map(|i| match i {
            0 => start,
            _ if i + 1 == count => stop,
            _ => (a + step * i as f64).exp(),
        })
        .collect()
}

/// One successful run of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LCurvePoint {
    pub lambda: f64,
    pub phi_d: f64,
    pub phi_m: f64,
    pub chi2: f64,
    pub rrms: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl From<&InversionOutcome> for LCurvePoint {
    fn from(out: &InversionOutcome) -> Self {
        Self {
            lambda: out.lambda,
            phi_d: out.phi_d,
            phi_m: out.phi_m,
            chi2: out.chi2,
            rrms: out.rrms,
            iterations: out.iterations,
            converged: out.converged,
        }
    }
}

/// A lambda whose run failed.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaFailure {
    pub lambda: f64,
    pub error: InversionError,
}

/// How [`LCurve::select`] picks a lambda.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LambdaSelection {
    /// Corner of the L-curve.
    MaxCurvature,
    /// χ² closest to the given value.
    TargetChi2(f64),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LCurve {
    pub points: Vec<LCurvePoint>,
    pub failures: Vec<LambdaFailure>,
}

impl LCurve {
    /// Selected point, or `None` when there are too few usable points
    /// (curvature needs three with `Φ_d, Φ_m > 0`).
    pub fn select(&self, selection: LambdaSelection) -> Option<&LCurvePoint> {
        match selection {
            LambdaSelection::MaxCurvature => self.max_curvature(),
            LambdaSelection::TargetChi2(target) => self
                .points
                .iter()
                .filter(|p| p.chi2.is_finite())
                .min_by(|a, b| (a.chi2 - target).abs().total_cmp(&(b.chi2 - target).abs())),
        }
    }

    fn max_curvature(&self) -> Option<&LCurvePoint> {
        let mut usable: Vec<&LCurvePoint> =
            self.points.iter().filter(|p| p.phi_d > 0.0 && p.phi_m > 0.0).collect();
        if usable.len() < 3 {
            return None;
        }
        usable.sort_by(|a, b| a.lambda.total_cmp(&b.lambda));
        let xy: Vec<(f64, f64)> = usable.iter().map(|p| (p.phi_d.ln(), p.phi_m.ln())).collect();
        (1..usable.len() - 1)
            .map(|i| (i, menger_curvature(xy[i - 1], xy[i], xy[i + 1])))
            .filter(|(_, k)| k.is_finite())
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| usable[i])
    }
}

/// Signed curvature of the circle through three points.
///
/// Positive for a left turn, which is the orientation of the L-curve corner
/// when points are ordered by increasing lambda.
fn menger_curvature(p1: (f64, f64), p2: (f64, f64), p3: (f64, f64)) -> f64 {
    let cross = (p2.0 - p1.0) * (p3.1 - p1.1) - (p2.1 - p1.1) * (p3.0 - p1.0);
    let d12 = (p2.0 - p1.0).hypot(p2.1 - p1.1);
    let d23 = (p3.0 - p2.0).hypot(p3.1 - p2.1);
    let d13 = (p3.0 - p1.0).hypot(p3.1 - p1.1);
    2.0 * cross / (d12 * d23 * d13)
}

/// Run `run` once per lambda of `sweep`.
///
/// # Errors
/// - The first [`InversionError::Configuration`]; other failures are
///   collected instead.
pub fn explore<F>(sweep: &LambdaSweep, mut run: F) -> InvResult<LCurve>
where
    F: FnMut(f64) -> InvResult<InversionOutcome>,
{
    let mut curve = LCurve::default();
    for &lambda in sweep.lambdas() {
        match run(lambda) {
            Ok(outcome) => curve.points.push(LCurvePoint::from(&outcome)),
            Err(err) if err.is_configuration() => return Err(err),
            Err(error) => {
                warn!("lambda {lambda}: inversion failed: {error}");
                curve.failures.push(LambdaFailure { lambda, error });
            }
        }
    }
    Ok(curve)
}
