//! engine::types — shared numeric aliases and solver wiring.
//!
//! Purpose
//! -------
//! Centralize the numeric types and argmin solver aliases used by the
//! inversion engine, so the rest of the optimizer stays agnostic to
//! `ndarray` and argmin generics.
//!
//! Key behaviors
//! -------------
//! - Canonical aliases for transformed model vectors, gradients,
//!   Jacobians and scalar objective values (`Theta`, `Grad`, `Jacobian`,
//!   `Cost`).
//! - A map type for function-evaluation counters (`FnEvalMap`), filled by
//!   argmin for L-BFGS runs and by the engine itself for Gauss–Newton.
//! - Pre-wired L-BFGS aliases for both supported line searches.
//!
//! Invariants & assumptions
//! ------------------------
//! - `Theta` always lives in the transformed (unbounded) model space.
//! - `Jacobian` is `n_data × n_model`, row `i` holding the sensitivities of
//!   weighted, transformed datum `i`.
//! - `Cost` is the regularized objective `Φ = Φ_d + λ Φ_m`, minimized
//!   directly.
use argmin::solver::{
    linesearch::{HagerZhangLineSearch, MoreThuenteLineSearch},
    quasinewton::LBFGS,
};
use ndarray::{Array1, Array2};
use std::collections::HashMap;

/// Model vector in transformed space.
pub type Theta = Array1<f64>;

/// Gradient `∇Φ(θ)`, same shape as `Theta`.
pub type Grad = Array1<f64>;

/// Dense sensitivity matrix `∂(w ∘ T_d(f(θ))) / ∂θ`.
pub type Jacobian = Array2<f64>;

/// Scalar objective value.
pub type Cost = f64;

/// Function-evaluation counters keyed by name (e.g. `"cost_count"`).
pub type FnEvalMap = HashMap<String, u64>;

/// Default history size (`m`) for L-BFGS runs.
pub const DEFAULT_LBFGS_MEM: usize = 7;

pub type HagerZhangLS = HagerZhangLineSearch<Theta, Grad, Cost>;

pub type MoreThuenteLS = MoreThuenteLineSearch<Theta, Grad, Cost>;

pub type LbfgsHagerZhang = LBFGS<HagerZhangLS, Theta, Grad, Cost>;

pub type LbfgsMoreThuente = LBFGS<MoreThuenteLS, Theta, Grad, Cost>;
