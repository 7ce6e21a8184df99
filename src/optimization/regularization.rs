//! Model regularization — roughness operators and the model functional Φ_m.
//!
//! Purpose
//! -------
//! Provide the constraint operator `C` of the regularized objective
//! `Φ = Φ_d + λ Φ_m` with `Φ_m = ||C (y - y_ref)||²`, where `y` is the model
//! in transformed space.
//!
//! Key behaviors
//! -------------
//! - [`RegularizationKind::Smoothness`]: first-order differences between
//!   vertically adjacent layers, inside each parameter block. Blocks are
//!   never coupled to each other. The reference model is not used.
//! - [`RegularizationKind::Damping`]: identity operator; the reference
//!   model (the start model) is what the solution is damped towards.
//!
//! Invariants & assumptions
//! ------------------------
//! - `C` has exactly `model_len` columns for the layout it was built for.
//! - A single-layer smooth block contributes no rows.
//!
//! Conventions
//! -----------
//! - Smooth layouts default to smoothness, block layouts to damping
//!   ([`RegularizationKind::default_for`]).
use crate::model::{errors::ConfigResult, layout::{ParamKind, Parameterization}};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Form of the model constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegularizationKind {
    #[default]
    Smoothness,
    Damping,
}

impl RegularizationKind {
    pub fn default_for(parameterization: Parameterization) -> Self {
        match parameterization {
            Parameterization::Smooth => RegularizationKind::Smoothness,
            Parameterization::Block => RegularizationKind::Damping,
        }
    }
}

/// Constraint operator bound to one model layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Regularization {
    kind: RegularizationKind,
    matrix: Array2<f64>,
}

impl Regularization {
    /// # Errors
    /// - [`crate::model::ConfigError::UnsupportedParameterCount`] unless
    ///   `n_params` is 1 or 4.
    pub fn new(
        kind: RegularizationKind, parameterization: Parameterization, n_layers: usize, n_params: usize,
    ) -> ConfigResult<Self> {
        let matrix = roughness_matrix(kind, parameterization, n_layers, n_params)?;
        Ok(Self { kind, matrix })
    }

    pub fn kind(&self) -> RegularizationKind {
        self.kind
    }

    /// The operator `C` (`n_constraints × model_len`).
    pub fn matrix(&self) -> ArrayView2<'_, f64> {
        self.matrix.view()
    }

    pub fn model_len(&self) -> usize {
        self.matrix.ncols()
    }

    /// Constraint residual: `C y` for smoothness, `C (y - y_ref)` for damping.
    pub fn roughness(&self, y: ArrayView1<'_, f64>, y_ref: ArrayView1<'_, f64>) -> Array1<f64> {
        match self.kind {
            RegularizationKind::Smoothness => self.matrix.dot(&y),
            RegularizationKind::Damping => self.matrix.dot(&(&y - &y_ref)),
        }
    }

    /// Model functional `Φ_m = ||roughness||²`.
    pub fn phi_m(&self, y: ArrayView1<'_, f64>, y_ref: ArrayView1<'_, f64>) -> f64 {
        let r = self.roughness(y, y_ref);
        r.dot(&r)
    }

    /// `CᵀC`, the model block of the Gauss–Newton normal equations.
    pub fn normal_matrix(&self) -> Array2<f64> {
        self.matrix.t().dot(&self.matrix)
    }
}

/// Build the constraint operator for a layout.
///
/// Smooth layouts consist of `n_params` blocks of `n_layers` entries; block
/// layouts add a leading thickness block of `n_layers - 1` entries.
/// Smoothness differences are taken inside every block, including the
/// thickness block.
///
/// # Errors
/// - [`crate::model::ConfigError::UnsupportedParameterCount`] unless
///   `n_params` is 1 or 4.
pub fn roughness_matrix(
    kind: RegularizationKind, parameterization: Parameterization, n_layers: usize, n_params: usize,
) -> ConfigResult<Array2<f64>> {
    let kinds = ParamKind::columns(n_params)?;
    let mut block_lens = Vec::with_capacity(kinds.len() + 1);
    if parameterization == Parameterization::Block && n_layers > 1 {
        block_lens.push(n_layers - 1);
    }
    block_lens.extend(std::iter::repeat(n_layers).take(kinds.len()));
    let model_len: usize = block_lens.iter().sum();

    match kind {
        RegularizationKind::Damping => Ok(Array2::eye(model_len)),
        RegularizationKind::Smoothness => {
            let n_rows: usize = block_lens.iter().map(|n| n.saturating_sub(1)).sum();
            let mut c = Array2::zeros((n_rows, model_len));
            let mut row = 0;
            let mut offset = 0;
            for len in block_lens {
                for i in 0..len.saturating_sub(1) {
                    c[[row, offset + i]] = -1.0;
                    c[[row, offset + i + 1]] = 1.0;
                    row += 1;
                }
                offset += len;
            }
            Ok(c)
        }
    }
}
