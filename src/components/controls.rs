//! Ideal switch.
//!
//! Parameter layout: `[state, r_on, r_off]` where a non-zero `state` closes
//! the switch. Resistances are optional.

use crate::circuit::{HistoryState, Terminals};
use crate::error::{Result, TransimError};
use crate::solver::{DenseMatrix, Discretization};

use super::{finite_current, optional_param, required_param, ComponentType, Stamper};

/// Closed-state resistance when none is given.
pub const DEFAULT_R_ON: f64 = 1e-3;
/// Open-state resistance when none is given.
pub const DEFAULT_R_OFF: f64 = 1e9;

/// A two-state switch modeled as `R_on` when closed and `R_off` when open.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwitchStamper;

impl SwitchStamper {
    /// Whether the parameter vector describes a closed switch.
    pub fn is_closed(params: &[f64]) -> bool {
        params.first().map_or(false, |&s| s != 0.0)
    }

    fn conductance(params: &[f64]) -> Result<f64> {
        required_param(params, 0, "state")?;
        let r_on = optional_param(params, 1, "ron", DEFAULT_R_ON)?;
        let r_off = optional_param(params, 2, "roff", DEFAULT_R_OFF)?;
        let r = if Self::is_closed(params) { r_on } else { r_off };
        if r <= 0.0 {
            return Err(TransimError::invalid_parameter(
                "",
                if Self::is_closed(params) { "ron" } else { "roff" },
                format!("must be positive, got {}", r),
            ));
        }
        Ok(1.0 / r)
    }
}

impl Stamper for SwitchStamper {
    fn component_type(&self) -> ComponentType {
        ComponentType::Switch
    }

    fn validate(&self, params: &[f64]) -> Result<()> {
        // Check both resistances, not just the active one
        let mut flipped = params.to_vec();
        if let Some(state) = flipped.first_mut() {
            *state = if *state != 0.0 { 0.0 } else { 1.0 };
        }
        Self::conductance(params)?;
        Self::conductance(&flipped)?;
        Ok(())
    }

    fn initial_history(&self, params: &[f64]) -> HistoryState {
        HistoryState {
            conducting: Self::is_closed(params),
            ..HistoryState::default()
        }
    }

    fn stamp_matrix(
        &self,
        matrix: &mut DenseMatrix,
        terminals: Terminals,
        params: &[f64],
        _ctx: &Discretization,
        _history: &HistoryState,
    ) -> Result<()> {
        matrix.stamp_conductance(terminals.a, terminals.b, Self::conductance(params)?);
        Ok(())
    }

    fn calculate_current(
        &self,
        v_a: f64,
        v_b: f64,
        params: &[f64],
        _ctx: &Discretization,
        _history: &HistoryState,
    ) -> Result<f64> {
        finite_current(ComponentType::Switch, (v_a - v_b) * Self::conductance(params)?)
    }
}
