//! Piecewise-linear diode model.
//!
//! The diode is either conducting or blocking:
//!   conducting: I = (V - Vf) / R_on
//!   blocking:   I = V / R_off
//!
//! Conducting is modeled as a conductance `1/R_on` in parallel with a
//! current source `Vf/R_on` flowing from cathode to anode, which is a
//! voltage source `Vf` in series with `R_on` in Norton form.
//!
//! State transitions after each solve:
//!   on  -> off when the current reverses (I < 0)
//!   off -> on  when the forward voltage reaches Vf
//!
//! Parameter layout: `[r_on, r_off, vf]`, all optional.

use crate::circuit::{HistoryState, Terminals};
use crate::error::{Result, TransimError};
use crate::solver::{DenseMatrix, Discretization};

use super::{finite_current, inject_current, optional_param, ComponentType, Stamper};

/// Parameters for a piecewise-linear diode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiodeParams {
    /// Conducting resistance
    pub r_on: f64,
    /// Blocking resistance
    pub r_off: f64,
    /// Forward voltage drop, typically 0.6-0.7V for silicon
    pub vf: f64,
}

impl Default for DiodeParams {
    fn default() -> Self {
        Self {
            r_on: 1e-3,
            r_off: 1e9,
            vf: 0.7,
        }
    }
}

impl DiodeParams {
    /// Parameters for a germanium diode (lower forward voltage).
    pub fn germanium() -> Self {
        Self {
            vf: 0.3,
            ..Self::default()
        }
    }

    /// Decode a parameter vector, filling gaps with defaults.
    pub fn from_params(params: &[f64]) -> Result<Self> {
        let d = Self::default();
        let p = Self {
            r_on: optional_param(params, 0, "ron", d.r_on)?,
            r_off: optional_param(params, 1, "roff", d.r_off)?,
            vf: optional_param(params, 2, "vf", d.vf)?,
        };
        if p.r_on <= 0.0 {
            return Err(TransimError::invalid_parameter(
                "",
                "ron",
                format!("must be positive, got {}", p.r_on),
            ));
        }
        if p.r_off <= 0.0 {
            return Err(TransimError::invalid_parameter(
                "",
                "roff",
                format!("must be positive, got {}", p.r_off),
            ));
        }
        Ok(p)
    }

    /// Encode into a parameter vector.
    pub fn to_params(&self) -> Vec<f64> {
        vec![self.r_on, self.r_off, self.vf]
    }

    fn conductance(&self, conducting: bool) -> f64 {
        if conducting {
            1.0 / self.r_on
        } else {
            1.0 / self.r_off
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiodeStamper;

impl Stamper for DiodeStamper {
    fn component_type(&self) -> ComponentType {
        ComponentType::Diode
    }

    fn validate(&self, params: &[f64]) -> Result<()> {
        DiodeParams::from_params(params).map(|_| ())
    }

    fn stamp_matrix(
        &self,
        matrix: &mut DenseMatrix,
        terminals: Terminals,
        params: &[f64],
        _ctx: &Discretization,
        history: &HistoryState,
    ) -> Result<()> {
        let p = DiodeParams::from_params(params)?;
        matrix.stamp_conductance(terminals.a, terminals.b, p.conductance(history.conducting));
        Ok(())
    }

    fn stamp_rhs(
        &self,
        rhs: &mut [f64],
        terminals: Terminals,
        params: &[f64],
        _ctx: &Discretization,
        _time: f64,
        history: &HistoryState,
    ) -> Result<()> {
        if history.conducting {
            let p = DiodeParams::from_params(params)?;
            if p.vf > 0.0 {
                inject_current(rhs, terminals.a, terminals.b, p.conductance(true) * p.vf);
            }
        }
        Ok(())
    }

    fn calculate_current(
        &self,
        v_a: f64,
        v_b: f64,
        params: &[f64],
        _ctx: &Discretization,
        history: &HistoryState,
    ) -> Result<f64> {
        let p = DiodeParams::from_params(params)?;
        let v = v_a - v_b;
        let i = if history.conducting {
            (v - p.vf) / p.r_on
        } else {
            v / p.r_off
        };
        finite_current(ComponentType::Diode, i)
    }

    fn is_switching(&self) -> bool {
        true
    }

    fn update_state(
        &self,
        v: f64,
        i: f64,
        params: &[f64],
        _time: f64,
        history: &mut HistoryState,
    ) -> bool {
        let vf = DiodeParams::from_params(params)
            .map(|p| p.vf)
            .unwrap_or_else(|_| DiodeParams::default().vf);
        let previous = history.conducting;
        if previous {
            if i < 0.0 {
                history.conducting = false;
            }
        } else if v >= vf {
            history.conducting = true;
        }
        history.conducting != previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_fill_missing_params() {
        let p = DiodeParams::from_params(&[0.01]).unwrap();
        assert_eq!(p.r_on, 0.01);
        assert_eq!(p.r_off, 1e9);
        assert_eq!(p.vf, 0.7);
        assert!(DiodeParams::from_params(&[0.0]).is_err());
    }

    #[test]
    fn test_turns_on_at_forward_voltage() {
        let mut h = HistoryState::default();
        assert!(!DiodeStamper.update_state(0.5, 0.0, &[], 0.0, &mut h));
        assert!(!h.conducting);
        assert!(DiodeStamper.update_state(0.7, 0.0, &[], 0.0, &mut h));
        assert!(h.conducting);
    }

    #[test]
    fn test_turns_off_on_reverse_current() {
        let mut h = HistoryState {
            conducting: true,
            ..HistoryState::default()
        };
        assert!(!DiodeStamper.update_state(0.8, 1.0, &[], 0.0, &mut h));
        assert!(DiodeStamper.update_state(0.6, -1e-6, &[], 0.0, &mut h));
        assert!(!h.conducting);
    }

    #[test]
    fn test_conducting_current() {
        let ctx = Discretization::backward_euler(1e-6).unwrap();
        let h = HistoryState {
            conducting: true,
            ..HistoryState::default()
        };
        let i = DiodeStamper
            .calculate_current(1.7, 0.0, &[1.0, 1e9, 0.7], &ctx, &h)
            .unwrap();
        assert_relative_eq!(i, 1.0);
    }

    #[test]
    fn test_forward_compensation_only_when_conducting() {
        let ctx = Discretization::backward_euler(1e-6).unwrap();
        let t = Terminals {
            a: Some(0),
            b: Some(1),
            branch: None,
        };
        let mut rhs = vec![0.0; 2];
        DiodeStamper
            .stamp_rhs(&mut rhs, t, &[1.0, 1e9, 0.7], &ctx, 0.0, &HistoryState::default())
            .unwrap();
        assert_eq!(rhs, vec![0.0, 0.0]);

        let on = HistoryState {
            conducting: true,
            ..HistoryState::default()
        };
        DiodeStamper
            .stamp_rhs(&mut rhs, t, &[1.0, 1e9, 0.7], &ctx, 0.0, &on)
            .unwrap();
        assert_relative_eq!(rhs[0], 0.7);
        assert_relative_eq!(rhs[1], -0.7);
    }
}
