//! Voltage and current sources.
//!
//! Both kinds share the same parameter layout, decoded by [`Waveform`]:
//! - DC: `[value]`
//! - Sine: `[offset, amplitude, frequency, phase]` (phase in degrees, optional)

use std::f64::consts::PI;

use crate::circuit::{HistoryState, Terminals};
use crate::error::{Result, TransimError};
use crate::solver::{DenseMatrix, Discretization};

use super::{finite_current, inject_current, required_param, ComponentType, Stamper};

/// Time-dependent source value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    /// Constant value
    Dc(f64),
    /// `offset + amplitude·sin(2π·f·t + φ)`
    Sine {
        offset: f64,
        amplitude: f64,
        frequency: f64,
        /// Phase in degrees
        phase: f64,
    },
}

impl Waveform {
    /// Decode a source parameter vector.
    pub fn from_params(params: &[f64]) -> Result<Self> {
        match params.len() {
            1 => Ok(Self::Dc(required_param(params, 0, "value")?)),
            3 | 4 => {
                let frequency = required_param(params, 2, "frequency")?;
                if frequency < 0.0 {
                    return Err(TransimError::invalid_parameter(
                        "",
                        "frequency",
                        format!("must not be negative, got {}", frequency),
                    ));
                }
                Ok(Self::Sine {
                    offset: required_param(params, 0, "offset")?,
                    amplitude: required_param(params, 1, "amplitude")?,
                    frequency,
                    phase: if params.len() == 4 {
                        required_param(params, 3, "phase")?
                    } else {
                        0.0
                    },
                })
            }
            n => Err(TransimError::invalid_parameter(
                "",
                "value",
                format!("expected 1 (DC) or 3-4 (sine) parameters, got {}", n),
            )),
        }
    }

    /// Encode back into a parameter vector.
    pub fn to_params(&self) -> Vec<f64> {
        match *self {
            Self::Dc(value) => vec![value],
            Self::Sine {
                offset,
                amplitude,
                frequency,
                phase,
            } => vec![offset, amplitude, frequency, phase],
        }
    }

    /// Source value at `time`.
    pub fn value_at(&self, time: f64) -> f64 {
        match *self {
            Self::Dc(value) => value,
            Self::Sine {
                offset,
                amplitude,
                frequency,
                phase,
            } => offset + amplitude * (2.0 * PI * frequency * time + phase.to_radians()).sin(),
        }
    }
}

/// An independent voltage source.
///
/// Voltage sources require an extra row/column in the MNA matrix for the
/// branch current. The source enforces: `V(A) - V(B) = V(t)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoltageSourceStamper;

impl Stamper for VoltageSourceStamper {
    fn component_type(&self) -> ComponentType {
        ComponentType::VoltageSource
    }

    fn validate(&self, params: &[f64]) -> Result<()> {
        Waveform::from_params(params).map(|_| ())
    }

    fn needs_branch(&self, _params: &[f64]) -> bool {
        true
    }

    fn stamp_matrix(
        &self,
        matrix: &mut DenseMatrix,
        terminals: Terminals,
        _params: &[f64],
        _ctx: &Discretization,
        _history: &HistoryState,
    ) -> Result<()> {
        let br = terminals.branch.ok_or_else(|| TransimError::InvalidTopology {
            message: "voltage source without a branch row".to_string(),
        })?;
        matrix.stamp_branch_incidence(terminals.a, terminals.b, br);
        Ok(())
    }

    fn stamp_rhs(
        &self,
        rhs: &mut [f64],
        terminals: Terminals,
        params: &[f64],
        _ctx: &Discretization,
        time: f64,
        _history: &HistoryState,
    ) -> Result<()> {
        if let Some(br) = terminals.branch {
            rhs[br] += Waveform::from_params(params)?.value_at(time);
        }
        Ok(())
    }

    /// The current of a voltage source is a solved unknown; outside a solve
    /// the last recorded value is the best answer.
    fn calculate_current(
        &self,
        _v_a: f64,
        _v_b: f64,
        _params: &[f64],
        _ctx: &Discretization,
        history: &HistoryState,
    ) -> Result<f64> {
        finite_current(ComponentType::VoltageSource, history.current)
    }
}

/// An independent current source.
///
/// The current leaves terminal A, flows through the source and enters
/// terminal B. Only the RHS is touched.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentSourceStamper;

impl Stamper for CurrentSourceStamper {
    fn component_type(&self) -> ComponentType {
        ComponentType::CurrentSource
    }

    fn validate(&self, params: &[f64]) -> Result<()> {
        Waveform::from_params(params).map(|_| ())
    }

    fn stamp_matrix(
        &self,
        _matrix: &mut DenseMatrix,
        _terminals: Terminals,
        _params: &[f64],
        _ctx: &Discretization,
        _history: &HistoryState,
    ) -> Result<()> {
        Ok(())
    }

    fn stamp_rhs(
        &self,
        rhs: &mut [f64],
        terminals: Terminals,
        params: &[f64],
        _ctx: &Discretization,
        time: f64,
        _history: &HistoryState,
    ) -> Result<()> {
        let value = Waveform::from_params(params)?.value_at(time);
        inject_current(rhs, terminals.a, terminals.b, -value);
        Ok(())
    }

    fn imposed_current(&self, params: &[f64], time: f64) -> Result<Option<f64>> {
        Ok(Some(Waveform::from_params(params)?.value_at(time)))
    }

    /// Value recorded at the last completed step.
    fn calculate_current(
        &self,
        _v_a: f64,
        _v_b: f64,
        _params: &[f64],
        _ctx: &Discretization,
        history: &HistoryState,
    ) -> Result<f64> {
        finite_current(ComponentType::CurrentSource, history.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_waveform_decode() {
        assert_eq!(Waveform::from_params(&[5.0]).unwrap(), Waveform::Dc(5.0));
        let sine = Waveform::from_params(&[1.0, 2.0, 50.0]).unwrap();
        assert!(matches!(sine, Waveform::Sine { phase, .. } if phase == 0.0));
        assert!(Waveform::from_params(&[]).is_err());
        assert!(Waveform::from_params(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_sine_value() {
        let w = Waveform::Sine {
            offset: 1.0,
            amplitude: 2.0,
            frequency: 50.0,
            phase: 90.0,
        };
        assert_abs_diff_eq!(w.value_at(0.0), 3.0, epsilon = 1e-12);
        // Quarter period later the sine is at zero crossing
        assert_abs_diff_eq!(w.value_at(0.005), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_voltage_source_stamp() {
        let mut m = DenseMatrix::zeros(2);
        let mut rhs = vec![0.0; 2];
        let t = Terminals {
            a: Some(0),
            b: None,
            branch: Some(1),
        };
        let ctx = Discretization::backward_euler(1e-6).unwrap();
        let h = HistoryState::default();
        VoltageSourceStamper
            .stamp_matrix(&mut m, t, &[10.0], &ctx, &h)
            .unwrap();
        VoltageSourceStamper
            .stamp_rhs(&mut rhs, t, &[10.0], &ctx, 0.0, &h)
            .unwrap();
        assert_eq!(m.get(0, 1), 1.0);
        assert_eq!(m.get(1, 0), 1.0);
        assert_eq!(m.get(1, 1), 0.0);
        assert_eq!(rhs, vec![0.0, 10.0]);
    }

    #[test]
    fn test_voltage_source_requires_branch() {
        let mut m = DenseMatrix::zeros(1);
        let t = Terminals {
            a: Some(0),
            b: None,
            branch: None,
        };
        let ctx = Discretization::backward_euler(1e-6).unwrap();
        assert!(VoltageSourceStamper
            .stamp_matrix(&mut m, t, &[1.0], &ctx, &HistoryState::default())
            .is_err());
    }

    #[test]
    fn test_current_source_direction() {
        let mut rhs = vec![0.0; 2];
        let t = Terminals {
            a: Some(0),
            b: Some(1),
            branch: None,
        };
        let ctx = Discretization::backward_euler(1e-6).unwrap();
        CurrentSourceStamper
            .stamp_rhs(&mut rhs, t, &[1e-3], &ctx, 0.0, &HistoryState::default())
            .unwrap();
        assert_eq!(rhs, vec![-1e-3, 1e-3]);
    }
}
