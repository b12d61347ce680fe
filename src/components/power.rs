//! Gate-driven power semiconductors: thyristor, IGBT and MOSFET.
//!
//! All three are two-state resistances like the diode, with a gate that
//! decides whether the device may conduct. The gate is enabled by the
//! `gate` flag and active inside the window `t_on <= t < t_off`.
//!
//! Parameter layout, shared by the three kinds:
//! `[gate, r_on, r_off, vf, t_on, t_off, t_rr]`. Everything after `gate` is
//! optional; `t_off` may be infinite. The MOSFET ignores `vf` and `t_rr`,
//! the IGBT ignores `t_rr`.
//!
//! State transitions after each solve:
//!
//! | Device | off -> on | on -> off |
//! |--------|-----------|-----------|
//! | Thyristor | gate active, V >= Vf, `t_rr` elapsed since turn-off | I < 0 (gate ignored) |
//! | IGBT | gate active, V >= Vf | gate inactive or I < 0 |
//! | MOSFET | gate active | gate inactive |
//!
//! Thyristors and IGBTs model the forward drop the way the diode does: a
//! current source `Vf/R_on` in parallel with `1/R_on` while conducting.

use crate::circuit::{HistoryState, Terminals};
use crate::error::{Result, TransimError};
use crate::solver::{DenseMatrix, Discretization};

use super::{
    finite_current, inject_current, optional_param, required_param, ComponentType, Stamper,
};

/// Decoded parameters of a gate-driven device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatedParams {
    /// Gate enabled at all
    pub gate: bool,
    /// Conducting resistance
    pub r_on: f64,
    /// Blocking resistance
    pub r_off: f64,
    /// Forward voltage drop while conducting
    pub vf: f64,
    /// Gate window start
    pub t_on: f64,
    /// Gate window end, exclusive
    pub t_off: f64,
    /// Minimum off time before a thyristor can fire again
    pub recovery_time: f64,
}

impl GatedParams {
    /// Thyristor defaults.
    pub fn thyristor() -> Self {
        Self {
            gate: false,
            r_on: 1e-3,
            r_off: 1e9,
            vf: 1.5,
            t_on: 0.0,
            t_off: f64::INFINITY,
            recovery_time: 10e-6,
        }
    }

    /// IGBT defaults.
    pub fn igbt() -> Self {
        Self {
            recovery_time: 0.0,
            ..Self::thyristor()
        }
    }

    /// MOSFET defaults.
    pub fn mosfet() -> Self {
        Self {
            vf: 0.0,
            ..Self::igbt()
        }
    }

    /// Defaults for `kind`, `None` for kinds that are not gate-driven.
    pub fn defaults(kind: ComponentType) -> Option<Self> {
        match kind {
            ComponentType::Thyristor => Some(Self::thyristor()),
            ComponentType::Igbt => Some(Self::igbt()),
            ComponentType::Mosfet => Some(Self::mosfet()),
            _ => None,
        }
    }

    /// Decode a parameter vector, filling gaps from `defaults`.
    pub fn from_params(params: &[f64], defaults: Self) -> Result<Self> {
        let gate = required_param(params, 0, "gate")? != 0.0;
        let t_off = match params.get(5) {
            Some(v) if v.is_nan() => {
                return Err(TransimError::invalid_parameter("", "toff", "must be a number"));
            }
            Some(&v) => v,
            None => defaults.t_off,
        };
        let p = Self {
            gate,
            r_on: optional_param(params, 1, "ron", defaults.r_on)?,
            r_off: optional_param(params, 2, "roff", defaults.r_off)?,
            vf: optional_param(params, 3, "vf", defaults.vf)?,
            t_on: optional_param(params, 4, "ton", defaults.t_on)?,
            t_off,
            recovery_time: optional_param(params, 6, "trr", defaults.recovery_time)?,
        };
        for (name, r) in [("ron", p.r_on), ("roff", p.r_off)] {
            if r <= 0.0 {
                return Err(TransimError::invalid_parameter(
                    "",
                    name,
                    format!("must be positive, got {}", r),
                ));
            }
        }
        if p.recovery_time < 0.0 {
            return Err(TransimError::invalid_parameter(
                "",
                "trr",
                format!("must not be negative, got {}", p.recovery_time),
            ));
        }
        Ok(p)
    }

    /// Encode into a parameter vector.
    pub fn to_params(&self) -> Vec<f64> {
        vec![
            if self.gate { 1.0 } else { 0.0 },
            self.r_on,
            self.r_off,
            self.vf,
            self.t_on,
            self.t_off,
            self.recovery_time,
        ]
    }

    /// Whether the gate drives the device at `time`.
    pub fn gate_active(&self, time: f64) -> bool {
        self.gate && time >= self.t_on && time < self.t_off
    }

    fn conductance(&self, conducting: bool) -> f64 {
        if conducting {
            1.0 / self.r_on
        } else {
            1.0 / self.r_off
        }
    }
}

fn stamp_two_state(
    matrix: &mut DenseMatrix,
    terminals: Terminals,
    p: &GatedParams,
    history: &HistoryState,
) {
    matrix.stamp_conductance(terminals.a, terminals.b, p.conductance(history.conducting));
}

fn stamp_forward_drop(
    rhs: &mut [f64],
    terminals: Terminals,
    p: &GatedParams,
    history: &HistoryState,
) {
    if history.conducting && p.vf > 0.0 {
        inject_current(rhs, terminals.a, terminals.b, p.conductance(true) * p.vf);
    }
}

fn forward_current(
    kind: ComponentType,
    v: f64,
    p: &GatedParams,
    history: &HistoryState,
) -> Result<f64> {
    let i = if history.conducting {
        (v - p.vf) / p.r_on
    } else {
        v / p.r_off
    };
    finite_current(kind, i)
}

/// Latching thyristor (SCR).
///
/// Fires on an active gate under forward bias and keeps conducting after
/// the gate goes away, until its current reverses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThyristorStamper;

impl ThyristorStamper {
    fn params(params: &[f64]) -> Result<GatedParams> {
        GatedParams::from_params(params, GatedParams::thyristor())
    }
}

impl Stamper for ThyristorStamper {
    fn component_type(&self) -> ComponentType {
        ComponentType::Thyristor
    }

    fn validate(&self, params: &[f64]) -> Result<()> {
        Self::params(params).map(|_| ())
    }

    fn stamp_matrix(
        &self,
        matrix: &mut DenseMatrix,
        terminals: Terminals,
        params: &[f64],
        _ctx: &Discretization,
        history: &HistoryState,
    ) -> Result<()> {
        stamp_two_state(matrix, terminals, &Self::params(params)?, history);
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
        stamp_forward_drop(rhs, terminals, &Self::params(params)?, history);
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
        forward_current(ComponentType::Thyristor, v_a - v_b, &Self::params(params)?, history)
    }

    fn is_switching(&self) -> bool {
        true
    }

    fn update_state(
        &self,
        v: f64,
        i: f64,
        params: &[f64],
        time: f64,
        history: &mut HistoryState,
    ) -> bool {
        let Ok(p) = Self::params(params) else {
            return false;
        };
        let previous = history.conducting;
        if previous {
            if i < 0.0 {
                history.conducting = false;
                history.off_since = Some(time);
            }
        } else {
            let recovered = history
                .off_since
                .map_or(true, |t| time - t >= p.recovery_time);
            if p.gate_active(time) && v >= p.vf && recovered {
                history.conducting = true;
            }
        }
        history.conducting != previous
    }
}

/// IGBT: conducts forward while the gate is active, blocks reverse.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgbtStamper;

impl IgbtStamper {
    fn params(params: &[f64]) -> Result<GatedParams> {
        GatedParams::from_params(params, GatedParams::igbt())
    }
}

impl Stamper for IgbtStamper {
    fn component_type(&self) -> ComponentType {
        ComponentType::Igbt
    }

    fn validate(&self, params: &[f64]) -> Result<()> {
        Self::params(params).map(|_| ())
    }

    fn stamp_matrix(
        &self,
        matrix: &mut DenseMatrix,
        terminals: Terminals,
        params: &[f64],
        _ctx: &Discretization,
        history: &HistoryState,
    ) -> Result<()> {
        stamp_two_state(matrix, terminals, &Self::params(params)?, history);
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
        stamp_forward_drop(rhs, terminals, &Self::params(params)?, history);
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
        forward_current(ComponentType::Igbt, v_a - v_b, &Self::params(params)?, history)
    }

    fn is_switching(&self) -> bool {
        true
    }

    fn update_state(
        &self,
        v: f64,
        i: f64,
        params: &[f64],
        time: f64,
        history: &mut HistoryState,
    ) -> bool {
        let Ok(p) = Self::params(params) else {
            return false;
        };
        let previous = history.conducting;
        let gate = p.gate_active(time);
        if previous {
            if !gate || i < 0.0 {
                history.conducting = false;
            }
        } else if gate && v >= p.vf {
            history.conducting = true;
        }
        history.conducting != previous
    }
}

/// MOSFET as an ideal gate-controlled resistance, conducting both ways.
#[derive(Debug, Clone, Copy, Default)]
pub struct MosfetStamper;

impl MosfetStamper {
    fn params(params: &[f64]) -> Result<GatedParams> {
        GatedParams::from_params(params, GatedParams::mosfet())
    }
}

impl Stamper for MosfetStamper {
    fn component_type(&self) -> ComponentType {
        ComponentType::Mosfet
    }

    fn validate(&self, params: &[f64]) -> Result<()> {
        Self::params(params).map(|_| ())
    }

    fn initial_history(&self, params: &[f64]) -> HistoryState {
        HistoryState {
            conducting: Self::params(params).map_or(false, |p| p.gate_active(0.0)),
            ..HistoryState::default()
        }
    }

    fn stamp_matrix(
        &self,
        matrix: &mut DenseMatrix,
        terminals: Terminals,
        params: &[f64],
        _ctx: &Discretization,
        history: &HistoryState,
    ) -> Result<()> {
        stamp_two_state(matrix, terminals, &Self::params(params)?, history);
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
        let p = Self::params(params)?;
        finite_current(ComponentType::Mosfet, (v_a - v_b) * p.conductance(history.conducting))
    }

    fn is_switching(&self) -> bool {
        true
    }

    fn update_state(
        &self,
        _v: f64,
        _i: f64,
        params: &[f64],
        time: f64,
        history: &mut HistoryState,
    ) -> bool {
        let Ok(p) = Self::params(params) else {
            return false;
        };
        let previous = history.conducting;
        history.conducting = p.gate_active(time);
        history.conducting != previous
    }
}
