//! Element stampers for companion-model circuit simulation.
//!
//! This module provides one stamper per lumped-element kind:
//! - Linear: Resistor, Capacitor, Inductor
//! - Sources: Voltage Source, Current Source
//! - Switching: ideal Switch, piecewise-linear Diode
//! - Power: gate-driven Thyristor, IGBT and MOSFET
//!
//! A stamper is stateless. Everything that changes from step to step lives
//! in the element's [`HistoryState`] slot, owned by the simulator, so one
//! stamper instance serves every element of its kind.

mod controls;
mod diode;
mod linear;
mod power;
mod registry;
mod sources;

pub use controls::{SwitchStamper, DEFAULT_R_OFF, DEFAULT_R_ON};
pub use diode::{DiodeParams, DiodeStamper};
pub use linear::{CapacitorStamper, InductorStamper, ResistorStamper};
pub use power::{GatedParams, IgbtStamper, MosfetStamper, ThyristorStamper};
pub use registry::StamperRegistry;
pub use sources::{CurrentSourceStamper, VoltageSourceStamper, Waveform};

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::circuit::{HistoryState, Terminals};
use crate::error::{Result, TransimError};
use crate::solver::{DenseMatrix, Discretization};

/// Element kinds with a registered stamper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Resistor,
    Capacitor,
    Inductor,
    VoltageSource,
    CurrentSource,
    Switch,
    Diode,
    Thyristor,
    Igbt,
    Mosfet,
}

impl ComponentType {
    /// All kinds, in registration order.
    pub const ALL: [ComponentType; 10] = [
        Self::Resistor,
        Self::Capacitor,
        Self::Inductor,
        Self::VoltageSource,
        Self::CurrentSource,
        Self::Switch,
        Self::Diode,
        Self::Thyristor,
        Self::Igbt,
        Self::Mosfet,
    ];

    /// Parse a component type from its netlist prefix.
    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix.to_ascii_uppercase() {
            'R' => Some(Self::Resistor),
            'C' => Some(Self::Capacitor),
            'L' => Some(Self::Inductor),
            'V' => Some(Self::VoltageSource),
            'I' => Some(Self::CurrentSource),
            'S' => Some(Self::Switch),
            'D' => Some(Self::Diode),
            'T' => Some(Self::Thyristor),
            'Z' => Some(Self::Igbt),
            'M' => Some(Self::Mosfet),
            _ => None,
        }
    }

    /// Short netlist tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Resistor => "R",
            Self::Capacitor => "C",
            Self::Inductor => "L",
            Self::VoltageSource => "V",
            Self::CurrentSource => "I",
            Self::Switch => "S",
            Self::Diode => "D",
            Self::Thyristor => "T",
            Self::Igbt => "Z",
            Self::Mosfet => "M",
        }
    }

    /// Whether the element carries history between steps.
    pub fn is_reactive(&self) -> bool {
        matches!(self, Self::Capacitor | Self::Inductor)
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resistor => "resistor",
            Self::Capacitor => "capacitor",
            Self::Inductor => "inductor",
            Self::VoltageSource => "voltage source",
            Self::CurrentSource => "current source",
            Self::Switch => "switch",
            Self::Diode => "diode",
            Self::Thyristor => "thyristor",
            Self::Igbt => "IGBT",
            Self::Mosfet => "MOSFET",
        };
        f.write_str(name)
    }
}

impl FromStr for ComponentType {
    type Err = TransimError;

    /// Accepts the single-letter tag or the long name, case-insensitive.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        let parsed = match lower.as_str() {
            "r" | "resistor" => Some(Self::Resistor),
            "c" | "capacitor" => Some(Self::Capacitor),
            "l" | "inductor" => Some(Self::Inductor),
            "v" | "vsource" | "voltage_source" => Some(Self::VoltageSource),
            "i" | "isource" | "current_source" => Some(Self::CurrentSource),
            "s" | "sw" | "switch" => Some(Self::Switch),
            "d" | "diode" => Some(Self::Diode),
            "t" | "scr" | "thyristor" => Some(Self::Thyristor),
            "z" | "igbt" => Some(Self::Igbt),
            "m" | "mosfet" => Some(Self::Mosfet),
            _ => None,
        };
        parsed.ok_or_else(|| TransimError::UnknownComponentType {
            component_type: s.to_string(),
            element: String::new(),
        })
    }
}

/// Companion-model contribution of one element kind.
///
/// Node terminals arrive as matrix rows (`None` for ground). `params` is the
/// element's parameter vector, laid out per kind (see each stamper).
pub trait Stamper: fmt::Debug + Send + Sync {
    /// The kind this stamper handles.
    fn component_type(&self) -> ComponentType;

    /// Reject parameter vectors this kind cannot stamp.
    fn validate(&self, params: &[f64]) -> Result<()>;

    /// Whether the element needs an auxiliary branch-current unknown.
    fn needs_branch(&self, _params: &[f64]) -> bool {
        false
    }

    /// History slot contents before the first step.
    fn initial_history(&self, _params: &[f64]) -> HistoryState {
        HistoryState::default()
    }

    /// Add the element's admittance contribution to `matrix` in place.
    fn stamp_matrix(
        &self,
        matrix: &mut DenseMatrix,
        terminals: Terminals,
        params: &[f64],
        ctx: &Discretization,
        history: &HistoryState,
    ) -> Result<()>;

    /// Add history current sources and source values to `rhs`.
    fn stamp_rhs(
        &self,
        _rhs: &mut [f64],
        _terminals: Terminals,
        _params: &[f64],
        _ctx: &Discretization,
        _time: f64,
        _history: &HistoryState,
    ) -> Result<()> {
        Ok(())
    }

    /// Branch current from A to B given present terminal voltages.
    fn calculate_current(
        &self,
        v_a: f64,
        v_b: f64,
        params: &[f64],
        ctx: &Discretization,
        history: &HistoryState,
    ) -> Result<f64>;

    /// Current fixed by the element itself at `time`, independent of the
    /// terminal voltages. Only sources return `Some`.
    fn imposed_current(&self, _params: &[f64], _time: f64) -> Result<Option<f64>> {
        Ok(None)
    }

    /// Whether the admittance depends on a conduction state that can flip
    /// after a solve.
    fn is_switching(&self) -> bool {
        false
    }

    /// Re-evaluate the conduction state from the latest solution at `time`.
    /// Returns `true` if the state changed and the step must be re-solved.
    fn update_state(
        &self,
        _v: f64,
        _i: f64,
        _params: &[f64],
        _time: f64,
        _history: &mut HistoryState,
    ) -> bool {
        false
    }
}

/// Read parameter `index`, failing with `InvalidParameter` when absent or
/// non-finite.
pub(crate) fn required_param(params: &[f64], index: usize, name: &str) -> Result<f64> {
    let value = params
        .get(index)
        .copied()
        .ok_or_else(|| TransimError::invalid_parameter("", name, "missing"))?;
    if !value.is_finite() {
        return Err(TransimError::invalid_parameter(
            "",
            name,
            format!("must be finite, got {}", value),
        ));
    }
    Ok(value)
}

/// Read a strictly positive parameter.
pub(crate) fn positive_param(params: &[f64], index: usize, name: &str) -> Result<f64> {
    let value = required_param(params, index, name)?;
    if value <= 0.0 {
        return Err(TransimError::invalid_parameter(
            "",
            name,
            format!("must be positive, got {}", value),
        ));
    }
    Ok(value)
}

/// Read an optional parameter, falling back to `default` when absent.
pub(crate) fn optional_param(params: &[f64], index: usize, name: &str, default: f64) -> Result<f64> {
    if params.len() > index {
        required_param(params, index, name)
    } else {
        Ok(default)
    }
}

/// Inject `current` into row `a` and draw it from row `b`.
pub(crate) fn inject_current(rhs: &mut [f64], a: Option<usize>, b: Option<usize>, current: f64) {
    if let Some(i) = a {
        rhs[i] += current;
    }
    if let Some(j) = b {
        rhs[j] -= current;
    }
}

/// Guard a computed current against NaN and infinities.
pub(crate) fn finite_current(kind: ComponentType, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(TransimError::NotANumber {
            signal: format!("i({})", kind.tag()),
            time: f64::NAN,
            value,
        })
    }
}
