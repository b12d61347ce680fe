//! Integration schemes and companion-model coefficients.
//!
//! A reactive element is replaced for one time step by a conductance in
//! parallel with a history current source. Both supported schemes share the
//! same formulas up to a scale factor `s`:
//!
//! | Scheme          | `s` | `G_C`    | `G_L`       |
//! |-----------------|-----|----------|-------------|
//! | Backward-Euler  | 1   | `C/dt`   | `dt/L`      |
//! | Trapezoidal     | 2   | `2C/dt`  | `dt/(2L)`   |

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Result, TransimError};

/// Numerical integration scheme for reactive elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationMethod {
    /// First-order, L-stable. No ringing on stiff circuits.
    #[default]
    BackwardEuler,
    /// Second-order, A-stable. May ring on switching events.
    Trapezoidal,
}

impl IntegrationMethod {
    /// Companion-model scale factor.
    pub fn scale(self) -> f64 {
        match self {
            Self::BackwardEuler => 1.0,
            Self::Trapezoidal => 2.0,
        }
    }
}

impl fmt::Display for IntegrationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackwardEuler => write!(f, "BackwardEuler"),
            Self::Trapezoidal => write!(f, "Trapezoidal"),
        }
    }
}

impl FromStr for IntegrationMethod {
    type Err = TransimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "be" | "euler" | "backward-euler" | "backwardeuler" => Ok(Self::BackwardEuler),
            "trap" | "trz" | "trapezoidal" => Ok(Self::Trapezoidal),
            other => Err(TransimError::invalid_simulation_param(format!(
                "unknown integration method '{}'",
                other
            ))),
        }
    }
}

/// Step size and scheme shared by every stamper during one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Discretization {
    dt: f64,
    method: IntegrationMethod,
}

impl Discretization {
    /// Create a context for the given step size and scheme.
    pub fn new(dt: f64, method: IntegrationMethod) -> Result<Self> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(TransimError::invalid_simulation_param(format!(
                "time step must be positive and finite, got {}",
                dt
            )));
        }
        Ok(Self { dt, method })
    }

    /// Backward-Euler context.
    pub fn backward_euler(dt: f64) -> Result<Self> {
        Self::new(dt, IntegrationMethod::BackwardEuler)
    }

    /// Trapezoidal context.
    pub fn trapezoidal(dt: f64) -> Result<Self> {
        Self::new(dt, IntegrationMethod::Trapezoidal)
    }

    /// Time step in seconds.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Selected scheme.
    pub fn method(&self) -> IntegrationMethod {
        self.method
    }

    /// Companion-model scale factor (1 for BE, 2 for trapezoidal).
    pub fn scale(&self) -> f64 {
        self.method.scale()
    }

    pub fn is_backward_euler(&self) -> bool {
        self.method == IntegrationMethod::BackwardEuler
    }

    pub fn is_trapezoidal(&self) -> bool {
        self.method == IntegrationMethod::Trapezoidal
    }

    /// Companion conductance of a capacitor: `s·C/dt`.
    pub fn capacitor_conductance(&self, capacitance: f64) -> Result<f64> {
        check_reactive("capacitance", capacitance)?;
        Ok(self.scale() * capacitance / self.dt)
    }

    /// Companion conductance of an inductor: `dt/(s·L)`.
    pub fn inductor_conductance(&self, inductance: f64) -> Result<f64> {
        check_reactive("inductance", inductance)?;
        Ok(self.dt / (self.scale() * inductance))
    }

    /// Companion resistance of an inductor in branch form: `s·L/dt`.
    pub fn inductor_impedance(&self, inductance: f64) -> Result<f64> {
        check_reactive("inductance", inductance)?;
        Ok(self.scale() * inductance / self.dt)
    }
}

impl fmt::Display for Discretization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Discretization[dt={:e}, method={}]", self.dt, self.method)
    }
}

fn check_reactive(param: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(TransimError::invalid_parameter(
            "",
            param,
            format!("must be positive and finite, got {}", value),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scale_per_method() {
        assert_eq!(IntegrationMethod::BackwardEuler.scale(), 1.0);
        assert_eq!(IntegrationMethod::Trapezoidal.scale(), 2.0);
    }

    #[test]
    fn test_capacitor_conductance() {
        let be = Discretization::backward_euler(1e-6).unwrap();
        let trap = Discretization::trapezoidal(1e-6).unwrap();
        assert_relative_eq!(be.capacitor_conductance(1e-6).unwrap(), 1.0);
        assert_relative_eq!(trap.capacitor_conductance(1e-6).unwrap(), 2.0);
    }

    #[test]
    fn test_inductor_conductance() {
        let be = Discretization::backward_euler(1e-6).unwrap();
        let trap = Discretization::trapezoidal(1e-6).unwrap();
        assert_relative_eq!(be.inductor_conductance(1e-3).unwrap(), 1e-3);
        assert_relative_eq!(trap.inductor_conductance(1e-3).unwrap(), 5e-4);
    }

    #[test]
    fn test_rejects_bad_step() {
        assert!(Discretization::backward_euler(0.0).is_err());
        assert!(Discretization::backward_euler(-1e-6).is_err());
        assert!(Discretization::backward_euler(f64::NAN).is_err());
    }

    #[test]
    fn test_rejects_non_positive_reactance() {
        let ctx = Discretization::backward_euler(1e-6).unwrap();
        assert!(matches!(
            ctx.inductor_conductance(0.0),
            Err(TransimError::InvalidParameter { .. })
        ));
        assert!(ctx.capacitor_conductance(-1e-9).is_err());
        assert!(ctx.capacitor_conductance(f64::INFINITY).is_err());
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!(
            "trap".parse::<IntegrationMethod>().unwrap(),
            IntegrationMethod::Trapezoidal
        );
        assert_eq!(
            "BE".parse::<IntegrationMethod>().unwrap(),
            IntegrationMethod::BackwardEuler
        );
        assert!("gear".parse::<IntegrationMethod>().is_err());
    }

    #[test]
    fn test_display_names_method() {
        let ctx = Discretization::trapezoidal(1e-6).unwrap();
        assert!(ctx.to_string().contains("Trapezoidal"));
    }
}
