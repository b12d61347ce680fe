//! Linear passive components: Resistor, Capacitor, Inductor.
//!
//! Parameter layouts:
//! - Resistor: `[R]`
//! - Capacitor: `[C, v0]` (initial voltage optional, default 0)
//! - Inductor: `[L, i0]` (initial current optional, default 0)

use crate::circuit::{HistoryState, Terminals};
use crate::error::Result;
use crate::solver::{DenseMatrix, Discretization};

use super::{
    finite_current, inject_current, optional_param, positive_param, ComponentType, Stamper,
};

/// A resistor: a plain conductance `g = 1/R` between its terminals.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResistorStamper;

impl ResistorStamper {
    fn conductance(params: &[f64]) -> Result<f64> {
        Ok(1.0 / positive_param(params, 0, "resistance")?)
    }
}

impl Stamper for ResistorStamper {
    fn component_type(&self) -> ComponentType {
        ComponentType::Resistor
    }

    fn validate(&self, params: &[f64]) -> Result<()> {
        Self::conductance(params).map(|_| ())
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
        let g = Self::conductance(params)?;
        finite_current(ComponentType::Resistor, (v_a - v_b) * g)
    }
}

/// A capacitor, replaced each step by its companion model.
///
/// With scale `s` (1 for Backward-Euler, 2 for trapezoidal):
///
/// ```text
///   G_eq = s·C/dt
///   I_eq = G_eq·v(n-1) + (s-1)·i(n-1)
///   i(n) = G_eq·v(n) - I_eq
/// ```
///
/// `I_eq` is injected into terminal A and drawn from terminal B.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapacitorStamper;

impl CapacitorStamper {
    fn conductance(params: &[f64], ctx: &Discretization) -> Result<f64> {
        ctx.capacitor_conductance(positive_param(params, 0, "capacitance")?)
    }

    fn history_current(g: f64, ctx: &Discretization, history: &HistoryState) -> f64 {
        g * history.voltage + (ctx.scale() - 1.0) * history.current
    }
}

impl Stamper for CapacitorStamper {
    fn component_type(&self) -> ComponentType {
        ComponentType::Capacitor
    }

    fn validate(&self, params: &[f64]) -> Result<()> {
        positive_param(params, 0, "capacitance")?;
        optional_param(params, 1, "ic", 0.0)?;
        Ok(())
    }

    fn initial_history(&self, params: &[f64]) -> HistoryState {
        let v0 = params.get(1).copied().unwrap_or(0.0);
        HistoryState::new(v0, 0.0)
    }

    fn stamp_matrix(
        &self,
        matrix: &mut DenseMatrix,
        terminals: Terminals,
        params: &[f64],
        ctx: &Discretization,
        _history: &HistoryState,
    ) -> Result<()> {
        matrix.stamp_conductance(terminals.a, terminals.b, Self::conductance(params, ctx)?);
        Ok(())
    }

    fn stamp_rhs(
        &self,
        rhs: &mut [f64],
        terminals: Terminals,
        params: &[f64],
        ctx: &Discretization,
        _time: f64,
        history: &HistoryState,
    ) -> Result<()> {
        let g = Self::conductance(params, ctx)?;
        let i_eq = Self::history_current(g, ctx, history);
        inject_current(rhs, terminals.a, terminals.b, i_eq);
        Ok(())
    }

    fn calculate_current(
        &self,
        v_a: f64,
        v_b: f64,
        params: &[f64],
        ctx: &Discretization,
        history: &HistoryState,
    ) -> Result<f64> {
        let g = Self::conductance(params, ctx)?;
        let i = g * (v_a - v_b) - Self::history_current(g, ctx, history);
        finite_current(ComponentType::Capacitor, i)
    }
}

/// An inductor.
///
/// Uncoupled inductors use the admittance form, a conductance in parallel
/// with a history current source:
///
/// ```text
///   G_eq = dt/(s·L)
///   I_hist = i(n-1) + (s-1)·G_eq·v(n-1)
///   i(n) = I_hist + G_eq·v(n)
/// ```
///
/// Inductors that take part in a mutual coupling get a branch row instead,
/// so their current is an unknown the partner's equation can reference:
///
/// ```text
///   vA - vB - (s·L/dt)·i(n) = -(s·L/dt)·i(n-1) - (s-1)·v(n-1)
/// ```
///
/// The simulator adds the mutual cross terms on top of this.
#[derive(Debug, Clone, Copy, Default)]
pub struct InductorStamper;

impl InductorStamper {
    fn inductance(params: &[f64]) -> Result<f64> {
        positive_param(params, 0, "inductance")
    }

    fn history_current(g: f64, ctx: &Discretization, history: &HistoryState) -> f64 {
        history.current + (ctx.scale() - 1.0) * g * history.voltage
    }
}

impl Stamper for InductorStamper {
    fn component_type(&self) -> ComponentType {
        ComponentType::Inductor
    }

    fn validate(&self, params: &[f64]) -> Result<()> {
        Self::inductance(params)?;
        optional_param(params, 1, "ic", 0.0)?;
        Ok(())
    }

    fn initial_history(&self, params: &[f64]) -> HistoryState {
        let i0 = params.get(1).copied().unwrap_or(0.0);
        HistoryState::new(0.0, i0)
    }

    fn stamp_matrix(
        &self,
        matrix: &mut DenseMatrix,
        terminals: Terminals,
        params: &[f64],
        ctx: &Discretization,
        _history: &HistoryState,
    ) -> Result<()> {
        let l = Self::inductance(params)?;
        match terminals.branch {
            Some(br) => {
                matrix.stamp_branch_incidence(terminals.a, terminals.b, br);
                matrix.add(br, br, -ctx.inductor_impedance(l)?);
            }
            None => {
                matrix.stamp_conductance(terminals.a, terminals.b, ctx.inductor_conductance(l)?);
            }
        }
        Ok(())
    }

    fn stamp_rhs(
        &self,
        rhs: &mut [f64],
        terminals: Terminals,
        params: &[f64],
        ctx: &Discretization,
        _time: f64,
        history: &HistoryState,
    ) -> Result<()> {
        let l = Self::inductance(params)?;
        match terminals.branch {
            Some(br) => {
                let z = ctx.inductor_impedance(l)?;
                rhs[br] += -z * history.current - (ctx.scale() - 1.0) * history.voltage;
            }
            None => {
                let g = ctx.inductor_conductance(l)?;
                let i_hist = Self::history_current(g, ctx, history);
                // Current leaves A through the inductor into B
                inject_current(rhs, terminals.a, terminals.b, -i_hist);
            }
        }
        Ok(())
    }

    fn calculate_current(
        &self,
        v_a: f64,
        v_b: f64,
        params: &[f64],
        ctx: &Discretization,
        history: &HistoryState,
    ) -> Result<f64> {
        let g = ctx.inductor_conductance(Self::inductance(params)?)?;
        let i = Self::history_current(g, ctx, history) + g * (v_a - v_b);
        finite_current(ComponentType::Inductor, i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransimError;
    use approx::assert_relative_eq;

    fn be(dt: f64) -> Discretization {
        Discretization::backward_euler(dt).unwrap()
    }

    fn two_node() -> Terminals {
        Terminals {
            a: Some(0),
            b: Some(1),
            branch: None,
        }
    }

    #[test]
    fn test_resistor_stamp_is_symmetric() {
        let mut m = DenseMatrix::zeros(2);
        ResistorStamper
            .stamp_matrix(&mut m, two_node(), &[1000.0], &be(1e-6), &HistoryState::default())
            .unwrap();
        assert_relative_eq!(m.get(0, 0), 1e-3);
        assert_relative_eq!(m.get(1, 1), 1e-3);
        assert_relative_eq!(m.get(0, 1), -1e-3);
        assert_relative_eq!(m.get(1, 0), -1e-3);
    }

    #[test]
    fn test_resistor_rejects_zero() {
        assert!(matches!(
            ResistorStamper.validate(&[0.0]),
            Err(TransimError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_capacitor_backward_euler_current() {
        // i = C·(v - v_prev)/dt
        let history = HistoryState::new(1.0, 0.0);
        let i = CapacitorStamper
            .calculate_current(3.0, 0.0, &[1e-6], &be(1e-6), &history)
            .unwrap();
        assert_relative_eq!(i, 2.0);
    }

    #[test]
    fn test_capacitor_history_injection() {
        let mut rhs = vec![0.0; 2];
        let history = HistoryState::new(2.0, 0.5);
        CapacitorStamper
            .stamp_rhs(&mut rhs, two_node(), &[1e-6], &be(1e-6), 0.0, &history)
            .unwrap();
        // BE ignores the previous current
        assert_relative_eq!(rhs[0], 2.0);
        assert_relative_eq!(rhs[1], -2.0);
    }

    #[test]
    fn test_capacitor_grounded_stamp() {
        // G = C/dt on the diagonal, nothing else with B at ground
        let mut m = DenseMatrix::zeros(1);
        let t = Terminals {
            a: Some(0),
            b: None,
            branch: None,
        };
        CapacitorStamper
            .stamp_matrix(&mut m, t, &[1e-6], &be(1e-5), &HistoryState::default())
            .unwrap();
        assert_relative_eq!(m.get(0, 0), 0.1);
    }

    #[test]
    fn test_capacitor_trapezoidal_uses_previous_current() {
        let trap = Discretization::trapezoidal(1e-6).unwrap();
        let history = HistoryState::new(1.0, 0.5);
        let i = CapacitorStamper
            .calculate_current(1.0, 0.0, &[1e-6], &trap, &history)
            .unwrap();
        assert_relative_eq!(i, -0.5);
    }

    #[test]
    fn test_capacitor_initial_voltage() {
        let h = CapacitorStamper.initial_history(&[1e-6, 5.0]);
        assert_eq!(h.voltage, 5.0);
        assert_eq!(CapacitorStamper.initial_history(&[1e-6]).voltage, 0.0);
    }

    #[test]
    fn test_inductor_backward_euler_current() {
        // i = i_prev + (dt/L)·(vA - vB)
        let history = HistoryState::new(0.0, 0.1);
        let i = InductorStamper
            .calculate_current(2.0, 1.0, &[1e-3], &be(1e-6), &history)
            .unwrap();
        assert_relative_eq!(i, 0.1 + 1e-3);
    }

    #[test]
    fn test_inductor_rejects_non_positive() {
        assert!(matches!(
            InductorStamper.validate(&[0.0]),
            Err(TransimError::InvalidParameter { .. })
        ));
        assert!(InductorStamper.validate(&[-1e-3]).is_err());
        assert!(CapacitorStamper.validate(&[f64::NAN]).is_err());
    }

    #[test]
    fn test_inductor_branch_form() {
        let mut m = DenseMatrix::zeros(3);
        let mut rhs = vec![0.0; 3];
        let t = two_node().with_branch(2);
        let history = HistoryState::new(0.0, 0.2);
        let ctx = be(1e-6);
        InductorStamper
            .stamp_matrix(&mut m, t, &[1e-3], &ctx, &history)
            .unwrap();
        InductorStamper
            .stamp_rhs(&mut rhs, t, &[1e-3], &ctx, 0.0, &history)
            .unwrap();
        assert_eq!(m.get(2, 0), 1.0);
        assert_eq!(m.get(2, 1), -1.0);
        assert_relative_eq!(m.get(2, 2), -1000.0);
        assert_relative_eq!(rhs[2], -200.0);
        assert_eq!(rhs[0], 0.0);
    }

    #[test]
    fn test_inductor_admittance_stamp() {
        // Without a branch row the inductor is a conductance dt/L
        let mut m = DenseMatrix::zeros(2);
        InductorStamper
            .stamp_matrix(&mut m, two_node(), &[1e-3], &be(1e-6), &HistoryState::default())
            .unwrap();
        assert_relative_eq!(m.get(0, 0), 1e-3);
        assert_relative_eq!(m.get(1, 1), 1e-3);
        assert_relative_eq!(m.get(0, 1), -1e-3);
    }

    #[test]
    fn test_inductor_admittance_history_draws_from_a() {
        let mut rhs = vec![0.0; 2];
        let history = HistoryState::new(0.0, 0.3);
        InductorStamper
            .stamp_rhs(&mut rhs, two_node(), &[1e-3], &be(1e-6), 0.0, &history)
            .unwrap();
        assert_relative_eq!(rhs[0], -0.3);
        assert_relative_eq!(rhs[1], 0.3);
    }
}
