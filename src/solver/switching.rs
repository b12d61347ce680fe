//! State iteration for switching elements (diodes, thyristors, gated switches).

use crate::circuit::{Circuit, HistoryState, NodeId};
use crate::components::StamperRegistry;
use crate::error::Result;

use super::Discretization;

/// Re-solve bookkeeping for elements whose admittance depends on a
/// conduction state.
///
/// After each solve the simulator asks every switching element whether the
/// solution contradicts its assumed state. If any flips, the matrix is
/// re-stamped and the step solved again, up to `max_iterations` times.
#[derive(Debug, Clone)]
pub struct SwitchingIteration {
    /// Maximum re-solves per step
    pub max_iterations: usize,
    /// Element indices with a switching stamper
    elements: Vec<usize>,
    /// Re-solves used in the last step
    last_iterations: usize,
    /// Steps that ran out of iterations
    unsettled_steps: usize,
}

impl SwitchingIteration {
    /// Collect the switching elements of `circuit`.
    pub fn new(circuit: &Circuit, registry: &StamperRegistry, max_iterations: usize) -> Result<Self> {
        let mut elements = Vec::new();
        for element in &circuit.elements {
            let stamper = registry
                .get_stamper(element.kind)
                .map_err(|e| e.for_element(&element.name))?;
            if stamper.is_switching() {
                elements.push(element.id.0);
            }
        }
        Ok(Self {
            max_iterations,
            elements,
            last_iterations: 0,
            unsettled_steps: 0,
        })
    }

    /// Whether there is anything to iterate on.
    pub fn is_active(&self) -> bool {
        !self.elements.is_empty()
    }

    /// Re-evaluate every switching element against solution `x` at `time`.
    ///
    /// Returns the number of elements that changed state.
    pub fn update_states(
        &self,
        circuit: &Circuit,
        registry: &StamperRegistry,
        ctx: &Discretization,
        x: &[f64],
        time: f64,
        history: &mut [HistoryState],
    ) -> Result<usize> {
        let voltage = |node: NodeId| node.matrix_row().map_or(0.0, |row| x[row]);
        let mut changed = 0;
        for &index in &self.elements {
            let element = &circuit.elements[index];
            let stamper = registry
                .get_stamper(element.kind)
                .map_err(|e| e.for_element(&element.name))?;
            let v_a = voltage(element.nodes[0]);
            let v_b = voltage(element.nodes[1]);
            let slot = &mut history[element.history.0];
            let i = stamper
                .calculate_current(v_a, v_b, &element.params, ctx, slot)
                .map_err(|e| e.for_element(&element.name))?;
            if stamper.update_state(v_a - v_b, i, &element.params, time, slot) {
                log::trace!(
                    "{} switched {}",
                    element.name,
                    if slot.conducting { "on" } else { "off" }
                );
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Note how a step's iteration ended.
    pub(crate) fn record(&mut self, iterations: usize, settled: bool) {
        self.last_iterations = iterations;
        if !settled {
            self.unsettled_steps += 1;
        }
    }

    /// Re-solves used in the last step.
    pub fn last_iterations(&self) -> usize {
        self.last_iterations
    }

    /// Steps whose switching states never settled.
    pub fn unsettled_steps(&self) -> usize {
        self.unsettled_steps
    }
}
