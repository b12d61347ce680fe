//! Main simulator interface.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::circuit::{validate_circuit, Circuit, CouplingTerm, HistoryState, NodeId, Probe};
use crate::components::StamperRegistry;
use crate::error::{Result, TransimError};

use super::{
    DenseMatrix, Discretization, IntegrationMethod, LuDecomposition, SimulationResult,
    SwitchingIteration, DEFAULT_MAX_SWITCH_ITERATIONS, DEFAULT_STEP, DEFAULT_STOP_TIME,
};

/// Configuration for the simulator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatorConfig {
    /// Fixed time step (s).
    pub step: f64,
    /// Simulated time span (s).
    pub stop_time: f64,
    /// Integration scheme applied to every reactive element.
    pub method: IntegrationMethod,
    /// Maximum re-solves per step while switching elements change state.
    pub max_switch_iterations: usize,
    /// Record every n-th step.
    pub record_interval: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            step: DEFAULT_STEP,
            stop_time: DEFAULT_STOP_TIME,
            method: IntegrationMethod::default(),
            max_switch_iterations: DEFAULT_MAX_SWITCH_ITERATIONS,
            record_interval: 1,
        }
    }
}

impl SimulatorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time step (in seconds).
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Set the stop time (in seconds).
    pub fn with_stop_time(mut self, stop_time: f64) -> Self {
        self.stop_time = stop_time;
        self
    }

    /// Set the integration scheme.
    ///
    /// - Backward-Euler (default): damped, no ringing on switching events
    /// - Trapezoidal: second-order accurate, may ring on stiff circuits
    pub fn with_method(mut self, method: IntegrationMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the maximum switching re-solves per step.
    pub fn with_max_switch_iterations(mut self, max_switch_iterations: usize) -> Self {
        self.max_switch_iterations = max_switch_iterations;
        self
    }

    /// Record only every n-th step.
    pub fn with_record_interval(mut self, record_interval: usize) -> Self {
        self.record_interval = record_interval;
        self
    }

    /// Number of steps needed to reach `stop_time`.
    pub fn num_steps(&self) -> usize {
        (self.stop_time / self.step).round().max(1.0) as usize
    }

    /// Reject configurations no run can use.
    pub fn validate(&self) -> Result<()> {
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(TransimError::invalid_simulation_param(format!(
                "time step must be positive and finite, got {}",
                self.step
            )));
        }
        if !self.stop_time.is_finite() || self.stop_time <= 0.0 {
            return Err(TransimError::invalid_simulation_param(format!(
                "stop time must be positive and finite, got {}",
                self.stop_time
            )));
        }
        if self.max_switch_iterations == 0 {
            return Err(TransimError::invalid_simulation_param(
                "max switch iterations must be at least 1",
            ));
        }
        if self.record_interval == 0 {
            return Err(TransimError::invalid_simulation_param(
                "record interval must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Where a recorded signal is read from.
#[derive(Debug, Clone, Copy)]
enum ProbeSource {
    /// Solution row of a node voltage (`None` for ground)
    Node(Option<usize>),
    /// Element index into the current vector
    Element(usize),
}

/// The transient circuit simulator.
///
/// Owns everything a run touches: the compiled circuit, its stamper
/// registry, the system matrix and the history array.
pub struct Simulator {
    /// The circuit being simulated
    circuit: Circuit,
    /// Stampers for every element kind in the circuit
    registry: StamperRegistry,
    config: SimulatorConfig,
    ctx: Discretization,
    /// System matrix, re-stamped only when `dirty`
    matrix: DenseMatrix,
    /// Factorization of `matrix`
    lu: Option<LuDecomposition>,
    dirty: bool,
    rhs: Vec<f64>,
    /// Latest solution: node voltages, then branch currents
    solution: Vec<f64>,
    /// Previous-step state, indexed by history slot
    history: Vec<HistoryState>,
    /// Latest current of every element
    currents: Vec<f64>,
    /// Mutual cross terms keyed by inductor element index
    coupling_terms: BTreeMap<usize, Vec<CouplingTerm>>,
    switching: SwitchingIteration,
    probes: Vec<(String, ProbeSource)>,
    time: f64,
    steps: usize,
}

impl Simulator {
    /// Create a simulator with the built-in stampers.
    pub fn new(circuit: Circuit, config: SimulatorConfig) -> Result<Self> {
        Self::with_registry(circuit, StamperRegistry::create_default(), config)
    }

    /// Create a simulator with a custom stamper registry.
    pub fn with_registry(
        circuit: Circuit,
        registry: StamperRegistry,
        config: SimulatorConfig,
    ) -> Result<Self> {
        config.validate()?;
        validate_circuit(&circuit)?;
        let ctx = Discretization::new(config.step, config.method)?;

        let mut history = vec![HistoryState::default(); circuit.elements.len()];
        for element in &circuit.elements {
            let stamper = registry
                .get_stamper(element.kind)
                .map_err(|e| e.for_element(&element.name))?;
            history[element.history.0] = stamper.initial_history(&element.params);
        }
        let currents = history.iter().map(|h| h.current).collect();

        let coupling_terms = circuit
            .couplings
            .build_coupling_arrays(&circuit.branch_rows())?;
        let switching = SwitchingIteration::new(&circuit, &registry, config.max_switch_iterations)?;

        let probes = circuit
            .probes
            .iter()
            .map(|p| {
                let source = match p {
                    Probe::Voltage(net) => {
                        let node = circuit.find_node(net).ok_or_else(|| {
                            TransimError::UnresolvedLabel {
                                label: net.clone(),
                                context: "probe".to_string(),
                            }
                        })?;
                        ProbeSource::Node(node.matrix_row())
                    }
                    Probe::Current(name) => {
                        let element = circuit.find_element(name).ok_or_else(|| {
                            TransimError::UnresolvedLabel {
                                label: name.clone(),
                                context: "probe".to_string(),
                            }
                        })?;
                        ProbeSource::Element(element.id.0)
                    }
                };
                Ok((p.to_string(), source))
            })
            .collect::<Result<Vec<_>>>()?;

        let size = circuit.matrix_size();
        log::debug!(
            "simulator ready: {} unknowns, {}, {} switching elements",
            size,
            ctx,
            if switching.is_active() { "with" } else { "no" }
        );

        Ok(Self {
            circuit,
            registry,
            config,
            ctx,
            matrix: DenseMatrix::zeros(size),
            lu: None,
            dirty: true,
            rhs: vec![0.0; size],
            solution: vec![0.0; size],
            history,
            currents,
            coupling_terms,
            switching,
            probes,
            time: 0.0,
            steps: 0,
        })
    }

    /// Stamp every element's admittance and the mutual cross terms.
    fn stamp_matrix(&mut self) -> Result<()> {
        self.matrix.clear();
        for element in &self.circuit.elements {
            let stamper = self
                .registry
                .get_stamper(element.kind)
                .map_err(|e| e.for_element(&element.name))?;
            stamper
                .stamp_matrix(
                    &mut self.matrix,
                    self.circuit.terminals(element),
                    &element.params,
                    &self.ctx,
                    &self.history[element.history.0],
                )
                .map_err(|e| e.for_element(&element.name))?;
        }

        // Mutual inductance: -(s·M/dt) on the partner's branch current
        let scale = self.ctx.scale() / self.ctx.dt();
        for (&inductor, terms) in &self.coupling_terms {
            if let Some(row) = self.branch_row_of(inductor) {
                for term in terms {
                    self.matrix
                        .add(row, term.partner_branch, -scale * term.mutual_inductance);
                }
            }
        }

        self.lu = Some(self.matrix.lu());
        self.dirty = false;
        log::trace!("re-stamped system matrix at t = {:e}", self.time);
        Ok(())
    }

    /// Stamp sources and history terms for time `time`.
    fn stamp_rhs(&mut self, time: f64) -> Result<()> {
        self.rhs.fill(0.0);
        for element in &self.circuit.elements {
            let stamper = self
                .registry
                .get_stamper(element.kind)
                .map_err(|e| e.for_element(&element.name))?;
            stamper
                .stamp_rhs(
                    &mut self.rhs,
                    self.circuit.terminals(element),
                    &element.params,
                    &self.ctx,
                    time,
                    &self.history[element.history.0],
                )
                .map_err(|e| e.for_element(&element.name))?;
        }

        let scale = self.ctx.scale() / self.ctx.dt();
        for (&inductor, terms) in &self.coupling_terms {
            if let Some(row) = self.branch_row_of(inductor) {
                for term in terms {
                    let i_prev = self.history[self.circuit.elements[term.partner].history.0].current;
                    self.rhs[row] -= scale * term.mutual_inductance * i_prev;
                }
            }
        }
        Ok(())
    }

    fn branch_row_of(&self, element: usize) -> Option<usize> {
        self.circuit.elements[element]
            .branch
            .map(|b| self.circuit.branch_row(b))
    }

    /// Assemble and solve the system at `time`.
    fn solve_at(&mut self, time: f64) -> Result<Vec<f64>> {
        if self.dirty || self.lu.is_none() {
            self.stamp_matrix()?;
        }
        self.stamp_rhs(time)?;
        match &self.lu {
            Some(lu) => lu.solve(&self.rhs),
            None => Err(TransimError::invalid_simulation_param("system was never factorized")),
        }
    }

    /// Advance the simulation by one time step.
    ///
    /// On error the conduction states of switching elements are rolled back
    /// to where they were before the call, so the simulator can be stepped
    /// again after adjusting the circuit or the configuration.
    pub fn step(&mut self) -> Result<()> {
        let snapshot = self.switching.is_active().then(|| self.history.clone());
        let outcome = self.advance();
        if outcome.is_err() {
            if let Some(history) = snapshot {
                self.history = history;
                self.dirty = true;
            }
        }
        outcome
    }

    fn advance(&mut self) -> Result<()> {
        let t_next = self.time + self.ctx.dt();
        let mut x = self.solve_at(t_next)?;

        if self.switching.is_active() {
            let mut settled = false;
            let mut iterations = 0;
            while iterations < self.switching.max_iterations {
                let changed = self.switching.update_states(
                    &self.circuit,
                    &self.registry,
                    &self.ctx,
                    &x,
                    t_next,
                    &mut self.history,
                )?;
                if changed == 0 {
                    settled = true;
                    break;
                }
                iterations += 1;
                self.dirty = true;
                x = self.solve_at(t_next)?;
            }
            if !settled {
                log::warn!(
                    "switching states did not settle after {} iterations at t = {:e}",
                    iterations,
                    t_next
                );
            }
            self.switching.record(iterations, settled);
        }

        let currents = self.element_currents(&x, t_next)?;
        self.check_finite(&x, &currents, t_next)?;

        // Update history
        for (element, &i) in self.circuit.elements.iter().zip(&currents) {
            let v = node_voltage(&x, element.nodes[0]) - node_voltage(&x, element.nodes[1]);
            let slot = &mut self.history[element.history.0];
            slot.voltage = v;
            slot.current = i;
        }

        self.solution = x;
        self.currents = currents;
        self.time = t_next;
        self.steps += 1;
        Ok(())
    }

    /// Current of every element from solution `x`.
    fn element_currents(&self, x: &[f64], time: f64) -> Result<Vec<f64>> {
        self.circuit
            .elements
            .iter()
            .map(|element| {
                let stamper = self
                    .registry
                    .get_stamper(element.kind)
                    .map_err(|e| e.for_element(&element.name))?;
                if let Some(i) = stamper
                    .imposed_current(&element.params, time)
                    .map_err(|e| e.for_element(&element.name))?
                {
                    return Ok(i);
                }
                if let Some(row) = self.branch_row_of(element.id.0) {
                    return Ok(x[row]);
                }
                stamper
                    .calculate_current(
                        node_voltage(x, element.nodes[0]),
                        node_voltage(x, element.nodes[1]),
                        &element.params,
                        &self.ctx,
                        &self.history[element.history.0],
                    )
                    .map_err(|e| e.for_element(&element.name).at_time(time))
            })
            .collect()
    }

    /// Fail with `NotANumber` on the first non-finite voltage or current.
    fn check_finite(&self, x: &[f64], currents: &[f64], time: f64) -> Result<()> {
        for n in 1..self.circuit.num_nodes {
            let value = x[n - 1];
            if !value.is_finite() {
                return Err(TransimError::NotANumber {
                    signal: format!("v({})", self.circuit.node_name(NodeId(n))),
                    time,
                    value,
                });
            }
        }
        for (element, &value) in self.circuit.elements.iter().zip(currents) {
            if !value.is_finite() {
                return Err(TransimError::NotANumber {
                    signal: format!("i({})", element.name),
                    time,
                    value,
                });
            }
        }
        Ok(())
    }

    /// Names of the recorded signals.
    pub fn signal_names(&self) -> Vec<String> {
        self.probes.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Present value of every recorded signal, in [`Simulator::signal_names`] order.
    pub fn sample(&self) -> Vec<f64> {
        self.probes
            .iter()
            .map(|(_, source)| match *source {
                ProbeSource::Node(Some(row)) => self.solution[row],
                ProbeSource::Node(None) => 0.0,
                ProbeSource::Element(index) => self.currents[index],
            })
            .collect()
    }

    fn empty_result(&self) -> SimulationResult {
        SimulationResult::new(
            self.signal_names(),
            self.config.method,
            self.config.step,
        )
    }

    /// Run until the configured stop time.
    pub fn run(&mut self) -> Result<SimulationResult> {
        self.run_until(|_| false)
    }

    /// Run until `stop` returns `true` after a step, or the stop time is
    /// reached.
    pub fn run_until<F>(&mut self, mut stop: F) -> Result<SimulationResult>
    where
        F: FnMut(&Simulator) -> bool,
    {
        let total = self.config.num_steps();
        let interval = self.config.record_interval;
        let mut result = self.empty_result();
        log::info!(
            "transient run: {} steps of {:e} s ({})",
            total,
            self.ctx.dt(),
            self.ctx.method()
        );

        for n in 1..=total {
            self.step()?;
            let halt = stop(&*self);
            if n % interval == 0 || n == total || halt {
                result.push(self.time, self.sample());
            }
            if halt {
                log::debug!("run stopped by caller at t = {:e}", self.time);
                break;
            }
        }

        result.steps = self.steps;
        log::info!(
            "transient run finished: {} steps, {} points, t = {:e}",
            self.steps,
            result.len(),
            self.time
        );
        if self.switching.unsettled_steps() > 0 {
            log::warn!(
                "{} steps ended with unsettled switching states",
                self.switching.unsettled_steps()
            );
        }
        Ok(result)
    }

    /// Simulated time (s).
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Steps completed so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Get the current voltage at a node by name.
    pub fn node_voltage(&self, name: &str) -> Option<f64> {
        let node = self.circuit.find_node(name)?;
        Some(node_voltage(&self.solution, node))
    }

    /// Get the current through an element by name.
    pub fn element_current(&self, name: &str) -> Option<f64> {
        let element = self.circuit.find_element(name)?;
        self.currents.get(element.id.0).copied()
    }

    /// Latest solution vector: node voltages, then branch currents.
    pub fn solution(&self) -> &[f64] {
        &self.solution
    }

    /// History slots, indexed by element.
    pub fn history(&self) -> &[HistoryState] {
        &self.history
    }

    /// Get a reference to the circuit.
    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn discretization(&self) -> &Discretization {
        &self.ctx
    }

    pub fn switching(&self) -> &SwitchingIteration {
        &self.switching
    }
}

fn node_voltage(x: &[f64], node: NodeId) -> f64 {
    node.matrix_row().map_or(0.0, |row| x[row])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Netlist;
    use crate::circuit::Terminals;
    use crate::components::{ComponentType, Stamper};
    use approx::assert_abs_diff_eq;

    fn compile(n: &Netlist) -> Circuit {
        n.compile(&StamperRegistry::create_default()).unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(SimulatorConfig::new().validate().is_ok());
        assert!(SimulatorConfig::new().with_step(0.0).validate().is_err());
        assert!(SimulatorConfig::new().with_stop_time(-1.0).validate().is_err());
        assert!(SimulatorConfig::new().with_record_interval(0).validate().is_err());
        assert!(SimulatorConfig::new()
            .with_max_switch_iterations(0)
            .validate()
            .is_err());
        assert_eq!(
            SimulatorConfig::new().with_step(1e-5).with_stop_time(5e-3).num_steps(),
            500
        );
    }

    #[test]
    fn test_voltage_divider() {
        let mut n = Netlist::new();
        n.add_element("V1", ComponentType::VoltageSource, "in", "0", vec![10.0])
            .add_element("R1", ComponentType::Resistor, "in", "out", vec![1e3])
            .add_element("R2", ComponentType::Resistor, "out", "0", vec![1e3]);
        let mut sim = Simulator::new(compile(&n), SimulatorConfig::new()).unwrap();
        sim.step().unwrap();
        assert_abs_diff_eq!(sim.node_voltage("out").unwrap(), 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(sim.element_current("R1").unwrap(), 5e-3, epsilon = 1e-12);
        // Source current flows into its + terminal through the source
        assert_abs_diff_eq!(sim.element_current("V1").unwrap(), -5e-3, epsilon = 1e-12);
    }

    #[test]
    fn test_current_source_into_resistor() {
        let mut n = Netlist::new();
        // 1 mA leaves ground through the source into node a
        n.add_element("I1", ComponentType::CurrentSource, "0", "a", vec![1e-3])
            .add_element("R1", ComponentType::Resistor, "a", "0", vec![1e3]);
        let mut sim = Simulator::new(compile(&n), SimulatorConfig::new()).unwrap();
        sim.step().unwrap();
        assert_abs_diff_eq!(sim.node_voltage("a").unwrap(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(sim.element_current("I1").unwrap(), 1e-3, epsilon = 1e-15);
    }

    #[test]
    fn test_floating_node_is_singular() {
        let mut n = Netlist::new();
        n.add_element("R1", ComponentType::Resistor, "a", "b", vec![1e3]);
        let mut sim = Simulator::new(compile(&n), SimulatorConfig::new()).unwrap();
        assert!(matches!(sim.step(), Err(TransimError::SingularSystem { .. })));
        assert_eq!(sim.steps(), 0);
    }

    #[test]
    fn test_matrix_reused_without_switching() {
        let mut n = Netlist::new();
        n.add_element("V1", ComponentType::VoltageSource, "in", "0", vec![1.0])
            .add_element("R1", ComponentType::Resistor, "in", "out", vec![1e3])
            .add_element("C1", ComponentType::Capacitor, "out", "0", vec![1e-6]);
        let mut sim = Simulator::new(compile(&n), SimulatorConfig::new()).unwrap();
        sim.step().unwrap();
        assert!(!sim.dirty);
        let before = sim.matrix.clone();
        sim.step().unwrap();
        assert_eq!(sim.matrix, before);
    }

    #[test]
    fn test_diode_half_wave() {
        let mut n = Netlist::new();
        n.add_element("V1", ComponentType::VoltageSource, "in", "0", vec![5.0])
            .add_element("D1", ComponentType::Diode, "in", "out", vec![1e-3, 1e9, 0.7])
            .add_element("R1", ComponentType::Resistor, "out", "0", vec![1e3]);
        let mut sim = Simulator::new(compile(&n), SimulatorConfig::new()).unwrap();
        sim.step().unwrap();
        assert!(sim.history()[1].conducting);
        assert_abs_diff_eq!(sim.node_voltage("out").unwrap(), 4.3, epsilon = 1e-2);

        // Reverse bias blocks
        let mut n = Netlist::new();
        n.add_element("V1", ComponentType::VoltageSource, "in", "0", vec![-5.0])
            .add_element("D1", ComponentType::Diode, "in", "out", vec![])
            .add_element("R1", ComponentType::Resistor, "out", "0", vec![1e3]);
        let mut sim = Simulator::new(compile(&n), SimulatorConfig::new()).unwrap();
        sim.step().unwrap();
        assert!(!sim.history()[1].conducting);
        assert_abs_diff_eq!(sim.node_voltage("out").unwrap(), 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_run_until_stops_early() {
        let mut n = Netlist::new();
        n.add_element("V1", ComponentType::VoltageSource, "in", "0", vec![1.0])
            .add_element("R1", ComponentType::Resistor, "in", "0", vec![1.0]);
        let config = SimulatorConfig::new().with_step(1e-6).with_stop_time(1e-3);
        let mut sim = Simulator::new(compile(&n), config).unwrap();
        let result = sim.run_until(|s| s.steps() == 10).unwrap();
        assert_eq!(result.steps, 10);
        assert_eq!(result.len(), 10);
    }

    #[test]
    fn test_record_interval() {
        let mut n = Netlist::new();
        n.add_element("V1", ComponentType::VoltageSource, "in", "0", vec![1.0])
            .add_element("R1", ComponentType::Resistor, "in", "0", vec![1.0]);
        let config = SimulatorConfig::new()
            .with_step(1e-6)
            .with_stop_time(1e-5)
            .with_record_interval(4);
        let mut sim = Simulator::new(compile(&n), config).unwrap();
        let result = sim.run().unwrap();
        // Steps 4, 8 and the final step 10
        assert_eq!(result.len(), 3);
        assert_eq!(result.steps, 10);
    }

    /// Leaves its node floating once it decides to conduct.
    #[derive(Debug)]
    struct VanishingStamper;

    impl Stamper for VanishingStamper {
        fn component_type(&self) -> ComponentType {
            ComponentType::Diode
        }

        fn validate(&self, _params: &[f64]) -> Result<()> {
            Ok(())
        }

        fn stamp_matrix(
            &self,
            matrix: &mut DenseMatrix,
            terminals: Terminals,
            _params: &[f64],
            _ctx: &Discretization,
            history: &HistoryState,
        ) -> Result<()> {
            if !history.conducting {
                matrix.stamp_conductance(terminals.a, terminals.b, 1e-3);
            }
            Ok(())
        }

        fn calculate_current(
            &self,
            v_a: f64,
            v_b: f64,
            _params: &[f64],
            _ctx: &Discretization,
            history: &HistoryState,
        ) -> Result<f64> {
            Ok(if history.conducting { 0.0 } else { (v_a - v_b) * 1e-3 })
        }

        fn is_switching(&self) -> bool {
            true
        }

        fn update_state(
            &self,
            v: f64,
            _i: f64,
            _params: &[f64],
            _time: f64,
            history: &mut HistoryState,
        ) -> bool {
            let previous = history.conducting;
            history.conducting = v > 0.0;
            history.conducting != previous
        }
    }

    #[test]
    fn test_failed_step_restores_switch_states() {
        let mut registry = StamperRegistry::create_default();
        registry.register(Box::new(VanishingStamper));
        let mut n = Netlist::new();
        n.add_element("I1", ComponentType::CurrentSource, "0", "a", vec![1e-3])
            .add_element("D1", ComponentType::Diode, "a", "0", vec![]);
        let circuit = n.compile(&registry).unwrap();
        let mut sim = Simulator::with_registry(circuit, registry, SimulatorConfig::new()).unwrap();

        // The first solve flips D1, the re-solve then finds node a floating
        assert!(matches!(sim.step(), Err(TransimError::SingularSystem { .. })));
        assert!(!sim.history()[1].conducting);
        assert_eq!(sim.steps(), 0);
        assert_eq!(sim.time(), 0.0);

        // Retrying starts from the same states and fails the same way
        assert!(matches!(sim.step(), Err(TransimError::SingularSystem { .. })));
        assert!(!sim.history()[1].conducting);
    }
}
