//! Netlist construction and compilation into a simulatable [`Circuit`].

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::components::{
    ComponentType, DiodeParams, GatedParams, StamperRegistry, DEFAULT_R_OFF, DEFAULT_R_ON,
};
use crate::dsl::{ElementLine, NetlistAst};
use crate::error::{Result, TransimError};

use super::coupling::MutualCouplingRegistry;
use super::labels::LabelResolver;
use super::node_indexer::NodeIndexer;
use super::types::{BranchId, ElementId, HistorySlot, NodeId, Terminals};

/// Net names that always refer to ground.
pub const GROUND_ALIASES: [&str; 2] = ["0", "gnd"];

/// Whether `name` is one of the ground aliases.
pub fn is_ground_name(name: &str) -> bool {
    GROUND_ALIASES.iter().any(|g| g.eq_ignore_ascii_case(name))
}

/// One element line before compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDef {
    pub name: String,
    /// Component type tag, resolved against the stamper registry on compile
    pub tag: String,
    pub node_a: String,
    pub node_b: String,
    pub params: Vec<f64>,
}

/// A mutual coupling line before compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CouplingDef {
    pub name: String,
    pub first: String,
    pub second: String,
    pub k: f64,
}

/// A signal to record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Probe {
    /// Voltage of a named net
    Voltage(String),
    /// Current through a named element
    Current(String),
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Probe::Voltage(net) => write!(f, "v({})", net),
            Probe::Current(element) => write!(f, "i({})", element),
        }
    }
}

/// Programmatic netlist builder.
///
/// Nothing is checked until [`Netlist::compile`], which fails on the first
/// unknown type, bad parameter, unresolved name or invalid coupling.
#[derive(Debug, Clone, Default)]
pub struct Netlist {
    elements: Vec<ElementDef>,
    couplings: Vec<CouplingDef>,
    probes: Vec<Probe>,
}

impl Netlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element of a known kind.
    pub fn add_element(
        &mut self,
        name: impl Into<String>,
        kind: ComponentType,
        node_a: impl Into<String>,
        node_b: impl Into<String>,
        params: Vec<f64>,
    ) -> &mut Self {
        self.add_tagged(name, kind.tag(), node_a, node_b, params)
    }

    /// Add an element by type tag.
    pub fn add_tagged(
        &mut self,
        name: impl Into<String>,
        tag: impl Into<String>,
        node_a: impl Into<String>,
        node_b: impl Into<String>,
        params: Vec<f64>,
    ) -> &mut Self {
        self.elements.push(ElementDef {
            name: name.into(),
            tag: tag.into(),
            node_a: node_a.into(),
            node_b: node_b.into(),
            params,
        });
        self
    }

    /// Couple two inductors by element name.
    pub fn add_coupling(
        &mut self,
        name: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
        k: f64,
    ) -> &mut Self {
        self.couplings.push(CouplingDef {
            name: name.into(),
            first: first.into(),
            second: second.into(),
            k,
        });
        self
    }

    /// Record `probe` during simulation. With no probes every node voltage
    /// and element current is recorded.
    pub fn add_probe(&mut self, probe: Probe) -> &mut Self {
        self.probes.push(probe);
        self
    }

    pub fn elements(&self) -> &[ElementDef] {
        &self.elements
    }

    pub fn couplings(&self) -> &[CouplingDef] {
        &self.couplings
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    /// Resolve names, validate parameters and lay out the MNA unknowns.
    pub fn compile(&self, registry: &StamperRegistry) -> Result<Circuit> {
        // Node numbering in order of first appearance
        let mut labels = LabelResolver::new();
        let mut next_node = 1usize;
        let mut node_of = |name: &str, labels: &mut LabelResolver| -> Result<NodeId> {
            if is_ground_name(name) {
                return Ok(NodeId::GROUND);
            }
            if let Some(index) = labels.index(name) {
                return Ok(NodeId(index));
            }
            let id = NodeId(next_node);
            labels.add_label(name, id.0)?;
            next_node += 1;
            Ok(id)
        };

        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(self.elements.len());
        for def in &self.elements {
            if !seen.insert(def.name.to_lowercase()) {
                return Err(TransimError::DuplicateElement {
                    name: def.name.clone(),
                });
            }
            let kind: ComponentType = def
                .tag
                .parse()
                .map_err(|e: TransimError| e.for_element(&def.name))?;
            let stamper = registry
                .get_stamper(kind)
                .map_err(|e| e.for_element(&def.name))?;
            stamper
                .validate(&def.params)
                .map_err(|e| e.for_element(&def.name))?;
            let a = node_of(&def.node_a, &mut labels)?;
            let b = node_of(&def.node_b, &mut labels)?;
            resolved.push((kind, a, b, stamper.needs_branch(&def.params)));
        }
        let num_nodes = next_node;

        let element_index: HashMap<String, usize> = self
            .elements
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.to_lowercase(), i))
            .collect();

        let mut couplings = MutualCouplingRegistry::new();
        for def in &self.couplings {
            let inductor = |name: &str| -> Result<(usize, f64)> {
                let index = *element_index.get(&name.to_lowercase()).ok_or_else(|| {
                    TransimError::UnresolvedLabel {
                        label: name.to_string(),
                        context: def.name.clone(),
                    }
                })?;
                if resolved[index].0 != ComponentType::Inductor {
                    return Err(TransimError::invalid_coupling(format!(
                        "{} couples '{}', which is not an inductor",
                        def.name, name
                    )));
                }
                let inductance = self.elements[index].params.first().copied().unwrap_or(0.0);
                Ok((index, inductance))
            };
            let (first, l_first) = inductor(&def.first)?;
            let (second, l_second) = inductor(&def.second)?;
            couplings.register_coupling(first, second, def.k, l_first, l_second)?;
        }

        let mut indexer = NodeIndexer::new(self.elements.len());
        let mut elements = Vec::with_capacity(self.elements.len());
        let mut num_branches = 0usize;
        for (i, (def, (kind, a, b, needs_branch))) in
            self.elements.iter().zip(resolved).enumerate()
        {
            indexer.set_terminals(i, a, b)?;
            let branch = if needs_branch || couplings.is_coupled(i) {
                num_branches += 1;
                Some(BranchId(num_branches - 1))
            } else {
                None
            };
            elements.push(Element {
                id: ElementId(i),
                name: def.name.clone(),
                kind,
                nodes: [a, b],
                params: def.params.clone(),
                history: HistorySlot(i),
                branch,
            });
        }

        let mut circuit = Circuit {
            elements,
            labels,
            indexer,
            couplings,
            num_nodes,
            num_branches,
            probes: Vec::new(),
        };
        circuit.probes = circuit.resolve_probes(&self.probes)?;

        log::debug!(
            "compiled netlist: {} elements, {} nodes, {} branches, {} couplings",
            circuit.elements.len(),
            circuit.num_nodes,
            circuit.num_branches,
            circuit.couplings.len()
        );
        Ok(circuit)
    }
}

impl Netlist {
    /// Interpret a parsed netlist.
    ///
    /// The first letter of each element name selects its type. Values are
    /// mapped onto the parameter layout of that type's stamper; unknown
    /// prefixes pass their bare values through, so [`Netlist::compile`]
    /// reports them as unknown types.
    pub fn from_ast(ast: &NetlistAst) -> Result<Self> {
        let mut netlist = Self::new();
        for line in &ast.elements {
            let tag = line.prefix();
            let params = match tag.parse::<ComponentType>() {
                Ok(kind) => element_params(kind, line)?,
                Err(_) => line.values.clone(),
            };
            netlist.add_tagged(&line.name, tag, &line.node_a, &line.node_b, params);
        }
        for k in &ast.couplings {
            netlist.add_coupling(&k.name, &k.first, &k.second, k.k);
        }
        for probe in &ast.prints {
            netlist.add_probe(probe.clone());
        }
        Ok(netlist)
    }
}

fn element_params(kind: ComponentType, line: &ElementLine) -> Result<Vec<f64>> {
    let allowed: &[&str] = match kind {
        ComponentType::Capacitor | ComponentType::Inductor => &["ic"],
        ComponentType::Switch => &["ron", "roff"],
        ComponentType::Diode => &["ron", "roff", "vf"],
        ComponentType::Thyristor => &["ron", "roff", "vf", "ton", "toff", "trr"],
        ComponentType::Igbt => &["ron", "roff", "vf", "ton", "toff"],
        ComponentType::Mosfet => &["ron", "roff", "ton", "toff"],
        _ => &[],
    };
    if let Some(key) = line.params.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(TransimError::parse(
            line.line,
            format!("unknown parameter '{}' for {}", key, line.name),
        ));
    }
    let value = || {
        line.values.first().copied().ok_or_else(|| {
            TransimError::parse(line.line, format!("{} is missing its value", line.name))
        })
    };
    let param = |key: &str, default: f64| line.params.get(key).copied().unwrap_or(default);

    Ok(match kind {
        ComponentType::Resistor => vec![value()?],
        ComponentType::Capacitor | ComponentType::Inductor => vec![value()?, param("ic", 0.0)],
        ComponentType::VoltageSource | ComponentType::CurrentSource => match &line.function {
            Some(f) if f.name == "SIN" => {
                if !(3..=4).contains(&f.args.len()) {
                    return Err(TransimError::parse(
                        line.line,
                        format!("{}: SIN takes (offset amplitude freq [phase])", line.name),
                    ));
                }
                f.args.clone()
            }
            Some(f) => {
                return Err(TransimError::parse(
                    line.line,
                    format!("{}: unsupported source function {}", line.name, f.name),
                ));
            }
            None => vec![value()?],
        },
        ComponentType::Switch => {
            let state = if line.has_keyword("on") {
                1.0
            } else if line.has_keyword("off") {
                0.0
            } else {
                line.values.first().copied().unwrap_or(0.0)
            };
            vec![
                state,
                param("ron", DEFAULT_R_ON),
                param("roff", DEFAULT_R_OFF),
            ]
        }
        ComponentType::Diode => {
            let d = DiodeParams::default();
            vec![param("ron", d.r_on), param("roff", d.r_off), param("vf", d.vf)]
        }
        ComponentType::Thyristor | ComponentType::Igbt | ComponentType::Mosfet => {
            let mut g = GatedParams::defaults(kind).unwrap_or_else(GatedParams::thyristor);
            // The gate is enabled unless switched off explicitly
            g.gate = if line.has_keyword("off") {
                false
            } else {
                line.values.first().map_or(true, |&v| v != 0.0)
            };
            g.r_on = param("ron", g.r_on);
            g.r_off = param("roff", g.r_off);
            g.vf = param("vf", g.vf);
            g.t_on = param("ton", g.t_on);
            g.t_off = param("toff", g.t_off);
            g.recovery_time = param("trr", g.recovery_time);
            g.to_params()
        }
    })
}

/// A compiled element.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: ElementId,
    pub name: String,
    pub kind: ComponentType,
    /// `[A, B]`; current is measured from A through the element to B
    pub nodes: [NodeId; 2],
    pub params: Vec<f64>,
    /// Slot of this element in the simulator's history array
    pub history: HistorySlot,
    /// Auxiliary branch-current unknown, if any
    pub branch: Option<BranchId>,
}

/// A compiled circuit ready for simulation.
#[derive(Debug, Clone)]
pub struct Circuit {
    pub elements: Vec<Element>,
    /// Net name ↔ node index
    pub labels: LabelResolver,
    pub indexer: NodeIndexer,
    pub couplings: MutualCouplingRegistry,
    /// Number of nodes (including ground)
    pub num_nodes: usize,
    /// Number of branch current variables (voltage sources, coupled inductors)
    pub num_branches: usize,
    /// Signals to record, resolved
    pub probes: Vec<Probe>,
}

impl Circuit {
    /// Get the total size of the MNA solution vector.
    pub fn matrix_size(&self) -> usize {
        // Nodes (excluding ground) + branch currents
        (self.num_nodes - 1) + self.num_branches
    }

    /// Get the matrix index for a branch current.
    pub fn branch_row(&self, branch: BranchId) -> usize {
        (self.num_nodes - 1) + branch.0
    }

    /// Matrix placement of an element.
    pub fn terminals(&self, element: &Element) -> Terminals {
        let t = Terminals::between(element.nodes[0], element.nodes[1]);
        match element.branch {
            Some(b) => t.with_branch(self.branch_row(b)),
            None => t,
        }
    }

    /// Find a node ID by net name (ground aliases included).
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        if is_ground_name(name) {
            Some(NodeId::GROUND)
        } else {
            self.labels.index(name).map(NodeId)
        }
    }

    /// Get the name of a node.
    pub fn node_name(&self, node: NodeId) -> &str {
        if node.is_ground() {
            GROUND_ALIASES[0]
        } else {
            self.labels.label(node.0).unwrap_or("?")
        }
    }

    /// Find an element by name, case-insensitive.
    pub fn find_element(&self, name: &str) -> Option<&Element> {
        self.elements
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Branch row of every element that has one, keyed by element index.
    pub fn branch_rows(&self) -> HashMap<usize, usize> {
        self.elements
            .iter()
            .filter_map(|e| e.branch.map(|b| (e.id.0, self.branch_row(b))))
            .collect()
    }

    /// Every node voltage and element current, in that order.
    pub fn all_probes(&self) -> Vec<Probe> {
        let voltages = (1..self.num_nodes)
            .map(|n| Probe::Voltage(self.node_name(NodeId(n)).to_string()));
        let currents = self.elements.iter().map(|e| Probe::Current(e.name.clone()));
        voltages.chain(currents).collect()
    }

    fn resolve_probes(&self, requested: &[Probe]) -> Result<Vec<Probe>> {
        if requested.is_empty() {
            return Ok(self.all_probes());
        }
        let nets: Vec<&str> = requested
            .iter()
            .filter_map(|p| match p {
                Probe::Voltage(net) if !is_ground_name(net) => Some(net.as_str()),
                _ => None,
            })
            .collect();
        if let Some(missing) = self.labels.validate_labels(nets).into_iter().next() {
            return Err(TransimError::UnresolvedLabel {
                label: missing,
                context: ".print".to_string(),
            });
        }
        for probe in requested {
            if let Probe::Current(name) = probe {
                if self.find_element(name).is_none() {
                    return Err(TransimError::UnresolvedLabel {
                        label: name.clone(),
                        context: ".print".to_string(),
                    });
                }
            }
        }
        Ok(requested.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rc() -> Netlist {
        let mut n = Netlist::new();
        n.add_element("V1", ComponentType::VoltageSource, "in", "0", vec![10.0])
            .add_element("R1", ComponentType::Resistor, "in", "out", vec![1e3])
            .add_element("C1", ComponentType::Capacitor, "out", "GND", vec![1e-6]);
        n
    }

    #[test]
    fn test_compile_layout() {
        let c = rc().compile(&StamperRegistry::create_default()).unwrap();
        assert_eq!(c.num_nodes, 3);
        assert_eq!(c.num_branches, 1);
        assert_eq!(c.matrix_size(), 3);
        assert_eq!(c.find_node("OUT"), Some(NodeId(2)));
        assert_eq!(c.find_node("gnd"), Some(NodeId::GROUND));
        assert_eq!(c.node_name(NodeId(1)), "in");
        let v1 = c.find_element("v1").unwrap();
        assert_eq!(c.terminals(v1).branch, Some(2));
        // One history slot per element
        let slots: HashSet<_> = c.elements.iter().map(|e| e.history).collect();
        assert_eq!(slots.len(), 3);
    }

    #[test]
    fn test_unknown_tag_fails_compile() {
        let mut n = rc();
        n.add_tagged("Q1", "Q", "out", "0", vec![]);
        match n.compile(&StamperRegistry::create_default()) {
            Err(TransimError::UnknownComponentType { element, .. }) => assert_eq!(element, "Q1"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unregistered_kind_fails_compile() {
        let mut registry = StamperRegistry::create_default();
        registry.unregister(ComponentType::Capacitor);
        assert!(matches!(
            rc().compile(&registry),
            Err(TransimError::UnknownComponentType { .. })
        ));
    }

    #[test]
    fn test_bad_parameter_names_element() {
        let mut n = Netlist::new();
        n.add_element("L1", ComponentType::Inductor, "a", "0", vec![0.0]);
        match n.compile(&StamperRegistry::create_default()) {
            Err(TransimError::InvalidParameter { element, .. }) => assert_eq!(element, "L1"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_element_name() {
        let mut n = rc();
        n.add_element("r1", ComponentType::Resistor, "out", "0", vec![1.0]);
        assert!(matches!(
            n.compile(&StamperRegistry::create_default()),
            Err(TransimError::DuplicateElement { .. })
        ));
    }

    #[test]
    fn test_coupled_inductors_get_branches() {
        let mut n = Netlist::new();
        n.add_element("L1", ComponentType::Inductor, "a", "0", vec![1e-3])
            .add_element("L2", ComponentType::Inductor, "b", "0", vec![1e-3])
            .add_element("L3", ComponentType::Inductor, "c", "0", vec![1e-3])
            .add_coupling("K1", "L1", "l2", 0.9);
        let c = n.compile(&StamperRegistry::create_default()).unwrap();
        assert_eq!(c.num_branches, 2);
        assert!(c.elements[0].branch.is_some());
        assert!(c.elements[2].branch.is_none());
        assert!(c.couplings.are_coupled(0, 1));
    }

    #[test]
    fn test_coupling_errors() {
        let registry = StamperRegistry::create_default();
        let mut n = rc();
        n.add_coupling("K1", "R1", "C1", 0.5);
        assert!(matches!(
            n.compile(&registry),
            Err(TransimError::InvalidCoupling { .. })
        ));

        let mut n = rc();
        n.add_coupling("K1", "L9", "C1", 0.5);
        assert!(matches!(
            n.compile(&registry),
            Err(TransimError::UnresolvedLabel { .. })
        ));
    }

    #[test]
    fn test_probe_resolution() {
        let registry = StamperRegistry::create_default();
        let mut n = rc();
        n.add_probe(Probe::Voltage("nowhere".into()));
        assert!(matches!(
            n.compile(&registry),
            Err(TransimError::UnresolvedLabel { .. })
        ));

        let c = rc().compile(&registry).unwrap();
        let names: Vec<String> = c.probes.iter().map(|p| p.to_string()).collect();
        assert_eq!(names, vec!["v(in)", "v(out)", "i(V1)", "i(R1)", "i(C1)"]);
    }
}
