//! Syntax tree for a parsed netlist.

use std::collections::HashMap;

use crate::circuit::Probe;
use crate::solver::{IntegrationMethod, SimulatorConfig};

/// Complete parsed netlist, before element values are interpreted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetlistAst {
    /// Element lines in source order
    pub elements: Vec<ElementLine>,
    /// `K` coupling lines
    pub couplings: Vec<CouplingLine>,
    /// Signals named by `.print`
    pub prints: Vec<Probe>,
    /// `.tran <step> <stop>`
    pub tran: Option<TranDirective>,
    /// `.method be|trap`
    pub method: Option<IntegrationMethod>,
    /// `.options key=value ...`
    pub options: HashMap<String, f64>,
}

impl NetlistAst {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the analysis directives on top of `base`.
    ///
    /// Recognized options are `maxswitch` and `record`.
    pub fn simulator_config(&self, base: SimulatorConfig) -> SimulatorConfig {
        let mut config = base;
        if let Some(tran) = self.tran {
            config = config.with_step(tran.step).with_stop_time(tran.stop);
        }
        if let Some(method) = self.method {
            config = config.with_method(method);
        }
        if let Some(&n) = self.options.get("maxswitch") {
            config = config.with_max_switch_iterations(n.max(0.0) as usize);
        }
        if let Some(&n) = self.options.get("record") {
            config = config.with_record_interval(n.max(1.0) as usize);
        }
        config
    }
}

/// One element line.
///
/// Values are kept in the form they were written; the element prefix
/// decides how they become a parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementLine {
    pub name: String,
    pub node_a: String,
    pub node_b: String,
    /// Bare numeric values after the nodes
    pub values: Vec<f64>,
    /// Bare keywords after the nodes (`DC`, `on`, `off`)
    pub keywords: Vec<String>,
    /// Function-style value such as `SIN(0 1 50)`
    pub function: Option<FunctionCall>,
    /// `key=value` pairs, keys lowercased
    pub params: HashMap<String, f64>,
    /// Source line number for error reporting
    pub line: usize,
}

impl ElementLine {
    /// Type tag implied by the first letter of the name.
    pub fn prefix(&self) -> String {
        self.name
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase().to_string())
            .unwrap_or_default()
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k.eq_ignore_ascii_case(keyword))
    }
}

/// A `NAME(arg arg ...)` value.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Function name, uppercased
    pub name: String,
    pub args: Vec<f64>,
}

/// `K<name> <inductor> <inductor> <k>`
#[derive(Debug, Clone, PartialEq)]
pub struct CouplingLine {
    pub name: String,
    pub first: String,
    pub second: String,
    pub k: f64,
    pub line: usize,
}

/// Transient analysis directive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranDirective {
    pub step: f64,
    pub stop: f64,
}
