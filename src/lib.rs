//! # Transim
//!
//! A time-domain circuit simulation core built on companion models.
//!
//! This library provides:
//! - A SPICE-flavoured netlist format and a programmatic netlist builder
//! - Modified Nodal Analysis (MNA) with dense LU factorization
//! - Backward Euler and trapezoidal companion models for capacitors and inductors
//! - Mutually coupled inductors, ideal switches and piecewise-linear diodes
//! - Gate-driven thyristors, IGBTs and MOSFETs
//! - A pluggable stamper registry, one stamper per component type
//!
//! ## Architecture
//!
//! - [`dsl`] - Lexer and parser for the netlist text format
//! - [`circuit`] - Netlist compilation, node/label bookkeeping and coupling registry
//! - [`components`] - Stampers: how each component type enters the MNA system
//! - [`solver`] - Matrix, discretization context and the time-stepping loop
//! - [`output`] - CSV, table and JSON export of recorded signals
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! transim rc.cir --step 10u --stop 5m --format csv > rc.csv
//! ```
//!
//! ### Library
//!
//! ```
//! use transim::{circuit::Netlist, components::{ComponentType, StamperRegistry}};
//! use transim::solver::{Simulator, SimulatorConfig};
//!
//! let mut netlist = Netlist::new();
//! netlist
//!     .add_element("V1", ComponentType::VoltageSource, "in", "0", vec![10.0])
//!     .add_element("R1", ComponentType::Resistor, "in", "out", vec![1e3])
//!     .add_element("C1", ComponentType::Capacitor, "out", "0", vec![1e-6]);
//! let circuit = netlist.compile(&StamperRegistry::create_default()).unwrap();
//!
//! let config = SimulatorConfig::new().with_step(1e-5).with_stop_time(5e-3);
//! let result = Simulator::new(circuit, config).unwrap().run().unwrap();
//! assert!(result.final_value("v(out)").unwrap() > 9.9);
//! ```
//!
//! ## Simulation Method
//!
//! For each fixed time step dt:
//!
//! 1. Reactive elements are replaced by a conductance in parallel with a
//!    history current source (companion model)
//! 2. The system matrix is stamped and LU-factored, reusing the previous
//!    factorization when nothing changed
//! 3. The right-hand side is stamped from sources and history, and solved
//! 4. Diodes and gated switches compare the solution with their assumed
//!    state; on a flip the step is re-stamped and solved again
//! 5. Element currents are derived and stored as history for the next step

pub mod circuit;
pub mod components;
pub mod dsl;
pub mod error;
pub mod output;
pub mod solver;

// Re-export main types for convenience
pub use circuit::{Circuit, Netlist};
pub use error::{Result, TransimError};
pub use solver::{SimulationResult, Simulator, SimulatorConfig};

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmTransient;

/// Parse, compile and run a netlist in one call.
///
/// `.tran`, `.method` and `.options` in the text override `base`.
pub fn simulate(netlist_text: &str, base: SimulatorConfig) -> Result<SimulationResult> {
    let ast = dsl::parse(netlist_text)?;
    let config = ast.simulator_config(base);
    let circuit = Netlist::from_ast(&ast)?.compile(&components::StamperRegistry::create_default())?;
    Simulator::new(circuit, config)?.run()
}
