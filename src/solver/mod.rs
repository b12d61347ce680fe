//! MNA (Modified Nodal Analysis) transient solver.
//!
//! This module provides the numerical engine for circuit simulation.
//!
//! ## Modified Nodal Analysis
//!
//! MNA assembles a system of equations Ax = z where:
//! - x contains node voltages and branch currents
//! - A is the conductance/coefficient matrix
//! - z is the source vector
//!
//! The matrix structure is:
//! ```text
//! [ G   B ] [ v ]   [ i ]
//! [ C   D ] [ j ] = [ e ]
//! ```
//!
//! where:
//! - G is the conductance matrix (node equations)
//! - B, C connect branch currents to nodes
//! - D holds the companion impedances and mutual terms of coupled
//!   inductors, and is 0 for ideal voltage sources
//! - v is the vector of node voltages
//! - j is the vector of branch currents
//! - i is the sum of current sources into each node
//! - e is the vector of branch equation right-hand sides
//!
//! ## Time stepping
//!
//! Reactive elements are replaced by companion models (see
//! [`Discretization`]), so every step is a single linear solve. Switching
//! elements may force a few re-solves until their states settle.

mod discretization;
mod matrix;
mod result;
mod simulator;
mod switching;

pub use discretization::{Discretization, IntegrationMethod};
pub use matrix::{DenseMatrix, LuDecomposition};
pub use result::SimulationResult;
pub use simulator::{Simulator, SimulatorConfig};
pub use switching::SwitchingIteration;

/// Pivot threshold, relative to the largest entry of the pivot's row,
/// below which the system counts as singular.
pub const PIVOT_TOLERANCE: f64 = 1e-13;

/// Maximum re-solves per step while switching elements change state.
pub const DEFAULT_MAX_SWITCH_ITERATIONS: usize = 20;

/// Default time step in seconds.
pub const DEFAULT_STEP: f64 = 1e-6;

/// Default stop time in seconds.
pub const DEFAULT_STOP_TIME: f64 = 1e-3;
