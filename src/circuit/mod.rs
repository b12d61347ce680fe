//! Netlist representation, node bookkeeping and validation.
//!
//! A [`Netlist`] is built programmatically or from parsed text, then compiled
//! against a [`crate::components::StamperRegistry`] into a [`Circuit`]: every
//! net gets a node index, every element a history slot, and every voltage
//! source or coupled inductor a branch-current row.

mod coupling;
mod labels;
mod netlist;
mod node_indexer;
mod types;
mod validate;

pub use coupling::{Coupling, CouplingTerm, MutualCouplingRegistry};
pub use labels::LabelResolver;
pub use netlist::{
    is_ground_name, Circuit, CouplingDef, Element, ElementDef, Netlist, Probe, GROUND_ALIASES,
};
pub use node_indexer::NodeIndexer;
pub use types::*;
pub use validate::{missing_labels, validate_circuit};
