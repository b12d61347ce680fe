//! Core types for circuit representation.

use std::fmt;

/// A unique identifier for a node in the circuit.
/// Node 0 is always ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The ground node (always index 0).
    pub const GROUND: NodeId = NodeId(0);

    /// Check if this is the ground node.
    pub fn is_ground(&self) -> bool {
        self.0 == 0
    }

    /// Row of this node's KCL equation in the system matrix.
    /// Returns `None` for ground, which carries no equation.
    pub fn matrix_row(&self) -> Option<usize> {
        if self.is_ground() {
            None
        } else {
            Some(self.0 - 1)
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "N{}", self.0)
        }
    }
}

/// A unique identifier for an element in the netlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub usize);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Index for auxiliary branch-current unknowns (voltage sources, coupled inductors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchId(pub usize);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I{}", self.0)
    }
}

/// Stable slot in the history-state arena owned by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HistorySlot(pub usize);

/// Previous-step state of one element.
///
/// Capacitors read `voltage`, inductors read `current`; the trapezoidal
/// scheme needs both. `conducting` holds the state of switching elements.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HistoryState {
    /// Voltage across the element (terminal A minus terminal B)
    pub voltage: f64,
    /// Current through the element from A to B
    pub current: f64,
    /// Conduction state of diodes and switches
    pub conducting: bool,
    /// When a thyristor last stopped conducting
    pub off_since: Option<f64>,
}

impl HistoryState {
    pub fn new(voltage: f64, current: f64) -> Self {
        Self {
            voltage,
            current,
            conducting: false,
            off_since: None,
        }
    }
}

/// Matrix placement of one element: terminal rows and optional branch row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminals {
    /// Row of terminal A (`None` for ground)
    pub a: Option<usize>,
    /// Row of terminal B (`None` for ground)
    pub b: Option<usize>,
    /// Row of the auxiliary branch-current unknown, if any
    pub branch: Option<usize>,
}

impl Terminals {
    /// Terminals between two nodes, without a branch unknown.
    pub fn between(a: NodeId, b: NodeId) -> Self {
        Self {
            a: a.matrix_row(),
            b: b.matrix_row(),
            branch: None,
        }
    }

    /// Attach a branch-current row.
    pub fn with_branch(mut self, row: usize) -> Self {
        self.branch = Some(row);
        self
    }
}

/// Variable index in the MNA solution vector.
/// Can be either a node voltage or a branch current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarIndex {
    /// Node voltage variable
    Voltage(NodeId),
    /// Branch current variable (for voltage sources, coupled inductors)
    Current(BranchId),
}

impl VarIndex {
    /// Get the raw index into the solution vector.
    /// Node voltages come first (excluding ground), then branch currents.
    pub fn to_index(&self, num_nodes: usize) -> usize {
        match self {
            // Node 0 (ground) is not in the matrix, so subtract 1
            VarIndex::Voltage(NodeId(n)) => {
                debug_assert!(*n > 0, "Ground node should not be in solution vector");
                n - 1
            }
            // Branch currents come after node voltages
            VarIndex::Current(BranchId(b)) => (num_nodes - 1) + b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_has_no_row() {
        assert_eq!(NodeId::GROUND.matrix_row(), None);
        assert_eq!(NodeId(3).matrix_row(), Some(2));
    }

    #[test]
    fn test_var_index_layout() {
        // 3 nodes including ground -> 2 voltage rows, branches start at 2
        assert_eq!(VarIndex::Voltage(NodeId(1)).to_index(3), 0);
        assert_eq!(VarIndex::Current(BranchId(0)).to_index(3), 2);
        assert_eq!(VarIndex::Current(BranchId(1)).to_index(3), 3);
    }

    #[test]
    fn test_terminals_between() {
        let t = Terminals::between(NodeId(2), NodeId::GROUND).with_branch(5);
        assert_eq!(t.a, Some(1));
        assert_eq!(t.b, None);
        assert_eq!(t.branch, Some(5));
    }
}
