//! Circuit validation.

use crate::components::ComponentType;
use crate::error::{Result, TransimError};

use super::Circuit;

/// Validate a compiled circuit for simulation.
///
/// Checks:
/// - The circuit has at least one element
/// - No two voltage sources are connected across the same pair of nodes
/// - Every net a probe refers to exists
///
/// Nodes touched by a single element are legal (they float to whatever the
/// element drives them to) but usually indicate a typo, so they are logged.
pub fn validate_circuit(circuit: &Circuit) -> Result<()> {
    if circuit.elements.is_empty() {
        return Err(TransimError::InvalidTopology {
            message: "Circuit has no elements".to_string(),
        });
    }

    let sources: Vec<usize> = circuit
        .elements
        .iter()
        .filter(|e| e.kind == ComponentType::VoltageSource)
        .map(|e| e.id.0)
        .collect();
    for (i, &first) in sources.iter().enumerate() {
        for &second in &sources[i + 1..] {
            let (a1, b1) = circuit.indexer.terminals(first)?;
            let (a2, b2) = circuit.indexer.terminals(second)?;
            let parallel = (a1 == a2 && b1 == b2) || (a1 == b2 && b1 == a2);
            if parallel {
                return Err(TransimError::InvalidTopology {
                    message: format!(
                        "voltage sources '{}' and '{}' are connected in parallel",
                        circuit.elements[first].name, circuit.elements[second].name
                    ),
                });
            }
        }
    }

    for (node, elements) in circuit.indexer.node_to_elements() {
        if !node.is_ground() && elements.len() == 1 {
            log::warn!(
                "node '{}' is only connected to '{}'",
                circuit.node_name(node),
                circuit.elements[elements[0]].name
            );
        }
    }

    Ok(())
}

/// Net names from `required` that the circuit does not define.
pub fn missing_labels<'a>(circuit: &Circuit, required: &[&'a str]) -> Vec<String> {
    circuit.labels.validate_labels(
        required
            .iter()
            .copied()
            .filter(|name| circuit.find_node(name).is_none()),
    )
}
