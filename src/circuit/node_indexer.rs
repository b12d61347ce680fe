//! Terminal bookkeeping: which node each element connects to.

use std::collections::BTreeMap;

use crate::error::{Result, TransimError};

use super::types::NodeId;

/// Terminal pairs of a fixed number of elements.
///
/// Every element starts connected ground-to-ground. `node_max` tracks the
/// highest node index seen and only grows, until [`NodeIndexer::recompute_max`]
/// rescans the terminals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeIndexer {
    terminals: Vec<(NodeId, NodeId)>,
    node_max: usize,
}

impl NodeIndexer {
    /// An indexer for `element_count` elements, all grounded.
    pub fn new(element_count: usize) -> Self {
        Self {
            terminals: vec![(NodeId::GROUND, NodeId::GROUND); element_count],
            node_max: 0,
        }
    }

    /// Build from parallel terminal-A and terminal-B arrays.
    pub fn from_pairs(nodes_a: &[usize], nodes_b: &[usize]) -> Result<Self> {
        if nodes_a.len() != nodes_b.len() {
            return Err(TransimError::InvalidTopology {
                message: format!(
                    "terminal arrays differ in length ({} vs {})",
                    nodes_a.len(),
                    nodes_b.len()
                ),
            });
        }
        let mut indexer = Self::new(nodes_a.len());
        for (element, (&a, &b)) in nodes_a.iter().zip(nodes_b).enumerate() {
            indexer.set_terminals(element, NodeId(a), NodeId(b))?;
        }
        Ok(indexer)
    }

    pub fn element_count(&self) -> usize {
        self.terminals.len()
    }

    /// Connect `element` between nodes `a` and `b`.
    pub fn set_terminals(&mut self, element: usize, a: NodeId, b: NodeId) -> Result<()> {
        let count = self.terminals.len();
        let slot = self
            .terminals
            .get_mut(element)
            .ok_or(TransimError::ElementOutOfRange {
                index: element,
                count,
            })?;
        *slot = (a, b);
        self.node_max = self.node_max.max(a.0).max(b.0);
        Ok(())
    }

    /// Terminal pair of `element`.
    pub fn terminals(&self, element: usize) -> Result<(NodeId, NodeId)> {
        self.terminals
            .get(element)
            .copied()
            .ok_or(TransimError::ElementOutOfRange {
                index: element,
                count: self.terminals.len(),
            })
    }

    /// Terminal A of every element, in element order.
    pub fn all_nodes_a(&self) -> Vec<NodeId> {
        self.terminals.iter().map(|&(a, _)| a).collect()
    }

    /// Terminal B of every element, in element order.
    pub fn all_nodes_b(&self) -> Vec<NodeId> {
        self.terminals.iter().map(|&(_, b)| b).collect()
    }

    /// Highest node index in use.
    pub fn node_max(&self) -> usize {
        self.node_max
    }

    /// Number of nodes including ground.
    pub fn total_node_count(&self) -> usize {
        self.node_max + 1
    }

    /// Elements with at least one terminal on `node`.
    pub fn elements_at_node(&self, node: NodeId) -> Vec<usize> {
        self.terminals
            .iter()
            .enumerate()
            .filter(|(_, &(a, b))| a == node || b == node)
            .map(|(e, _)| e)
            .collect()
    }

    /// A node both elements touch, preferring terminal A of `first`.
    pub fn shared_node(&self, first: usize, second: usize) -> Option<NodeId> {
        let (a1, b1) = self.terminals.get(first).copied()?;
        let (a2, b2) = self.terminals.get(second).copied()?;
        [a1, b1].into_iter().find(|&n| n == a2 || n == b2)
    }

    pub fn share_common_node(&self, first: usize, second: usize) -> bool {
        self.shared_node(first, second).is_some()
    }

    /// Node to incident elements. A self-looped element is listed once.
    pub fn node_to_elements(&self) -> BTreeMap<NodeId, Vec<usize>> {
        let mut map: BTreeMap<NodeId, Vec<usize>> = BTreeMap::new();
        for (element, &(a, b)) in self.terminals.iter().enumerate() {
            map.entry(a).or_default().push(element);
            if b != a {
                map.entry(b).or_default().push(element);
            }
        }
        map
    }

    /// Rescan the terminals for the highest node index.
    pub fn recompute_max(&mut self) {
        self.node_max = self
            .terminals
            .iter()
            .map(|&(a, b)| a.0.max(b.0))
            .max()
            .unwrap_or(0);
    }

    /// Every terminal lies within `0..=node_max`.
    pub fn is_valid(&self) -> bool {
        self.terminals
            .iter()
            .all(|&(a, b)| a.0 <= self.node_max && b.0 <= self.node_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NodeIndexer {
        let mut ni = NodeIndexer::new(5);
        ni.set_terminals(0, NodeId(1), NodeId(2)).unwrap();
        ni.set_terminals(1, NodeId(2), NodeId(3)).unwrap();
        ni.set_terminals(2, NodeId(2), NodeId(4)).unwrap();
        ni.set_terminals(3, NodeId(5), NodeId(6)).unwrap();
        ni.set_terminals(4, NodeId(3), NodeId(2)).unwrap();
        ni
    }

    #[test]
    fn test_node_max_grows() {
        let mut ni = NodeIndexer::new(2);
        assert_eq!(ni.node_max(), 0);
        ni.set_terminals(0, NodeId(5), NodeId(3)).unwrap();
        assert_eq!(ni.node_max(), 5);
        ni.set_terminals(1, NodeId(2), NodeId(10)).unwrap();
        assert_eq!(ni.total_node_count(), 11);
    }

    #[test]
    fn test_out_of_range_element() {
        let mut ni = NodeIndexer::new(2);
        assert!(matches!(
            ni.set_terminals(10, NodeId(1), NodeId(2)),
            Err(TransimError::ElementOutOfRange { index: 10, count: 2 })
        ));
        assert!(ni.terminals(2).is_err());
    }

    #[test]
    fn test_from_pairs_length_mismatch() {
        assert!(NodeIndexer::from_pairs(&[1, 2, 3], &[1, 2]).is_err());
        let ni = NodeIndexer::from_pairs(&[0, 1, 2, 1], &[1, 2, 0, 0]).unwrap();
        assert_eq!(ni.node_max(), 2);
        assert_eq!(ni.terminals(0).unwrap(), (NodeId(0), NodeId(1)));
    }

    #[test]
    fn test_elements_at_node() {
        let ni = sample();
        assert_eq!(ni.elements_at_node(NodeId(2)), vec![0, 1, 2, 4]);
        assert!(ni.elements_at_node(NodeId(99)).is_empty());
    }

    #[test]
    fn test_shared_node() {
        let ni = sample();
        assert_eq!(ni.shared_node(0, 1), Some(NodeId(2)));
        assert_eq!(ni.shared_node(0, 3), None);
        assert!(ni.share_common_node(0, 0));
        assert!(!ni.share_common_node(0, 3));
        assert!(!ni.share_common_node(0, 42));
    }

    #[test]
    fn test_node_to_elements_lists_self_loop_once() {
        let mut ni = NodeIndexer::new(3);
        ni.set_terminals(0, NodeId(0), NodeId(1)).unwrap();
        ni.set_terminals(1, NodeId(1), NodeId(1)).unwrap();
        ni.set_terminals(2, NodeId(0), NodeId(2)).unwrap();
        let map = ni.node_to_elements();
        assert_eq!(map.len(), 3);
        assert_eq!(map[&NodeId(0)], vec![0, 2]);
        assert_eq!(map[&NodeId(1)], vec![0, 1]);
        assert_eq!(map[&NodeId(2)], vec![2]);
    }

    #[test]
    fn test_recompute_max_shrinks() {
        let mut ni = NodeIndexer::new(1);
        ni.set_terminals(0, NodeId(9), NodeId(0)).unwrap();
        ni.set_terminals(0, NodeId(1), NodeId(0)).unwrap();
        assert_eq!(ni.node_max(), 9);
        ni.recompute_max();
        assert_eq!(ni.node_max(), 1);
        assert!(ni.is_valid());
    }
}
