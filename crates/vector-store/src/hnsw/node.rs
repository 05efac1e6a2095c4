//! Node representation in the HNSW graph

use crate::types::DocId;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// A node in the HNSW graph
///
/// Each node exists on layers `0..=level`. Layer 0 holds every node; higher
/// layers hold progressively fewer nodes for long-range routing.
///
/// Neighbour lists are replaced wholesale: a writer builds the new list and
/// swaps the pointer, so a concurrent reader sees either the old or the new
/// list, never a partial one.
#[derive(Debug)]
pub(crate) struct GraphNode {
    layers: Box<[ArcSwap<Vec<DocId>>]>,
}

impl GraphNode {
    pub fn with_layers(layers: Vec<Vec<DocId>>) -> Self {
        debug_assert!(!layers.is_empty());
        Self {
            layers: layers
                .into_iter()
                .map(ArcSwap::from_pointee)
                .collect(),
        }
    }

    /// Highest layer this node exists on
    pub fn level(&self) -> usize {
        self.layers.len().saturating_sub(1)
    }

    /// Snapshot of the neighbours on `layer`; empty above the node's level.
    pub fn neighbors(&self, layer: usize) -> Arc<Vec<DocId>> {
        self.layers
            .get(layer)
            .map(|slot| slot.load_full())
            .unwrap_or_default()
    }

    /// Atomically publish a new neighbour list for `layer`.
    pub fn replace_neighbors(&self, layer: usize, neighbors: Vec<DocId>) {
        if let Some(slot) = self.layers.get(layer) {
            slot.store(Arc::new(neighbors));
        }
    }

    /// Owned copy of every layer, lowest first.
    pub fn layers_snapshot(&self) -> Vec<Vec<DocId>> {
        self.layers
            .iter()
            .map(|slot| slot.load().as_ref().clone())
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.layers.iter().map(|slot| slot.load().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_creation() {
        let node = GraphNode::with_layers(vec![vec![1, 2], vec![3], vec![]]);
        assert_eq!(node.level(), 2);
        assert_eq!(node.neighbors(0).as_slice(), &[1, 2]);
        assert_eq!(node.neighbors(1).as_slice(), &[3]);
        assert!(node.neighbors(2).is_empty());
        assert!(node.neighbors(7).is_empty());
        assert_eq!(node.edge_count(), 3);
    }

    #[test]
    fn test_replace_keeps_old_snapshot_intact() {
        let node = GraphNode::with_layers(vec![vec![1, 2, 3]]);
        let before = node.neighbors(0);

        node.replace_neighbors(0, vec![4]);

        assert_eq!(before.as_slice(), &[1, 2, 3]);
        assert_eq!(node.neighbors(0).as_slice(), &[4]);
        assert_eq!(node.layers_snapshot(), vec![vec![4]]);
    }

    #[test]
    fn test_replace_above_level_is_ignored() {
        let node = GraphNode::with_layers(vec![vec![]]);
        node.replace_neighbors(3, vec![1]);
        assert_eq!(node.level(), 0);
        assert!(node.neighbors(3).is_empty());
    }
}
