//! Physical removal of tombstoned documents.
//!
//! Compaction runs in two passes over the old id space and then renumbers:
//!
//! 1. every live list that points at a removed node is rebuilt from its live
//!    neighbours plus the live neighbours of each removed one ("bridging"),
//! 2. a new entry point is chosen if the old one is going away,
//! 3. the store is compacted and every id in the graph is rewritten through
//!    the resulting [`Remap`].

use super::graph::GraphView;
use super::index::{EntryPoint, HnswIndex};
use super::node::GraphNode;
use crate::error::Result;
use crate::store::Remap;
use crate::types::DocId;
use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Instant;

impl HnswIndex {
    /// Drop tombstoned documents and renumber the survivors densely.
    ///
    /// Takes the index exclusively: queries and writers wait until it is done.
    /// Every id issued before the call is invalid afterwards unless it appears
    /// in the returned [`Remap`]. Without tombstones this is a no-op returning
    /// the identity mapping.
    pub fn compact(&self) -> Result<Remap> {
        let _writer = self.writer.lock();
        let mut guard = self.state.write();
        let state = &mut *guard;
        let store = state.store.get_mut();
        let nodes = state.nodes.get_mut();
        let entry = state.entry.get_mut();

        let removed = store.tombstone_count();
        if removed == 0 {
            return Ok(Remap::identity(store.len()));
        }

        let started = Instant::now();
        let mut repaired = 0usize;

        let (rebuilt, new_entry) = {
            let view = GraphView::new(self.config.metric, store, nodes);
            let mut rebuilt: Vec<Option<Vec<Vec<DocId>>>> = Vec::with_capacity(nodes.len());

            for (idx, node) in nodes.iter().enumerate() {
                let id = idx as DocId;
                if !view.is_live(id) {
                    rebuilt.push(None);
                    continue;
                }

                let mut layers = node.layers_snapshot();
                for (layer, list) in layers.iter_mut().enumerate() {
                    if list.iter().all(|&n| view.is_live(n)) {
                        continue;
                    }
                    *list = view.bridge_repair(id, layer, list, self.config.max_neighbors(layer));
                    repaired += 1;
                }
                rebuilt.push(Some(layers));
            }

            let new_entry = match *entry {
                Some(ep) if view.is_live(ep.id) => Some(ep),
                _ => nodes
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| view.is_live(*idx as DocId))
                    .max_by_key(|(idx, node)| (node.level(), Reverse(*idx)))
                    .map(|(idx, node)| EntryPoint {
                        id: idx as DocId,
                        level: node.level(),
                    }),
            };

            (rebuilt, new_entry)
        };

        let remap = store.compact();

        let mut orphans = 0usize;
        let survivors: Vec<Arc<GraphNode>> = rebuilt
            .into_iter()
            .flatten()
            .map(|layers| {
                let layers: Vec<Vec<DocId>> = layers
                    .into_iter()
                    .map(|list| list.into_iter().filter_map(|old| remap.get(old)).collect())
                    .collect();
                if layers.first().is_some_and(|list| list.is_empty()) {
                    orphans += 1;
                }
                Arc::new(GraphNode::with_layers(layers))
            })
            .collect();
        *nodes = survivors;

        *entry = new_entry.and_then(|ep| {
            remap.get(ep.id).map(|id| EntryPoint {
                id,
                level: ep.level,
            })
        });

        if orphans > 0 && nodes.len() > 1 {
            log::warn!("Compaction left {orphans} nodes without layer-0 neighbours");
        }
        log::info!(
            "Compacted index: removed {removed}, repaired {repaired} lists, {} remain ({:?})",
            nodes.len(),
            started.elapsed()
        );

        Ok(remap)
    }
}
