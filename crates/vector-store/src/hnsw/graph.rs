//! Read-only traversal primitives shared by insertion, querying and compaction.
//!
//! A [`GraphView`] borrows the store and the node table for the duration of one
//! operation. During insertion the new node is not stored yet; its vector is
//! supplied as `pending` so that neighbour pruning can measure against it.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;

use super::node::GraphNode;
use crate::metric::DistanceMetric;
use crate::store::VectorStore;
use crate::types::{DocId, Neighbor};

/// Heap entry ordered by (distance, id).
#[derive(Clone, Copy)]
struct Scored(Neighbor);

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scored {}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp_by_distance(&other.0)
    }
}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub(crate) struct GraphView<'a> {
    metric: DistanceMetric,
    store: &'a VectorStore,
    nodes: &'a [Arc<GraphNode>],
    pending: Option<(DocId, &'a [f32])>,
}

impl<'a> GraphView<'a> {
    pub fn new(
        metric: DistanceMetric,
        store: &'a VectorStore,
        nodes: &'a [Arc<GraphNode>],
    ) -> Self {
        Self {
            metric,
            store,
            nodes,
            pending: None,
        }
    }

    /// Treat `vector` as the vector of the not-yet-stored node `id`.
    pub fn with_pending(mut self, id: DocId, vector: &'a [f32]) -> Self {
        self.pending = Some((id, vector));
        self
    }

    #[inline]
    pub fn vector(&self, id: DocId) -> Option<&'a [f32]> {
        match self.pending {
            Some((pending_id, vector)) if pending_id == id => Some(vector),
            _ => self.store.vector(id),
        }
    }

    #[inline]
    pub fn node(&self, id: DocId) -> Option<&'a Arc<GraphNode>> {
        self.nodes.get(id as usize)
    }

    #[inline]
    pub fn is_live(&self, id: DocId) -> bool {
        self.store.is_live(id)
    }

    #[inline]
    fn distance_to(&self, query: &[f32], id: DocId) -> f32 {
        self.vector(id)
            .map_or(f32::INFINITY, |vector| self.metric.distance(query, vector))
    }

    /// Single-best greedy step used while descending the upper layers.
    pub fn greedy_closest(&self, query: &[f32], entry: DocId, layer: usize) -> DocId {
        self.search_layer(query, &[entry], 1, layer, false)
            .first()
            .map_or(entry, |nearest| nearest.id)
    }

    /// Beam search on one layer.
    ///
    /// Every reachable node can be expanded, but with `live_only` set only live
    /// nodes enter the result set, so tombstones still route without being
    /// returned. Results are sorted by ascending distance, ties by id.
    pub fn search_layer(
        &self,
        query: &[f32],
        entry_points: &[DocId],
        ef: usize,
        layer: usize,
        live_only: bool,
    ) -> Vec<Neighbor> {
        let ef = ef.max(1);
        // A beam wider than the graph holds every node anyway.
        let hint = ef.min(self.nodes.len());
        let mut visited: HashSet<DocId> =
            HashSet::with_capacity(hint.saturating_mul(4).min(self.nodes.len()));

        // Frontier to expand (closest first)
        let mut candidates: BinaryHeap<Reverse<Scored>> = BinaryHeap::with_capacity(hint);
        // Best `ef` seen so far (worst on top)
        let mut results: BinaryHeap<Scored> = BinaryHeap::with_capacity(hint + 1);

        let accepts = |id: DocId| !live_only || self.store.is_live(id);

        for &ep in entry_points {
            if self.node(ep).is_none() || !visited.insert(ep) {
                continue;
            }
            let hit = Neighbor::new(ep, self.distance_to(query, ep));
            candidates.push(Reverse(Scored(hit)));
            if accepts(ep) {
                results.push(Scored(hit));
                if results.len() > ef {
                    results.pop();
                }
            }
        }

        while let Some(Reverse(Scored(current))) = candidates.pop() {
            if results.len() >= ef {
                if let Some(worst) = results.peek() {
                    if current.distance > worst.0.distance {
                        break;
                    }
                }
            }

            let Some(node) = self.node(current.id) else {
                continue;
            };
            let neighbors = node.neighbors(layer);

            for &next in neighbors.iter() {
                if self.node(next).is_none() || !visited.insert(next) {
                    continue;
                }

                let distance = self.distance_to(query, next);
                let dominated = results.len() >= ef
                    && results.peek().is_some_and(|worst| distance > worst.0.distance);
                if dominated {
                    continue;
                }

                let hit = Neighbor::new(next, distance);
                candidates.push(Reverse(Scored(hit)));
                if accepts(next) {
                    results.push(Scored(hit));
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut found: Vec<Neighbor> = results.into_iter().map(|scored| scored.0).collect();
        found.sort_by(Neighbor::cmp_by_distance);
        found
    }

    /// Exact top `k` over every live node.
    pub fn scan_live(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let mut results: BinaryHeap<Scored> =
            BinaryHeap::with_capacity(k.min(self.nodes.len()).saturating_add(1));
        for idx in 0..self.nodes.len() {
            let id = idx as DocId;
            if !self.is_live(id) {
                continue;
            }
            results.push(Scored(Neighbor::new(id, self.distance_to(query, id))));
            if results.len() > k {
                results.pop();
            }
        }
        let mut found: Vec<Neighbor> = results.into_iter().map(|scored| scored.0).collect();
        found.sort_by(Neighbor::cmp_by_distance);
        found
    }

    /// Diversity heuristic.
    ///
    /// `candidates` carry their distance to the base node. Walking them nearest
    /// first, a candidate is kept only if it is closer to the base than to every
    /// neighbour kept so far. Remaining slots are back-filled with the nearest
    /// skipped candidates.
    pub fn select_neighbors(&self, candidates: &[Neighbor], m: usize) -> Vec<Neighbor> {
        if candidates.is_empty() || m == 0 {
            return Vec::new();
        }

        let mut sorted = candidates.to_vec();
        sorted.sort_by(Neighbor::cmp_by_distance);
        sorted.dedup_by_key(|candidate| candidate.id);

        let mut selected: Vec<Neighbor> = Vec::with_capacity(m);
        let mut skipped: Vec<Neighbor> = Vec::new();

        for candidate in sorted {
            if selected.len() >= m {
                break;
            }
            let Some(candidate_vec) = self.vector(candidate.id) else {
                continue;
            };

            let is_diverse = selected.iter().all(|kept| {
                self.vector(kept.id).map_or(true, |kept_vec| {
                    candidate.distance < self.metric.distance(candidate_vec, kept_vec)
                })
            });

            if is_diverse {
                selected.push(candidate);
            } else {
                skipped.push(candidate);
            }
        }

        for candidate in skipped {
            if selected.len() >= m {
                break;
            }
            selected.push(candidate);
        }

        selected
    }

    /// Distances from `base` to each id in `ids`.
    pub fn measure_from(&self, base: DocId, ids: &[DocId]) -> Vec<Neighbor> {
        let Some(base_vec) = self.vector(base) else {
            return Vec::new();
        };
        ids.iter()
            .filter(|&&id| id != base)
            .filter_map(|&id| {
                self.vector(id)
                    .map(|vector| Neighbor::new(id, self.metric.distance(base_vec, vector)))
            })
            .collect()
    }

    /// Rebuild `node`'s list on `layer` after some of its neighbours were removed.
    ///
    /// Candidates are the surviving neighbours plus the live neighbours of each
    /// removed one, re-selected with the diversity heuristic.
    pub fn bridge_repair(
        &self,
        node: DocId,
        layer: usize,
        list: &[DocId],
        cap: usize,
    ) -> Vec<DocId> {
        let mut seen: HashSet<DocId> = HashSet::new();
        seen.insert(node);
        let mut pool: Vec<DocId> = Vec::new();

        for &neighbor in list {
            if self.is_live(neighbor) {
                if seen.insert(neighbor) {
                    pool.push(neighbor);
                }
                continue;
            }
            let Some(removed) = self.node(neighbor) else {
                continue;
            };
            for &second in removed.neighbors(layer).iter() {
                if self.is_live(second) && seen.insert(second) {
                    pool.push(second);
                }
            }
        }

        let candidates = self.measure_from(node, &pool);
        self.select_neighbors(&candidates, cap)
            .into_iter()
            .map(|neighbor| neighbor.id)
            .collect()
    }
}
