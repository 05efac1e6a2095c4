use super::graph::GraphView;
use super::node::GraphNode;
use crate::config::{IndexConfig, MAX_LEVEL};
use crate::error::{Result, VectorStoreError};
use crate::metric::DistanceMetric;
use crate::store::{StoredRecord, VectorStore};
use crate::types::{DocId, Document, Neighbor};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;

/// Top of the graph: where every search starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    pub id: DocId,
    pub level: usize,
}

/// Store, nodes and entry point. Each sits behind its own lock so that an
/// insert can commit while queries hold the outer gate shared.
pub(crate) struct IndexState {
    pub(crate) store: RwLock<VectorStore>,
    pub(crate) nodes: RwLock<Vec<Arc<GraphNode>>>,
    pub(crate) entry: RwLock<Option<EntryPoint>>,
}

impl IndexState {
    pub(crate) fn new(
        store: VectorStore,
        nodes: Vec<Arc<GraphNode>>,
        entry: Option<EntryPoint>,
    ) -> Self {
        Self {
            store: RwLock::new(store),
            nodes: RwLock::new(nodes),
            entry: RwLock::new(entry),
        }
    }
}

/// Neighbour-list edits computed before anything is written.
struct InsertPlan {
    id: DocId,
    level: usize,
    layers: Vec<Vec<DocId>>,
    updates: Vec<(DocId, usize, Vec<DocId>)>,
    promote: bool,
}

/// Summary of the index shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub total: usize,
    pub live: usize,
    pub tombstoned: usize,
    /// Level of the entry point, 0 for an empty graph
    pub max_level: usize,
    /// Nodes present on each layer, layer 0 first
    pub layer_counts: Vec<usize>,
    pub total_edges: usize,
    pub m: usize,
    pub ef_construction: usize,
}

/// Hierarchical Navigable Small World index over a [`VectorStore`].
///
/// Mutations (insert, delete, compaction, save) are serialised by one writer
/// lock. Queries never wait on that lock: they only contend with the short
/// commit window of an insert, and with compaction, which takes the index
/// exclusively.
pub struct HnswIndex {
    pub(crate) config: IndexConfig,
    pub(crate) dimension: usize,
    pub(crate) state: RwLock<IndexState>,
    /// Writer lock, also owning the RNG used for level assignment.
    pub(crate) writer: Mutex<StdRng>,
}

impl HnswIndex {
    pub fn new(dimension: usize, config: IndexConfig) -> Result<Self> {
        if dimension == 0 {
            return Err(VectorStoreError::invalid_config("dimension must be > 0"));
        }
        config.validate()?;
        Ok(Self::from_parts(
            dimension,
            config,
            IndexState::new(VectorStore::new(dimension), Vec::new(), None),
        ))
    }

    pub(crate) fn from_parts(dimension: usize, config: IndexConfig, state: IndexState) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            dimension,
            state: RwLock::new(state),
            writer: Mutex::new(rng),
        }
    }

    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    pub const fn metric(&self) -> DistanceMetric {
        self.config.metric
    }

    pub const fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Ids issued and not yet compacted away, tombstones included.
    pub fn len(&self) -> usize {
        self.state.read().store.read().len()
    }

    pub fn live_count(&self) -> usize {
        self.state.read().store.read().live_count()
    }

    /// True when no live document remains.
    pub fn is_empty(&self) -> bool {
        self.live_count() == 0
    }

    pub fn entry_point(&self) -> Option<EntryPoint> {
        *self.state.read().entry.read()
    }

    /// Add a vector and its payload, returning the new id.
    ///
    /// On any error the index is left exactly as it was.
    pub fn insert(&self, vector: Vec<f32>, document: Document) -> Result<DocId> {
        let mut rng = self.writer.lock();
        let state = self.state.read();
        state.store.read().validate(&vector)?;

        let level = self.draw_level(&mut rng);
        let plan = self.plan_insert(&state, &vector, level)?;
        self.commit_insert(&state, plan, vector, document)
    }

    /// Insert many records. Every vector is validated before the first insert,
    /// so a bad record rejects the whole batch.
    pub fn insert_batch(&self, records: Vec<(Vec<f32>, Document)>) -> Result<Vec<DocId>> {
        let mut rng = self.writer.lock();
        let state = self.state.read();
        {
            let store = state.store.read();
            for (vector, _) in &records {
                store.validate(vector)?;
            }
        }

        let mut ids = Vec::with_capacity(records.len());
        for (vector, document) in records {
            let level = self.draw_level(&mut rng);
            let plan = self.plan_insert(&state, &vector, level)?;
            ids.push(self.commit_insert(&state, plan, vector, document)?);
        }
        log::debug!("Inserted batch of {} vectors", ids.len());
        Ok(ids)
    }

    /// Tombstone `id`. It stops appearing in results immediately but keeps
    /// routing traffic until the next compaction.
    ///
    /// Returns `false` if `id` was already deleted.
    pub fn delete(&self, id: DocId) -> Result<bool> {
        let _writer = self.writer.lock();
        let state = self.state.read();
        let removed = state.store.write().mark_deleted(id)?;
        if removed {
            log::debug!("Tombstoned document {id}");
        }
        Ok(removed)
    }

    pub fn get(&self, id: DocId) -> Result<StoredRecord> {
        self.state.read().store.read().get(id)
    }

    /// Approximate k nearest live neighbours, nearest first.
    ///
    /// `ef` is the layer-0 beam width; it is raised to `k` if smaller and
    /// never exceeds the graph size. Fewer than `k` results come back only when
    /// fewer than `k` live documents exist.
    pub fn knn_search(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<Neighbor>> {
        self.reader().knn_search(query, k, ef)
    }

    /// Pin the current id space for a sequence of reads.
    ///
    /// Compaction waits until the reader is dropped, so ids returned by
    /// [`IndexReader::knn_search`] stay valid for [`IndexReader::get`].
    pub fn reader(&self) -> IndexReader<'_> {
        IndexReader {
            index: self,
            state: self.state.read(),
        }
    }

    /// True once the tombstone ratio reaches the configured threshold.
    pub fn should_compact(&self) -> bool {
        let state = self.state.read();
        let store = state.store.read();
        let total = store.len();
        let tombstoned = store.tombstone_count();
        tombstoned > 0 && tombstoned as f32 / total as f32 >= self.config.compaction_threshold
    }

    pub fn stats(&self) -> IndexStats {
        let state = self.state.read();
        let store = state.store.read();
        let nodes = state.nodes.read();
        let entry = *state.entry.read();

        let max_level = entry.map_or(0, |ep| ep.level);
        let mut layer_counts = vec![0usize; if nodes.is_empty() { 0 } else { max_level + 1 }];
        let mut total_edges = 0;
        for node in nodes.iter() {
            for count in layer_counts.iter_mut().take(node.level() + 1) {
                *count += 1;
            }
            total_edges += node.edge_count();
        }

        IndexStats {
            dimension: self.dimension,
            metric: self.config.metric,
            total: store.len(),
            live: store.live_count(),
            tombstoned: store.tombstone_count(),
            max_level,
            layer_counts,
            total_edges,
            m: self.config.m,
            ef_construction: self.config.ef_construction,
        }
    }

    /// `floor(-ln(U) * mL)` with U uniform on (0, 1], capped at [`MAX_LEVEL`].
    fn draw_level(&self, rng: &mut StdRng) -> usize {
        let uniform: f64 = 1.0 - rng.gen::<f64>();
        let level = (-uniform.ln() * self.config.level_multiplier()).floor();
        (level as usize).min(MAX_LEVEL)
    }

    /// Work out where the new node goes, under read locks only.
    fn plan_insert(&self, state: &IndexState, vector: &[f32], level: usize) -> Result<InsertPlan> {
        let store = state.store.read();
        let nodes = state.nodes.read();
        let entry = *state.entry.read();

        let id = store.next_id();
        if nodes.len() != store.len() {
            return Err(VectorStoreError::conflict(format!(
                "graph has {} nodes but store has {} records",
                nodes.len(),
                store.len()
            )));
        }

        let mut layers = vec![Vec::new(); level + 1];
        let Some(entry) = entry else {
            return Ok(InsertPlan {
                id,
                level,
                layers,
                updates: Vec::new(),
                promote: true,
            });
        };

        let view = GraphView::new(self.config.metric, &store, &nodes).with_pending(id, vector);
        if view.node(entry.id).is_none() {
            return Err(VectorStoreError::conflict(format!(
                "entry point {} is not in the graph",
                entry.id
            )));
        }

        let mut current = entry.id;
        for layer in (level + 1..=entry.level).rev() {
            current = view.greedy_closest(vector, current, layer);
        }

        let mut updates = Vec::new();
        let mut entry_points = vec![current];
        for layer in (0..=level.min(entry.level)).rev() {
            let found =
                view.search_layer(vector, &entry_points, self.config.ef_construction, layer, false);

            // Link to live nodes when there are any; tombstones are about to go.
            let live: Vec<Neighbor> =
                found.iter().copied().filter(|n| view.is_live(n.id)).collect();
            let pool = if live.is_empty() { &found } else { &live };

            let selected = view.select_neighbors(pool, self.config.m);
            let cap = self.config.max_neighbors(layer);

            for neighbor in &selected {
                let Some(node) = view.node(neighbor.id) else {
                    continue;
                };
                let mut list = node.neighbors(layer).as_ref().clone();
                if list.contains(&id) {
                    continue;
                }
                list.push(id);
                if list.len() > cap {
                    let candidates = view.measure_from(neighbor.id, &list);
                    list = view
                        .select_neighbors(&candidates, cap)
                        .into_iter()
                        .map(|n| n.id)
                        .collect();
                }
                updates.push((neighbor.id, layer, list));
            }

            layers[layer] = selected.iter().map(|n| n.id).collect();
            if !found.is_empty() {
                entry_points = found.iter().map(|n| n.id).collect();
            }
        }

        Ok(InsertPlan {
            id,
            level,
            layers,
            updates,
            promote: level > entry.level,
        })
    }

    /// Apply a plan. Fails before touching anything if the graph moved since
    /// the plan was made.
    fn commit_insert(
        &self,
        state: &IndexState,
        plan: InsertPlan,
        vector: Vec<f32>,
        document: Document,
    ) -> Result<DocId> {
        {
            let store = state.store.read();
            let nodes = state.nodes.read();
            if store.next_id() != plan.id || nodes.len() != plan.id as usize {
                return Err(VectorStoreError::conflict(format!(
                    "insert planned for id {} but store is at {} and graph at {}",
                    plan.id,
                    store.next_id(),
                    nodes.len()
                )));
            }
        }

        let id = state.store.write().append(vector, document)?;
        state
            .nodes
            .write()
            .push(Arc::new(GraphNode::with_layers(plan.layers)));

        {
            let nodes = state.nodes.read();
            for (neighbor, layer, list) in plan.updates {
                if let Some(node) = nodes.get(neighbor as usize) {
                    node.replace_neighbors(layer, list);
                }
            }
        }

        if plan.promote {
            *state.entry.write() = Some(EntryPoint {
                id,
                level: plan.level,
            });
            log::debug!("New entry point {id} at level {}", plan.level);
        }

        Ok(id)
    }
}

/// Consistent read access to an [`HnswIndex`].
///
/// Holds the index shared; compaction blocks until every reader is dropped.
/// Do not call methods on the owning [`HnswIndex`] while a reader is alive.
pub struct IndexReader<'a> {
    index: &'a HnswIndex,
    state: RwLockReadGuard<'a, IndexState>,
}

impl IndexReader<'_> {
    pub fn metric(&self) -> DistanceMetric {
        self.index.config.metric
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension
    }

    pub fn live_count(&self) -> usize {
        self.state.store.read().live_count()
    }

    pub fn check_dimension(&self, query: &[f32]) -> Result<()> {
        if query.len() != self.index.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.index.dimension,
                actual: query.len(),
            });
        }
        Ok(())
    }

    /// See [`HnswIndex::knn_search`].
    pub fn knn_search(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<Neighbor>> {
        self.check_dimension(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let store = self.state.store.read();
        if store.is_empty() {
            return Ok(Vec::new());
        }
        let nodes = self.state.nodes.read();
        let Some(entry) = *self.state.entry.read() else {
            return Ok(Vec::new());
        };

        let view = GraphView::new(self.index.config.metric, &store, &nodes);
        let mut current = entry.id;
        for layer in (1..=entry.level).rev() {
            current = view.greedy_closest(query, current, layer);
        }

        let beam = ef.max(k).min(nodes.len());
        let mut found = view.search_layer(query, &[current], beam, 0, true);
        let wanted = k.min(store.live_count());
        if found.len() < wanted {
            // Some live nodes are unreachable from the entry point.
            log::debug!(
                "Graph search returned {} of {wanted} live results, scanning",
                found.len()
            );
            found = view.scan_live(query, wanted);
        }
        found.truncate(k);
        Ok(found)
    }

    pub fn get(&self, id: DocId) -> Result<StoredRecord> {
        self.state.store.read().get(id)
    }
}
