//! Binary on-disk format.
//!
//! All integers are little-endian.
//!
//! ```text
//! magic            b"SIDX"
//! version          u16
//! dimension        u32
//! metric           u8    (0 cosine, 1 dot, 2 l2)
//! node_count       u32
//! top_layer        u8
//! entry_point      u32   (u32::MAX when the graph is empty)
//! m                u32
//! ef_construction  u32
//! ef_search        u32
//! node_count × {
//!     id           u32   (must equal its position)
//!     vector       f32 × dimension
//!     tombstone    u8    (0 or 1)
//!     level        u8
//!     (level + 1) × { count u32, neighbour ids u32 × count }
//! }
//! node_count × { payload_len u64, payload bytes }
//! sha256           32 bytes over everything above
//! ```
//!
//! Loading verifies the checksum first and then every structural invariant of
//! the graph. Any failure is reported as [`VectorStoreError::CorruptIndex`];
//! a corrupt file is never partially loaded.

use crate::config::{IndexConfig, MAX_LEVEL};
use crate::error::{Result, VectorStoreError};
use crate::hnsw::{EntryPoint, GraphNode, HnswIndex, IndexState};
use crate::metric::DistanceMetric;
use crate::store::VectorStore;
use crate::types::{DocId, Document};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

const MAGIC: &[u8; 4] = b"SIDX";
const FORMAT_VERSION: u16 = 1;
const NO_ENTRY: u32 = u32::MAX;
const CHECKSUM_LEN: usize = 32;

/// magic + version + dimension + metric + node_count + top_layer + entry + m + ef_c + ef_s
const HEADER_LEN: usize = 4 + 2 + 4 + 1 + 4 + 1 + 4 + 4 + 4 + 4;

/// Everything needed to rebuild an index, detached from its locks.
pub(crate) struct IndexSnapshot {
    pub dimension: usize,
    pub config: IndexConfig,
    pub store: VectorStore,
    pub layers: Vec<Vec<Vec<DocId>>>,
    pub entry: Option<EntryPoint>,
}

impl HnswIndex {
    /// Consistent copy of the index, taken under the writer lock so no
    /// mutation can interleave.
    pub(crate) fn snapshot(&self) -> IndexSnapshot {
        let _writer = self.writer.lock();
        let state = self.state.read();
        let store = state.store.read().clone();
        let layers = state
            .nodes
            .read()
            .iter()
            .map(|node| node.layers_snapshot())
            .collect();
        let entry = *state.entry.read();
        IndexSnapshot {
            dimension: self.dimension,
            config: self.config.clone(),
            store,
            layers,
            entry,
        }
    }

    /// Serialise the whole index, checksum included.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(&self.snapshot())
    }

    /// Rebuild an index from [`HnswIndex::to_bytes`] output.
    ///
    /// Graph parameters and the metric come from the data; the remaining
    /// configuration takes its defaults.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let snapshot = decode(bytes)?;
        let nodes = snapshot
            .layers
            .into_iter()
            .map(|layers| Arc::new(GraphNode::with_layers(layers)))
            .collect();
        Ok(Self::from_parts(
            snapshot.dimension,
            snapshot.config,
            IndexState::new(snapshot.store, nodes, snapshot.entry),
        ))
    }

    /// Write the index to `path` atomically: a crash leaves either the old
    /// file or the new one, never a torn write.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let started = Instant::now();
        let bytes = self.to_bytes()?;
        write_atomic(path, &bytes)?;
        log::info!(
            "Saved index to {} ({} bytes, {:?})",
            path.display(),
            bytes.len(),
            started.elapsed()
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let started = Instant::now();
        let bytes = fs::read(path)?;
        let index = Self::from_bytes(&bytes)?;
        log::info!(
            "Loaded index from {} ({} records, {:?})",
            path.display(),
            index.len(),
            started.elapsed()
        );
        Ok(index)
    }
}

fn to_u32(value: usize, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        VectorStoreError::InvalidConfig(format!("{field} ({value}) does not fit the index format"))
    })
}

pub(crate) fn encode(snapshot: &IndexSnapshot) -> Result<Vec<u8>> {
    let store = &snapshot.store;
    let dimension = snapshot.dimension;
    let node_count = snapshot.layers.len();
    if node_count != store.len() {
        return Err(VectorStoreError::conflict(format!(
            "snapshot has {node_count} nodes but {} records",
            store.len()
        )));
    }

    let mut out = Vec::with_capacity(HEADER_LEN + node_count * (dimension * 4 + 64) + CHECKSUM_LEN);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&to_u32(dimension, "dimension")?.to_le_bytes());
    out.push(snapshot.config.metric.id());
    out.extend_from_slice(&to_u32(node_count, "node count")?.to_le_bytes());
    let (top_layer, entry) = snapshot
        .entry
        .map_or((0, NO_ENTRY), |ep| (ep.level as u8, ep.id));
    out.push(top_layer);
    out.extend_from_slice(&entry.to_le_bytes());
    out.extend_from_slice(&to_u32(snapshot.config.m, "m")?.to_le_bytes());
    let ef_construction = to_u32(snapshot.config.ef_construction, "ef_construction")?;
    out.extend_from_slice(&ef_construction.to_le_bytes());
    out.extend_from_slice(&to_u32(snapshot.config.ef_search, "ef_search")?.to_le_bytes());

    for (idx, layers) in snapshot.layers.iter().enumerate() {
        let id = idx as DocId;
        out.extend_from_slice(&id.to_le_bytes());
        let vector = store
            .vector(id)
            .ok_or_else(|| VectorStoreError::conflict(format!("record {id} vanished")))?;
        for component in vector {
            out.extend_from_slice(&component.to_le_bytes());
        }
        out.push(u8::from(store.is_tombstoned(id)));
        out.push(layers.len().saturating_sub(1) as u8);
        for list in layers {
            out.extend_from_slice(&(list.len() as u32).to_le_bytes());
            for neighbor in list {
                out.extend_from_slice(&neighbor.to_le_bytes());
            }
        }
    }

    for idx in 0..node_count {
        let payload = store
            .document(idx as DocId)
            .map(|doc| doc.as_bytes())
            .unwrap_or_default();
        out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        out.extend_from_slice(payload);
    }

    let checksum = Sha256::digest(&out);
    out.extend_from_slice(&checksum);
    Ok(out)
}

/// Bounds-checked little-endian reader. Every short read names the field.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize, field: &str) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(VectorStoreError::corrupt(format!("truncated at {field}")));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, field: &str) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N, field)?);
        Ok(buf)
    }

    fn u8(&mut self, field: &str) -> Result<u8> {
        Ok(self.array::<1>(field)?[0])
    }

    fn u16(&mut self, field: &str) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array(field)?))
    }

    fn u32(&mut self, field: &str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array(field)?))
    }

    fn u64(&mut self, field: &str) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array(field)?))
    }

    fn f32(&mut self, field: &str) -> Result<f32> {
        Ok(f32::from_le_bytes(self.array(field)?))
    }
}

pub(crate) fn decode(bytes: &[u8]) -> Result<IndexSnapshot> {
    if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(VectorStoreError::corrupt(format!(
            "file too short ({} bytes)",
            bytes.len()
        )));
    }

    let (body, stored_checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let actual = Sha256::digest(body);
    if actual.as_slice() != stored_checksum {
        return Err(VectorStoreError::corrupt("checksum mismatch"));
    }

    let mut cur = Cursor::new(body);
    if &cur.array::<4>("magic")? != MAGIC {
        return Err(VectorStoreError::corrupt("bad magic"));
    }
    let version = cur.u16("version")?;
    if version != FORMAT_VERSION {
        return Err(VectorStoreError::corrupt(format!(
            "unsupported format version {version}"
        )));
    }

    let dimension = cur.u32("dimension")? as usize;
    if dimension == 0 {
        return Err(VectorStoreError::corrupt("dimension is 0"));
    }
    let metric_id = cur.u8("metric")?;
    let metric = DistanceMetric::from_id(metric_id)
        .ok_or_else(|| VectorStoreError::corrupt(format!("unknown metric id {metric_id}")))?;
    let node_count = cur.u32("node_count")? as usize;
    let top_layer = cur.u8("top_layer")? as usize;
    let entry_raw = cur.u32("entry_point")?;

    let config = IndexConfig {
        m: cur.u32("m")? as usize,
        ef_construction: cur.u32("ef_construction")? as usize,
        ef_search: cur.u32("ef_search")? as usize,
        metric,
        ..IndexConfig::default()
    };
    config
        .validate()
        .map_err(|err| VectorStoreError::corrupt(format!("stored parameters rejected: {err}")))?;

    // Each record is at least id + vector + tombstone + level + one count.
    let min_record = 4 + dimension * 4 + 1 + 1 + 4;
    if node_count > cur.remaining() / min_record {
        return Err(VectorStoreError::corrupt(format!(
            "node_count {node_count} exceeds available data"
        )));
    }

    let mut vectors: Vec<(Vec<f32>, bool)> = Vec::with_capacity(node_count);
    let mut layers: Vec<Vec<Vec<DocId>>> = Vec::with_capacity(node_count);

    for expected_id in 0..node_count {
        let id = cur.u32("node id")?;
        if id as usize != expected_id {
            return Err(VectorStoreError::corrupt(format!(
                "node {expected_id} stored with id {id}"
            )));
        }

        let mut vector = Vec::with_capacity(dimension);
        for _ in 0..dimension {
            let component = cur.f32("vector")?;
            if !component.is_finite() {
                return Err(VectorStoreError::corrupt(format!(
                    "node {id} has a non-finite component"
                )));
            }
            vector.push(component);
        }

        let tombstone = match cur.u8("tombstone")? {
            0 => false,
            1 => true,
            other => {
                return Err(VectorStoreError::corrupt(format!(
                    "node {id} has tombstone flag {other}"
                )))
            }
        };

        let level = cur.u8("level")? as usize;
        if level > MAX_LEVEL {
            return Err(VectorStoreError::corrupt(format!(
                "node {id} has level {level} above the maximum {MAX_LEVEL}"
            )));
        }

        let mut node_layers = Vec::with_capacity(level + 1);
        for layer in 0..=level {
            let count = cur.u32("neighbour count")? as usize;
            if count > config.max_neighbors(layer) || count > cur.remaining() / 4 {
                return Err(VectorStoreError::corrupt(format!(
                    "node {id} has {count} neighbours on layer {layer}"
                )));
            }
            let mut list = Vec::with_capacity(count);
            for _ in 0..count {
                list.push(cur.u32("neighbour id")?);
            }
            node_layers.push(list);
        }

        vectors.push((vector, tombstone));
        layers.push(node_layers);
    }

    for (id, node_layers) in layers.iter().enumerate() {
        for (layer, list) in node_layers.iter().enumerate() {
            for &neighbor in list {
                let target = neighbor as usize;
                if target >= node_count {
                    return Err(VectorStoreError::corrupt(format!(
                        "node {id} links to missing node {neighbor}"
                    )));
                }
                if target == id {
                    return Err(VectorStoreError::corrupt(format!(
                        "node {id} links to itself on layer {layer}"
                    )));
                }
                if layers[target].len() <= layer {
                    return Err(VectorStoreError::corrupt(format!(
                        "node {id} links to {neighbor} on layer {layer} above its level"
                    )));
                }
            }
        }
    }

    let entry = if entry_raw == NO_ENTRY {
        if node_count != 0 || top_layer != 0 {
            return Err(VectorStoreError::corrupt(
                "non-empty graph without an entry point",
            ));
        }
        None
    } else {
        let entry_id = entry_raw as usize;
        if entry_id >= node_count {
            return Err(VectorStoreError::corrupt(format!(
                "entry point {entry_raw} out of range"
            )));
        }
        let max_level = layers.iter().map(|l| l.len() - 1).max().unwrap_or(0);
        if layers[entry_id].len() - 1 != top_layer || top_layer != max_level {
            return Err(VectorStoreError::corrupt(format!(
                "entry point {entry_raw} is not on the top layer {max_level}"
            )));
        }
        Some(EntryPoint {
            id: entry_raw,
            level: top_layer,
        })
    };

    let mut slots = Vec::with_capacity(node_count);
    for (id, (vector, tombstone)) in vectors.into_iter().enumerate() {
        let len = cur.u64("payload length")?;
        let len = usize::try_from(len)
            .ok()
            .filter(|len| *len <= cur.remaining())
            .ok_or_else(|| VectorStoreError::corrupt(format!("truncated at payload {id}")))?;
        let payload = cur.take(len, "payload")?;
        slots.push((vector, Document::from_bytes(payload), tombstone));
    }

    if cur.remaining() != 0 {
        return Err(VectorStoreError::corrupt(format!(
            "{} trailing bytes",
            cur.remaining()
        )));
    }

    let store = VectorStore::from_slots(dimension, slots)?;
    Ok(IndexSnapshot {
        dimension,
        config,
        store,
        layers,
        entry,
    })
}

fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write to a sibling temp file, fsync, then rename over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let tmp = tmp_path(path);
    let written = (|| -> Result<()> {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        writer.write_all(bytes)?;
        writer.flush()?;
        let file = writer.into_inner().map_err(|err| err.into_error())?;
        file.sync_all()?;
        Ok(())
    })();
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }

    fs::rename(&tmp, path)?;
    sync_dir(parent);
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    let synced = File::open(dir).and_then(|handle| handle.sync_all());
    if let Err(err) = synced {
        log::warn!("Failed to sync directory {}: {err}", dir.display());
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Neighbor;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tempfile::TempDir;

    fn sample_index(n: usize, dim: usize, seed: u64) -> HnswIndex {
        let mut rng = StdRng::seed_from_u64(seed);
        let index = HnswIndex::new(dim, IndexConfig::for_speed().with_seed(seed)).unwrap();
        for i in 0..n {
            let v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
            index.insert(v, format!("payload {i}").into()).unwrap();
        }
        index
    }

    /// Re-seal `bytes` after tampering so only the structural checks can fail.
    fn reseal(mut bytes: Vec<u8>) -> Vec<u8> {
        let body_len = bytes.len() - CHECKSUM_LEN;
        let checksum = Sha256::digest(&bytes[..body_len]);
        bytes[body_len..].copy_from_slice(&checksum);
        bytes
    }

    fn expect_corrupt(bytes: &[u8]) -> String {
        match HnswIndex::from_bytes(bytes) {
            Err(VectorStoreError::CorruptIndex(msg)) => msg,
            Err(other) => panic!("expected CorruptIndex, got {other}"),
            Ok(_) => panic!("corrupt data was accepted"),
        }
    }

    #[test]
    fn test_round_trip_preserves_results() {
        let index = sample_index(150, 8, 1);
        index.delete(7).unwrap();
        index.delete(42).unwrap();

        let restored = HnswIndex::from_bytes(&index.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.stats(), index.stats());
        assert_eq!(restored.entry_point(), index.entry_point());
        assert_eq!(restored.metric(), index.metric());
        assert_eq!(restored.config().m, index.config().m);

        let query = index.get(3).unwrap().vector;
        let a: Vec<Neighbor> = index.knn_search(&query, 10, 64).unwrap();
        let b: Vec<Neighbor> = restored.knn_search(&query, 10, 64).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            restored.get(3).unwrap().document.as_text(),
            Some("payload 3")
        );
        assert!(matches!(restored.get(7), Err(VectorStoreError::NotFound(7))));
    }

    #[test]
    fn test_save_and_load_file() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("index.sidx");

        let index = sample_index(40, 4, 2);
        index.save(&path).unwrap();
        assert!(path.exists());
        assert!(!tmp_path(&path).exists());

        let loaded = HnswIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 40);

        // Saving over an existing file replaces it.
        index.delete(0).unwrap();
        index.save(&path).unwrap();
        assert_eq!(HnswIndex::load(&path).unwrap().live_count(), 39);
    }

    #[test]
    fn test_empty_index_round_trip() {
        let index = HnswIndex::new(5, IndexConfig::default()).unwrap();
        let bytes = index.to_bytes().unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + CHECKSUM_LEN);

        let restored = HnswIndex::from_bytes(&bytes).unwrap();
        assert_eq!(restored.dimension(), 5);
        assert!(restored.is_empty());
        assert_eq!(restored.entry_point(), None);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            HnswIndex::load(dir.path().join("absent.sidx")),
            Err(VectorStoreError::IoError(_))
        ));
    }

    #[test]
    fn test_flipped_byte_fails_checksum() {
        let mut bytes = sample_index(20, 4, 3).to_bytes().unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0x40;
        assert_eq!(expect_corrupt(&bytes), "checksum mismatch");
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let bytes = sample_index(20, 4, 4).to_bytes().unwrap();
        for cut in [0, 10, HEADER_LEN + CHECKSUM_LEN - 1, bytes.len() - 1] {
            expect_corrupt(&bytes[..cut]);
        }
        // Truncation that still carries a valid checksum over the shorter body.
        let mut short = bytes[..bytes.len() - CHECKSUM_LEN - 5].to_vec();
        short.extend_from_slice(&[0u8; CHECKSUM_LEN]);
        assert!(expect_corrupt(&reseal(short)).starts_with("truncated at"));
    }

    #[test]
    fn test_bad_magic_and_version() {
        let bytes = sample_index(5, 2, 5).to_bytes().unwrap();

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert_eq!(expect_corrupt(&reseal(bad_magic)), "bad magic");

        let mut bad_version = bytes;
        bad_version[4] = 9;
        assert!(expect_corrupt(&reseal(bad_version)).contains("version"));
    }

    #[test]
    fn test_dangling_neighbour_is_rejected() {
        let dim = 2;
        let bytes = sample_index(6, dim, 6).to_bytes().unwrap();

        // First record: id, vector, tombstone, level, then layer-0 count and ids.
        let count_at = HEADER_LEN + 4 + dim * 4 + 2;
        let count = u32::from_le_bytes(bytes[count_at..count_at + 4].try_into().unwrap());
        assert!(count > 0);

        let mut tampered = bytes;
        let first_neighbor = count_at + 4;
        tampered[first_neighbor..first_neighbor + 4].copy_from_slice(&999u32.to_le_bytes());
        assert!(expect_corrupt(&reseal(tampered)).contains("missing node 999"));
    }

    #[test]
    fn test_unknown_metric_and_tombstone_flag() {
        let dim = 2;
        let bytes = sample_index(3, dim, 7).to_bytes().unwrap();

        let mut bad_metric = bytes.clone();
        bad_metric[10] = 7;
        assert!(expect_corrupt(&reseal(bad_metric)).contains("unknown metric"));

        let mut bad_flag = bytes;
        bad_flag[HEADER_LEN + 4 + dim * 4] = 2;
        assert!(expect_corrupt(&reseal(bad_flag)).contains("tombstone flag"));
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let bytes = sample_index(3, 2, 8).to_bytes().unwrap();
        let mut padded = bytes[..bytes.len() - CHECKSUM_LEN].to_vec();
        padded.extend_from_slice(&[0xAA; 3]);
        padded.extend_from_slice(&[0u8; CHECKSUM_LEN]);
        assert!(expect_corrupt(&reseal(padded)).contains("trailing"));
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_sync_failure_is_not_fatal() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = TempDir::new().unwrap();
        sync_dir(&dir.path().join("missing"));
        sync_dir(dir.path());
    }

    /// Header plus one single-component node with a layer-0 neighbour count.
    fn handmade(m: u32, count: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.push(DistanceMetric::Cosine.id());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.push(0);
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&m.to_le_bytes());
        bytes.extend_from_slice(&m.to_le_bytes());
        bytes.extend_from_slice(&m.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        bytes.push(0);
        bytes.push(0);
        bytes.extend_from_slice(&count.to_le_bytes());
        bytes.extend_from_slice(&[0u8; CHECKSUM_LEN]);
        reseal(bytes)
    }

    #[test]
    fn test_oversized_counts_are_rejected_without_allocating() {
        let msg = expect_corrupt(&handmade(u32::MAX / 2, u32::MAX - 2));
        assert!(msg.contains("stored parameters rejected"), "{msg}");

        // Within the neighbour cap but larger than the bytes that follow.
        let msg = expect_corrupt(&handmade(16, 20));
        assert!(msg.contains("20 neighbours"), "{msg}");

        let msg = expect_corrupt(&handmade(16, u32::MAX));
        assert!(msg.contains("neighbours"), "{msg}");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn proptest_garbage_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
            let _ = HnswIndex::from_bytes(&bytes);
        }

        #[test]
        fn proptest_any_single_corruption_is_caught(offset in 0usize..10_000, flip in 1u8..=255) {
            let bytes = sample_index(8, 3, 9).to_bytes().unwrap();
            let mut tampered = bytes.clone();
            let at = offset % tampered.len();
            tampered[at] ^= flip;
            prop_assert!(matches!(
                HnswIndex::from_bytes(&tampered),
                Err(VectorStoreError::CorruptIndex(_))
            ));
        }
    }
}
