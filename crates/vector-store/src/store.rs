use crate::error::{Result, VectorStoreError};
use crate::types::{DocId, Document};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Slot {
    vector: Arc<[f32]>,
    document: Arc<Document>,
    deleted: bool,
}

/// Raw vectors and payloads, addressed by dense [`DocId`]s.
///
/// Slot `i` holds the record for id `i`. Tombstoned slots keep their vector
/// (the graph still routes through them) until [`VectorStore::compact`].
#[derive(Debug, Clone)]
pub struct VectorStore {
    dimension: usize,
    slots: Vec<Slot>,
    live: usize,
}

/// A live record: immutable views of the vector and payload.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: DocId,
    pub vector: Arc<[f32]>,
    pub document: Arc<Document>,
}

/// Old → new id mapping produced by compaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Remap {
    forward: Vec<Option<DocId>>,
}

impl Remap {
    pub(crate) fn identity(len: usize) -> Self {
        Self {
            forward: (0..len).map(|id| Some(id as DocId)).collect(),
        }
    }

    /// New id for `old`, or `None` if the document was removed.
    pub fn get(&self, old: DocId) -> Option<DocId> {
        self.forward.get(old as usize).copied().flatten()
    }

    /// Number of ids the mapping covers (the pre-compaction id space).
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn removed_count(&self) -> usize {
        self.forward.iter().filter(|entry| entry.is_none()).count()
    }

    pub fn is_identity(&self) -> bool {
        self.forward
            .iter()
            .enumerate()
            .all(|(old, new)| *new == Some(old as DocId))
    }

    /// `(old, new)` pairs for every surviving document.
    pub fn iter(&self) -> impl Iterator<Item = (DocId, DocId)> + '_ {
        self.forward
            .iter()
            .enumerate()
            .filter_map(|(old, new)| new.map(|new| (old as DocId, new)))
    }
}

impl VectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            slots: Vec::new(),
            live: 0,
        }
    }

    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of slots, tombstones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no live document remains.
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub const fn live_count(&self) -> usize {
        self.live
    }

    pub fn tombstone_count(&self) -> usize {
        self.slots.len() - self.live
    }

    /// Id the next [`VectorStore::append`] will return.
    pub fn next_id(&self) -> DocId {
        self.slots.len() as DocId
    }

    /// Reject vectors of the wrong length or with non-finite components.
    pub fn validate(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if let Some(pos) = vector.iter().position(|v| !v.is_finite()) {
            return Err(VectorStoreError::InvalidVector(format!(
                "component {pos} is not finite"
            )));
        }
        Ok(())
    }

    pub fn append(&mut self, vector: Vec<f32>, document: Document) -> Result<DocId> {
        self.validate(&vector)?;
        if self.slots.len() >= DocId::MAX as usize {
            return Err(VectorStoreError::InvalidVector(
                "document id space exhausted".to_string(),
            ));
        }

        let id = self.next_id();
        self.slots.push(Slot {
            vector: vector.into(),
            document: Arc::new(document),
            deleted: false,
        });
        self.live += 1;
        Ok(id)
    }

    /// Live record for `id`. Tombstoned ids are reported as missing.
    pub fn get(&self, id: DocId) -> Result<StoredRecord> {
        match self.slots.get(id as usize) {
            Some(slot) if !slot.deleted => Ok(StoredRecord {
                id,
                vector: Arc::clone(&slot.vector),
                document: Arc::clone(&slot.document),
            }),
            _ => Err(VectorStoreError::NotFound(id)),
        }
    }

    /// Vector for any slot, tombstoned or not.
    #[inline]
    pub(crate) fn vector(&self, id: DocId) -> Option<&[f32]> {
        self.slots.get(id as usize).map(|slot| &*slot.vector)
    }

    pub(crate) fn document(&self, id: DocId) -> Option<&Arc<Document>> {
        self.slots.get(id as usize).map(|slot| &slot.document)
    }

    #[inline]
    pub fn is_live(&self, id: DocId) -> bool {
        self.slots
            .get(id as usize)
            .is_some_and(|slot| !slot.deleted)
    }

    pub fn is_tombstoned(&self, id: DocId) -> bool {
        self.slots.get(id as usize).is_some_and(|slot| slot.deleted)
    }

    /// Tombstone `id`. Returns `false` if it was already tombstoned.
    pub fn mark_deleted(&mut self, id: DocId) -> Result<bool> {
        let slot = self
            .slots
            .get_mut(id as usize)
            .ok_or(VectorStoreError::NotFound(id))?;
        if slot.deleted {
            return Ok(false);
        }
        slot.deleted = true;
        self.live -= 1;
        Ok(true)
    }

    /// Drop tombstoned slots and renumber the survivors densely, preserving order.
    ///
    /// Every id issued before this call is invalid unless it appears in the
    /// returned [`Remap`].
    pub fn compact(&mut self) -> Remap {
        let mut forward = Vec::with_capacity(self.slots.len());
        let mut next: DocId = 0;
        for slot in &self.slots {
            if slot.deleted {
                forward.push(None);
            } else {
                forward.push(Some(next));
                next += 1;
            }
        }

        self.slots.retain(|slot| !slot.deleted);
        self.live = self.slots.len();
        Remap { forward }
    }

    pub fn iter_live(&self) -> impl Iterator<Item = StoredRecord> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.deleted)
            .map(|(id, slot)| StoredRecord {
                id: id as DocId,
                vector: Arc::clone(&slot.vector),
                document: Arc::clone(&slot.document),
            })
    }

    /// Rebuild a store from persisted slots, in id order.
    pub(crate) fn from_slots(
        dimension: usize,
        slots: Vec<(Vec<f32>, Document, bool)>,
    ) -> Result<Self> {
        let mut store = Self::new(dimension);
        for (id, (vector, document, deleted)) in slots.into_iter().enumerate() {
            if vector.len() != dimension {
                return Err(VectorStoreError::corrupt(format!(
                    "record {id} has {} components, expected {dimension}",
                    vector.len()
                )));
            }
            store.slots.push(Slot {
                vector: vector.into(),
                document: Arc::new(document),
                deleted,
            });
            if !deleted {
                store.live += 1;
            }
        }
        Ok(store)
    }
}
