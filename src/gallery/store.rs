//! Gallery store contract and the process-wide in-memory implementation.
//!
//! The gallery is mutated concurrently by the pipeline executor, the single-shot path, and direct
//! user deletes. Every mutation takes the lock for one short critical section and never across an
//! `.await`, so interleaved callers always observe a consistent list. Removal is idempotent.

use crate::gallery::record::GenerationRecord;
use crate::types::{ChainId, RecordId};
use parking_lot::RwLock;

/// Compound filter over gallery records. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GalleryQuery {
    pub tag: Option<String>,
    pub chain_id: Option<ChainId>,
    pub step_number: Option<u32>,
    pub variation_index: Option<u32>,
    /// `Some(true)` only placeholders, `Some(false)` only real records.
    pub placeholders: Option<bool>,
}

impl GalleryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn chain(mut self, chain_id: &ChainId) -> Self {
        self.chain_id = Some(chain_id.clone());
        self
    }

    pub fn step(mut self, step_number: u32) -> Self {
        self.step_number = Some(step_number);
        self
    }

    pub fn variation(mut self, variation_index: u32) -> Self {
        self.variation_index = Some(variation_index);
        self
    }

    pub fn placeholders_only(mut self) -> Self {
        self.placeholders = Some(true);
        self
    }

    pub fn matches(&self, record: &GenerationRecord) -> bool {
        if let Some(tag) = &self.tag {
            if !record.has_tag(tag) {
                return false;
            }
        }
        if let Some(want) = self.placeholders {
            if record.is_placeholder() != want {
                return false;
            }
        }
        let needs_chain =
            self.chain_id.is_some() || self.step_number.is_some() || self.variation_index.is_some();
        if !needs_chain {
            return true;
        }
        let Some(chain) = &record.chain else {
            return false;
        };
        self.chain_id.as_ref().map_or(true, |id| &chain.chain_id == id)
            && self.step_number.map_or(true, |n| chain.step_number == n)
            && self.variation_index.map_or(true, |v| chain.variation_index == v)
    }
}

/// Canonical collection of generation records. Insertion order is display order.
pub trait GalleryStore: Send + Sync {
    /// Append a record. A record whose id is already present replaces it in place.
    fn add_image(&self, record: GenerationRecord);

    /// Remove by id. Removing an unknown id is a no-op; returns whether something was removed.
    fn remove_image(&self, id: &RecordId) -> bool;

    /// Substitute `record` at the slot held by `id`. Appends when `id` is gone (for example the
    /// user deleted a placeholder mid-flight). Returns whether the substitution was in place.
    fn replace_image(&self, id: &RecordId, record: GenerationRecord) -> bool;

    /// All records in display order.
    fn images(&self) -> Vec<GenerationRecord>;

    fn query(&self, query: &GalleryQuery) -> Vec<GenerationRecord> {
        self.images()
            .into_iter()
            .filter(|record| query.matches(record))
            .collect()
    }

    fn get_images_by_tag(&self, tag: &str) -> Vec<GenerationRecord> {
        self.query(&GalleryQuery::new().tag(tag))
    }

    /// Count of real (non-placeholder) records.
    fn total_images(&self) -> usize {
        self.images()
            .iter()
            .filter(|record| !record.is_placeholder())
            .count()
    }

    fn total_credits_used(&self) -> u64 {
        self.images()
            .iter()
            .filter(|record| !record.is_placeholder())
            .map(|record| u64::from(record.credits_used))
            .sum()
    }

    /// Distinct chain ids among real records, in order of first appearance.
    fn unique_chains(&self) -> Vec<ChainId> {
        let mut chains: Vec<ChainId> = Vec::new();
        for record in self.images() {
            if record.is_placeholder() {
                continue;
            }
            if let Some(chain) = record.chain {
                if !chains.contains(&chain.chain_id) {
                    chains.push(chain.chain_id);
                }
            }
        }
        chains
    }
}

/// In-memory gallery. One instance is created per process and injected as
/// `Arc<dyn GalleryStore>` into every component that mutates it.
#[derive(Debug, Default)]
pub struct InMemoryGallery {
    records: RwLock<Vec<GenerationRecord>>,
}

impl InMemoryGallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<GenerationRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl GalleryStore for InMemoryGallery {
    fn add_image(&self, record: GenerationRecord) {
        let mut records = self.records.write();
        match records.iter().position(|r| r.id == record.id) {
            Some(slot) => records[slot] = record,
            None => records.push(record),
        }
    }

    fn remove_image(&self, id: &RecordId) -> bool {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| &r.id != id);
        records.len() != before
    }

    fn replace_image(&self, id: &RecordId, record: GenerationRecord) -> bool {
        let mut records = self.records.write();
        if let Some(existing) = records.iter().position(|r| r.id == record.id && &r.id != id) {
            records.remove(existing);
        }
        match records.iter().position(|r| &r.id == id) {
            Some(slot) => {
                records[slot] = record;
                true
            }
            None => {
                records.push(record);
                false
            }
        }
    }

    fn images(&self) -> Vec<GenerationRecord> {
        self.records.read().clone()
    }

    fn query(&self, query: &GalleryQuery) -> Vec<GenerationRecord> {
        self.records
            .read()
            .iter()
            .filter(|record| query.matches(record))
            .cloned()
            .collect()
    }
}
