//! Identifier types shared across the gallery, pipeline, and generation domains.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_sequence() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Identifier of one end-to-end pipeline execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    /// Mint a fresh chain id. Unique within the process and practically unique across runs.
    pub fn mint() -> Self {
        let seq = next_sequence();
        ChainId(format!(
            "chain-{}-{}",
            now_millis(),
            &hex::encode(seq.to_be_bytes())[8..]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChainId {
    fn from(value: &str) -> Self {
        ChainId(value.to_string())
    }
}

impl From<String> for ChainId {
    fn from(value: String) -> Self {
        ChainId(value)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a gallery record (real or placeholder).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Mint an id for a real generation record.
    pub fn mint() -> Self {
        RecordId(format!("gen-{}-{:06}", now_millis(), next_sequence()))
    }

    /// Deterministic id of the placeholder standing in for one chain variation.
    pub fn placeholder(chain_id: &ChainId, step_number: u32, variation_index: u32) -> Self {
        RecordId(format!(
            "pending-{}-s{}-v{}",
            chain_id, step_number, variation_index
        ))
    }

    /// Id of a single-shot placeholder slot.
    pub fn batch_placeholder(batch: u64, slot: usize) -> Self {
        RecordId(format!("pending-batch-{}-{}", batch, slot))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        RecordId(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sequence number for a single-shot placeholder batch.
pub fn next_batch_id() -> u64 {
    next_sequence()
}
