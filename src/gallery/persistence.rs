//! Durable sled-backed gallery.
//!
//! Real records are written through to sled as they are committed; placeholders live in memory
//! only and never survive a restart. Restored records come back in commit order.

use std::io;
use std::path::Path;

use sled::{Db, Tree};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::gallery::record::GenerationRecord;
use crate::gallery::store::{GalleryQuery, GalleryStore, InMemoryGallery};
use crate::types::RecordId;
use parking_lot::Mutex;

const TREE_RECORDS: &str = "gallery_records";
const TREE_INDEX: &str = "gallery_index";
const RECORD_KEY_PAD: usize = 20;

pub struct SledGallery {
    db: Db,
    records: Tree,
    index: Tree,
    memory: InMemoryGallery,
    next_seq: Mutex<u64>,
}

impl SledGallery {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(path)?;
        let db = sled::open(path).map_err(to_storage_io)?;
        Self::from_db(db)
    }

    pub fn from_db(db: Db) -> Result<Self, StorageError> {
        let records = db.open_tree(TREE_RECORDS).map_err(to_storage_io)?;
        let index = db.open_tree(TREE_INDEX).map_err(to_storage_io)?;

        let mut restored = Vec::new();
        let mut next_seq = 1u64;
        for result in records.iter() {
            let (key, value) = result.map_err(to_storage_io)?;
            let record: GenerationRecord =
                serde_json::from_slice(&value).map_err(to_storage_data)?;
            if let Some(seq) = decode_record_key(&key) {
                next_seq = next_seq.max(seq + 1);
            }
            restored.push(record);
        }
        debug!(restored = restored.len(), "Gallery restored from disk");

        Ok(Self {
            db,
            records,
            index,
            memory: InMemoryGallery::with_records(restored),
            next_seq: Mutex::new(next_seq),
        })
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(to_storage_io)?;
        Ok(())
    }

    pub fn encode_record_key(seq: u64) -> String {
        encode_record_key(seq)
    }

    fn persist(&self, record: &GenerationRecord) -> Result<(), StorageError> {
        if record.is_placeholder() {
            return Ok(());
        }
        let value = serde_json::to_vec(record).map_err(to_storage_data)?;
        let id = record.id.as_str().as_bytes();
        let key = match self.index.get(id).map_err(to_storage_io)? {
            Some(existing) => existing.to_vec(),
            None => {
                let mut seq = self.next_seq.lock();
                let key = encode_record_key(*seq).into_bytes();
                *seq += 1;
                key
            }
        };
        self.records
            .insert(key.as_slice(), value)
            .map_err(to_storage_io)?;
        self.index.insert(id, key).map_err(to_storage_io)?;
        Ok(())
    }

    fn forget(&self, id: &RecordId) -> Result<(), StorageError> {
        if let Some(key) = self
            .index
            .remove(id.as_str().as_bytes())
            .map_err(to_storage_io)?
        {
            self.records.remove(key).map_err(to_storage_io)?;
        }
        Ok(())
    }
}

impl GalleryStore for SledGallery {
    fn add_image(&self, record: GenerationRecord) {
        if let Err(e) = self.persist(&record) {
            warn!(record_id = %record.id, error = %e, "Failed to persist gallery record");
        }
        self.memory.add_image(record);
    }

    fn remove_image(&self, id: &RecordId) -> bool {
        if let Err(e) = self.forget(id) {
            warn!(record_id = %id, error = %e, "Failed to remove persisted gallery record");
        }
        self.memory.remove_image(id)
    }

    fn replace_image(&self, id: &RecordId, record: GenerationRecord) -> bool {
        if &record.id != id {
            if let Err(e) = self.forget(id) {
                warn!(record_id = %id, error = %e, "Failed to remove persisted gallery record");
            }
        }
        if let Err(e) = self.persist(&record) {
            warn!(record_id = %record.id, error = %e, "Failed to persist gallery record");
        }
        self.memory.replace_image(id, record)
    }

    fn images(&self) -> Vec<GenerationRecord> {
        self.memory.images()
    }

    fn query(&self, query: &GalleryQuery) -> Vec<GenerationRecord> {
        self.memory.query(query)
    }
}

fn encode_record_key(seq: u64) -> String {
    format!("{seq:0RECORD_KEY_PAD$}")
}

fn decode_record_key(key: &[u8]) -> Option<u64> {
    std::str::from_utf8(key).ok()?.parse().ok()
}

fn to_storage_io(err: sled::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::Other, err.to_string()))
}

fn to_storage_data(err: serde_json::Error) -> StorageError {
    StorageError::InvalidData(err.to_string())
}
