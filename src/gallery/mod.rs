//! Gallery domain: generation records, the store contract, and its implementations.

pub mod persistence;
pub mod record;
pub mod store;

pub use persistence::SledGallery;
pub use record::{
    ChainMetadata, GenerationRecord, GenerationSettings, MediaKind, TAG_GENERATED,
    TAG_GENERATING, TAG_PIPELINE,
};
pub use store::{GalleryQuery, GalleryStore, InMemoryGallery};
