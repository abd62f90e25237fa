//! Dataset registry and upload ingestion.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐      ┌──────────────────────────────┐
//! │   IngestGate     │─────▶│        DatasetStore          │
//! │ (validate, save) │      │ id → Arc<Dataset> (DashMap)  │
//! └──────────────────┘      └──────────────┬───────────────┘
//!                                          │ owns
//!                                          ▼
//!                               ┌──────────────────────┐
//!                               │  TileArchive handle  │
//!                               └──────────────────────┘
//! ```
//!
//! Identifiers encode their origin: `<file base name>!<millis>` for archives
//! found by the start-up scan, `<upload name>#<millis>` for uploads.

mod ingest;
mod store;

pub use ingest::{IngestGate, Upload, BYTES_PER_MIB};
pub use store::{
    discovered_id, now_millis, uploaded_id, Dataset, DatasetStore, Eviction, Registration,
    DISCOVERED_SEPARATOR, UPLOADED_SEPARATOR,
};
