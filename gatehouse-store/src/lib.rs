//! # gatehouse-store
//!
//! Record Store access layer: the [`RecordStore`] trait, the in-memory
//! implementation behind tests, and the REST document-collection client used
//! against a live store. [`FallbackLookup`] is the secondary lookup path the
//! authorization resolver turns to when the primary store misbehaves.

pub mod error;
pub mod fallback;
pub mod memory;
pub mod rest;
pub mod store;

pub use error::StoreError;
pub use fallback::{FallbackLookup, RestFallback};
pub use memory::MemoryStore;
pub use rest::RestStore;
pub use store::RecordStore;
