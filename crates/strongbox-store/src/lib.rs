//! Retry task storage for Strongbox.
//!
//! This crate provides:
//! - The `RetryRecord` type describing one deferred work item
//! - The `RetryTaskStore` trait consumed by the retry scheduler
//! - An in-memory store and a JSON file store
//! - Paging rules shared by every store implementation

mod error;
mod file;
mod memory;
mod paging;
mod record;
mod store;

pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use paging::{DEFAULT_LIMIT_PAGING, DuePage, Fetched, MAX_LIMIT_PAGING, PageRequest};
pub use record::{RecordStatus, RetryRecord};
pub use store::RetryTaskStore;
