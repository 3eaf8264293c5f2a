//! Business record stores, resolved by model name.

pub mod registry;
pub mod store;

pub use registry::{ReadError, RecordStoreRegistry};
pub use store::{InMemoryRecordStore, RecordStore};
