//! Document store - JSON collections cached in memory and mirrored to disk.

pub mod async_store;
pub mod file;
pub mod merge;
pub mod store;

pub use async_store::AsyncStore;
pub use file::{validate_collection_name, CollectionFile};
pub use store::Store;
