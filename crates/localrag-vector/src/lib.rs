//! In-memory exact vector index, its atomic-swap holder, and LanceDB snapshots.

pub mod index;
pub mod schema;
pub mod shared;
pub mod store;
pub mod table;

pub use index::VectorIndex;
pub use shared::SharedIndex;
pub use store::IndexStore;
