pub mod memory;
pub mod pool;
pub mod queries;
pub mod store;

pub use memory::MemoryStore;
pub use pool::{create_pool, init_schema};
pub use store::{DocumentStore, PgStore, StoreError};
