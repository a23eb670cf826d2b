//! SQLite storage: connection pooling and the durable cache store.

pub mod cache;
pub mod pool;

pub use cache::SqliteCacheStore;
pub use pool::DatabasePool;
