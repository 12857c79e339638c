pub mod memory;
pub use memory::MemoryStore;

#[cfg(feature = "pg")]
pub mod pg;
#[cfg(feature = "pg")]
pub use pg::PgStore;
