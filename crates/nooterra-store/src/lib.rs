//! The `commitTx` store abstraction: tenant-scoped entities, a single
//! atomic mutator, and two backends - an in-memory one for tests/local
//! dev and an optional Postgres one behind the `pg` feature (spec §4.3).

pub mod backends;
pub mod entities;
pub mod error;
pub mod ops;
pub mod traits;

pub use backends::MemoryStore;
#[cfg(feature = "pg")]
pub use backends::PgStore;
pub use entities::*;
pub use error::{StoreError, StoreResult};
pub use ops::{CommitTx, DispatchKey, Op};
pub use traits::Store;
