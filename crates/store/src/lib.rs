//! The Durable Store (DS): the authoritative, never-bypassed record owner
//! for every table in §3 of the engine specification.
//!
//! [`Store`] is an object-safe trait so `pe-core` can depend on it without
//! importing `sqlx` or `pe-store`'s Postgres internals — the same seam the
//! teacher draws around `BuildsRootService` / `PutBuilds` /
//! `FetchBuilds` in `control::services::builds_root`. Two implementations
//! are provided: [`postgres::PostgresStore`] for production and
//! [`memory::InMemoryStore`] for unit tests and `PLUGIN_ENGINE_ENV=development`.

mod error;
pub mod memory;
pub mod postgres;
mod store_trait;

pub use error::{StoreError, StoreResult};
pub use store_trait::{ClaimedTask, Store};
