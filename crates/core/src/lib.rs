//! The engine core: `IntegrationManager`, `ErrorHandler`, `Scheduler`,
//! `ContextMapper`, the `Adapter` trait, and the `PluginEngine` dispatcher
//! (§4 of the engine specification).
//!
//! Nothing here imports a concrete adapter package (`pe-adapters`) or a
//! concrete transport — only the `Store` and `Cache` trait objects and the
//! `Adapter` trait adapters implement. This keeps the dependency graph
//! acyclic per §9's "Cyclic risk" note: adapters depend on `pe-core` for
//! `IntegrationManager`/`ErrorHandler`/the `Adapter` trait, never the other
//! way around.

pub mod adapter;
pub mod context_mapper;
pub mod engine;
pub mod error;
pub mod error_handler;
pub mod integration_manager;
pub mod keys;
pub mod scheduler;

pub use adapter::Adapter;
pub use context_mapper::ContextMapper;
pub use engine::{PluginEngine, PluginEngineBuilder};
pub use error::{CoreResult, EngineError};
pub use error_handler::ErrorHandler;
pub use integration_manager::{IntegrationManager, RefreshedToken, TokenRefresher};
pub use scheduler::Scheduler;
