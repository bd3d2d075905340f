//! Admin backend for scrimbase.
//!
//! Hosts the reconciliation engine over HTTP for the surrounding admin
//! tooling. The backing store is the in-process [`Memory`] instance; every
//! money-touching route goes through the engine's compare-and-swap
//! operations, never through raw record writes.

pub mod api;

pub use api::Api;

use scrimbase_engine::{Engine, Memory};

/// Shared service state: the engine over the local backing store.
pub struct Gateway {
    engine: Engine<Memory>,
}

impl Gateway {
    pub fn new() -> Self {
        Self {
            engine: Engine::new(Memory::new()),
        }
    }

    pub fn engine(&self) -> &Engine<Memory> {
        &self.engine
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}
