//! Application state for the Payroll Engine API.

use crate::engine::PayrollEngine;

/// Shared application state.
///
/// Holds the engine every handler works against; cloning shares its store.
#[derive(Clone)]
pub struct AppState {
    engine: PayrollEngine,
}

impl AppState {
    /// Creates a new application state around an engine.
    pub fn new(engine: PayrollEngine) -> Self {
        Self { engine }
    }

    /// Returns a reference to the engine.
    pub fn engine(&self) -> &PayrollEngine {
        &self.engine
    }
}
