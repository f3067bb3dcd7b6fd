//! Task execution engine
//!
//! - [`dispatcher`] runs the plugins of one phase
//! - [`executor`] runs one task through every phase
//! - [`manager`] runs the configured tasks

pub mod dispatcher;
pub mod executor;
pub mod manager;

pub use dispatcher::run_phase;
pub use executor::{RunSummary, execute};
pub use manager::{Manager, ManagerError};
