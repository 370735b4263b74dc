//! Dependency ordering and execution.

mod executor;
mod graph;
mod report;

pub use executor::Executor;
pub use graph::execution_order;
pub use report::{ResourceResult, ResourceStatus, RunReport};
