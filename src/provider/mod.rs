//! Cloud provider boundary.
//!
//! This module defines the calls the engine makes against a cloud provider,
//! a timeout wrapper, the shared find-one read path, and an in-memory
//! provider used for dry runs and tests.

mod client;
mod types;
mod observer;
mod memory;

pub use client::{CloudProvider, TimeoutProvider};
#[cfg(test)]
pub(crate) use client::MockCloudProvider;
pub use types::{
    CreateRequest, Filter, Mutation, ProviderObject, Query, ResourceKind, UpdateRequest,
};
pub use observer::find_unique;
pub use memory::{MemoryCloud, ProviderCall};
