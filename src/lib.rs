// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(nonstandard_style)]           // Non-standard code style is forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Kube Converge
//!
//! Converges the cloud resources a Kubernetes cluster depends on, and keeps
//! the cluster's DNS zone in step with its ingresses.
//!
//! ## Overview
//!
//! Every declared resource is reconciled the same way:
//!
//! 1. **Find**: read the Actual object from the provider, if any
//! 2. **Diff**: compare it with the Expected object built from configuration
//! 3. **Validate**: reject changes the provider cannot make in place
//! 4. **Render**: hand the result to the active render target
//!
//! Resources run in dependency order. A render target either mutates live
//! infrastructure or emits a declarative document; references between
//! resources resolve to provider ids or symbolic links accordingly.
//!
//! Independently, a watch loop per DNS scope streams ingress events into a
//! [`dns::Scope`], which republishes its merged records into a shared
//! [`dns::Zone`].
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`model`]: Resource kinds, references and per-resource tasks
//! - [`engine`]: Dependency ordering and task execution
//! - [`target`]: Live and code-generation render targets
//! - [`provider`]: Cloud provider boundary and an in-memory provider
//! - [`reconciler`]: Wires configuration, engine and targets together
//! - [`dns`]: DNS records, scopes and zone publication
//! - [`watch`]: Kubernetes list/watch loop with fixed-interval retry
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! cluster:
//!   name: prod.example.com
//!
//! subnets:
//!   - name: utility-a
//!     id: subnet-0a1b2c3d
//!     shared: true
//!
//! security_groups:
//!   - name: api-elb
//!
//! load_balancers:
//!   - name: api
//!     subnets: [utility-a]
//!     security_groups: [api-elb]
//!     listeners:
//!       443: { instance_port: 443 }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod dns;
pub mod engine;
pub mod error;
pub mod model;
pub mod provider;
pub mod reconciler;
pub mod target;
pub mod watch;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ClusterConfig, ConfigHasher, ConfigParser, ConfigValidator};
pub use dns::{Record, RecordType, Scope, Zone, ZoneFile, ZonePublisher, ZoneSink};
pub use engine::{Executor, RunReport};
pub use error::{ConvergeError, Result};
pub use model::{Registry, Resource, ResourceKey, Task, TaskOutcome};
pub use provider::{CloudProvider, MemoryCloud};
pub use reconciler::{Reconciler, RunOutput, TargetKind};
pub use target::{CodegenTarget, LiveTarget, RenderTarget};
pub use watch::{FixedBackoff, KubeSource, Source, WatchLoop};
