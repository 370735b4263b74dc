//! Watch-driven convergence of DNS scopes.
//!
//! A [`WatchLoop`] keeps one scope in step with a [`Source`], relisting with
//! a fixed backoff after any list, watch or publish failure.

mod backoff;
mod controller;
mod kubernetes;
mod source;

pub use backoff::{Backoff, FixedBackoff, Sleeper, TokioSleeper};
pub use controller::WatchLoop;
pub use kubernetes::KubeSource;
pub use source::{ObjectList, Source, SourceObject, WatchEvent};
