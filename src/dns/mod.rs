//! DNS scope reconciliation.
//!
//! Source objects contribute records to a named [`Scope`]; scopes publish
//! their merged records into a [`Zone`], which writes the combined set to a
//! [`ZoneSink`].

mod ingress;
mod record;
mod scope;
mod zone;

pub use k8s_openapi::api::networking::v1::Ingress;
pub use record::{Record, RecordType, ensure_dot_suffix, prefer_cnames};
pub use scope::Scope;
pub use zone::{LogSink, Zone, ZoneFile, ZonePublisher, ZoneSink};
