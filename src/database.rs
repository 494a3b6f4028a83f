//! Database connectivity and the version probe.

pub mod auth;
mod probe;

pub use auth::{create_connection, RawConnection};
pub use probe::{probe, ProbeOutcome, ProbeReport, SqlServerProbe, VersionProbe};
