//! Shared application state handed to the router.

use crate::config::Config;
use crate::database::{SqlServerProbe, VersionProbe};
use std::sync::Arc;

/// State shared by every request. Immutable after startup.
#[derive(Clone)]
pub struct AppState {
    /// Probe used by `/test-connection`.
    pub probe: Arc<dyn VersionProbe>,
}

impl AppState {
    /// State backed by a real SQL Server connection descriptor.
    pub fn from_config(config: &Config) -> Self {
        Self::with_probe(SqlServerProbe::new(config.database.clone()))
    }

    /// State backed by any probe implementation.
    pub fn with_probe(probe: impl VersionProbe + 'static) -> Self {
        Self {
            probe: Arc::new(probe),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
