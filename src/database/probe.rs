//! Connectivity probe: connect, ask the server for its version, report.

use super::auth::create_connection;
use crate::config::DatabaseConfig;
use crate::constants::{ARITHABORT_STATEMENT, SUCCESS_MESSAGE, VERSION_COLUMN, VERSION_QUERY};
use crate::error::ServerError;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

/// Something that can report the SQL Server version string.
#[async_trait]
pub trait VersionProbe: Send + Sync {
    /// Connect and return `@@VERSION`.
    async fn server_version(&self) -> Result<String, ServerError>;
}

/// Probe backed by a fresh tiberius connection per call.
#[derive(Debug, Clone)]
pub struct SqlServerProbe {
    config: DatabaseConfig,
}

impl SqlServerProbe {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl VersionProbe for SqlServerProbe {
    async fn server_version(&self) -> Result<String, ServerError> {
        let mut client = create_connection(&self.config).await?;

        if self.config.arith_abort {
            client
                .simple_query(ARITHABORT_STATEMENT)
                .await?
                .into_results()
                .await?;
        }

        let row = client
            .simple_query(VERSION_QUERY)
            .await?
            .into_row()
            .await?
            .ok_or_else(|| ServerError::query_error("Version query returned no rows"))?;

        let version = row
            .try_get::<&str, _>(VERSION_COLUMN)?
            .map(str::to_owned)
            .ok_or_else(|| ServerError::query_error("Version column was NULL"))?;

        if let Err(e) = client.close().await {
            debug!("Error closing probe connection: {}", e);
        }

        Ok(version)
    }
}

/// Result of a single probe, mapped to an HTTP status at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success { version: String },
    Failure { message: String },
}

/// JSON body for a probe response.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProbeReport {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_version: Option<String>,
}

impl ProbeOutcome {
    /// Collapse a probe result; every error kind becomes a `Failure`.
    pub fn from_result(result: Result<String, ServerError>) -> Self {
        match result {
            Ok(version) => Self::Success { version },
            Err(e) => Self::Failure {
                message: e.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn report(&self) -> ProbeReport {
        match self {
            Self::Success { version } => ProbeReport {
                status: "success",
                message: SUCCESS_MESSAGE.to_string(),
                sql_version: Some(version.clone()),
            },
            Self::Failure { message } => ProbeReport {
                status: "error",
                message: message.clone(),
                sql_version: None,
            },
        }
    }
}

/// Run `source` once and log failures.
pub async fn probe(source: &dyn VersionProbe) -> ProbeOutcome {
    let outcome = ProbeOutcome::from_result(source.server_version().await);
    match &outcome {
        ProbeOutcome::Success { version } => {
            debug!("Probe succeeded: {}", version.lines().next().unwrap_or_default())
        }
        ProbeOutcome::Failure { message } => warn!("Probe failed: {}", message),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<&'static str, &'static str>);

    #[async_trait]
    impl VersionProbe for Fixed {
        async fn server_version(&self) -> Result<String, ServerError> {
            self.0
                .map(str::to_string)
                .map_err(ServerError::connection)
        }
    }

    #[test]
    fn test_success_report_shape() {
        let outcome = ProbeOutcome::Success {
            version: "Microsoft SQL Server 2022".to_string(),
        };
        let json = serde_json::to_value(outcome.report()).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["message"], "Connected successfully");
        assert_eq!(json["sql_version"], "Microsoft SQL Server 2022");
    }

    #[test]
    fn test_failure_report_has_no_version_key() {
        let outcome = ProbeOutcome::from_result(Err(ServerError::auth("Login failed")));
        let json = serde_json::to_value(outcome.report()).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Authentication failed: Login failed");
        assert!(json.get("sql_version").is_none());
    }

    #[tokio::test]
    async fn test_probe_collapses_errors() {
        let outcome = probe(&Fixed(Err("refused"))).await;
        assert_eq!(
            outcome,
            ProbeOutcome::Failure {
                message: "Connection error: refused".to_string()
            }
        );

        let outcome = probe(&Fixed(Ok("Microsoft SQL Server 2019"))).await;
        assert!(outcome.is_success());
    }
}
