//! Configuration management for the probe service.
//!
//! Configuration is loaded from environment variables following the 12-factor app pattern.
//! Values are defaulted but otherwise passed through unchecked.

use crate::constants::{
    APPLICATION_NAME, DEFAULT_DATABASE, DEFAULT_HTTP_HOST, DEFAULT_HTTP_PORT, DEFAULT_KEYTAB,
    DEFAULT_RENEW_INTERVAL, DEFAULT_SQL_HOST, DEFAULT_SQL_PORT, INTEGRATED_AUTH_UNSUPPORTED,
    KERBEROS_COMMAND_TIMEOUT, KLIST_TIMEOUT,
};
use crate::error::ServerError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener configuration
    pub http: HttpConfig,

    /// Database connection descriptor
    pub database: DatabaseConfig,

    /// Kerberos ticket renewal, enabled when `KRB5_PRINCIPAL` is set
    pub kerberos: Option<KerberosConfig>,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address to bind to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,
}

/// Database connection descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQL Server hostname or IP address
    pub host: String,

    /// SQL Server port (default: 1433)
    pub port: u16,

    /// Database name
    pub database: String,

    /// Authentication mode
    pub auth: AuthMode,

    /// Enable TLS encryption
    pub encrypt: bool,

    /// Trust server certificate (for self-signed certs)
    pub trust_server_certificate: bool,

    /// Issue `SET ARITHABORT ON` after login
    pub arith_abort: bool,

    /// Application name sent to SQL Server
    pub application_name: String,
}

/// Authentication mode.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthMode {
    /// Integrated security: Kerberos (GSSAPI) on Unix, SSPI on Windows.
    #[default]
    Integrated,

    /// SQL Server authentication (username/password)
    SqlServer { username: String, password: String },
}

impl std::fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMode::Integrated => write!(f, "Integrated"),
            AuthMode::SqlServer { username, .. } => f
                .debug_struct("SqlServer")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

impl AuthMode {
    /// Whether this build can log in with this mode.
    pub fn is_supported(&self) -> bool {
        match self {
            AuthMode::Integrated => cfg!(any(windows, feature = "kerberos")),
            AuthMode::SqlServer { .. } => true,
        }
    }
}

/// Kerberos ticket renewal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KerberosConfig {
    /// Principal to obtain tickets for, e.g. `svc-app@EXAMPLE.COM`
    pub principal: String,

    /// Keytab holding the principal's keys
    pub keytab: PathBuf,

    /// Period between renewals
    pub renew_interval: Duration,

    /// Upper bound for a single kinit run
    pub command_timeout: Duration,

    /// Upper bound for a klist run
    pub klist_timeout: Duration,

    /// Program used to obtain and renew tickets
    pub kinit_program: String,

    /// Program used to list the credential cache
    pub klist_program: String,
}

impl KerberosConfig {
    /// Renewal settings for `principal` with default keytab and timings.
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            keytab: PathBuf::from(DEFAULT_KEYTAB),
            renew_interval: DEFAULT_RENEW_INTERVAL,
            command_timeout: KERBEROS_COMMAND_TIMEOUT,
            klist_timeout: KLIST_TIMEOUT,
            kinit_program: "kinit".to_string(),
            klist_program: "klist".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PORT`: HTTP listen port (default: 8080)
    /// - `MSSQL_SERVER`: SQL Server hostname (default: localhost)
    /// - `MSSQL_DATABASE`: Database name (default: master)
    /// - `MSSQL_PORT`: SQL Server port (default: 1433)
    /// - `MSSQL_ENCRYPT`: Enable TLS (default: true)
    /// - `MSSQL_TRUST_CERT`: Trust server certificate (default: false)
    /// - `MSSQL_AUTH_TYPE`: `integrated` (default) or `sql`
    /// - `MSSQL_USER` / `MSSQL_PASSWORD`: required for `sql`
    /// - `KRB5_PRINCIPAL`: enables ticket renewal for this principal
    /// - `KRB5_KTNAME`: keytab path (default: /etc/kerberos/krb5.keytab)
    /// - `KRB5_RENEW_INTERVAL`: renewal period in seconds (default: 1800)
    ///
    /// Fails when the selected authentication mode is not compiled into this
    /// build, so the service never starts in a state where every probe fails.
    pub fn from_env() -> Result<Self, ServerError> {
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.ensure_auth_supported()?;
        Ok(config)
    }

    /// Reject an authentication mode this build cannot log in with.
    pub fn ensure_auth_supported(&self) -> Result<(), ServerError> {
        if self.database.auth.is_supported() {
            Ok(())
        } else {
            Err(ServerError::config(INTEGRATED_AUTH_UNSUPPORTED))
        }
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_HTTP_PORT);

        let host = lookup("MSSQL_SERVER").unwrap_or_else(|| DEFAULT_SQL_HOST.to_string());
        let database = lookup("MSSQL_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let sql_port = lookup("MSSQL_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_SQL_PORT);

        let encrypt = lookup("MSSQL_ENCRYPT")
            .map(|v| parse_flag(&v))
            .unwrap_or(true);

        let trust_server_certificate = lookup("MSSQL_TRUST_CERT")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let auth = match lookup("MSSQL_AUTH_TYPE").map(|s| s.to_lowercase()).as_deref() {
            Some("sql") | Some("sqlserver") | Some("password") => {
                match (lookup("MSSQL_USER"), lookup("MSSQL_PASSWORD")) {
                    (Some(username), Some(password)) => AuthMode::SqlServer { username, password },
                    _ => {
                        return Err(ServerError::config(
                            "MSSQL_USER and MSSQL_PASSWORD are required when MSSQL_AUTH_TYPE=sql",
                        ))
                    }
                }
            }
            _ => AuthMode::Integrated,
        };

        let kerberos = lookup("KRB5_PRINCIPAL").map(|principal| {
            let mut krb = KerberosConfig::new(principal);
            if let Some(keytab) = lookup("KRB5_KTNAME") {
                // MIT krb5 accepts a "FILE:" prefix on KRB5_KTNAME
                krb.keytab = PathBuf::from(keytab.strip_prefix("FILE:").unwrap_or(&keytab));
            }
            if let Some(secs) = lookup("KRB5_RENEW_INTERVAL").and_then(|s| s.parse().ok()) {
                krb.renew_interval = Duration::from_secs(secs);
            }
            krb
        });

        Ok(Config {
            http: HttpConfig {
                host: DEFAULT_HTTP_HOST.to_string(),
                port,
            },
            database: DatabaseConfig {
                host,
                port: sql_port,
                database,
                auth,
                encrypt,
                trust_server_certificate,
                arith_abort: true,
                application_name: APPLICATION_NAME.to_string(),
            },
            kerberos,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SQL_HOST.to_string(),
            port: DEFAULT_SQL_PORT,
            database: DEFAULT_DATABASE.to_string(),
            auth: AuthMode::Integrated,
            encrypt: true,
            trust_server_certificate: false,
            arith_abort: true,
            application_name: APPLICATION_NAME.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ServerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = load(&[]).unwrap();
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.database, "master");
        assert_eq!(config.database.port, 1433);
        assert_eq!(config.database.auth, AuthMode::Integrated);
        assert!(config.database.encrypt);
        assert!(!config.database.trust_server_certificate);
        assert!(config.database.arith_abort);
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.http.host, "0.0.0.0");
        assert!(config.kerberos.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("PORT", "9090"),
            ("MSSQL_SERVER", "sql01.corp.example.com"),
            ("MSSQL_DATABASE", "inventory"),
            ("MSSQL_TRUST_CERT", "1"),
            ("MSSQL_ENCRYPT", "false"),
        ])
        .unwrap();
        assert_eq!(config.http.port, 9090);
        assert_eq!(config.database.host, "sql01.corp.example.com");
        assert_eq!(config.database.database, "inventory");
        assert!(config.database.trust_server_certificate);
        assert!(!config.database.encrypt);
    }

    #[test]
    fn test_malformed_values_pass_through_or_default() {
        let config = load(&[("PORT", "not-a-port"), ("MSSQL_SERVER", "  odd host  ")]).unwrap();
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.database.host, "  odd host  ");
    }

    #[test]
    fn test_sql_auth_requires_credentials() {
        let err = load(&[("MSSQL_AUTH_TYPE", "sql"), ("MSSQL_USER", "sa")]).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));

        let config = load(&[
            ("MSSQL_AUTH_TYPE", "SQL"),
            ("MSSQL_USER", "sa"),
            ("MSSQL_PASSWORD", "secret"),
        ])
        .unwrap();
        assert_eq!(
            config.database.auth,
            AuthMode::SqlServer {
                username: "sa".to_string(),
                password: "secret".to_string()
            }
        );
    }

    #[test]
    fn test_auth_debug_hides_password() {
        let auth = AuthMode::SqlServer {
            username: "sa".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{:?}", auth);
        assert!(rendered.contains("sa"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_kerberos_settings() {
        let config = load(&[
            ("KRB5_PRINCIPAL", "svc-app@EXAMPLE.COM"),
            ("KRB5_KTNAME", "FILE:/run/secrets/app.keytab"),
            ("KRB5_RENEW_INTERVAL", "600"),
        ])
        .unwrap();
        let krb = config.kerberos.unwrap();
        assert_eq!(krb.principal, "svc-app@EXAMPLE.COM");
        assert_eq!(krb.keytab, PathBuf::from("/run/secrets/app.keytab"));
        assert_eq!(krb.renew_interval, Duration::from_secs(600));
        assert_eq!(krb.kinit_program, "kinit");
    }

    #[cfg(not(any(windows, feature = "kerberos")))]
    #[test]
    fn test_integrated_auth_rejected_at_startup_without_kerberos() {
        let config = load(&[]).unwrap();
        assert!(!config.database.auth.is_supported());

        let err = config.ensure_auth_supported().unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
        assert!(err.to_string().contains("kerberos"));

        let config = load(&[
            ("MSSQL_AUTH_TYPE", "sql"),
            ("MSSQL_USER", "sa"),
            ("MSSQL_PASSWORD", "secret"),
        ])
        .unwrap();
        assert!(config.ensure_auth_supported().is_ok());
    }

    #[cfg(any(windows, feature = "kerberos"))]
    #[test]
    fn test_integrated_auth_accepted_with_kerberos() {
        let config = load(&[]).unwrap();
        assert!(config.ensure_auth_supported().is_ok());
    }

    #[test]
    fn test_kerberos_defaults() {
        let krb = KerberosConfig::new("user@REALM");
        assert_eq!(krb.keytab, PathBuf::from("/etc/kerberos/krb5.keytab"));
        assert_eq!(krb.renew_interval, Duration::from_secs(1800));
        assert_eq!(krb.command_timeout, Duration::from_secs(30));
    }
}
