//! Centralized constants for the probe service.
//!
//! Default values for configuration, the fixed diagnostic query and the
//! response strings live here so they can be found in one place.

use std::time::Duration;

// =============================================================================
// HTTP Constants
// =============================================================================

/// Default HTTP listen port.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Address the HTTP listener binds to.
pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";

/// Plain-text body served at `/`.
pub const BANNER: &str = "MSSQL Kerberos Example App";

// =============================================================================
// Database Constants
// =============================================================================

/// Default SQL Server host.
pub const DEFAULT_SQL_HOST: &str = "localhost";

/// Default SQL Server TCP port.
pub const DEFAULT_SQL_PORT: u16 = 1433;

/// Default database.
pub const DEFAULT_DATABASE: &str = "master";

/// Application name reported to SQL Server.
pub const APPLICATION_NAME: &str = "mssql-kerberos-probe";

/// Query issued by the connection probe.
pub const VERSION_QUERY: &str = "SELECT @@VERSION AS version";

/// Column read from the first row of [`VERSION_QUERY`].
pub const VERSION_COLUMN: &str = "version";

/// Session option applied after login when `arith_abort` is enabled.
pub const ARITHABORT_STATEMENT: &str = "SET ARITHABORT ON";

/// Error text when integrated authentication is not compiled in.
pub const INTEGRATED_AUTH_UNSUPPORTED: &str =
    "Integrated (Kerberos) authentication requires the 'kerberos' feature. \
     Rebuild with: cargo build --features kerberos, or set MSSQL_AUTH_TYPE=sql";

/// Message returned alongside the server version on success.
pub const SUCCESS_MESSAGE: &str = "Connected successfully";

// =============================================================================
// Kerberos Constants
// =============================================================================

/// Default keytab location.
pub const DEFAULT_KEYTAB: &str = "/etc/kerberos/krb5.keytab";

/// Default ticket renewal interval in seconds (30 minutes).
pub const DEFAULT_RENEW_INTERVAL_SECS: u64 = 1800;

/// Default ticket renewal interval as Duration.
pub const DEFAULT_RENEW_INTERVAL: Duration = Duration::from_secs(DEFAULT_RENEW_INTERVAL_SECS);

/// Upper bound for a single `kinit` invocation.
pub const KERBEROS_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for a `klist` invocation.
pub const KLIST_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `RenewalTask::stop` waits for the loop to exit.
pub const RENEWER_STOP_TIMEOUT: Duration = Duration::from_secs(5);
