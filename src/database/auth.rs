//! Connection setup for SQL Server.
//!
//! Builds tiberius configuration from a [`DatabaseConfig`], applies the
//! authentication mode and performs the TCP connect and TDS handshake:
//! - Integrated security (Kerberos via GSSAPI on Unix, SSPI on Windows)
//! - SQL Server authentication (username/password)

use crate::config::{AuthMode, DatabaseConfig};
use crate::error::ServerError;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

/// Type alias for a raw tiberius connection.
pub type RawConnection = Client<Compat<TcpStream>>;

/// Configure the tiberius authentication method for `auth`.
pub fn configure_auth(config: &mut Config, auth: &AuthMode) -> Result<(), ServerError> {
    match auth {
        AuthMode::SqlServer { username, password } => {
            config.authentication(AuthMethod::sql_server(username, password));
            Ok(())
        }
        AuthMode::Integrated => configure_integrated(config),
    }
}

#[cfg(any(windows, feature = "kerberos"))]
fn configure_integrated(config: &mut Config) -> Result<(), ServerError> {
    config.authentication(AuthMethod::Integrated);
    Ok(())
}

#[cfg(not(any(windows, feature = "kerberos")))]
fn configure_integrated(_config: &mut Config) -> Result<(), ServerError> {
    Err(ServerError::config(crate::constants::INTEGRATED_AUTH_UNSUPPORTED))
}

/// Create a tiberius Config from DatabaseConfig.
///
/// This sets up host, port, database and encryption but does NOT configure
/// authentication - use `configure_auth` for that.
pub fn create_base_config(db_config: &DatabaseConfig) -> Config {
    let mut config = Config::new();

    config.host(&db_config.host);
    config.port(db_config.port);
    config.database(&db_config.database);

    if db_config.encrypt {
        config.encryption(EncryptionLevel::Required);
    } else {
        config.encryption(EncryptionLevel::Off);
    }

    if db_config.trust_server_certificate {
        config.trust_cert();
    }

    config.application_name(&db_config.application_name);

    config
}

/// Open a connection to SQL Server.
///
/// Handles the full connection flow:
/// 1. Creates base configuration
/// 2. Configures authentication
/// 3. Establishes TCP connection
/// 4. Performs TDS handshake (TLS and Kerberos negotiation happen here)
pub async fn create_connection(db_config: &DatabaseConfig) -> Result<RawConnection, ServerError> {
    let mut config = create_base_config(db_config);
    configure_auth(&mut config, &db_config.auth)?;

    let address = config.get_addr();
    debug!("Creating connection to {}", address);

    let tcp = TcpStream::connect(&address).await.map_err(|e| {
        ServerError::connection_with_source(format!("Failed to connect to {}: {}", address, e), e)
    })?;

    tcp.set_nodelay(true)
        .map_err(|e| ServerError::connection(format!("Failed to set TCP_NODELAY: {}", e)))?;

    let client = Client::connect(config, tcp.compat_write())
        .await
        .map_err(ServerError::from)?;

    debug!("Connection established to {}", address);
    Ok(client)
}
