//! MSSQL Kerberos Probe entry point.
//!
//! Loads configuration from the environment, optionally starts Kerberos
//! ticket renewal, and serves the HTTP endpoints until SIGINT/SIGTERM.

use anyhow::Result;
use mssql_kerberos_probe::kerberos::KerberosRenewer;
use mssql_kerberos_probe::shutdown::{install_signal_handlers, new_shutdown_controller};
use mssql_kerberos_probe::{server, AppState, Config};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!(
        "MSSQL Kerberos Probe v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    info!(
        "Target: {}:{} database={} auth={:?}",
        config.database.host, config.database.port, config.database.database, config.database.auth
    );

    let renewal = match &config.kerberos {
        Some(krb) => {
            let renewer = KerberosRenewer::new(krb.clone());
            let task = renewer.spawn();
            info!("Kerberos auto-renewal enabled");
            if let Some(tickets) = renewer.ticket_info().await {
                debug!("Credential cache:\n{}", tickets);
            }
            Some(task)
        }
        None => None,
    };

    let shutdown_controller = new_shutdown_controller();
    install_signal_handlers(shutdown_controller.clone());

    let listener = server::bind(&config.http).await?;
    let app = server::router(AppState::from_config(&config));
    server::serve(listener, app, shutdown_controller.signal()).await?;

    if let Some(task) = renewal {
        task.stop().await;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber with stderr output.
fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("warn,mssql_kerberos_probe=info,tower_http=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
