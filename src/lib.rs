//! # MSSQL Kerberos Probe
//!
//! A small HTTP service that checks connectivity to Microsoft SQL Server
//! using integrated (Kerberos) authentication.
//!
//! This crate provides:
//! - **Configuration**: connection descriptor assembled from environment variables
//! - **Probe**: connect, run `SELECT @@VERSION`, report success or failure
//! - **HTTP surface**: `GET /` banner and `GET /test-connection` diagnostic
//! - **Ticket renewal**: optional background `kinit` loop driven by a keytab

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod handlers;
pub mod kerberos;
pub mod server;
pub mod shutdown;
pub mod state;

pub use config::Config;
pub use error::ServerError;
pub use state::AppState;
