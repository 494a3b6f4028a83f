//! Error types for the probe service.
//!
//! Errors carry enough structure for logging, but the HTTP boundary reports
//! every kind the same way: a 500 with the error's display text.

use thiserror::Error;

/// Domain errors raised while loading configuration, talking to SQL Server
/// or managing Kerberos tickets.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection error
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Database not found
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    /// Query execution error
    #[error("Query execution error: {message}")]
    QueryExecution {
        message: String,
        sql_error_code: Option<u32>,
    },

    /// Kerberos ticket management error
    #[error("Kerberos error: {0}")]
    Kerberos(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a connection error with a source.
    pub fn connection_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an authentication error.
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a query execution error.
    pub fn query_error(msg: impl Into<String>) -> Self {
        Self::QueryExecution {
            message: msg.into(),
            sql_error_code: None,
        }
    }

    /// Create a query execution error with the server's error number.
    pub fn query_error_with_code(msg: impl Into<String>, code: u32) -> Self {
        Self::QueryExecution {
            message: msg.into(),
            sql_error_code: Some(code),
        }
    }

    /// Create a Kerberos error.
    pub fn kerberos(msg: impl Into<String>) -> Self {
        Self::Kerberos(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Map SQL Server error numbers to semantic ServerError types.
pub fn from_sql_error(code: u32, message: &str) -> ServerError {
    match code {
        18456 => ServerError::auth(format!("Login failed: {}", message)),
        4060 => ServerError::DatabaseNotFound(message.to_string()),
        _ => ServerError::query_error_with_code(message, code),
    }
}

impl From<tiberius::error::Error> for ServerError {
    fn from(e: tiberius::error::Error) -> Self {
        use tiberius::error::Error;

        match &e {
            Error::Server(token) => from_sql_error(token.code(), token.message()),
            Error::Io { .. } => ServerError::connection(format!("IO error: {}", e)),
            Error::Tls(_) => ServerError::connection(format!("TLS error: {}", e)),
            Error::Protocol(_) => ServerError::connection(format!("Protocol error: {}", e)),
            Error::Routing { host, port } => ServerError::connection(format!(
                "Server requested routing to {}:{}",
                host, port
            )),
            _ => ServerError::query_error(e.to_string()),
        }
    }
}
