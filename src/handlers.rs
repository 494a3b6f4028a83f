//! HTTP handlers.
//!
//! - `GET /` serves a fixed banner.
//! - `GET /test-connection` runs the version probe and reports the result.

use crate::constants::BANNER;
use crate::database::{probe, ProbeOutcome};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Banner handler. Never touches the database.
pub async fn index_handler() -> &'static str {
    BANNER
}

/// Connection probe handler.
pub async fn test_connection_handler(State(state): State<AppState>) -> ProbeOutcome {
    probe(state.probe.as_ref()).await
}

impl ProbeOutcome {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProbeOutcome::Success { .. } => StatusCode::OK,
            ProbeOutcome::Failure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProbeOutcome {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.report())).into_response()
    }
}
