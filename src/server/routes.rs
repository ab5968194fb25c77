use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::AppState;
use crate::executor::RunError;
use crate::steps::RunRequest;

const ALLOW_METHODS: &str = "GET, POST, OPTIONS";

fn cors_headers() -> [(header::HeaderName, &'static str); 3] {
    [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (header::ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS),
        (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
    ]
}

fn json_response(status: StatusCode, payload: Value) -> Response {
    (status, cors_headers(), Json(payload)).into_response()
}

fn message(status: StatusCode, text: impl Into<String>) -> Response {
    json_response(status, json!({ "message": text.into() }))
}

/// `POST /macros/run`
///
/// The body is read as raw bytes so clients that omit `Content-Type` still work.
pub async fn run(State(state): State<AppState>, body: Bytes) -> Response {
    let request: RunRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(err) => {
            warn!(target: "macrobot::server", error = %err, "Rejected malformed run request");
            return message(StatusCode::BAD_REQUEST, format!("Malformed request: {err}"));
        }
    };

    match state.controller.submit(request) {
        Ok(started) => json_response(
            StatusCode::OK,
            json!({
                "message": "Run started.",
                "steps": started.steps,
                "run_id": started.run_id,
            }),
        ),
        Err(err @ RunError::NestingTooDeep { .. }) => {
            warn!(target: "macrobot::server", error = %err, "Rejected run request");
            message(StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(err @ RunError::WorkerUnavailable) => {
            warn!(target: "macrobot::server", error = %err, "Cannot accept run");
            message(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
    }
}

/// `POST /macros/stop`
pub async fn stop(State(state): State<AppState>) -> Response {
    let was_running = state.controller.stop();
    debug!(target: "macrobot::server", was_running, "Stop handled");
    message(StatusCode::OK, "Stopped.")
}

/// `GET /macros/status`
pub async fn status(State(state): State<AppState>) -> Response {
    let status = state.controller.status();
    json_response(StatusCode::OK, json!(status))
}

/// `GET /mouse/position`
pub async fn position(State(state): State<AppState>) -> Response {
    match state.driver.location() {
        Ok(point) => json_response(StatusCode::OK, json!(point)),
        Err(err) => {
            warn!(target: "macrobot::server", error = %err, "Pointer location unavailable");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Pointer location unavailable")
        }
    }
}

/// `OPTIONS` on any macro route.
pub async fn preflight() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, cors_headers())
}

pub async fn method_not_allowed() -> Response {
    message(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}
