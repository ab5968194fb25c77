/*!
HTTP transport for Macrobot.

Routes:
- `POST /macros/run`      decode a step list and submit it as the new run
- `POST /macros/stop`     cancel the active run
- `GET  /macros/status`   informational run status
- `GET  /mouse/position`  current pointer location from the driver
- `OPTIONS` on any of the above answers CORS preflight; other verbs get 405
- everything else is served from the UI root directory

Handlers never wait for playback: `submit` and `stop` return as soon as the
controller has flipped its tokens.
*/

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::executor::{InputDriver, RunController};

pub mod assets;
pub mod routes;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<RunController>,
    pub driver: Arc<dyn InputDriver>,
    pub ui_root: Arc<PathBuf>,
}

impl AppState {
    pub fn new(
        controller: Arc<RunController>,
        driver: Arc<dyn InputDriver>,
        ui_root: PathBuf,
    ) -> Self {
        Self {
            controller,
            driver,
            ui_root: Arc::new(ui_root),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/macros/run",
            post(routes::run)
                .options(routes::preflight)
                .fallback(routes::method_not_allowed),
        )
        .route(
            "/macros/stop",
            post(routes::stop)
                .options(routes::preflight)
                .fallback(routes::method_not_allowed),
        )
        .route(
            "/macros/status",
            get(routes::status)
                .options(routes::preflight)
                .fallback(routes::method_not_allowed),
        )
        .route(
            "/mouse/position",
            get(routes::position)
                .options(routes::preflight)
                .fallback(routes::method_not_allowed),
        )
        .fallback(assets::serve_asset)
        .with_state(state)
}

/// Bind the listening socket. Failing here is a startup error.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("listener has no local address")?;
    info!(
        target: "macrobot::server",
        %addr, ui_root = %state.ui_root.display(),
        "Macro server listening"
    );
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")
}
