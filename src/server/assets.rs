//! Static file serving for the macro editor UI.

use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{trace, warn};

use super::AppState;

/// Fallback handler: serve `uri`'s path from the UI root.
pub async fn serve_asset(State(state): State<AppState>, uri: Uri) -> Response {
    let Some(mut file) = resolve_path(&state.ui_root, uri.path()) else {
        warn!(target: "macrobot::server", path = uri.path(), "Asset path rejected");
        return text(StatusCode::FORBIDDEN, "Forbidden");
    };

    if tokio::fs::metadata(&file)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        file.push("index.html");
    }

    match tokio::fs::read(&file).await {
        Ok(bytes) => {
            trace!(target: "macrobot::server", file = %file.display(), len = bytes.len(), "Serving asset");
            ([(header::CONTENT_TYPE, content_type(&file))], bytes).into_response()
        }
        Err(err) if err.kind() == ErrorKind::NotFound => text(StatusCode::NOT_FOUND, "Not found"),
        Err(err) => {
            warn!(target: "macrobot::server", file = %file.display(), error = %err, "Failed to read asset");
            text(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

/// Map a request path onto a file under `root`.
///
/// Each `/`-separated segment is percent-decoded before `.` and `..` are
/// resolved, so an encoded `%2e%2e` is treated as a parent step. Returns
/// `None` if a segment fails to decode, decodes to something other than a
/// single plain name, or the result would leave `root`.
pub fn resolve_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let request_path = match request_path {
        "" | "/" => "/index.html",
        p => p,
    };

    let mut out = root.to_path_buf();
    let mut depth = 0usize;
    for raw in request_path.split('/') {
        let segment = percent_decode(raw)?;
        match segment.as_str() {
            "" | "." => {}
            ".." => {
                if depth == 0 {
                    return None;
                }
                out.pop();
                depth -= 1;
            }
            name => {
                if name.contains(['/', '\\', '\0']) {
                    return None;
                }
                let mut components = Path::new(name).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(part)), None) => out.push(part),
                    _ => return None,
                }
                depth += 1;
            }
        }
    }
    Some(out)
}

/// Decode `%XX` escapes in one path segment. `+` is left alone.
fn percent_decode(segment: &str) -> Option<String> {
    if !segment.contains('%') {
        return Some(segment.to_owned());
    }
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hi = hex_val(*bytes.get(i + 1)?)?;
            let lo = hex_val(*bytes.get(i + 2)?)?;
            out.push((hi << 4) | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Content type inferred from the file extension.
pub fn content_type(file: &Path) -> &'static str {
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

fn text(status: StatusCode, body: &'static str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}
