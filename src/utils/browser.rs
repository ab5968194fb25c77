use anyhow::{Context, Result};
use std::process::{Command, Stdio};
use tracing::debug;

/// Ask the OS to open `url` with its default handler (usually a browser).
///
/// Returns once the helper process has been spawned; whether a browser
/// actually appears is not observed. Blank URLs are ignored.
pub fn open_url(url: &str) -> Result<()> {
    let url = url.trim();
    if url.is_empty() {
        return Ok(());
    }
    debug!(target: "macrobot::browser", %url, "open_url requested");
    open_url_impl(url)
}

#[cfg(target_os = "macos")]
fn open_url_impl(url: &str) -> Result<()> {
    spawn_detached(Command::new("open").arg(url))
}

#[cfg(target_os = "windows")]
fn open_url_impl(url: &str) -> Result<()> {
    // The empty argument is the window title `start` expects before the target.
    spawn_detached(Command::new("cmd").args(["/C", "start", "", url]))
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn open_url_impl(url: &str) -> Result<()> {
    spawn_detached(Command::new("xdg-open").arg(url))
}

fn spawn_detached(cmd: &mut Command) -> Result<()> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to spawn {:?}", cmd.get_program()))?;
    // Reap the helper so it does not linger as a zombie.
    std::thread::spawn(move || {
        let _ = child.wait();
    });
    Ok(())
}
