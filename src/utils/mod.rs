//! Utilities for Macrobot.
//!
//! Submodules:
//! - `browser`: OS-specific helper to open a URL in the default handler.

pub mod browser;
