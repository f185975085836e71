//! Error types
//!
//! Loader failures are recovered locally by advancing to the next candidate,
//! so `LoadError` mostly ends up in log lines. `NucleusError` is what a
//! backend reports when the native toolkit refuses to cooperate.

use std::path::PathBuf;

/// Failure to bring up a single backend candidate
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("could not load library {path}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("could not find symbol {symbol} in library {path}")]
    MissingSymbol { path: PathBuf, symbol: &'static str },
    #[error("could not initialize library {path}")]
    InitRefused { path: PathBuf },
}

/// Backend-side failures
#[derive(Debug, thiserror::Error)]
pub enum NucleusError {
    #[error("could not initialize toolkit: {0}")]
    ToolkitInit(String),
    #[error("could not create window")]
    WindowCreation,
    #[error("could not create webview")]
    WebViewCreation,
    #[error("could not load icon {path}: {reason}")]
    Icon { path: PathBuf, reason: String },
    #[error("nucleus is not initialized")]
    NotInitialized,
    #[error("invalid input from caller: {0}")]
    InvalidInput(&'static str),
    #[error("event loop error: {0}")]
    EventLoop(#[from] calloop::Error),
}
