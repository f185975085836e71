//! Backend module
//!
//! This module contains the toolkits a nucleus can drive:
//! - Headless toolkit on a calloop event loop (stub backend, tests)
//! - GTK/WebKit2 toolkit for Unix, behind the `webkit` feature

pub mod event_loop;
pub mod headless;
#[cfg(all(unix, not(target_os = "macos"), feature = "webkit"))]
pub mod webkit;

pub use event_loop::EventLoop;
pub use headless::HeadlessToolkit;
