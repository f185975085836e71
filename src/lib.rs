//! Audience - a native window hosting the platform webview
//!
//! Audience presents one native window with an embedded web rendering
//! surface, backed by whatever webview engine the platform offers. The
//! engine specific code lives in a separate "nucleus" library that is
//! picked at runtime.
//!
//! # Architecture
//!
//! - **Shell**: Stable facade plus the dynamic loader probing nucleus libraries
//! - **Nucleus**: Toolkit independent window lifecycle, lifecycle events and
//!   the dispatch bridge onto the UI thread
//! - **Backend**: Toolkits a nucleus can drive (headless, GTK/WebKit2)
//! - **FFI**: The C ABI between shell and nucleus
//!
//! # Example
//!
//! ```no_run
//! use audience::WindowDetails;
//!
//! if audience::init() {
//!     audience::window_create(&WindowDetails::new("Hello", "https://example.com"));
//!     audience::run_loop();
//! }
//! ```

pub mod backend;
pub mod config;
pub mod details;
pub mod error;
pub mod ffi;
pub mod nucleus;
pub mod shell;

pub use config::LoaderConfig;
pub use details::{AppDetails, Capabilities, WindowDetails};
pub use error::{LoadError, NucleusError};
pub use nucleus::{Decision, LifecycleListener, WindowId};
pub use shell::{Loader, Shell};

/// Load a nucleus into the process-wide shell
pub fn init() -> bool {
    Shell::global().init()
}

/// Whether the process-wide shell has a nucleus
pub fn is_initialized() -> bool {
    Shell::global().is_initialized()
}

/// Create a window through the process-wide shell
pub fn window_create(details: &WindowDetails) -> Option<WindowId> {
    Shell::global().window_create(details)
}

/// Request a window to close through the process-wide shell
pub fn window_destroy(window: WindowId) {
    Shell::global().window_destroy(window)
}

/// Run the event loop of the process-wide shell
pub fn run_loop() {
    Shell::global().run_loop()
}
