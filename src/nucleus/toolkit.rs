//! Native toolkit abstraction
//!
//! A `Toolkit` is the thin layer of native calls a nucleus needs. All methods
//! are called on the UI thread; only the `TaskQueue` crosses threads.

use std::fmt::Debug;
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;

use crate::error::NucleusError;
use crate::nucleus::dispatch::TaskQueue;
use crate::nucleus::SignalRouter;

/// Usable area of the primary display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkArea {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Parameters for a native top-level window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeWindowSpec<'a> {
    pub title: &'a str,
    pub width: i32,
    pub height: i32,
    pub resizable: bool,
    pub centered: bool,
}

/// Native GUI primitives backing a nucleus
pub trait Toolkit: Sized + 'static {
    /// Native top-level window
    type Window: Clone + Eq + Hash + Debug;
    /// Native web rendering surface
    type WebView: Clone + Eq + Hash + Debug;
    /// Decoded icon image
    type Icon;

    /// Start the toolkit; fails if no display is available
    fn init(&self) -> Result<(), NucleusError>;

    /// Queue drained by `run_main` at high priority
    fn task_queue(&self) -> Arc<dyn TaskQueue>;

    fn load_icon(&self, path: &Path) -> Result<Self::Icon, NucleusError>;

    fn icon_width(&self, icon: &Self::Icon) -> i32;

    /// Register the icons every window uses by default, in the given order
    fn set_default_icons(&self, icons: Vec<Self::Icon>);

    /// Register icons for one window, in the given order
    fn set_window_icons(&self, window: &Self::Window, icons: Vec<Self::Icon>);

    fn primary_work_area(&self) -> WorkArea;

    fn create_window(&self, spec: &NativeWindowSpec<'_>) -> Result<Self::Window, NucleusError>;

    /// Destroy immediately; emits the destroy signal if one is connected
    fn destroy_window(&self, window: &Self::Window);

    fn create_webview(&self) -> Result<Self::WebView, NucleusError>;

    /// Throw away a webview that never made it into a window
    fn discard_webview(&self, webview: &Self::WebView);

    /// Make `webview` the sole child of `window`
    fn attach_webview(&self, window: &Self::Window, webview: &Self::WebView);

    /// Route delete, destroy and title notifications to `router`
    fn connect_signals(
        &self,
        window: &Self::Window,
        webview: &Self::WebView,
        router: SignalRouter<Self>,
    );

    /// Console messages to stdout plus the inspector
    fn enable_developer_tools(&self, webview: &Self::WebView);

    fn load_url(&self, webview: &Self::WebView, url: &str);

    fn show(&self, window: &Self::Window);

    /// Ask for the window to be closed, like the close button would
    fn request_close(&self, window: &Self::Window);

    fn set_window_title(&self, window: &Self::Window, title: &str);

    fn webview_title(&self, webview: &Self::WebView) -> Option<String>;

    /// Run the native loop until `quit_main` is called
    fn run_main(&self) -> Result<(), NucleusError>;

    fn quit_main(&self);
}
