//! Nucleus backend core
//!
//! This module contains the toolkit independent half of a backend:
//! - Window lifecycle state machine (created, closing, closed)
//! - Side table from native objects to window contexts
//! - Lifecycle event channel with veto support
//! - Dispatch bridge onto the event loop thread
//!
//! A concrete backend pairs `Nucleus` with a `Toolkit` and exports it through
//! [`export_nucleus!`](crate::export_nucleus).

pub mod context;
pub mod dispatch;
#[doc(hidden)]
pub mod export;
pub mod lifecycle;
pub mod toolkit;

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::thread::{self, ThreadId};

use log::{debug, error, info, warn};

use crate::details::{AppDetails, Capabilities, WindowDetails};
use crate::error::NucleusError;

pub use context::{ContextTable, WindowContext, WindowId};
pub use dispatch::{Dispatcher, RawTask, Task, TaskQueue};
pub use lifecycle::{Decision, LifecycleChannel, LifecycleListener};
pub use toolkit::{NativeWindowSpec, Toolkit, WorkArea};

type Contexts<T> = ContextTable<<T as Toolkit>::Window, <T as Toolkit>::WebView>;

struct Shared<T: Toolkit> {
    toolkit: T,
    contexts: RefCell<Contexts<T>>,
    lifecycle: LifecycleChannel,
    capabilities: Cell<Capabilities>,
    initialized: Cell<bool>,
    ui_thread: ThreadId,
}

/// Backend implementation driving one toolkit
///
/// Lives on the UI thread. Use [`Nucleus::dispatcher`] to reach it from
/// other threads.
pub struct Nucleus<T: Toolkit> {
    shared: Rc<Shared<T>>,
}

impl<T: Toolkit> Nucleus<T> {
    /// Create a nucleus; the calling thread becomes the UI thread
    pub fn new(toolkit: T) -> Self {
        Self {
            shared: Rc::new(Shared {
                toolkit,
                contexts: RefCell::new(ContextTable::new()),
                lifecycle: LifecycleChannel::new(),
                capabilities: Cell::new(Capabilities::empty()),
                initialized: Cell::new(false),
                ui_thread: thread::current().id(),
            }),
        }
    }

    /// The underlying toolkit
    pub fn toolkit(&self) -> &T {
        &self.shared.toolkit
    }

    /// Register a lifecycle listener
    pub fn on_lifecycle(&self, listener: impl LifecycleListener + 'static) {
        self.shared.lifecycle.subscribe(Rc::new(listener));
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.initialized.get()
    }

    /// Capabilities negotiated during init, empty before
    pub fn capabilities(&self) -> Capabilities {
        self.shared.capabilities.get()
    }

    /// Start the toolkit and install the default icon set
    pub fn init(&self, app: &AppDetails) -> Result<Capabilities, NucleusError> {
        // post_message is accepted but does nothing yet, so it is not advertised
        let negotiation = Capabilities::WEBAPP_URL;

        self.shared.toolkit.init()?;

        let icons = self.load_icons(&app.icon_set);
        if !icons.is_empty() {
            debug!("setting default icon list");
            self.shared.toolkit.set_default_icons(icons);
        }

        self.shared.capabilities.set(negotiation);
        self.shared.initialized.set(true);
        info!("nucleus initialized with {:?}", negotiation);
        Ok(negotiation)
    }

    // Some toolkits (GDK on X11) silently stop packing icons past a size
    // limit, so they are always registered smallest first.
    fn load_icons(&self, paths: &[PathBuf]) -> Vec<T::Icon> {
        let toolkit = &self.shared.toolkit;
        let mut icons: Vec<T::Icon> = paths
            .iter()
            .filter_map(|path| {
                info!("loading icon {}", path.display());
                match toolkit.load_icon(path) {
                    Ok(icon) => {
                        debug!("icon width = {}", toolkit.icon_width(&icon));
                        Some(icon)
                    }
                    Err(e) => {
                        error!("{}", e);
                        None
                    }
                }
            })
            .collect();
        icons.sort_by_key(|icon| toolkit.icon_width(icon));
        icons
    }

    /// Create a window showing `details.url`
    ///
    /// The window takes half of the primary work area and is centered. If a
    /// native object cannot be created, whatever was built before is torn
    /// down again.
    pub fn window_create(&self, details: &WindowDetails) -> Result<WindowId, NucleusError> {
        if !self.is_initialized() {
            return Err(NucleusError::NotInitialized);
        }

        let toolkit = &self.shared.toolkit;
        let area = toolkit.primary_work_area();
        let spec = NativeWindowSpec {
            title: &details.title,
            width: area.width / 2,
            height: area.height / 2,
            resizable: true,
            centered: true,
        };

        let mut construction = Construction::new(toolkit);
        let window = toolkit.create_window(&spec)?;
        construction.window = Some(window.clone());
        let webview = toolkit.create_webview()?;
        construction.webview = Some(webview.clone());
        // A panic in attach still unwinds through the guard
        toolkit.attach_webview(&window, &webview);
        construction.commit();

        let id = self
            .shared
            .contexts
            .borrow_mut()
            .insert(window.clone(), webview.clone());
        toolkit.connect_signals(&window, &webview, self.router());

        let icons = self.load_icons(&details.icon_set);
        if !icons.is_empty() {
            toolkit.set_window_icons(&window, icons);
        }

        if details.dev_mode {
            debug!("enabling developer tools for {:?}", id);
            toolkit.enable_developer_tools(&webview);
        }

        toolkit.load_url(&webview, &details.url);
        toolkit.show(&window);

        info!("window created");
        Ok(id)
    }

    /// Request the window to close; teardown follows the native signals
    pub fn window_destroy(&self, id: WindowId) {
        let window = self
            .shared
            .contexts
            .borrow()
            .get(id)
            .and_then(|context| context.window.clone());

        match window {
            Some(window) => {
                self.shared.toolkit.request_close(&window);
                info!("window close triggered");
            }
            None => debug!("window {:?} is already gone", id),
        }
    }

    /// Deliver a message into the page
    ///
    /// Not wired to the webview yet; the call is accepted and dropped.
    /// `Capabilities::POST_MESSAGE` is not advertised while this is the case.
    pub fn post_message(&self, id: WindowId, message: &str) {
        debug!(
            "post_message to {:?} ignored ({} bytes)",
            id,
            message.len()
        );
    }

    /// Attach caller data to a window
    pub fn set_user_data(&self, id: WindowId, data: Rc<dyn Any>) -> bool {
        match self.shared.contexts.borrow_mut().get_mut(id) {
            Some(context) => {
                context.user_data = Some(data);
                true
            }
            None => false,
        }
    }

    /// Caller data attached to a window
    pub fn user_data(&self, id: WindowId) -> Option<Rc<dyn Any>> {
        self.shared
            .contexts
            .borrow()
            .get(id)
            .and_then(|context| context.user_data.clone())
    }

    /// Whether the window context still exists
    pub fn is_open(&self, id: WindowId) -> bool {
        self.shared.contexts.borrow().get(id).is_some()
    }

    /// Number of windows not yet closed
    pub fn window_count(&self) -> usize {
        self.shared.contexts.borrow().len()
    }

    /// Dispatcher targeting this nucleus' event loop
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::with_ui_thread(self.shared.toolkit.task_queue(), self.shared.ui_thread)
    }

    /// Run the native loop, then announce the final quit
    pub fn run_until_quit(&self) -> Result<(), NucleusError> {
        let result = self.shared.toolkit.run_main();
        self.shared.lifecycle.emit_app_quit();
        result
    }

    /// Run the native loop and terminate the process when it ends
    ///
    /// Nothing is cleaned up after the final quit event; `exit` does not
    /// return.
    pub fn run_loop(&self) -> ! {
        if let Err(e) = self.run_until_quit() {
            error!("{}", e);
        }

        info!("calling exit()");
        std::process::exit(0)
    }

    fn router(&self) -> SignalRouter<T> {
        SignalRouter {
            shared: Rc::downgrade(&self.shared),
        }
    }
}

/// Entry point for native signals, handed to the toolkit per window
pub struct SignalRouter<T: Toolkit> {
    shared: Weak<Shared<T>>,
}

impl<T: Toolkit> Clone for SignalRouter<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Toolkit> SignalRouter<T> {
    /// The user asked to close `window`
    ///
    /// Always returns true: the signal is handled here and the toolkit's
    /// default handling must not run.
    pub fn delete_requested(&self, window: &T::Window) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return true;
        };

        let id = shared.contexts.borrow().lookup_window(window);
        let decision = match id {
            Some(id) => shared.lifecycle.emit_window_will_close(id),
            None => Decision::Proceed,
        };

        if decision.is_proceed() {
            shared.toolkit.destroy_window(window);
        } else {
            info!("window close prevented");
        }

        true
    }

    /// `window` has been destroyed
    pub fn destroyed(&self, window: &T::Window) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        let mut quit = Decision::Proceed;
        let id = shared.contexts.borrow().lookup_window(window);
        if let Some(id) = id {
            quit = shared.lifecycle.emit_window_closed(id);

            let released = shared.contexts.borrow_mut().remove(id);
            if released.is_some() {
                info!("window closed and private context released");
            }
        }

        if quit.is_veto() {
            return;
        }

        if shared.lifecycle.emit_app_will_quit().is_proceed() {
            info!("quitting native event loop");
            shared.toolkit.quit_main();
        }
    }

    /// The page title of `webview` changed
    pub fn title_changed(&self, webview: &T::WebView) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        let live = {
            let contexts = shared.contexts.borrow();
            contexts
                .lookup_webview(webview)
                .and_then(|id| contexts.get(id))
                .and_then(|context| Some((context.window.clone()?, context.webview.clone()?)))
        };

        if let Some((window, webview)) = live {
            if let Some(title) = shared.toolkit.webview_title(&webview) {
                shared.toolkit.set_window_title(&window, &title);
            }
        }
    }
}

// Tears down half-built native objects unless committed.
struct Construction<'a, T: Toolkit> {
    toolkit: &'a T,
    window: Option<T::Window>,
    webview: Option<T::WebView>,
}

impl<'a, T: Toolkit> Construction<'a, T> {
    fn new(toolkit: &'a T) -> Self {
        Self {
            toolkit,
            window: None,
            webview: None,
        }
    }

    fn commit(&mut self) {
        self.window = None;
        self.webview = None;
    }
}

impl<T: Toolkit> Drop for Construction<'_, T> {
    fn drop(&mut self) {
        if self.window.is_none() && self.webview.is_none() {
            return;
        }

        warn!("rolling back partially constructed window");
        if let Some(webview) = self.webview.take() {
            self.toolkit.discard_webview(&webview);
        }
        if let Some(window) = self.window.take() {
            self.toolkit.destroy_window(&window);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessToolkit;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        events: Rc<RefCell<Vec<String>>>,
        veto_close: bool,
        veto_closed: bool,
        veto_quit: bool,
        closed: Option<Arc<AtomicBool>>,
    }

    impl LifecycleListener for Recorder {
        fn window_will_close(&self, _window: WindowId) -> Decision {
            self.events.borrow_mut().push("will_close".to_string());
            if self.veto_close {
                Decision::Veto
            } else {
                Decision::Proceed
            }
        }

        fn window_closed(&self, _window: WindowId) -> Decision {
            self.events.borrow_mut().push("closed".to_string());
            if let Some(closed) = &self.closed {
                closed.store(true, Ordering::SeqCst);
            }
            if self.veto_closed {
                Decision::Veto
            } else {
                Decision::Proceed
            }
        }

        fn app_will_quit(&self) -> Decision {
            self.events.borrow_mut().push("will_quit".to_string());
            if self.veto_quit {
                Decision::Veto
            } else {
                Decision::Proceed
            }
        }

        fn app_quit(&self) {
            self.events.borrow_mut().push("quit".to_string());
        }
    }

    fn nucleus() -> Nucleus<HeadlessToolkit> {
        let nucleus = Nucleus::new(HeadlessToolkit::new().unwrap());
        nucleus.init(&AppDetails::default()).unwrap();
        nucleus
    }

    fn only_window(nucleus: &Nucleus<HeadlessToolkit>) -> crate::backend::headless::HeadlessWindow {
        let windows = nucleus.toolkit().windows();
        assert_eq!(windows.len(), 1);
        windows[0]
    }

    #[test]
    fn test_init_negotiates_url_handling() {
        let nucleus = Nucleus::new(HeadlessToolkit::new().unwrap());
        assert!(!nucleus.is_initialized());
        let capabilities = nucleus.init(&AppDetails::default()).unwrap();
        assert!(capabilities.contains(Capabilities::WEBAPP_URL));
        assert!(!capabilities.contains(Capabilities::POST_MESSAGE));
        assert_eq!(nucleus.capabilities(), capabilities);
    }

    #[test]
    fn test_init_failure_reported() {
        let nucleus = Nucleus::new(HeadlessToolkit::new().unwrap());
        nucleus.toolkit().fail_init();
        assert!(matches!(
            nucleus.init(&AppDetails::default()),
            Err(NucleusError::ToolkitInit(_))
        ));
        assert!(matches!(
            nucleus.window_create(&WindowDetails::new("T", "http://x")),
            Err(NucleusError::NotInitialized)
        ));
    }

    #[test]
    fn test_icons_registered_smallest_first() {
        let toolkit = HeadlessToolkit::new()
            .unwrap()
            .with_icon("64.png", 64)
            .with_icon("16.png", 16)
            .with_icon("32.png", 32);
        let nucleus = Nucleus::new(toolkit);
        let app = AppDetails::new()
            .icon("64.png")
            .icon("missing.png")
            .icon("16.png")
            .icon("32.png");

        nucleus.init(&app).unwrap();
        assert_eq!(nucleus.toolkit().default_icon_widths(), vec![16, 32, 64]);

        let id = nucleus
            .window_create(&WindowDetails::new("T", "http://x").icon("32.png").icon("16.png"))
            .unwrap();
        assert!(nucleus.is_open(id));
        let record = nucleus.toolkit().window(only_window(&nucleus)).unwrap();
        assert_eq!(record.icon_widths, vec![16, 32]);
    }

    #[test]
    fn test_window_create_builds_half_size_centered_window() {
        let nucleus = nucleus();
        let id = nucleus
            .window_create(&WindowDetails::new("T", "http://x").dev_mode(true))
            .unwrap();

        let toolkit = nucleus.toolkit();
        let record = toolkit.window(only_window(&nucleus)).unwrap();
        assert_eq!((record.width, record.height), (960, 540));
        assert!(record.resizable && record.centered && record.visible);
        assert_eq!(record.title, "T");

        let webview = toolkit.webview(record.child.unwrap()).unwrap();
        assert_eq!(webview.url.as_deref(), Some("http://x"));
        assert!(webview.developer_tools);
        assert_eq!(nucleus.window_count(), 1);
        assert!(nucleus.is_open(id));
    }

    #[test]
    fn test_window_size_follows_work_area() {
        let toolkit = HeadlessToolkit::new().unwrap().with_work_area(WorkArea {
            x: 0,
            y: 24,
            width: 1280,
            height: 776,
        });
        let nucleus = Nucleus::new(toolkit);
        nucleus.init(&AppDetails::default()).unwrap();
        nucleus
            .window_create(&WindowDetails::new("T", "http://x"))
            .unwrap();

        let record = nucleus.toolkit().window(only_window(&nucleus)).unwrap();
        assert_eq!((record.width, record.height), (640, 388));
    }

    #[test]
    fn test_webview_failure_rolls_back_window() {
        let nucleus = nucleus();
        let events = Rc::new(RefCell::new(Vec::new()));
        nucleus.on_lifecycle(Recorder {
            events: events.clone(),
            ..Recorder::default()
        });

        nucleus.toolkit().fail_next_webview();
        let result = nucleus.window_create(&WindowDetails::new("T", "http://x"));

        assert!(matches!(result, Err(NucleusError::WebViewCreation)));
        assert_eq!(nucleus.toolkit().live_windows(), 0);
        assert_eq!(nucleus.toolkit().destroyed_windows(), 1);
        assert_eq!(nucleus.window_count(), 0);
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_window_failure_leaves_nothing_behind() {
        let nucleus = nucleus();
        nucleus.toolkit().fail_next_window();
        assert!(matches!(
            nucleus.window_create(&WindowDetails::new("T", "http://x")),
            Err(NucleusError::WindowCreation)
        ));
        assert_eq!(nucleus.toolkit().live_windows(), 0);
        assert_eq!(nucleus.toolkit().live_webviews(), 0);
    }

    #[test]
    fn test_close_veto_keeps_window_open() {
        let nucleus = nucleus();
        let events = Rc::new(RefCell::new(Vec::new()));
        nucleus.on_lifecycle(Recorder {
            events: events.clone(),
            veto_close: true,
            ..Recorder::default()
        });
        let id = nucleus
            .window_create(&WindowDetails::new("T", "http://x"))
            .unwrap();

        let handled = nucleus.toolkit().emit_delete(only_window(&nucleus));

        assert!(handled);
        assert_eq!(*events.borrow(), vec!["will_close"]);
        assert_eq!(nucleus.toolkit().destroyed_windows(), 0);
        assert!(nucleus.is_open(id));
    }

    #[test]
    fn test_close_sequence_order() {
        let nucleus = nucleus();
        let events = Rc::new(RefCell::new(Vec::new()));
        nucleus.on_lifecycle(Recorder {
            events: events.clone(),
            ..Recorder::default()
        });
        let id = nucleus
            .window_create(&WindowDetails::new("T", "http://x"))
            .unwrap();

        nucleus.window_destroy(id);
        // Destroy only requests the close, the loop does the rest
        assert!(nucleus.is_open(id));

        nucleus.run_until_quit().unwrap();
        assert_eq!(
            *events.borrow(),
            vec!["will_close", "closed", "will_quit", "quit"]
        );
        assert!(!nucleus.is_open(id));
        assert_eq!(nucleus.window_count(), 0);
    }

    #[test]
    fn test_quit_veto_keeps_loop_running() {
        let nucleus = nucleus();
        let events = Rc::new(RefCell::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        nucleus.on_lifecycle(Recorder {
            events: events.clone(),
            veto_quit: true,
            closed: Some(closed.clone()),
            ..Recorder::default()
        });
        let id = nucleus
            .window_create(&WindowDetails::new("T", "http://x"))
            .unwrap();
        nucleus.window_destroy(id);

        let dispatcher = nucleus.dispatcher();
        let quit = nucleus.toolkit().quit_handle();
        let worker = std::thread::spawn(move || {
            while !closed.load(Ordering::SeqCst) {
                std::thread::yield_now();
            }
            // Only a running loop can answer this
            let alive = dispatcher.dispatch_sync(|| true);
            quit.quit();
            alive
        });

        nucleus.run_until_quit().unwrap();
        assert_eq!(worker.join().unwrap(), Some(true));
        assert_eq!(
            *events.borrow(),
            vec!["will_close", "closed", "will_quit", "quit"]
        );
    }

    #[test]
    fn test_closed_veto_skips_will_quit() {
        let nucleus = nucleus();
        let events = Rc::new(RefCell::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        nucleus.on_lifecycle(Recorder {
            events: events.clone(),
            veto_closed: true,
            closed: Some(closed.clone()),
            ..Recorder::default()
        });
        let id = nucleus
            .window_create(&WindowDetails::new("T", "http://x"))
            .unwrap();
        nucleus.window_destroy(id);

        let dispatcher = nucleus.dispatcher();
        let quit = nucleus.toolkit().quit_handle();
        let worker = std::thread::spawn(move || {
            while !closed.load(Ordering::SeqCst) {
                std::thread::yield_now();
            }
            let alive = dispatcher.dispatch_sync(|| true);
            quit.quit();
            alive
        });

        nucleus.run_until_quit().unwrap();
        assert_eq!(worker.join().unwrap(), Some(true));
        assert_eq!(*events.borrow(), vec!["will_close", "closed", "quit"]);
        assert!(!nucleus.is_open(id));
        assert_eq!(nucleus.window_count(), 0);
        assert_eq!(nucleus.toolkit().live_windows(), 0);
    }

    #[test]
    fn test_unfinished_construction_is_torn_down() {
        let nucleus = nucleus();
        let toolkit = nucleus.toolkit();
        let spec = NativeWindowSpec {
            title: "T",
            width: 10,
            height: 10,
            resizable: true,
            centered: true,
        };

        {
            let mut construction = Construction::new(toolkit);
            construction.window = Some(toolkit.create_window(&spec).unwrap());
            construction.webview = Some(toolkit.create_webview().unwrap());
        }

        assert_eq!(toolkit.live_windows(), 0);
        assert_eq!(toolkit.live_webviews(), 0);
        assert_eq!(toolkit.destroyed_windows(), 1);
        assert_eq!(toolkit.discarded_webviews(), 1);
    }

    #[test]
    fn test_title_follows_page() {
        let nucleus = nucleus();
        nucleus
            .window_create(&WindowDetails::new("Loading", "http://x"))
            .unwrap();
        let toolkit = nucleus.toolkit();
        let window = only_window(&nucleus);
        let webview = toolkit.window(window).unwrap().child.unwrap();

        toolkit.set_webview_title(webview, "Page Title");
        assert_eq!(toolkit.window(window).unwrap().title, "Page Title");
    }

    #[test]
    fn test_user_data_and_post_message() {
        let nucleus = nucleus();
        let id = nucleus
            .window_create(&WindowDetails::new("T", "http://x"))
            .unwrap();

        assert!(nucleus.set_user_data(id, Rc::new(42u32)));
        let data = nucleus.user_data(id).unwrap();
        assert_eq!(data.downcast_ref::<u32>(), Some(&42));

        nucleus.post_message(id, "hello");
        assert!(nucleus.is_open(id));
        assert!(!nucleus.set_user_data(WindowId(u64::MAX), Rc::new(())));
    }

    #[test]
    fn test_destroy_unknown_window_is_noop() {
        let nucleus = nucleus();
        nucleus.window_destroy(WindowId(u64::MAX));
        assert_eq!(nucleus.toolkit().live_windows(), 0);
    }
}
