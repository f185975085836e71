//! Headless toolkit
//!
//! A display-less toolkit whose windows and webviews are plain records. Its
//! native loop is a calloop `EventLoop`; close requests and title changes are
//! delivered like native signals would be. Used as the stub backend and to
//! exercise the nucleus without a windowing system.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use calloop::LoopSignal;
use log::debug;

use crate::backend::event_loop::{ChannelQueue, EventLoop};
use crate::error::NucleusError;
use crate::nucleus::{NativeWindowSpec, SignalRouter, TaskQueue, Toolkit, WorkArea};

/// Headless window handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlessWindow(u64);

/// Headless webview handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlessWebView(u64);

/// Icon known to the headless toolkit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessIcon {
    pub path: PathBuf,
    pub width: i32,
}

/// State of a headless window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowRecord {
    pub title: String,
    pub width: i32,
    pub height: i32,
    pub resizable: bool,
    pub centered: bool,
    pub visible: bool,
    pub child: Option<HeadlessWebView>,
    /// Widths of the window icons, in registration order
    pub icon_widths: Vec<i32>,
}

/// State of a headless webview
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebViewRecord {
    pub url: Option<String>,
    pub title: Option<String>,
    pub developer_tools: bool,
}

enum NativeEvent {
    Delete(HeadlessWindow),
}

#[derive(Default)]
struct Failures {
    init: bool,
    window: bool,
    webview: bool,
}

#[derive(Default)]
struct State {
    next_id: u64,
    windows: HashMap<HeadlessWindow, WindowRecord>,
    webviews: HashMap<HeadlessWebView, WebViewRecord>,
    routers: HashMap<HeadlessWindow, SignalRouter<HeadlessToolkit>>,
    webview_routers: HashMap<HeadlessWebView, SignalRouter<HeadlessToolkit>>,
    icons: HashMap<PathBuf, i32>,
    default_icon_widths: Vec<i32>,
    destroyed_windows: usize,
    discarded_webviews: usize,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Stops a running headless loop from any thread
#[derive(Clone)]
pub struct QuitHandle {
    requested: Arc<AtomicBool>,
    signal: LoopSignal,
}

impl QuitHandle {
    pub fn quit(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.signal.wakeup();
    }
}

/// Toolkit without a display
pub struct HeadlessToolkit {
    event_loop: RefCell<EventLoop>,
    // Reachable while a running loop holds `event_loop` borrowed
    tasks: Arc<ChannelQueue>,
    quit: QuitHandle,
    work_area: WorkArea,
    state: RefCell<State>,
    pending: RefCell<VecDeque<NativeEvent>>,
    failures: RefCell<Failures>,
    running: Cell<bool>,
}

impl HeadlessToolkit {
    /// Create a toolkit with a 1920x1080 work area
    pub fn new() -> Result<Self, NucleusError> {
        let event_loop = EventLoop::new()?;
        let quit = QuitHandle {
            requested: Arc::new(AtomicBool::new(false)),
            signal: event_loop.signal(),
        };

        Ok(Self {
            tasks: event_loop.task_queue(),
            event_loop: RefCell::new(event_loop),
            quit,
            work_area: WorkArea {
                x: 0,
                y: 0,
                width: 1920,
                height: 1080,
            },
            state: RefCell::new(State::default()),
            pending: RefCell::new(VecDeque::new()),
            failures: RefCell::new(Failures::default()),
            running: Cell::new(false),
        })
    }

    /// Use a different primary work area
    pub fn with_work_area(mut self, work_area: WorkArea) -> Self {
        self.work_area = work_area;
        self
    }

    /// Make `path` loadable as an icon of the given width
    pub fn with_icon(self, path: impl Into<PathBuf>, width: i32) -> Self {
        self.state.borrow_mut().icons.insert(path.into(), width);
        self
    }

    /// Make the next `init` fail
    pub fn fail_init(&self) {
        self.failures.borrow_mut().init = true;
    }

    /// Make the next window creation fail
    pub fn fail_next_window(&self) {
        self.failures.borrow_mut().window = true;
    }

    /// Make the next webview creation fail
    pub fn fail_next_webview(&self) {
        self.failures.borrow_mut().webview = true;
    }

    /// Handle for stopping the loop from other threads
    pub fn quit_handle(&self) -> QuitHandle {
        self.quit.clone()
    }

    /// Whether `run_main` is currently executing
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub fn window(&self, window: HeadlessWindow) -> Option<WindowRecord> {
        self.state.borrow().windows.get(&window).cloned()
    }

    pub fn webview(&self, webview: HeadlessWebView) -> Option<WebViewRecord> {
        self.state.borrow().webviews.get(&webview).cloned()
    }

    /// All live windows
    pub fn windows(&self) -> Vec<HeadlessWindow> {
        self.state.borrow().windows.keys().copied().collect()
    }

    pub fn live_windows(&self) -> usize {
        self.state.borrow().windows.len()
    }

    pub fn live_webviews(&self) -> usize {
        self.state.borrow().webviews.len()
    }

    pub fn destroyed_windows(&self) -> usize {
        self.state.borrow().destroyed_windows
    }

    pub fn discarded_webviews(&self) -> usize {
        self.state.borrow().discarded_webviews
    }

    /// Widths of the default icons, in registration order
    pub fn default_icon_widths(&self) -> Vec<i32> {
        self.state.borrow().default_icon_widths.clone()
    }

    /// Deliver a delete request right away, as the close button would
    ///
    /// Returns whether the signal was handled by a connected router.
    pub fn emit_delete(&self, window: HeadlessWindow) -> bool {
        let router = self.state.borrow().routers.get(&window).cloned();
        match router {
            Some(router) => router.delete_requested(&window),
            None => {
                self.destroy_window(&window);
                false
            }
        }
    }

    /// Change the page title of `webview` and emit the notification
    pub fn set_webview_title(&self, webview: HeadlessWebView, title: &str) {
        let router = {
            let mut state = self.state.borrow_mut();
            match state.webviews.get_mut(&webview) {
                Some(record) => record.title = Some(title.to_string()),
                None => return,
            }
            state.webview_routers.get(&webview).cloned()
        };

        if let Some(router) = router {
            router.title_changed(&webview);
        }
    }

    fn take_failure(&self, select: impl FnOnce(&mut Failures) -> &mut bool) -> bool {
        let mut failures = self.failures.borrow_mut();
        std::mem::take(select(&mut *failures))
    }

    fn drain_native_events(&self) {
        loop {
            let event = self.pending.borrow_mut().pop_front();
            match event {
                Some(NativeEvent::Delete(window)) => {
                    self.emit_delete(window);
                }
                None => break,
            }
        }
    }
}

impl Toolkit for HeadlessToolkit {
    type Window = HeadlessWindow;
    type WebView = HeadlessWebView;
    type Icon = HeadlessIcon;

    fn init(&self) -> Result<(), NucleusError> {
        if self.take_failure(|f| &mut f.init) {
            return Err(NucleusError::ToolkitInit("no display".to_string()));
        }
        Ok(())
    }

    fn task_queue(&self) -> Arc<dyn TaskQueue> {
        self.tasks.clone()
    }

    fn load_icon(&self, path: &Path) -> Result<HeadlessIcon, NucleusError> {
        match self.state.borrow().icons.get(path) {
            Some(&width) => Ok(HeadlessIcon {
                path: path.to_path_buf(),
                width,
            }),
            None => Err(NucleusError::Icon {
                path: path.to_path_buf(),
                reason: "no such icon".to_string(),
            }),
        }
    }

    fn icon_width(&self, icon: &HeadlessIcon) -> i32 {
        icon.width
    }

    fn set_default_icons(&self, icons: Vec<HeadlessIcon>) {
        self.state.borrow_mut().default_icon_widths = icons.iter().map(|i| i.width).collect();
    }

    fn set_window_icons(&self, window: &HeadlessWindow, icons: Vec<HeadlessIcon>) {
        if let Some(record) = self.state.borrow_mut().windows.get_mut(window) {
            record.icon_widths = icons.iter().map(|i| i.width).collect();
        }
    }

    fn primary_work_area(&self) -> WorkArea {
        self.work_area
    }

    fn create_window(&self, spec: &NativeWindowSpec<'_>) -> Result<HeadlessWindow, NucleusError> {
        if self.take_failure(|f| &mut f.window) {
            return Err(NucleusError::WindowCreation);
        }

        let mut state = self.state.borrow_mut();
        let window = HeadlessWindow(state.next_id());
        state.windows.insert(
            window,
            WindowRecord {
                title: spec.title.to_string(),
                width: spec.width,
                height: spec.height,
                resizable: spec.resizable,
                centered: spec.centered,
                ..WindowRecord::default()
            },
        );
        debug!("created headless window {:?}", window);
        Ok(window)
    }

    fn destroy_window(&self, window: &HeadlessWindow) {
        let router = {
            let mut state = self.state.borrow_mut();
            let Some(record) = state.windows.remove(window) else {
                return;
            };
            if let Some(child) = record.child {
                state.webviews.remove(&child);
                state.webview_routers.remove(&child);
            }
            state.destroyed_windows += 1;
            state.routers.remove(window)
        };

        debug!("destroyed headless window {:?}", window);
        if let Some(router) = router {
            router.destroyed(window);
        }
    }

    fn create_webview(&self) -> Result<HeadlessWebView, NucleusError> {
        if self.take_failure(|f| &mut f.webview) {
            return Err(NucleusError::WebViewCreation);
        }

        let mut state = self.state.borrow_mut();
        let webview = HeadlessWebView(state.next_id());
        state.webviews.insert(webview, WebViewRecord::default());
        Ok(webview)
    }

    fn discard_webview(&self, webview: &HeadlessWebView) {
        let mut state = self.state.borrow_mut();
        if state.webviews.remove(webview).is_some() {
            state.discarded_webviews += 1;
        }
        for record in state.windows.values_mut() {
            if record.child == Some(*webview) {
                record.child = None;
            }
        }
    }

    fn attach_webview(&self, window: &HeadlessWindow, webview: &HeadlessWebView) {
        if let Some(record) = self.state.borrow_mut().windows.get_mut(window) {
            record.child = Some(*webview);
        }
    }

    fn connect_signals(
        &self,
        window: &HeadlessWindow,
        webview: &HeadlessWebView,
        router: SignalRouter<Self>,
    ) {
        let mut state = self.state.borrow_mut();
        state.webview_routers.insert(*webview, router.clone());
        state.routers.insert(*window, router);
    }

    fn enable_developer_tools(&self, webview: &HeadlessWebView) {
        if let Some(record) = self.state.borrow_mut().webviews.get_mut(webview) {
            record.developer_tools = true;
        }
    }

    fn load_url(&self, webview: &HeadlessWebView, url: &str) {
        if let Some(record) = self.state.borrow_mut().webviews.get_mut(webview) {
            record.url = Some(url.to_string());
        }
    }

    fn show(&self, window: &HeadlessWindow) {
        if let Some(record) = self.state.borrow_mut().windows.get_mut(window) {
            record.visible = true;
        }
    }

    fn request_close(&self, window: &HeadlessWindow) {
        self.pending.borrow_mut().push_back(NativeEvent::Delete(*window));
        self.quit.signal.wakeup();
    }

    fn set_window_title(&self, window: &HeadlessWindow, title: &str) {
        if let Some(record) = self.state.borrow_mut().windows.get_mut(window) {
            record.title = title.to_string();
        }
    }

    fn webview_title(&self, webview: &HeadlessWebView) -> Option<String> {
        self.state
            .borrow()
            .webviews
            .get(webview)
            .and_then(|record| record.title.clone())
    }

    fn run_main(&self) -> Result<(), NucleusError> {
        self.running.set(true);

        let result = loop {
            self.drain_native_events();
            if self.quit.requested.load(Ordering::SeqCst) {
                break Ok(());
            }
            if let Err(e) = self.event_loop.borrow_mut().dispatch(None) {
                break Err(e);
            }
        };

        self.running.set(false);
        self.quit.requested.store(false, Ordering::SeqCst);
        result
    }

    fn quit_main(&self) {
        self.quit.quit();
    }
}
