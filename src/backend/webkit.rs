//! GTK 3 / WebKit2GTK toolkit
//!
//! Native objects are reference counted GObjects, so windows and webviews are
//! compared and hashed by identity. Dispatched tasks run as high priority
//! idle sources on the default main context.

use std::path::Path;
use std::sync::Arc;

use gtk::gdk_pixbuf::Pixbuf;
use gtk::prelude::*;
use gtk::{gdk, glib};
use log::{debug, info, warn};
use webkit2gtk::{SettingsExt, WebView, WebViewExt};

use crate::error::NucleusError;
use crate::nucleus::{NativeWindowSpec, SignalRouter, Task, TaskQueue, Toolkit, WorkArea};

// Used when GDK cannot tell us about the primary monitor.
const FALLBACK_WORK_AREA: WorkArea = WorkArea {
    x: 0,
    y: 0,
    width: 1280,
    height: 800,
};

/// Posts tasks as `G_PRIORITY_HIGH_IDLE` idle sources
pub struct IdleQueue;

impl TaskQueue for IdleQueue {
    fn post(&self, task: Task) {
        let mut task = Some(task);
        glib::idle_add_full(glib::Priority::HIGH_IDLE, move || {
            if let Some(task) = task.take() {
                task();
            }
            glib::ControlFlow::Break
        });
    }
}

/// Toolkit backed by GTK 3 and WebKit2GTK
#[derive(Debug, Default)]
pub struct WebkitToolkit;

impl WebkitToolkit {
    pub fn new() -> Self {
        Self
    }
}

impl Toolkit for WebkitToolkit {
    type Window = gtk::Window;
    type WebView = WebView;
    type Icon = Pixbuf;

    fn init(&self) -> Result<(), NucleusError> {
        gtk::init().map_err(|e| NucleusError::ToolkitInit(e.to_string()))
    }

    fn task_queue(&self) -> Arc<dyn TaskQueue> {
        Arc::new(IdleQueue)
    }

    fn load_icon(&self, path: &Path) -> Result<Pixbuf, NucleusError> {
        Pixbuf::from_file(path).map_err(|e| NucleusError::Icon {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn icon_width(&self, icon: &Pixbuf) -> i32 {
        icon.width()
    }

    fn set_default_icons(&self, icons: Vec<Pixbuf>) {
        gtk::Window::set_default_icon_list(&icons);
    }

    fn set_window_icons(&self, window: &gtk::Window, icons: Vec<Pixbuf>) {
        window.set_icon_list(&icons);
    }

    fn primary_work_area(&self) -> WorkArea {
        match gdk::Display::default().and_then(|display| display.primary_monitor()) {
            Some(monitor) => {
                let area = monitor.workarea();
                WorkArea {
                    x: area.x(),
                    y: area.y(),
                    width: area.width(),
                    height: area.height(),
                }
            }
            None => {
                warn!("no primary monitor, using fallback work area");
                FALLBACK_WORK_AREA
            }
        }
    }

    fn create_window(&self, spec: &NativeWindowSpec<'_>) -> Result<gtk::Window, NucleusError> {
        let window = gtk::Window::new(gtk::WindowType::Toplevel);
        window.set_title(spec.title);
        window.set_default_size(spec.width, spec.height);
        window.set_resizable(spec.resizable);
        if spec.centered {
            window.set_position(gtk::WindowPosition::Center);
        }
        Ok(window)
    }

    fn destroy_window(&self, window: &gtk::Window) {
        // SAFETY: the nucleus drops every reference it keeps in the destroy handler
        unsafe { window.destroy() };
    }

    fn create_webview(&self) -> Result<WebView, NucleusError> {
        Ok(WebView::new())
    }

    fn discard_webview(&self, webview: &WebView) {
        // SAFETY: the webview was never handed out
        unsafe { webview.destroy() };
    }

    fn attach_webview(&self, window: &gtk::Window, webview: &WebView) {
        window.add(webview);
    }

    fn connect_signals(&self, window: &gtk::Window, webview: &WebView, router: SignalRouter<Self>) {
        let delete_router = router.clone();
        window.connect_delete_event(move |window, _| {
            if delete_router.delete_requested(window) {
                glib::Propagation::Stop
            } else {
                glib::Propagation::Proceed
            }
        });

        let destroy_router = router.clone();
        window.connect_destroy(move |window| destroy_router.destroyed(window));

        webview.connect_title_notify(move |webview| router.title_changed(webview));
    }

    fn enable_developer_tools(&self, webview: &WebView) {
        if let Some(settings) = WebViewExt::settings(webview) {
            settings.set_enable_write_console_messages_to_stdout(true);
            settings.set_enable_developer_extras(true);
        }
    }

    fn load_url(&self, webview: &WebView, url: &str) {
        debug!("loading {}", url);
        webview.load_uri(url);
    }

    fn show(&self, window: &gtk::Window) {
        window.show_all();
    }

    fn request_close(&self, window: &gtk::Window) {
        window.close();
    }

    fn set_window_title(&self, window: &gtk::Window, title: &str) {
        window.set_title(title);
    }

    fn webview_title(&self, webview: &WebView) -> Option<String> {
        webview.title().map(|title| title.to_string())
    }

    fn run_main(&self) -> Result<(), NucleusError> {
        gtk::main();
        Ok(())
    }

    fn quit_main(&self) {
        info!("calling gtk::main_quit()");
        gtk::main_quit();
    }
}
