//! Shell facade
//!
//! The stable entry points an application links against. Every call is
//! forwarded to whichever nucleus the loader bound; before a successful
//! init they are harmless no-ops.

pub mod loader;

use std::ffi::c_void;

use log::{debug, error};

use crate::details::{AppDetails, Capabilities, WindowDetails};
use crate::ffi::{OwnedWindowDetails, SharedListener};
use crate::nucleus::{LifecycleListener, Task, WindowId};

pub use loader::{BoundNucleus, DylibOpener, EntryPoints, LibraryOpener, Loader, NucleusLibrary};

unsafe extern "C" fn run_boxed_task(context: *mut c_void) {
    let task = Box::from_raw(context as *mut Task);
    task();
}

/// Facade over an injected loader
#[derive(Clone, Copy)]
pub struct Shell {
    loader: &'static Loader,
}

impl Shell {
    pub fn new(loader: &'static Loader) -> Self {
        Self { loader }
    }

    /// Shell over the process-wide loader
    pub fn global() -> Self {
        Self::new(Loader::global())
    }

    pub fn loader(&self) -> &'static Loader {
        self.loader
    }

    /// Load a nucleus; true once one is bound
    pub fn init(&self) -> bool {
        self.loader.initialize()
    }

    /// Load a nucleus with app details and a lifecycle listener
    pub fn init_with<L>(&self, app: &AppDetails, listener: L) -> bool
    where
        L: LifecycleListener + Send + Sync + 'static,
    {
        let listener: SharedListener = Box::new(listener);
        self.loader.initialize_with(app, Some(listener))
    }

    pub fn is_initialized(&self) -> bool {
        self.loader.is_initialized()
    }

    /// Capabilities negotiated with the nucleus, empty before init
    pub fn capabilities(&self) -> Capabilities {
        self.loader.capabilities()
    }

    /// Create a window; `None` before init or if the nucleus failed
    pub fn window_create(&self, details: &WindowDetails) -> Option<WindowId> {
        let bound = self.loader.bound()?;

        let owned = match OwnedWindowDetails::new(details) {
            Ok(owned) => owned,
            Err(e) => {
                error!("{}", e);
                return None;
            }
        };
        let raw = owned.as_raw();

        // SAFETY: `raw` borrows from `owned`, which outlives the call
        let handle = unsafe { (bound.entry_points().window_create)(&raw) };
        WindowId::from_handle(handle)
    }

    /// Request a window to close
    pub fn window_destroy(&self, window: WindowId) {
        if let Some(bound) = self.loader.bound() {
            // SAFETY: handles are plain ids, the nucleus ignores unknown ones
            unsafe { (bound.entry_points().window_destroy)(window.as_handle()) }
        }
    }

    /// Run the nucleus' event loop
    ///
    /// With a nucleus bound this ends in process exit and never returns.
    pub fn run_loop(&self) {
        match self.loader.bound() {
            // SAFETY: no arguments, called from the thread that ran init
            Some(bound) => unsafe { (bound.entry_points().run_loop)() },
            None => debug!("loop requested before init, ignoring"),
        }
    }

    /// Run `task` on the UI thread and wait for it
    ///
    /// True once the task has run. False if uninitialized, if the nucleus
    /// cannot dispatch, or if it discarded the task; `task` is dropped then.
    pub fn dispatch_sync<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch(task, |entry| entry.dispatch_sync)
    }

    /// Queue `task` on the UI thread
    ///
    /// False if uninitialized or the nucleus did not accept the task.
    pub fn dispatch_async<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch(task, |entry| entry.dispatch_async)
    }

    fn dispatch<F>(
        &self,
        task: F,
        select: impl FnOnce(&EntryPoints) -> Option<crate::ffi::DispatchFn>,
    ) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(dispatch) = self.loader.bound().and_then(|b| select(b.entry_points())) else {
            return false;
        };

        let task: Task = Box::new(task);
        let context = Box::into_raw(Box::new(task)) as *mut c_void;
        // SAFETY: `run_boxed_task` reclaims the box when it runs; on false it
        // never ran and the box is still ours
        let accepted = unsafe { dispatch(run_boxed_task, context) };
        if !accepted {
            debug!("nucleus did not run the task, dropping it");
            drop(unsafe { Box::from_raw(context as *mut Task) });
        }
        accepted
    }
}
