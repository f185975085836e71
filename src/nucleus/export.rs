//! Glue behind `export_nucleus!`
//!
//! The nucleus itself is thread-local to the UI thread; only the dispatcher
//! is reachable process-wide.

use std::cell::OnceCell;
use std::ffi::c_void;
use std::sync::OnceLock;
use std::thread::LocalKey;

use log::{error, warn};

use crate::details::AppDetails;
use crate::ffi::{ForeignListener, RawAppDetails, RawNegotiation, RawWindowDetails};
use crate::nucleus::{Dispatcher, Nucleus, RawTask, Toolkit, WindowId};

pub type NucleusSlot<T> = LocalKey<OnceCell<Nucleus<T>>>;

/// # Safety
///
/// `app` and `negotiation` must be null or valid.
pub unsafe fn init<T: Toolkit>(
    slot: &'static NucleusSlot<T>,
    dispatcher: &'static OnceLock<Dispatcher>,
    toolkit: impl FnOnce() -> T,
    app: *const RawAppDetails,
    negotiation: *mut RawNegotiation,
) -> bool {
    let (details, events) = match app.as_ref() {
        Some(app) => match app.to_details() {
            Ok(details) => (details, Some(app.events)),
            Err(e) => {
                error!("{}", e);
                return false;
            }
        },
        None => (AppDetails::default(), None),
    };

    let capabilities = slot.with(|cell| {
        if let Some(nucleus) = cell.get() {
            warn!("nucleus already initialized");
            return Some(nucleus.capabilities());
        }

        let nucleus = Nucleus::new(toolkit());
        match nucleus.init(&details) {
            Ok(capabilities) => {
                if let Some(events) = events {
                    nucleus.on_lifecycle(unsafe { ForeignListener::new(events) });
                }
                let _ = dispatcher.set(nucleus.dispatcher());
                let _ = cell.set(nucleus);
                Some(capabilities)
            }
            Err(e) => {
                error!("{}", e);
                None
            }
        }
    });

    match capabilities {
        Some(capabilities) => {
            if let Some(negotiation) = negotiation.as_mut() {
                negotiation.capabilities = capabilities.bits();
            }
            true
        }
        None => false,
    }
}

/// # Safety
///
/// `details` must be null or valid.
pub unsafe fn window_create<T: Toolkit>(
    slot: &'static NucleusSlot<T>,
    details: *const RawWindowDetails,
) -> *mut c_void {
    let details = match details.as_ref().map(|raw| raw.to_details()) {
        Some(Ok(details)) => details,
        Some(Err(e)) => {
            error!("{}", e);
            return std::ptr::null_mut();
        }
        None => return std::ptr::null_mut(),
    };

    slot.with(|cell| match cell.get() {
        Some(nucleus) => match nucleus.window_create(&details) {
            Ok(id) => id.as_handle(),
            Err(e) => {
                error!("{}", e);
                std::ptr::null_mut()
            }
        },
        None => std::ptr::null_mut(),
    })
}

pub fn window_destroy<T: Toolkit>(slot: &'static NucleusSlot<T>, handle: *mut c_void) {
    if let Some(id) = WindowId::from_handle(handle) {
        slot.with(|cell| {
            if let Some(nucleus) = cell.get() {
                nucleus.window_destroy(id);
            }
        });
    }
}

pub fn run_loop<T: Toolkit>(slot: &'static NucleusSlot<T>) {
    slot.with(|cell| match cell.get() {
        Some(nucleus) => nucleus.run_loop(),
        None => warn!("loop requested before init, ignoring"),
    })
}

/// # Safety
///
/// `task` must be safe to call with `context` on the UI thread.
pub unsafe fn dispatch_sync(
    dispatcher: &OnceLock<Dispatcher>,
    task: RawTask,
    context: *mut c_void,
) -> bool {
    match dispatcher.get() {
        Some(dispatcher) => dispatcher.dispatch_sync_raw(task, context),
        None => {
            warn!("dispatch before init, dropping task");
            false
        }
    }
}

/// # Safety
///
/// `task` must be safe to call with `context` on the UI thread.
pub unsafe fn dispatch_async(
    dispatcher: &OnceLock<Dispatcher>,
    task: RawTask,
    context: *mut c_void,
) -> bool {
    match dispatcher.get() {
        Some(dispatcher) => {
            dispatcher.dispatch_async_raw(task, context);
            true
        }
        None => {
            warn!("dispatch before init, dropping task");
            false
        }
    }
}

/// Export a toolkit as a loadable nucleus library
///
/// Expands to the `audience_*` entry points the loader looks for. Use it
/// once, in a `cdylib`:
///
/// ```ignore
/// audience::export_nucleus!(MyToolkit, MyToolkit::new);
/// ```
#[macro_export]
macro_rules! export_nucleus {
    ($toolkit:ty, $ctor:path) => {
        ::std::thread_local! {
            static AUDIENCE_NUCLEUS: ::std::cell::OnceCell<$crate::nucleus::Nucleus<$toolkit>> =
                ::std::cell::OnceCell::new();
        }

        static AUDIENCE_DISPATCHER: ::std::sync::OnceLock<$crate::nucleus::Dispatcher> =
            ::std::sync::OnceLock::new();

        #[no_mangle]
        pub unsafe extern "C" fn audience_init(
            app: *const $crate::ffi::RawAppDetails,
            negotiation: *mut $crate::ffi::RawNegotiation,
        ) -> bool {
            $crate::nucleus::export::init(
                &AUDIENCE_NUCLEUS,
                &AUDIENCE_DISPATCHER,
                $ctor,
                app,
                negotiation,
            )
        }

        #[no_mangle]
        pub unsafe extern "C" fn audience_window_create(
            details: *const $crate::ffi::RawWindowDetails,
        ) -> *mut ::std::ffi::c_void {
            $crate::nucleus::export::window_create(&AUDIENCE_NUCLEUS, details)
        }

        #[no_mangle]
        pub unsafe extern "C" fn audience_window_destroy(window: *mut ::std::ffi::c_void) {
            $crate::nucleus::export::window_destroy(&AUDIENCE_NUCLEUS, window)
        }

        #[no_mangle]
        pub unsafe extern "C" fn audience_loop() {
            $crate::nucleus::export::run_loop(&AUDIENCE_NUCLEUS)
        }

        #[no_mangle]
        pub unsafe extern "C" fn audience_dispatch_sync(
            task: $crate::nucleus::RawTask,
            context: *mut ::std::ffi::c_void,
        ) -> bool {
            $crate::nucleus::export::dispatch_sync(&AUDIENCE_DISPATCHER, task, context)
        }

        #[no_mangle]
        pub unsafe extern "C" fn audience_dispatch_async(
            task: $crate::nucleus::RawTask,
            context: *mut ::std::ffi::c_void,
        ) -> bool {
            $crate::nucleus::export::dispatch_async(&AUDIENCE_DISPATCHER, task, context)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::nucleus::{Task, TaskQueue};

    struct DiscardQueue;

    impl TaskQueue for DiscardQueue {
        fn post(&self, task: Task) {
            drop(task);
        }
    }

    unsafe extern "C" fn mark(context: *mut c_void) {
        *(context as *mut bool) = true;
    }

    #[test]
    fn test_dispatch_before_init_reports_failure() {
        let dispatcher = OnceLock::new();
        let mut ran = false;
        let context = &mut ran as *mut bool as *mut c_void;

        assert!(!unsafe { dispatch_sync(&dispatcher, mark, context) });
        assert!(!unsafe { dispatch_async(&dispatcher, mark, context) });
        assert!(!ran);
    }

    #[test]
    fn test_discarded_sync_task_reports_failure() {
        let dispatcher = OnceLock::new();
        let _ = dispatcher.set(Dispatcher::with_ui_thread(
            Arc::new(DiscardQueue),
            std::thread::spawn(|| std::thread::current().id())
                .join()
                .unwrap(),
        ));
        let mut ran = false;

        assert!(!unsafe { dispatch_sync(&dispatcher, mark, &mut ran as *mut bool as *mut c_void) });
        assert!(!ran);
    }

    #[test]
    fn test_sync_task_on_ui_thread_runs() {
        let dispatcher = OnceLock::new();
        let _ = dispatcher.set(Dispatcher::new(Arc::new(DiscardQueue)));
        let mut ran = false;

        assert!(unsafe { dispatch_sync(&dispatcher, mark, &mut ran as *mut bool as *mut c_void) });
        assert!(ran);
    }
}
