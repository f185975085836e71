//! Dispatch bridge
//!
//! Marshals work from arbitrary threads onto the thread running the native
//! event loop. Each toolkit supplies a `TaskQueue`; tasks posted from one
//! thread run in the order they were posted.

use std::ffi::c_void;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, ThreadId};

use log::{debug, warn};

/// Unit of work for the event loop thread
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Task as seen through the C ABI
pub type RawTask = unsafe extern "C" fn(context: *mut c_void);

/// High priority queue drained by the native event loop
pub trait TaskQueue: Send + Sync {
    /// Queue `task`; it runs at most once and is dropped exactly once
    fn post(&self, task: Task);
}

enum Slot<R> {
    Pending,
    Done(R),
    Dropped,
}

struct Handshake<R> {
    slot: Mutex<Slot<R>>,
    ready: Condvar,
}

impl<R> Handshake<R> {
    fn finish(&self, slot: Slot<R>) {
        let mut guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*guard, Slot::Pending) {
            *guard = slot;
        }
        drop(guard);
        self.ready.notify_one();
    }

    fn wait(&self) -> Option<R> {
        let guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let mut guard = self
            .ready
            .wait_while(guard, |slot| matches!(slot, Slot::Pending))
            .unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *guard, Slot::Dropped) {
            Slot::Done(result) => Some(result),
            _ => None,
        }
    }
}

// Signals the waiting caller even if the loop discards the task unrun.
struct SyncTask<F, R> {
    task: Option<F>,
    handshake: Arc<Handshake<R>>,
}

impl<F: FnOnce() -> R, R> SyncTask<F, R> {
    fn run(mut self) {
        if let Some(task) = self.task.take() {
            let result = task();
            self.handshake.finish(Slot::Done(result));
        }
    }
}

impl<F, R> Drop for SyncTask<F, R> {
    fn drop(&mut self) {
        self.handshake.finish(Slot::Dropped);
    }
}

struct RawContext(*mut c_void);

// The context is owned by whoever dispatched it; we only carry it over.
unsafe impl Send for RawContext {}

impl RawContext {
    unsafe fn run(self, task: RawTask) {
        task(self.0)
    }
}

/// Handle for submitting work to the event loop thread
#[derive(Clone)]
pub struct Dispatcher {
    queue: Arc<dyn TaskQueue>,
    ui_thread: ThreadId,
}

impl Dispatcher {
    /// Dispatcher whose event loop runs on the calling thread
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        Self::with_ui_thread(queue, thread::current().id())
    }

    /// Dispatcher whose event loop runs on `ui_thread`
    pub fn with_ui_thread(queue: Arc<dyn TaskQueue>, ui_thread: ThreadId) -> Self {
        Self { queue, ui_thread }
    }

    /// Whether the calling thread is the event loop thread
    pub fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.ui_thread
    }

    /// Run `task` on the event loop thread and wait for its result
    ///
    /// Returns `None` only if the loop discarded the task without running
    /// it. Called from the event loop thread itself, the task runs inline.
    /// There is no timeout.
    pub fn dispatch_sync<F, R>(&self, task: F) -> Option<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_ui_thread() {
            return Some(task());
        }

        let handshake = Arc::new(Handshake {
            slot: Mutex::new(Slot::Pending),
            ready: Condvar::new(),
        });
        let wrapper = SyncTask {
            task: Some(task),
            handshake: handshake.clone(),
        };

        debug!("dispatching task on main queue (sync)");
        self.queue.post(Box::new(move || wrapper.run()));

        let result = handshake.wait();
        if result.is_none() {
            warn!("sync task was discarded before it could run");
        }
        result
    }

    /// Queue `task` on the event loop thread and return immediately
    pub fn dispatch_async<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        debug!("dispatching task on main queue (async)");
        self.queue.post(Box::new(task));
    }

    /// C flavour of [`Dispatcher::dispatch_sync`]; true if the task ran
    ///
    /// # Safety
    ///
    /// `task` must be safe to call with `context` on the event loop thread.
    pub unsafe fn dispatch_sync_raw(&self, task: RawTask, context: *mut c_void) -> bool {
        let context = RawContext(context);
        self.dispatch_sync(move || unsafe { context.run(task) })
            .is_some()
    }

    /// C flavour of [`Dispatcher::dispatch_async`]
    ///
    /// # Safety
    ///
    /// `task` must be safe to call with `context` on the event loop thread,
    /// and `context` must stay valid until then.
    pub unsafe fn dispatch_async_raw(&self, task: RawTask, context: *mut c_void) {
        let context = RawContext(context);
        self.dispatch_async(move || unsafe { context.run(task) });
    }
}
