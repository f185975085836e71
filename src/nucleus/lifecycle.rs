//! Lifecycle event channel
//!
//! Listeners are told about window and application transitions and may veto
//! the ones that are still pending. Every listener sees every event, in
//! registration order; one veto is enough to stop the transition.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::nucleus::WindowId;

/// Outcome of a vetoable lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decision {
    /// Let the transition happen
    #[default]
    Proceed,
    /// Stop the transition
    Veto,
}

impl Decision {
    /// Combine two decisions, a veto on either side wins
    pub fn and(self, other: Decision) -> Decision {
        if self == Decision::Veto || other == Decision::Veto {
            Decision::Veto
        } else {
            Decision::Proceed
        }
    }

    pub fn is_veto(self) -> bool {
        self == Decision::Veto
    }

    pub fn is_proceed(self) -> bool {
        self == Decision::Proceed
    }
}

/// Receiver of lifecycle events
///
/// All methods default to proceeding, implement only what you care about.
pub trait LifecycleListener {
    /// The user asked to close `window`; veto keeps it open
    fn window_will_close(&self, _window: WindowId) -> Decision {
        Decision::Proceed
    }

    /// `window` is gone; veto keeps the application running
    fn window_closed(&self, _window: WindowId) -> Decision {
        Decision::Proceed
    }

    /// The application is about to stop its event loop
    fn app_will_quit(&self) -> Decision {
        Decision::Proceed
    }

    /// The event loop has returned, the process exits next
    fn app_quit(&self) {}
}

/// Ordered set of lifecycle listeners
#[derive(Default)]
pub struct LifecycleChannel {
    listeners: RefCell<Vec<Rc<dyn LifecycleListener>>>,
}

impl LifecycleChannel {
    /// Create a channel without listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener
    pub fn subscribe(&self, listener: Rc<dyn LifecycleListener>) {
        self.listeners.borrow_mut().push(listener);
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    // Listeners may subscribe others while an event is being delivered.
    fn snapshot(&self) -> Vec<Rc<dyn LifecycleListener>> {
        self.listeners.borrow().clone()
    }

    fn fold(&self, emit: impl Fn(&dyn LifecycleListener) -> Decision) -> Decision {
        self.snapshot()
            .iter()
            .fold(Decision::Proceed, |decision, listener| {
                decision.and(emit(listener.as_ref()))
            })
    }

    pub fn emit_window_will_close(&self, window: WindowId) -> Decision {
        let decision = self.fold(|listener| listener.window_will_close(window));
        debug!("window {:?} will close: {:?}", window, decision);
        decision
    }

    pub fn emit_window_closed(&self, window: WindowId) -> Decision {
        let decision = self.fold(|listener| listener.window_closed(window));
        debug!("window {:?} closed: {:?}", window, decision);
        decision
    }

    pub fn emit_app_will_quit(&self) -> Decision {
        let decision = self.fold(|listener| listener.app_will_quit());
        debug!("app will quit: {:?}", decision);
        decision
    }

    pub fn emit_app_quit(&self) {
        for listener in self.snapshot() {
            listener.app_quit();
        }
    }
}
