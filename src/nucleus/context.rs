//! Window contexts
//!
//! Maps native window and webview objects back to the context that owns
//! them. Entries are inserted when a window is created and removed exactly
//! once when the native destroy signal arrives.

use std::any::Any;
use std::collections::HashMap;
use std::ffi::c_void;
use std::hash::Hash;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for windows, doubles as the opaque handle given to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u64);

impl WindowId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        WindowId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Opaque handle for C callers, never null
    pub fn as_handle(self) -> *mut c_void {
        self.0 as usize as *mut c_void
    }

    /// Recover an id from a handle, `None` for null
    pub fn from_handle(handle: *mut c_void) -> Option<Self> {
        if handle.is_null() {
            None
        } else {
            Some(WindowId(handle as usize as u64))
        }
    }
}

/// One native window and its embedded webview
pub struct WindowContext<W, V> {
    /// Unique identifier
    pub id: WindowId,
    /// Native window, `None` once torn down
    pub window: Option<W>,
    /// Native webview, `None` once torn down
    pub webview: Option<V>,
    /// Caller supplied data
    pub user_data: Option<Rc<dyn Any>>,
}

impl<W, V> WindowContext<W, V> {
    /// Both native objects are still alive
    pub fn is_live(&self) -> bool {
        self.window.is_some() && self.webview.is_some()
    }
}

/// Side table from native objects to window contexts
pub struct ContextTable<W, V> {
    contexts: HashMap<WindowId, WindowContext<W, V>>,
    by_window: HashMap<W, WindowId>,
    by_webview: HashMap<V, WindowId>,
}

impl<W, V> ContextTable<W, V>
where
    W: Clone + Eq + Hash,
    V: Clone + Eq + Hash,
{
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            contexts: HashMap::new(),
            by_window: HashMap::new(),
            by_webview: HashMap::new(),
        }
    }

    /// Register a freshly constructed window/webview pair
    pub fn insert(&mut self, window: W, webview: V) -> WindowId {
        let id = WindowId::new();
        self.by_window.insert(window.clone(), id);
        self.by_webview.insert(webview.clone(), id);
        self.contexts.insert(
            id,
            WindowContext {
                id,
                window: Some(window),
                webview: Some(webview),
                user_data: None,
            },
        );
        id
    }

    /// Look up the context owning a native window
    pub fn lookup_window(&self, window: &W) -> Option<WindowId> {
        self.by_window.get(window).copied()
    }

    /// Look up the context owning a native webview
    pub fn lookup_webview(&self, webview: &V) -> Option<WindowId> {
        self.by_webview.get(webview).copied()
    }

    /// Get a context by ID
    pub fn get(&self, id: WindowId) -> Option<&WindowContext<W, V>> {
        self.contexts.get(&id)
    }

    /// Get a mutable context by ID
    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut WindowContext<W, V>> {
        self.contexts.get_mut(&id)
    }

    /// Remove a context and both of its back-references
    pub fn remove(&mut self, id: WindowId) -> Option<WindowContext<W, V>> {
        let mut context = self.contexts.remove(&id)?;
        if let Some(window) = context.window.take() {
            self.by_window.remove(&window);
        }
        if let Some(webview) = context.webview.take() {
            self.by_webview.remove(&webview);
        }
        Some(context)
    }

    /// Get count of contexts
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

impl<W, V> Default for ContextTable<W, V>
where
    W: Clone + Eq + Hash,
    V: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_id_unique() {
        let id1 = WindowId::new();
        let id2 = WindowId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_handle_conversion() {
        let id = WindowId::new();
        assert!(!id.as_handle().is_null());
        assert_eq!(WindowId::from_handle(id.as_handle()), Some(id));
        assert_eq!(WindowId::from_handle(std::ptr::null_mut()), None);
    }

    #[test]
    fn test_lookup_both_native_objects() {
        let mut table: ContextTable<u32, &str> = ContextTable::new();
        let id = table.insert(7, "webview-7");
        assert_eq!(table.lookup_window(&7), Some(id));
        assert_eq!(table.lookup_webview(&"webview-7"), Some(id));
        assert!(table.get(id).unwrap().is_live());
    }

    #[test]
    fn test_remove_clears_back_references_once() {
        let mut table: ContextTable<u32, &str> = ContextTable::new();
        let id = table.insert(1, "a");
        let other = table.insert(2, "b");

        let removed = table.remove(id).unwrap();
        assert!(!removed.is_live());
        assert!(table.lookup_window(&1).is_none());
        assert!(table.lookup_webview(&"a").is_none());
        assert!(table.remove(id).is_none());

        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup_window(&2), Some(other));
    }
}
