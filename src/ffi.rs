//! C ABI shared by the shell and nucleus libraries
//!
//! A nucleus library exports `audience_init`, `audience_window_create`,
//! `audience_window_destroy` and `audience_loop`, and optionally
//! `audience_dispatch_sync` / `audience_dispatch_async`.

use std::ffi::{c_char, c_void, CStr, CString};
use std::path::PathBuf;
use std::ptr;

use crate::details::{AppDetails, WindowDetails};
use crate::error::NucleusError;
use crate::nucleus::{Decision, LifecycleListener, RawTask, WindowId};

pub const INIT_SYMBOL: &str = "audience_init";
pub const WINDOW_CREATE_SYMBOL: &str = "audience_window_create";
pub const WINDOW_DESTROY_SYMBOL: &str = "audience_window_destroy";
pub const LOOP_SYMBOL: &str = "audience_loop";
pub const DISPATCH_SYNC_SYMBOL: &str = "audience_dispatch_sync";
pub const DISPATCH_ASYNC_SYMBOL: &str = "audience_dispatch_async";

pub type InitFn = unsafe extern "C" fn(*const RawAppDetails, *mut RawNegotiation) -> bool;
pub type WindowCreateFn = unsafe extern "C" fn(*const RawWindowDetails) -> *mut c_void;
pub type WindowDestroyFn = unsafe extern "C" fn(*mut c_void);
pub type LoopFn = unsafe extern "C" fn();
/// True if the task ran (sync) or was queued (async); on false the task
/// was never called and `context` still belongs to the caller
pub type DispatchFn = unsafe extern "C" fn(RawTask, *mut c_void) -> bool;

/// Window details as passed to `audience_window_create`
#[repr(C)]
#[derive(Debug)]
pub struct RawWindowDetails {
    /// UTF-8, NUL terminated
    pub title: *const c_char,
    /// UTF-8, NUL terminated
    pub url: *const c_char,
    pub icon_set: *const *const c_char,
    pub icon_count: usize,
    pub dev_mode: bool,
}

/// Lifecycle callbacks; returning true from a `will`/`closed` hook vetoes
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawEventHandler {
    pub user_data: *mut c_void,
    pub window_will_close: Option<unsafe extern "C" fn(*mut c_void, *mut c_void) -> bool>,
    pub window_closed: Option<unsafe extern "C" fn(*mut c_void, *mut c_void) -> bool>,
    pub app_will_quit: Option<unsafe extern "C" fn(*mut c_void) -> bool>,
    pub app_quit: Option<unsafe extern "C" fn(*mut c_void)>,
}

impl Default for RawEventHandler {
    fn default() -> Self {
        Self {
            user_data: ptr::null_mut(),
            window_will_close: None,
            window_closed: None,
            app_will_quit: None,
            app_quit: None,
        }
    }
}

/// App details as passed to `audience_init`
#[repr(C)]
#[derive(Debug)]
pub struct RawAppDetails {
    pub icon_set: *const *const c_char,
    pub icon_count: usize,
    pub events: RawEventHandler,
}

/// Filled in by the nucleus during `audience_init`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawNegotiation {
    /// `Capabilities` bits
    pub capabilities: u32,
}

unsafe fn read_str(ptr: *const c_char, field: &'static str) -> Result<String, NucleusError> {
    if ptr.is_null() {
        return Err(NucleusError::InvalidInput(field));
    }
    Ok(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

unsafe fn read_paths(list: *const *const c_char, count: usize) -> Result<Vec<PathBuf>, NucleusError> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if list.is_null() {
        return Err(NucleusError::InvalidInput("icon_set"));
    }
    std::slice::from_raw_parts(list, count)
        .iter()
        .map(|&path| unsafe { read_str(path, "icon_set") }.map(PathBuf::from))
        .collect()
}

impl RawWindowDetails {
    /// Copy into owned details
    ///
    /// # Safety
    ///
    /// All pointers must be null or valid for the advertised lengths.
    pub unsafe fn to_details(&self) -> Result<WindowDetails, NucleusError> {
        Ok(WindowDetails {
            title: read_str(self.title, "title")?,
            url: read_str(self.url, "url")?,
            icon_set: read_paths(self.icon_set, self.icon_count)?,
            dev_mode: self.dev_mode,
        })
    }
}

impl RawAppDetails {
    /// Copy into owned details
    ///
    /// # Safety
    ///
    /// `icon_set` must be null or point to `icon_count` valid C strings.
    pub unsafe fn to_details(&self) -> Result<AppDetails, NucleusError> {
        Ok(AppDetails {
            icon_set: read_paths(self.icon_set, self.icon_count)?,
        })
    }
}

fn c_string(value: &str, field: &'static str) -> Result<CString, NucleusError> {
    CString::new(value).map_err(|_| NucleusError::InvalidInput(field))
}

fn c_paths(paths: &[PathBuf]) -> Result<Vec<CString>, NucleusError> {
    paths
        .iter()
        .map(|path| c_string(&path.to_string_lossy(), "icon_set"))
        .collect()
}

/// Owns the C strings behind a `RawWindowDetails`
pub struct OwnedWindowDetails {
    title: CString,
    url: CString,
    _icons: Vec<CString>,
    icon_ptrs: Vec<*const c_char>,
    dev_mode: bool,
}

impl OwnedWindowDetails {
    pub fn new(details: &WindowDetails) -> Result<Self, NucleusError> {
        let icons = c_paths(&details.icon_set)?;
        let icon_ptrs = icons.iter().map(|icon| icon.as_ptr()).collect();
        Ok(Self {
            title: c_string(&details.title, "title")?,
            url: c_string(&details.url, "url")?,
            _icons: icons,
            icon_ptrs,
            dev_mode: details.dev_mode,
        })
    }

    /// Borrowed view, valid while `self` lives
    pub fn as_raw(&self) -> RawWindowDetails {
        RawWindowDetails {
            title: self.title.as_ptr(),
            url: self.url.as_ptr(),
            icon_set: self.icon_ptrs.as_ptr(),
            icon_count: self.icon_ptrs.len(),
            dev_mode: self.dev_mode,
        }
    }
}

/// Owns the C strings behind a `RawAppDetails`
pub struct OwnedAppDetails {
    _icons: Vec<CString>,
    icon_ptrs: Vec<*const c_char>,
}

impl OwnedAppDetails {
    pub fn new(details: &AppDetails) -> Result<Self, NucleusError> {
        let icons = c_paths(&details.icon_set)?;
        let icon_ptrs = icons.iter().map(|icon| icon.as_ptr()).collect();
        Ok(Self {
            _icons: icons,
            icon_ptrs,
        })
    }

    /// Borrowed view, valid while `self` lives
    pub fn as_raw(&self, events: RawEventHandler) -> RawAppDetails {
        RawAppDetails {
            icon_set: self.icon_ptrs.as_ptr(),
            icon_count: self.icon_ptrs.len(),
            events,
        }
    }
}

/// Lifecycle listener living on the shell side of the ABI
pub type SharedListener = Box<dyn LifecycleListener + Send + Sync>;

unsafe fn listener<'a>(user_data: *mut c_void) -> &'a SharedListener {
    &*(user_data as *const SharedListener)
}

unsafe extern "C" fn window_will_close_hook(user_data: *mut c_void, window: *mut c_void) -> bool {
    match WindowId::from_handle(window) {
        Some(id) => listener(user_data).window_will_close(id).is_veto(),
        None => false,
    }
}

unsafe extern "C" fn window_closed_hook(user_data: *mut c_void, window: *mut c_void) -> bool {
    match WindowId::from_handle(window) {
        Some(id) => listener(user_data).window_closed(id).is_veto(),
        None => false,
    }
}

unsafe extern "C" fn app_will_quit_hook(user_data: *mut c_void) -> bool {
    listener(user_data).app_will_quit().is_veto()
}

unsafe extern "C" fn app_quit_hook(user_data: *mut c_void) {
    listener(user_data).app_quit()
}

/// C callbacks forwarding to `listener`
///
/// The handler points at `listener`, which must stay at its address for as
/// long as the nucleus may call back.
pub fn event_handler_for(listener: &SharedListener) -> RawEventHandler {
    RawEventHandler {
        user_data: listener as *const SharedListener as *mut c_void,
        window_will_close: Some(window_will_close_hook),
        window_closed: Some(window_closed_hook),
        app_will_quit: Some(app_will_quit_hook),
        app_quit: Some(app_quit_hook),
    }
}

/// Nucleus-side listener calling back into a `RawEventHandler`
pub struct ForeignListener {
    handler: RawEventHandler,
}

impl ForeignListener {
    /// # Safety
    ///
    /// The callbacks and `user_data` must stay valid for the listener's life.
    pub unsafe fn new(handler: RawEventHandler) -> Self {
        Self { handler }
    }
}

impl LifecycleListener for ForeignListener {
    fn window_will_close(&self, window: WindowId) -> Decision {
        match self.handler.window_will_close {
            Some(hook) if unsafe { hook(self.handler.user_data, window.as_handle()) } => {
                Decision::Veto
            }
            _ => Decision::Proceed,
        }
    }

    fn window_closed(&self, window: WindowId) -> Decision {
        match self.handler.window_closed {
            Some(hook) if unsafe { hook(self.handler.user_data, window.as_handle()) } => {
                Decision::Veto
            }
            _ => Decision::Proceed,
        }
    }

    fn app_will_quit(&self) -> Decision {
        match self.handler.app_will_quit {
            Some(hook) if unsafe { hook(self.handler.user_data) } => Decision::Veto,
            _ => Decision::Proceed,
        }
    }

    fn app_quit(&self) {
        if let Some(hook) = self.handler.app_quit {
            unsafe { hook(self.handler.user_data) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_window_details_cross_the_abi() {
        let details = WindowDetails::new("Title", "http://x")
            .icon("16.png")
            .icon("32.png")
            .dev_mode(true);
        let owned = OwnedWindowDetails::new(&details).unwrap();
        let raw = owned.as_raw();
        assert_eq!(unsafe { raw.to_details() }.unwrap(), details);
    }

    #[test]
    fn test_null_title_rejected() {
        let raw = RawWindowDetails {
            title: ptr::null(),
            url: ptr::null(),
            icon_set: ptr::null(),
            icon_count: 0,
            dev_mode: false,
        };
        assert!(matches!(
            unsafe { raw.to_details() },
            Err(NucleusError::InvalidInput("title"))
        ));
    }

    #[test]
    fn test_interior_nul_rejected() {
        let details = WindowDetails::new("bad\0title", "http://x");
        assert!(OwnedWindowDetails::new(&details).is_err());
    }

    struct VetoQuit {
        closed: Arc<AtomicUsize>,
    }

    impl LifecycleListener for VetoQuit {
        fn window_closed(&self, _window: WindowId) -> Decision {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Decision::Proceed
        }

        fn app_will_quit(&self) -> Decision {
            Decision::Veto
        }
    }

    #[test]
    fn test_foreign_listener_round_trips_shell_listener() {
        let closed = Arc::new(AtomicUsize::new(0));
        let shell_side: SharedListener = Box::new(VetoQuit {
            closed: closed.clone(),
        });
        let nucleus_side = unsafe { ForeignListener::new(event_handler_for(&shell_side)) };

        assert!(nucleus_side.window_will_close(WindowId(9)).is_proceed());
        assert!(nucleus_side.window_closed(WindowId(9)).is_proceed());
        assert!(nucleus_side.app_will_quit().is_veto());
        nucleus_side.app_quit();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_handler_always_proceeds() {
        let listener = unsafe { ForeignListener::new(RawEventHandler::default()) };
        assert!(listener.window_will_close(WindowId(1)).is_proceed());
        assert!(listener.app_will_quit().is_proceed());
    }
}
