//! Shell and nucleus talking over the C ABI inside one process

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use audience::backend::HeadlessToolkit;
use audience::ffi::InitFn;
use audience::shell::{EntryPoints, LibraryOpener, NucleusLibrary};
use audience::{
    AppDetails, Capabilities, Decision, LifecycleListener, LoadError, Loader, LoaderConfig,
    Shell, WindowDetails, WindowId,
};

fn headless() -> HeadlessToolkit {
    HeadlessToolkit::new().expect("headless toolkit")
}

audience::export_nucleus!(HeadlessToolkit, headless);

struct InProcess;

impl NucleusLibrary for InProcess {
    fn entry_points(&self) -> Result<EntryPoints, LoadError> {
        Ok(EntryPoints {
            init: audience_init as InitFn,
            window_create: audience_window_create,
            window_destroy: audience_window_destroy,
            run_loop: audience_loop,
            dispatch_sync: Some(audience_dispatch_sync),
            dispatch_async: Some(audience_dispatch_async),
        })
    }
}

/// Only `in-process` opens; every other candidate is missing
struct InProcessOpener;

impl LibraryOpener for InProcessOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn NucleusLibrary>, LoadError> {
        if path.file_name().is_some_and(|name| name == "in-process") {
            Ok(Box::new(InProcess))
        } else {
            Err(LoadError::Open {
                path: path.to_path_buf(),
                reason: "not found".to_string(),
            })
        }
    }
}

#[derive(Clone, Default)]
struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl LifecycleListener for Events {
    fn window_will_close(&self, window: WindowId) -> Decision {
        self.push(format!("will_close {}", window.0));
        Decision::Proceed
    }

    fn window_closed(&self, window: WindowId) -> Decision {
        self.push(format!("closed {}", window.0));
        Decision::Proceed
    }

    fn app_will_quit(&self) -> Decision {
        self.push("will_quit".to_string());
        Decision::Proceed
    }

    fn app_quit(&self) {
        self.push("quit".to_string());
    }
}

fn leak(loader: Loader) -> &'static Loader {
    Box::leak(Box::new(loader))
}

#[test]
fn test_window_round_trip_through_abi() {
    let config = LoaderConfig::new()
        .with_search_dir("/nonexistent")
        .with_candidates(["missing.so", "in-process"]);
    let shell = Shell::new(leak(Loader::new(config, InProcessOpener)));
    let events = Events::default();

    assert!(shell.init_with(&AppDetails::default(), events.clone()));
    assert!(shell.capabilities().contains(Capabilities::WEBAPP_URL));
    assert_eq!(
        shell.loader().bound().unwrap().path(),
        Path::new("/nonexistent/in-process")
    );

    let window = shell
        .window_create(&WindowDetails::new("Hello", "http://localhost"))
        .expect("window");

    // From a worker: a sync task first, then an async close back on the UI thread
    let ran = Arc::new(AtomicBool::new(false));
    let worker = {
        let ran = ran.clone();
        std::thread::spawn(move || {
            let sent = shell.dispatch_sync(move || ran.store(true, Ordering::SeqCst));
            let queued = shell.dispatch_async(move || shell.window_destroy(window));
            sent && queued
        })
    };

    AUDIENCE_NUCLEUS.with(|cell| cell.get().unwrap().run_until_quit().unwrap());

    assert!(worker.join().unwrap());
    assert!(ran.load(Ordering::SeqCst));
    assert_eq!(
        events.take(),
        vec![
            format!("will_close {}", window.0),
            format!("closed {}", window.0),
            "will_quit".to_string(),
            "quit".to_string(),
        ]
    );

    // A second init keeps the bound nucleus
    assert!(shell.init());
}

#[test]
fn test_uninitialized_shell_is_inert() {
    let config = LoaderConfig::new().with_candidates(["missing.so"]);
    let shell = Shell::new(leak(Loader::new(config, InProcessOpener)));

    assert!(!shell.init());
    assert!(!shell.is_initialized());
    assert!(shell.capabilities().is_empty());
    assert!(shell.window_create(&WindowDetails::new("T", "http://x")).is_none());
    shell.window_destroy(WindowId(1));
    assert!(!shell.dispatch_sync(|| ()));
    assert!(!shell.dispatch_async(|| ()));
    shell.run_loop();
}
