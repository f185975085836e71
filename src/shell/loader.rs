//! Dynamic loader
//!
//! Probes the configured candidate libraries in order and keeps the first one
//! that exports every required entry point and initializes successfully.
//! Missing libraries, missing symbols and refused inits only advance to the
//! next candidate; running out of candidates is the only reported failure.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

use log::{error, info, warn};

use crate::config::LoaderConfig;
use crate::details::{AppDetails, Capabilities};
use crate::error::LoadError;
use crate::ffi::{
    self, DispatchFn, InitFn, LoopFn, OwnedAppDetails, RawEventHandler, RawNegotiation,
    SharedListener, WindowCreateFn, WindowDestroyFn,
};

/// Entry points resolved from a nucleus library
#[derive(Debug, Clone, Copy)]
pub struct EntryPoints {
    pub init: InitFn,
    pub window_create: WindowCreateFn,
    pub window_destroy: WindowDestroyFn,
    pub run_loop: LoopFn,
    pub dispatch_sync: Option<DispatchFn>,
    pub dispatch_async: Option<DispatchFn>,
}

/// An opened library; dropping it unloads the library
pub trait NucleusLibrary: Send + Sync {
    /// Resolve the entry points; any required one missing is an error
    fn entry_points(&self) -> Result<EntryPoints, LoadError>;
}

/// Opens candidate libraries
pub trait LibraryOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn NucleusLibrary>, LoadError>;
}

/// Opens shared libraries from disk
#[derive(Debug, Default, Clone, Copy)]
pub struct DylibOpener;

struct Dylib {
    path: PathBuf,
    library: libloading::Library,
}

impl Dylib {
    fn symbol<T: Copy>(&self, name: &'static str) -> Result<T, LoadError> {
        // SAFETY: the entry point types are fixed by the nucleus ABI
        unsafe { self.library.get::<T>(name.as_bytes()) }
            .map(|symbol| *symbol)
            .map_err(|_| LoadError::MissingSymbol {
                path: self.path.clone(),
                symbol: name,
            })
    }
}

impl NucleusLibrary for Dylib {
    fn entry_points(&self) -> Result<EntryPoints, LoadError> {
        Ok(EntryPoints {
            init: self.symbol(ffi::INIT_SYMBOL)?,
            window_create: self.symbol(ffi::WINDOW_CREATE_SYMBOL)?,
            window_destroy: self.symbol(ffi::WINDOW_DESTROY_SYMBOL)?,
            run_loop: self.symbol(ffi::LOOP_SYMBOL)?,
            dispatch_sync: self.symbol(ffi::DISPATCH_SYNC_SYMBOL).ok(),
            dispatch_async: self.symbol(ffi::DISPATCH_ASYNC_SYMBOL).ok(),
        })
    }
}

impl LibraryOpener for DylibOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn NucleusLibrary>, LoadError> {
        // SAFETY: nucleus libraries have no load-time side effects beyond
        // static initialization
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| LoadError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(Box::new(Dylib {
            path: path.to_path_buf(),
            library,
        }))
    }
}

/// The nucleus picked by the loader, kept for the life of the loader
pub struct BoundNucleus {
    path: PathBuf,
    entry: EntryPoints,
    capabilities: Capabilities,
    _listener: Option<Box<SharedListener>>,
    _library: Box<dyn NucleusLibrary>,
}

impl BoundNucleus {
    /// Path the library was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_points(&self) -> &EntryPoints {
        &self.entry
    }

    /// Capabilities reported by the nucleus' init
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}

struct Probed {
    library: Box<dyn NucleusLibrary>,
    entry: EntryPoints,
    capabilities: Capabilities,
}

/// Write-once registry of the active nucleus
pub struct Loader {
    config: LoaderConfig,
    opener: Box<dyn LibraryOpener>,
    bound: OnceLock<BoundNucleus>,
    probing: Mutex<()>,
}

impl Loader {
    /// Create a loader probing `config` with `opener`
    pub fn new(config: LoaderConfig, opener: impl LibraryOpener + 'static) -> Self {
        Self {
            config,
            opener: Box::new(opener),
            bound: OnceLock::new(),
            probing: Mutex::new(()),
        }
    }

    /// Loader for real shared libraries, configured from the environment
    pub fn system() -> Self {
        Self::new(LoaderConfig::from_env(), DylibOpener)
    }

    /// The process-wide loader
    pub fn global() -> &'static Loader {
        static GLOBAL: OnceLock<Loader> = OnceLock::new();
        GLOBAL.get_or_init(Loader::system)
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Whether a nucleus is bound
    pub fn is_initialized(&self) -> bool {
        self.bound.get().is_some()
    }

    /// The bound nucleus, if any
    pub fn bound(&self) -> Option<&BoundNucleus> {
        self.bound.get()
    }

    /// Capabilities of the bound nucleus, empty if none
    pub fn capabilities(&self) -> Capabilities {
        self.bound
            .get()
            .map(BoundNucleus::capabilities)
            .unwrap_or_default()
    }

    /// Bind the first working candidate
    pub fn initialize(&self) -> bool {
        self.initialize_with(&AppDetails::default(), None)
    }

    /// Bind the first working candidate, handing it `app` and `listener`
    ///
    /// Returns true without probing again once a nucleus is bound. The
    /// listener is only kept if a candidate is bound.
    pub fn initialize_with(&self, app: &AppDetails, listener: Option<SharedListener>) -> bool {
        if self.is_initialized() {
            return true;
        }

        let _probing = self.probing.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_initialized() {
            return true;
        }

        let app = match OwnedAppDetails::new(app) {
            Ok(app) => app,
            Err(e) => {
                error!("{}", e);
                return false;
            }
        };

        let listener = listener.map(Box::new);
        let events = listener
            .as_deref()
            .map(ffi::event_handler_for)
            .unwrap_or_default();

        for path in self.config.candidate_paths() {
            info!("trying to load library from path {}", path.display());

            match self.probe(&path, &app, events) {
                Ok(probed) => {
                    info!("library {} loaded successfully", path.display());
                    let _ = self.bound.set(BoundNucleus {
                        path,
                        entry: probed.entry,
                        capabilities: probed.capabilities,
                        _listener: listener,
                        _library: probed.library,
                    });
                    return true;
                }
                Err(e) => info!("{}", e),
            }
        }

        warn!("no nucleus library could be loaded");
        false
    }

    fn probe(
        &self,
        path: &Path,
        app: &OwnedAppDetails,
        events: RawEventHandler,
    ) -> Result<Probed, LoadError> {
        let library = self.opener.open(path)?;
        let entry = library.entry_points()?;

        let raw = app.as_raw(events);
        let mut negotiation = RawNegotiation::default();
        // SAFETY: `raw` and `negotiation` outlive the call
        if !unsafe { (entry.init)(&raw, &mut negotiation) } {
            return Err(LoadError::InitRefused {
                path: path.to_path_buf(),
            });
        }

        Ok(Probed {
            library,
            entry,
            capabilities: Capabilities::from_bits_truncate(negotiation.capabilities),
        })
    }
}
