//! Open one window through whichever nucleus the loader finds
//!
//! Usage: open_window [TITLE] [URL]
//!
//! Build a nucleus first (on Unix: `--example audience_unix_webkit --features
//! webkit`) and point `AUDIENCE_NUCLEUS_DIR` at the directory holding it.

use anyhow::{bail, Result};
use audience::{LifecycleListener, Shell, WindowDetails, WindowId};
use log::info;

struct Announcer;

impl LifecycleListener for Announcer {
    fn window_closed(&self, window: WindowId) -> audience::Decision {
        info!("window {:?} closed", window);
        audience::Decision::Proceed
    }

    fn app_quit(&self) {
        info!("bye");
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let title = args.next().unwrap_or_else(|| "Audience".to_string());
    let url = args
        .next()
        .unwrap_or_else(|| "https://example.com".to_string());

    let shell = Shell::global();
    if !shell.init_with(&audience::AppDetails::default(), Announcer) {
        bail!("no nucleus library could be loaded");
    }
    info!("negotiated {:?}", shell.capabilities());

    let Some(window) = shell.window_create(&WindowDetails::new(title, url)) else {
        bail!("window creation failed");
    };
    info!("opened {:?}", window);

    shell.run_loop();
    Ok(())
}
