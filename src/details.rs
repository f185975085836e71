//! Value objects handed to a nucleus at init and window creation

use std::path::PathBuf;

bitflags::bitflags! {
    /// Capabilities a nucleus declares while negotiating with the shell
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Capabilities: u32 {
        /// The nucleus loads a URL itself instead of needing pre-fetched content
        const WEBAPP_URL = 1;
        /// `post_message` actually delivers text into the page
        const POST_MESSAGE = 2;
    }
}

/// Application-wide details passed to a nucleus at init
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppDetails {
    /// Default icon set for every window, any order
    pub icon_set: Vec<PathBuf>,
}

impl AppDetails {
    /// Create empty app details
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an icon to the default icon set
    pub fn icon(mut self, path: impl Into<PathBuf>) -> Self {
        self.icon_set.push(path.into());
        self
    }
}

/// Description of a window to create
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowDetails {
    /// Title shown until the page provides its own
    pub title: String,
    /// Initial location of the web app
    pub url: String,
    /// Window specific icons, any order
    pub icon_set: Vec<PathBuf>,
    /// Enables console logging to stdout and inspector tooling
    pub dev_mode: bool,
}

impl WindowDetails {
    /// Create details for a window showing `url`
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Add a window icon
    pub fn icon(mut self, path: impl Into<PathBuf>) -> Self {
        self.icon_set.push(path.into());
        self
    }

    /// Set developer mode
    pub fn dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }
}
