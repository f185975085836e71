//! Loader configuration
//!
//! Controls where backend libraries are looked up and in which order.

use std::path::{Path, PathBuf};

use log::{info, warn};

/// Environment variable overriding the directory searched for backends
pub const NUCLEUS_DIR_ENV: &str = "AUDIENCE_NUCLEUS_DIR";
/// Environment variable overriding the candidate list (comma separated)
pub const NUCLEUS_LIST_ENV: &str = "AUDIENCE_NUCLEUS";

/// Backend library file names for this platform, most capable engine first
pub fn default_candidates() -> Vec<String> {
    #[cfg(target_os = "windows")]
    let names: &[&str] = &["audience_windows_edge.dll", "audience_windows_ie11.dll"];
    #[cfg(target_os = "macos")]
    let names: &[&str] = &["libaudience_macos_webkit.dylib"];
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let names: &[&str] = &["libaudience_unix_webkit.so"];

    names.iter().map(|name| name.to_string()).collect()
}

/// Directory containing the running executable
///
/// Returns an empty path when the executable cannot be located, so that
/// candidates are then resolved relative to the working directory.
pub fn executable_dir() -> PathBuf {
    match std::env::current_exe() {
        Ok(exe) => {
            let dir = exe.parent().map(Path::to_path_buf).unwrap_or_default();
            info!("executable directory found: {}", dir.display());
            dir
        }
        Err(e) => {
            warn!("could not retrieve path of executable: {}", e);
            PathBuf::new()
        }
    }
}

/// Where and what the loader probes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Directory to search, `None` means the executable's directory
    pub search_dir: Option<PathBuf>,
    /// Candidate file names in probing order
    pub candidates: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            search_dir: None,
            candidates: default_candidates(),
        }
    }
}

impl LoaderConfig {
    /// Create the platform default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform defaults with environment overrides applied
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var(NUCLEUS_DIR_ENV).ok(),
            std::env::var(NUCLEUS_LIST_ENV).ok(),
        )
    }

    fn from_vars(dir: Option<String>, list: Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = dir.filter(|d| !d.trim().is_empty()) {
            config.search_dir = Some(PathBuf::from(dir));
        }

        if let Some(list) = list {
            let candidates: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from)
                .collect();
            if !candidates.is_empty() {
                config.candidates = candidates;
            }
        }

        config
    }

    /// Search `dir` instead of the executable's directory
    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dir = Some(dir.into());
        self
    }

    /// Replace the candidate list
    pub fn with_candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates = candidates.into_iter().map(Into::into).collect();
        self
    }

    /// Absolute paths of all candidates, in probing order
    pub fn candidate_paths(&self) -> Vec<PathBuf> {
        let dir = self.search_dir.clone().unwrap_or_else(executable_dir);
        self.candidates.iter().map(|name| dir.join(name)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_candidates_not_empty() {
        assert!(!default_candidates().is_empty());
    }

    #[test]
    fn test_from_vars_overrides() {
        let config = LoaderConfig::from_vars(
            Some("/opt/app".to_string()),
            Some(" a.so, ,b.so ".to_string()),
        );
        assert_eq!(config.search_dir, Some(PathBuf::from("/opt/app")));
        assert_eq!(config.candidates, vec!["a.so", "b.so"]);
    }

    #[test]
    fn test_from_vars_blank_keeps_defaults() {
        let config = LoaderConfig::from_vars(Some("  ".to_string()), Some(",".to_string()));
        assert_eq!(config, LoaderConfig::default());
    }

    #[test]
    fn test_candidate_paths_join_search_dir() {
        let config = LoaderConfig::new()
            .with_search_dir("base")
            .with_candidates(["one", "two"]);
        assert_eq!(
            config.candidate_paths(),
            vec![Path::new("base").join("one"), Path::new("base").join("two")]
        );
    }
}
