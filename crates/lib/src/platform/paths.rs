use crate::consts::{APP_NAME, CACHE_DIR_ENV};
use std::path::PathBuf;

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  let userprofile = std::env::var("USERPROFILE").expect("USERPROFILE not set");
  PathBuf::from(userprofile)
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  let home = std::env::var("HOME").expect("HOME not set");
  PathBuf::from(home)
}

/// Returns the directory for cache files for the application
///
/// `PROCMAN_CACHE_DIR` wins over the platform default when set.
#[cfg(windows)]
pub fn cache_dir() -> PathBuf {
  if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
    return PathBuf::from(dir);
  }
  let local_appdata = std::env::var("LOCALAPPDATA").expect("LOCALAPPDATA not set");
  PathBuf::from(local_appdata).join(APP_NAME).join("Cache")
}

/// Returns the directory for cache files for the application
///
/// `PROCMAN_CACHE_DIR` wins over the XDG location when set.
#[cfg(not(windows))]
pub fn cache_dir() -> PathBuf {
  if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
    return PathBuf::from(dir);
  }
  let cache_home = std::env::var("XDG_CACHE_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".cache"));
  cache_home.join(APP_NAME)
}

/// Returns the directory holding downloaded base-environment archives
pub fn base_cache_dir() -> PathBuf {
  cache_dir().join("base")
}
