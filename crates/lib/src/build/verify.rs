//! Preconditions checked before a build may start.
//!
//! Each check fails closed: a mismatch is an error, never a warning.

use std::collections::BTreeMap;
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::build::types::{BuildError, VerifiedLock};
use crate::descriptor::{LockHashVersion, LockPin, PackageSpec};
use crate::platform::Platform;
use crate::util::hash::{hash_directory, hash_file};

/// Fail unless `platform` is one of the descriptor's supported platforms.
pub fn check_platform(spec: &PackageSpec, platform: &Platform) -> Result<(), BuildError> {
  if spec.supports(platform) {
    debug!(platform = %platform, "host platform supported");
    return Ok(());
  }

  Err(BuildError::UnsupportedPlatform {
    host: platform.triple(),
    supported: spec.meta.platforms.join(", "),
  })
}

/// Hash the lock state under `source_dir` and compare it with the pin.
pub fn verify_lock(pin: &LockPin, source_dir: &Path) -> Result<VerifiedLock, BuildError> {
  let path = source_dir.join(&pin.path);

  let actual = match pin.hash_version {
    LockHashVersion::File => hash_file(&path)?,
    LockHashVersion::Vendored => hash_directory(&path, &[])?,
  };

  if !actual.matches(&pin.sha256) {
    return Err(BuildError::LockHashMismatch {
      path,
      version: pin.hash_version,
      expected: pin.sha256.clone(),
      actual: actual.0,
    });
  }

  info!(path = %path.display(), version = %pin.hash_version, "lock hash verified");
  Ok(VerifiedLock {
    path,
    hash_version: pin.hash_version,
    sha256: actual.0,
  })
}

/// Resolve every tool on the search path.
///
/// `search_path` uses the `PATH` syntax of the host; `None` reads `PATH`.
/// All missing tools are reported together.
pub fn find_tools(tools: &[String], search_path: Option<&OsStr>) -> Result<BTreeMap<String, PathBuf>, BuildError> {
  let search: OsString = match search_path {
    Some(path) => path.to_os_string(),
    None => env::var_os("PATH").unwrap_or_default(),
  };
  let dirs: Vec<PathBuf> = env::split_paths(&search).collect();

  let mut found = BTreeMap::new();
  let mut missing = Vec::new();

  for tool in tools {
    match find_executable(tool, &dirs) {
      Some(path) => {
        debug!(tool = %tool, path = %path.display(), "found build tool");
        found.insert(tool.clone(), path);
      }
      None => missing.push(tool.clone()),
    }
  }

  if !missing.is_empty() {
    return Err(BuildError::MissingTools(missing));
  }
  Ok(found)
}

fn find_executable(name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
  let direct = Path::new(name);
  if direct.components().count() > 1 {
    return is_executable(direct).then(|| direct.to_path_buf());
  }

  dirs
    .iter()
    .flat_map(|dir| candidates(dir, name))
    .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
  vec![dir.join(name)]
}

#[cfg(windows)]
fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
  ["", ".exe", ".cmd", ".bat"]
    .iter()
    .map(|ext| dir.join(format!("{}{}", name, ext)))
    .collect()
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
  use std::os::unix::fs::PermissionsExt;

  path
    .metadata()
    .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
    .unwrap_or(false)
}

#[cfg(windows)]
fn is_executable(path: &Path) -> bool {
  path.is_file()
}
