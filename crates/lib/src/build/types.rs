//! Types for descriptor evaluation and build execution.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::descriptor::{DescriptorError, LockHashVersion, Metadata};
use crate::platform::Platform;
use crate::platform::paths::base_cache_dir;
use crate::process::ManagerError;
use crate::util::hash::{DirHashError, ObjectHash};

/// Errors that can occur while evaluating a descriptor or running its build.
///
/// Every variant is fatal; nothing is retried.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Descriptor(#[from] DescriptorError),

  /// The host is not in `meta.platforms`.
  #[error("host platform {host} is not supported (supported: {supported})")]
  UnsupportedPlatform { host: String, supported: String },

  /// The base environment could not be downloaded or read.
  #[error("fetch failed for {url}: {message}")]
  FetchFailed { url: String, message: String },

  /// The base environment content does not match its pinned hash.
  #[error("hash mismatch for {url}: expected {expected}, got {actual}")]
  HashMismatch {
    url: String,
    expected: String,
    actual: String,
  },

  /// The dependency lock state does not match its pinned hash.
  #[error("lock hash mismatch for {path} (hash version {version}): expected {expected}, got {actual}")]
  LockHashMismatch {
    path: PathBuf,
    version: LockHashVersion,
    expected: String,
    actual: String,
  },

  #[error("failed to hash: {0}")]
  Hash(#[from] DirHashError),

  /// Declared native build inputs that are not on the search path.
  #[error("missing build tools: {}", .0.join(", "))]
  MissingTools(Vec<String>),

  #[error("build plan has an empty command")]
  EmptyCommand,

  #[error(transparent)]
  Process(#[from] ManagerError),

  #[error("build command failed with exit code {code:?}: {command}")]
  BuildFailed { command: String, code: Option<i32> },

  #[error("build task failed: {0}")]
  Join(#[from] tokio::task::JoinError),

  #[error("failed to serialize package metadata: {0}")]
  Metadata(#[source] serde_json::Error),

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

/// Where and for what host a descriptor is evaluated.
#[derive(Debug, Clone)]
pub struct BuildContext {
  /// Directory holding the descriptor; relative paths resolve against it.
  pub root: PathBuf,
  /// Download cache for base environment archives; `None` uses
  /// [`base_cache_dir`], resolved only when the cache is needed.
  pub cache_dir: Option<PathBuf>,
  pub platform: Platform,
  /// Search path for native build inputs; `None` uses `PATH`.
  pub search_path: Option<OsString>,
}

impl BuildContext {
  pub fn new(root: impl Into<PathBuf>, platform: Platform) -> Self {
    Self {
      root: root.into(),
      cache_dir: None,
      platform,
      search_path: None,
    }
  }

  pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
    self.cache_dir = Some(cache_dir.into());
    self
  }

  /// The download cache in effect.
  pub fn cache_dir(&self) -> PathBuf {
    self.cache_dir.clone().unwrap_or_else(base_cache_dir)
  }

  pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
    self.search_path = Some(search_path.into());
    self
  }
}

/// The fetched and verified base environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedBase {
  pub url: String,
  pub rev: String,
  pub sha256: String,
  pub path: PathBuf,
}

/// The verified dependency lock state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedLock {
  pub path: PathBuf,
  pub hash_version: LockHashVersion,
  pub sha256: String,
}

/// Everything a build needs, resolved and verified.
///
/// Only produced by [`crate::build::prepare`] once every pin and
/// precondition has been checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildPlan {
  pub name: String,
  pub version: String,
  pub platform: String,
  pub fingerprint: ObjectHash,
  pub base: FetchedBase,
  pub lock: VerifiedLock,
  /// Native build inputs and where they were found.
  pub tools: BTreeMap<String, PathBuf>,
  pub build_inputs: Vec<String>,
  pub env: BTreeMap<String, String>,
  pub command: Vec<String>,
  pub cwd: PathBuf,
  pub meta: Metadata,
}

/// Metadata written next to a build's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
  pub name: String,
  pub version: String,
  pub description: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub homepage: Option<String>,
  pub licenses: Vec<String>,
  pub maintainers: Vec<String>,
  pub platforms: Vec<String>,
  pub built_for: String,
  pub fingerprint: ObjectHash,
  pub base_rev: String,
  pub base_sha256: String,
  pub lock_sha256: String,
}

impl PackageMetadata {
  pub fn from_plan(plan: &BuildPlan) -> Self {
    Self {
      name: plan.name.clone(),
      version: plan.version.clone(),
      description: plan.meta.description.clone(),
      homepage: plan.meta.homepage.clone(),
      licenses: plan.meta.licenses.clone(),
      maintainers: plan.meta.maintainers.clone(),
      platforms: plan.meta.platforms.clone(),
      built_for: plan.platform.clone(),
      fingerprint: plan.fingerprint.clone(),
      base_rev: plan.base.rev.clone(),
      base_sha256: plan.base.sha256.clone(),
      lock_sha256: plan.lock.sha256.clone(),
    }
  }
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
  pub out_dir: PathBuf,
  pub metadata_path: PathBuf,
  pub metadata: PackageMetadata,
  pub duration: Duration,
}
