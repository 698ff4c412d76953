//! Package descriptors.
//!
//! A descriptor pins everything a build depends on: the base environment
//! archive (revision + content hash), the dependency lock state, the tools and
//! libraries the build needs, environment overrides and package metadata.
//! Descriptors are read-only input; evaluating one lives in [`crate::build`].

mod types;

pub use types::*;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::consts::RESERVED_ENV;
use crate::platform::Platform;
use crate::util::hash::{ContentHash, Hashable, ObjectHash};

/// Errors that can occur while loading or validating a descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
  #[error("failed to read descriptor '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse descriptor: {0}")]
  Parse(#[from] toml::de::Error),

  #[error("invalid descriptor field '{field}': {message}")]
  Invalid { field: String, message: String },

  #[error("failed to fingerprint descriptor: {0}")]
  Fingerprint(#[source] serde_json::Error),
}

impl DescriptorError {
  fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
    DescriptorError::Invalid {
      field: field.into(),
      message: message.into(),
    }
  }
}

impl PackageSpec {
  /// Load and validate a descriptor file.
  pub fn load(path: &Path) -> Result<Self, DescriptorError> {
    let content = fs::read_to_string(path).map_err(|source| DescriptorError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    debug!(path = %path.display(), "loaded descriptor");
    Self::from_toml_str(&content)
  }

  /// Parse and validate a descriptor from TOML text.
  pub fn from_toml_str(content: &str) -> Result<Self, DescriptorError> {
    let spec: PackageSpec = toml::from_str(content)?;
    spec.validate()?;
    Ok(spec)
  }

  /// Check the invariants serde cannot express.
  pub fn validate(&self) -> Result<(), DescriptorError> {
    if self.name.trim().is_empty() {
      return Err(DescriptorError::invalid("name", "must not be empty"));
    }
    if self.version.trim().is_empty() {
      return Err(DescriptorError::invalid("version", "must not be empty"));
    }

    if self.base.rev.trim().is_empty() {
      return Err(DescriptorError::invalid("base.rev", "must not be empty"));
    }
    if !self.base.url.contains(SourcePin::REV_PLACEHOLDER) {
      return Err(DescriptorError::invalid(
        "base.url",
        format!("must contain '{}' so the hash stays bound to the revision", SourcePin::REV_PLACEHOLDER),
      ));
    }
    check_sha256("base.sha256", &self.base.sha256)?;
    check_sha256("lock.sha256", &self.lock.sha256)?;

    if self.build.command.first().is_none_or(|program| program.is_empty()) {
      return Err(DescriptorError::invalid("build.command", "must name a program"));
    }

    for key in self.env.keys() {
      if key.is_empty() || key.contains('=') || key.contains('\0') {
        return Err(DescriptorError::invalid(format!("env.{}", key), "not a valid variable name"));
      }
      if RESERVED_ENV.contains(&key.as_str()) {
        return Err(DescriptorError::invalid(format!("env.{}", key), "is set by the build itself"));
      }
    }

    for triple in &self.meta.platforms {
      triple
        .parse::<Platform>()
        .map_err(|message| DescriptorError::invalid("meta.platforms", message))?;
    }

    for selector in self.platform_build_inputs.keys() {
      let known_os = selector.parse::<crate::platform::os::Os>().is_ok();
      if !known_os && selector.parse::<Platform>().is_err() {
        return Err(DescriptorError::invalid(
          format!("platform_build_inputs.{}", selector),
          "expected an OS name or a platform triple",
        ));
      }
    }

    Ok(())
  }

  /// Whether the descriptor declares support for `platform`.
  ///
  /// An empty platform list places no restriction.
  pub fn supports(&self, platform: &Platform) -> bool {
    self.meta.platforms.is_empty() || self.meta.platforms.iter().any(|p| *p == platform.triple())
  }

  /// `build_inputs` plus the platform-conditional inputs matching `platform`.
  ///
  /// Order follows the descriptor; duplicates are dropped.
  pub fn resolved_build_inputs(&self, platform: &Platform) -> Vec<String> {
    let conditional = self
      .platform_build_inputs
      .iter()
      .filter(|(selector, _)| platform.matches(selector))
      .flat_map(|(_, inputs)| inputs.iter());

    let mut resolved: Vec<String> = Vec::new();
    for input in self.build_inputs.iter().chain(conditional) {
      if !resolved.contains(input) {
        resolved.push(input.clone());
      }
    }
    resolved
  }

  /// The build command followed by the build flags.
  pub fn command_line(&self) -> Vec<String> {
    self.build.command.iter().chain(self.build_flags.iter()).cloned().collect()
  }

  /// Absolute source directory given the directory holding the descriptor.
  pub fn source_dir(&self, root: &Path) -> PathBuf {
    if self.source.is_absolute() {
      self.source.clone()
    } else {
      root.join(&self.source)
    }
  }

  /// Deterministic hash of the descriptor's canonical form.
  pub fn fingerprint(&self) -> Result<ObjectHash, DescriptorError> {
    self.compute_hash().map_err(DescriptorError::Fingerprint)
  }
}

fn check_sha256(field: &str, value: &str) -> Result<(), DescriptorError> {
  if ContentHash::is_well_formed(value) {
    Ok(())
  } else {
    Err(DescriptorError::invalid(field, "expected 64 lowercase hex characters"))
  }
}
