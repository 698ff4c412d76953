use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::util::hash::Hashable;

/// A package descriptor, usually read from `procman.toml`.
///
/// ```toml
/// name = "procman"
/// version = "0.0.1"
/// native_build_inputs = ["asciidoctor", "plantuml"]
///
/// [base]
/// url = "https://github.com/NixOS/nixpkgs/archive/{rev}.tar.gz"
/// rev = "2b4a4d1a4b2e2c8a..."
/// sha256 = "0c7f5e..."
///
/// [lock]
/// sha256 = "9a1e..."
///
/// [platform_build_inputs]
/// darwin = ["Security"]
///
/// [env]
/// RUSTC_BOOTSTRAP = "1"
///
/// [meta]
/// description = "Hello, world!"
/// platforms = ["x86_64-linux", "aarch64-darwin"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSpec {
  pub name: String,
  pub version: String,

  /// Source tree, relative to the descriptor's directory.
  #[serde(default = "default_source")]
  pub source: PathBuf,

  /// Pinned base environment archive.
  pub base: SourcePin,

  /// Pinned dependency lock state.
  pub lock: LockPin,

  /// Tools that must be on the search path at build time.
  #[serde(default)]
  pub native_build_inputs: Vec<String>,

  /// Libraries needed at link or run time.
  #[serde(default)]
  pub build_inputs: Vec<String>,

  /// Extra `build_inputs` keyed by OS name or platform triple.
  #[serde(default)]
  pub platform_build_inputs: BTreeMap<String, Vec<String>>,

  /// Environment overrides for the build command.
  #[serde(default)]
  pub env: BTreeMap<String, String>,

  /// Arguments appended to the build command.
  #[serde(default)]
  pub build_flags: Vec<String>,

  #[serde(default)]
  pub build: BuildSection,

  pub meta: Metadata,
}

impl Hashable for PackageSpec {}

fn default_source() -> PathBuf {
  PathBuf::from(".")
}

/// Revision plus content hash of a fetched archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourcePin {
  /// URL template; `{rev}` is replaced with [`SourcePin::rev`].
  pub url: String,
  pub rev: String,
  pub sha256: String,
}

impl SourcePin {
  pub const REV_PLACEHOLDER: &'static str = "{rev}";

  /// The URL with the revision substituted in.
  pub fn resolved_url(&self) -> String {
    self.url.replace(Self::REV_PLACEHOLDER, &self.rev)
  }
}

/// Hash of the dependency lock state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockPin {
  /// Lock file (version 1) or vendored dependency directory (version 2),
  /// relative to the source tree.
  #[serde(default = "default_lock_path")]
  pub path: PathBuf,
  pub sha256: String,
  #[serde(default)]
  pub hash_version: LockHashVersion,
}

fn default_lock_path() -> PathBuf {
  PathBuf::from("Cargo.lock")
}

/// How [`LockPin::sha256`] was computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum LockHashVersion {
  /// SHA-256 of the lock file bytes.
  #[default]
  File,
  /// Directory hash of the vendored dependency tree.
  Vendored,
}

impl TryFrom<u32> for LockHashVersion {
  type Error = String;

  fn try_from(value: u32) -> Result<Self, Self::Error> {
    match value {
      1 => Ok(Self::File),
      2 => Ok(Self::Vendored),
      other => Err(format!("unsupported lock hash version {}, expected 1 or 2", other)),
    }
  }
}

impl From<LockHashVersion> for u32 {
  fn from(version: LockHashVersion) -> Self {
    match version {
      LockHashVersion::File => 1,
      LockHashVersion::Vendored => 2,
    }
  }
}

impl fmt::Display for LockHashVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", u32::from(*self))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
  /// Build command argv; `build_flags` are appended.
  #[serde(default = "default_build_command")]
  pub command: Vec<String>,
}

impl Default for BuildSection {
  fn default() -> Self {
    Self {
      command: default_build_command(),
    }
  }
}

fn default_build_command() -> Vec<String> {
  ["cargo", "build", "--release"].iter().map(|s| s.to_string()).collect()
}

/// Descriptive package metadata, copied into the build output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Metadata {
  #[serde(default)]
  pub description: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub homepage: Option<String>,
  #[serde(default)]
  pub licenses: Vec<String>,
  #[serde(default)]
  pub maintainers: Vec<String>,
  /// Supported platform triples; empty means any platform.
  #[serde(default)]
  pub platforms: Vec<String>,
}
