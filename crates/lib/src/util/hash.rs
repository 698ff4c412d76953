//! Hashing utilities for pin verification and fingerprints.
//!
//! This module provides:
//! - `ContentHash`: a full 64-character SHA-256 used by every pin
//! - `ObjectHash`: a truncated 20-character hash for fingerprints and cache keys
//! - `hash_directory()`: deterministic directory hashing (vendored dependencies)
//! - `hash_file()` / `hash_bytes()`: single file and byte hashing

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::consts::OBJ_HASH_PREFIX_LEN;

pub type SerializeError = serde_json::Error;

/// A truncated content-addressed hash of a serializable value.
///
/// The hash is the first 20 hex characters of the SHA-256 of the value's JSON
/// serialization, e.g. `"a1b2c3d4e5f6789012ab"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHash(pub String);

impl std::fmt::Display for ObjectHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<ObjectHash, SerializeError> {
    let serialized = serde_json::to_string(self)?;
    let full = hash_bytes(serialized.as_bytes());
    Ok(ObjectHash(full.0[..OBJ_HASH_PREFIX_LEN].to_string()))
  }
}

/// A full 64-character lowercase hex SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
  /// Whether `s` looks like a SHA-256 in the form pins are written in.
  pub fn is_well_formed(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
  }

  /// Compare against a hash written in a descriptor.
  pub fn matches(&self, expected: &str) -> bool {
    self.0 == expected
  }
}

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Error while hashing files on disk.
#[derive(Debug, thiserror::Error)]
pub enum DirHashError {
  #[error("failed to walk directory: {message}")]
  WalkDir { message: String },

  #[error("failed to read file {path}: {message}")]
  ReadFile { path: String, message: String },

  #[error("failed to read symlink {path}: {message}")]
  ReadSymlink { path: String, message: String },
}

/// Compute a deterministic hash of a directory's contents.
///
/// Covers file contents, directory structure and symlink targets. Timestamps
/// and permissions are ignored. Entries named in `exclude` are skipped along
/// with everything beneath them.
pub fn hash_directory(path: &Path, exclude: &[&str]) -> Result<ContentHash, DirHashError> {
  let mut entries: Vec<(String, String)> = Vec::new();

  let walker = WalkDir::new(path).sort_by_file_name().into_iter().filter_entry(|e| {
    e.file_name()
      .to_str()
      .map(|name| !exclude.contains(&name))
      .unwrap_or(true)
  });

  for entry in walker {
    let entry = entry.map_err(|e| DirHashError::WalkDir { message: e.to_string() })?;
    let entry_path = entry.path();

    let rel_path = entry_path
      .strip_prefix(path)
      .unwrap_or(entry_path)
      .to_string_lossy()
      .replace('\\', "/");

    // Root itself
    if rel_path.is_empty() {
      continue;
    }

    let file_type = entry.file_type();
    let line = if file_type.is_file() {
      format!("F:{}:{}", rel_path, hash_file(entry_path)?)
    } else if file_type.is_dir() {
      format!("D:{}", rel_path)
    } else if file_type.is_symlink() {
      let target = fs::read_link(entry_path).map_err(|e| DirHashError::ReadSymlink {
        path: entry_path.display().to_string(),
        message: e.to_string(),
      })?;
      format!("L:{}:{}", rel_path, hash_bytes(target.to_string_lossy().as_bytes()))
    } else {
      // Sockets, devices and fifos carry no content
      continue;
    };

    entries.push((rel_path, line));
  }

  entries.sort_by(|a, b| a.0.cmp(&b.0));

  let mut hasher = Sha256::new();
  for (_, line) in entries {
    hasher.update(line.as_bytes());
    hasher.update(b"\n");
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash a file's contents in fixed-size chunks.
pub fn hash_file(path: &Path) -> Result<ContentHash, DirHashError> {
  let read_err = |e: std::io::Error| DirHashError::ReadFile {
    path: path.display().to_string(),
    message: e.to_string(),
  };

  let mut file = fs::File::open(path).map_err(read_err)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_err)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash a file or, if `path` is a directory, its whole tree.
pub fn hash_path(path: &Path) -> Result<ContentHash, DirHashError> {
  if path.is_dir() {
    hash_directory(path, &[])
  } else {
    hash_file(path)
  }
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}
