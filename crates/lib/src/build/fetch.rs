//! Base environment fetching.
//!
//! Downloads the pinned archive into the cache and verifies its SHA-256
//! before anything is built. `http(s)://` URLs go through reqwest;
//! `file://` URLs are read from disk, which keeps offline mirrors and tests
//! on the same code path.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::build::types::{BuildError, FetchedBase};
use crate::descriptor::SourcePin;
use crate::util::hash::hash_bytes;

/// Fetch the base environment named by `pin` into `cache_dir`.
///
/// The cache entry is keyed by the resolved URL, so a changed revision never
/// reuses an archive fetched for another one. A cached file is re-hashed on
/// every call and re-fetched when it no longer matches. On a hash mismatch
/// nothing is left in the cache.
pub async fn fetch_base(pin: &SourcePin, cache_dir: &Path) -> Result<FetchedBase, BuildError> {
  let url = pin.resolved_url();
  info!(url = %url, rev = %pin.rev, "fetching base environment");

  fs::create_dir_all(cache_dir).await?;
  let dest_path = cache_dir.join(cache_file_name(&url));

  if dest_path.exists() {
    debug!(path = ?dest_path, "checking cached archive");
    match fs::read(&dest_path).await {
      Ok(bytes) => {
        let actual = hash_bytes(&bytes);
        if actual.matches(&pin.sha256) {
          info!(path = ?dest_path, "using cached archive");
          return Ok(fetched(pin, url, dest_path));
        }
        debug!(expected = %pin.sha256, actual = %actual, "cached archive hash mismatch, re-fetching");
      }
      Err(e) => debug!(path = ?dest_path, error = %e, "cached archive unreadable, re-fetching"),
    }
  }

  let bytes = download(&url).await?;
  let actual = hash_bytes(&bytes);

  if !actual.matches(&pin.sha256) {
    if dest_path.exists() {
      fs::remove_file(&dest_path).await?;
    }
    return Err(BuildError::HashMismatch {
      url,
      expected: pin.sha256.clone(),
      actual: actual.0,
    });
  }

  // Stage next to the destination so the rename stays on one filesystem.
  let staging = tempfile::NamedTempFile::new_in(cache_dir)?;
  fs::write(staging.path(), &bytes).await?;
  staging.persist(&dest_path).map_err(|e| e.error)?;

  info!(path = ?dest_path, size = bytes.len(), "base environment verified");
  Ok(fetched(pin, url, dest_path))
}

fn fetched(pin: &SourcePin, url: String, path: PathBuf) -> FetchedBase {
  FetchedBase {
    url,
    rev: pin.rev.clone(),
    sha256: pin.sha256.clone(),
    path,
  }
}

async fn download(url: &str) -> Result<Vec<u8>, BuildError> {
  let failed = |message: String| BuildError::FetchFailed {
    url: url.to_string(),
    message,
  };

  if let Some(path) = url.strip_prefix("file://") {
    return fs::read(path).await.map_err(|e| failed(e.to_string()));
  }

  let response = reqwest::get(url).await.map_err(|e| failed(e.to_string()))?;
  if !response.status().is_success() {
    return Err(failed(format!("HTTP {}", response.status())));
  }

  let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
  Ok(bytes.to_vec())
}

/// Cache file name for a resolved URL: a short URL hash plus a readable tail.
fn cache_file_name(url: &str) -> String {
  let key = &hash_bytes(url.as_bytes()).0[..16];
  match url_to_filename(url) {
    Some(tail) => format!("{}-{}", key, tail),
    None => key.to_string(),
  }
}

/// Last path component of a URL, sanitized for use as a file name.
fn url_to_filename(url: &str) -> Option<String> {
  let last = url.rsplit('/').next()?;
  let last = last.split('?').next().unwrap_or(last);

  let sanitized: String = last
    .chars()
    .map(|c| {
      if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
        c
      } else {
        '_'
      }
    })
    .collect();

  if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
    None
  } else {
    Some(sanitized)
  }
}
