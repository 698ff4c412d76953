//! `procman hash`: compute the pin for a base archive or lock state.

use std::path::Path;

use anyhow::{Context, Result};

use procman::util::hash::hash_path;

use crate::output::{OutputFormat, print_json};

pub fn cmd_hash(path: &Path, output: OutputFormat) -> Result<()> {
  let hash = hash_path(path).with_context(|| format!("Failed to hash {}", path.display()))?;

  if output.is_json() {
    print_json(&serde_json::json!({ "path": path, "sha256": hash.0 }))?;
  } else {
    println!("{}", hash);
  }
  Ok(())
}
