//! `procman build`: evaluate a descriptor, then run its build.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use procman::build::{build, prepare};
use procman::process::ProcessManager;

use crate::output::{OutputFormat, format_duration, print_info, print_json, print_stat, print_success};

pub fn cmd_build(descriptor: &Path, out: &Path, cache_dir: Option<PathBuf>, output: OutputFormat) -> Result<()> {
  let (spec, ctx) = super::load(descriptor, cache_dir)?;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt.block_on(async {
    let plan = prepare(&spec, &ctx).await.context("Descriptor check failed")?;
    if !output.is_json() {
      print_info(&format!("Building {} {} for {}", plan.name, plan.version, plan.platform));
    }
    build(&plan, &ProcessManager::new(), out).await.context("Build failed")
  })?;

  if output.is_json() {
    print_json(&outcome.metadata)?;
  } else {
    println!();
    print_success("Build complete!");
    print_stat("Output", &outcome.out_dir.display().to_string());
    print_stat("Metadata", &outcome.metadata_path.display().to_string());
    print_stat("Fingerprint", &outcome.metadata.fingerprint.0);
    print_stat("Duration", &format_duration(outcome.duration));
  }
  Ok(())
}
