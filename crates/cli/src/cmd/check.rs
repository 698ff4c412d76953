//! `procman check`: evaluate a descriptor without building.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use procman::build::{BuildPlan, prepare};

use crate::output::{OutputFormat, print_json, print_stat, print_success, symbols, truncate_hash};

/// Verify every pin and precondition of the descriptor and print the plan.
pub fn cmd_check(descriptor: &Path, cache_dir: Option<PathBuf>, output: OutputFormat) -> Result<()> {
  let (spec, ctx) = super::load(descriptor, cache_dir)?;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let plan = rt.block_on(prepare(&spec, &ctx)).context("Descriptor check failed")?;

  if output.is_json() {
    print_json(&plan)?;
  } else {
    print_success(&format!("{} {} is ready to build", plan.name, plan.version));
    print_plan(&plan);
  }
  Ok(())
}

fn print_plan(plan: &BuildPlan) {
  print_stat("Platform", &plan.platform);
  print_stat("Fingerprint", &plan.fingerprint.0);
  print_stat(
    "Base",
    &format!("{} @ {} ({})", plan.base.url, plan.base.rev, truncate_hash(&plan.base.sha256)),
  );
  print_stat(
    "Lock",
    &format!("{} (v{}, {})", plan.lock.path.display(), plan.lock.hash_version, truncate_hash(&plan.lock.sha256)),
  );
  if !plan.build_inputs.is_empty() {
    print_stat("Build inputs", &plan.build_inputs.join(", "));
  }
  print_stat("Command", &plan.command.join(" "));

  if !plan.tools.is_empty() {
    println!();
    println!("Tools:");
    for (tool, path) in &plan.tools {
      println!("  {} {} {}", tool, symbols::ARROW, path.display());
    }
  }
}
