//! Running a verified build plan.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Instant;

use tokio::fs;
use tokio::process::Command;
use tracing::{info, warn};

use crate::build::types::{BuildError, BuildOutcome, BuildPlan, PackageMetadata};
use crate::consts::{BASE_ENV, BUILD_INPUTS_ENV, OUT_ENV, PACKAGE_METADATA_FILENAME};
use crate::process::{ProcessEvent, ProcessManager};

/// Run the plan's build command and write package metadata into `out_dir`.
///
/// The command runs in the source directory with the inherited environment,
/// the descriptor's overrides, and:
/// - `out`: the output directory
/// - `PROCMAN_BASE`: the verified base environment archive
/// - `PROCMAN_BUILD_INPUTS`: resolved build inputs, space separated
/// - `PATH`: the directories of the resolved tools, then the descriptor's
///   `PATH` override if any, then the inherited `PATH`
///
/// Output is streamed to the log as it arrives.
pub async fn build(plan: &BuildPlan, manager: &ProcessManager, out_dir: &Path) -> Result<BuildOutcome, BuildError> {
  let (program, args) = plan.command.split_first().ok_or(BuildError::EmptyCommand)?;
  fs::create_dir_all(out_dir).await?;

  let mut command = Command::new(program);
  command
    .args(args)
    .current_dir(&plan.cwd)
    .envs(&plan.env)
    .env(OUT_ENV, out_dir)
    .env(BASE_ENV, &plan.base.path)
    .env(BUILD_INPUTS_ENV, plan.build_inputs.join(" "))
    .env(
      "PATH",
      build_search_path(&plan.tools, plan.env.get("PATH").map(String::as_str), env::var_os("PATH"))?,
    );

  let command_line = plan.command.join(" ");
  info!(name = %plan.name, command = %command_line, cwd = %plan.cwd.display(), "running build");
  let started = Instant::now();

  let running = manager.start(plan.name.clone(), &mut command)?;
  let pump = tokio::spawn(running.run());

  let mut status: Option<ExitStatus> = None;
  manager
    .run_director_with_intercept(|name, event, deliver| {
      match &event {
        ProcessEvent::Output { stream, .. } => {
          for line in event.text().unwrap_or_default().lines() {
            info!(name, stream = %stream, "{}", line);
          }
        }
        ProcessEvent::Exited(exit) if name == plan.name => status = Some(*exit),
        ProcessEvent::Exited(exit) => info!(name, status = %exit, "process exited"),
        ProcessEvent::Error(err) => warn!(name, error = %err, "build process error"),
      }
      deliver(event);
    })
    .await;
  pump.await?;

  match status {
    Some(exit) if exit.success() => {}
    other => {
      return Err(BuildError::BuildFailed {
        command: command_line,
        code: other.and_then(|s| s.code()),
      });
    }
  }

  let metadata = PackageMetadata::from_plan(plan);
  let metadata_path = out_dir.join(PACKAGE_METADATA_FILENAME);
  let json = serde_json::to_string_pretty(&metadata).map_err(BuildError::Metadata)?;
  fs::write(&metadata_path, json).await?;

  let duration = started.elapsed();
  info!(name = %plan.name, out = %out_dir.display(), elapsed_ms = duration.as_millis() as u64, "build complete");

  Ok(BuildOutcome {
    out_dir: out_dir.to_path_buf(),
    metadata_path,
    metadata,
    duration,
  })
}

/// Tool directories first, then `overridden` (the descriptor's `PATH`), then
/// `inherited`.
fn build_search_path(
  tools: &BTreeMap<String, PathBuf>,
  overridden: Option<&str>,
  inherited: Option<OsString>,
) -> Result<OsString, BuildError> {
  let mut seen = BTreeSet::new();
  let mut dirs: Vec<PathBuf> = tools
    .values()
    .filter_map(|path| path.parent().map(Path::to_path_buf))
    .filter(|dir| seen.insert(dir.clone()))
    .collect();

  if let Some(overridden) = overridden {
    dirs.extend(env::split_paths(overridden));
  }
  if let Some(inherited) = inherited {
    dirs.extend(env::split_paths(&inherited));
  }

  env::join_paths(dirs).map_err(|e| BuildError::Io(std::io::Error::other(e)))
}
