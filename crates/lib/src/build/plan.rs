//! Descriptor evaluation.

use tracing::info;

use crate::build::fetch::fetch_base;
use crate::build::types::{BuildContext, BuildError, BuildPlan};
use crate::build::verify::{check_platform, find_tools, verify_lock};
use crate::descriptor::PackageSpec;

/// Evaluate a descriptor into a verified [`BuildPlan`].
///
/// Checks run in a fixed order and the first failure aborts: descriptor
/// validation, host platform, base environment hash, lock hash, build tools.
/// Nothing here runs the build command.
pub async fn prepare(spec: &PackageSpec, ctx: &BuildContext) -> Result<BuildPlan, BuildError> {
  spec.validate()?;
  check_platform(spec, &ctx.platform)?;

  let base = fetch_base(&spec.base, &ctx.cache_dir()).await?;

  let cwd = spec.source_dir(&ctx.root);
  let lock = verify_lock(&spec.lock, &cwd)?;

  let tools = find_tools(&spec.native_build_inputs, ctx.search_path.as_deref())?;

  let plan = BuildPlan {
    name: spec.name.clone(),
    version: spec.version.clone(),
    platform: ctx.platform.triple(),
    fingerprint: spec.fingerprint()?,
    base,
    lock,
    tools,
    build_inputs: spec.resolved_build_inputs(&ctx.platform),
    env: spec.env.clone(),
    command: spec.command_line(),
    cwd,
    meta: spec.meta.clone(),
  };

  info!(
    name = %plan.name,
    version = %plan.version,
    platform = %plan.platform,
    fingerprint = %plan.fingerprint,
    "build plan ready"
  );
  Ok(plan)
}
