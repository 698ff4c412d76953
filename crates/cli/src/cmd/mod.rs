mod build;
mod check;
mod hash;
mod info;
mod run;

pub use build::cmd_build;
pub use check::cmd_check;
pub use hash::cmd_hash;
pub use info::cmd_info;
pub use run::cmd_run;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use procman::build::BuildContext;
use procman::descriptor::PackageSpec;
use procman::platform::Platform;

/// Load a descriptor and the context it is evaluated in.
fn load(descriptor: &Path, cache_dir: Option<PathBuf>) -> Result<(PackageSpec, BuildContext)> {
  let spec = PackageSpec::load(descriptor).with_context(|| format!("Failed to load {}", descriptor.display()))?;
  let platform = Platform::current().context("Unsupported host platform")?;

  let root = match descriptor.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
    _ => PathBuf::from("."),
  };
  let root = dunce::canonicalize(&root).with_context(|| format!("Failed to resolve {}", root.display()))?;

  debug!(descriptor = %descriptor.display(), root = %root.display(), platform = %platform, "loaded descriptor");
  let mut ctx = BuildContext::new(root, platform);
  if let Some(cache_dir) = cache_dir {
    ctx = ctx.with_cache_dir(cache_dir);
  }
  Ok((spec, ctx))
}
