use anyhow::Result;

use procman::platform::{paths, platform_triple};

use crate::output::{OutputFormat, print_json, print_stat};

pub fn cmd_info(output: OutputFormat) -> Result<()> {
  let triple = platform_triple();
  let cache_dir = paths::base_cache_dir();

  if output.is_json() {
    print_json(&serde_json::json!({
      "platform": triple,
      "version": env!("CARGO_PKG_VERSION"),
      "cache_dir": cache_dir,
    }))?;
    return Ok(());
  }

  println!("System:");
  match triple {
    Some(triple) => print_stat("Platform", &triple),
    None => print_stat("Platform", "unknown"),
  }
  print_stat("Cache", &cache_dir.display().to_string());
  Ok(())
}
