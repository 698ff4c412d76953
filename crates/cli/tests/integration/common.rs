//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use procman::util::hash::hash_bytes;
use tempfile::TempDir;

pub const BASE_REV: &str = "v1";
pub const BASE_CONTENT: &str = "base environment v1";
pub const LOCK_CONTENT: &str = "# lock\nversion = 3\n";

/// Isolated test environment.
///
/// Each test gets its own temporary project with a base mirror, a lock file
/// and an isolated download cache.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// A project whose build runs `script` through `/bin/sh`.
  pub fn project(script: &str) -> Self {
    let env = Self::empty();
    env.write_file(&format!("mirror/{}.tar.gz", BASE_REV), BASE_CONTENT);
    env.write_file("Cargo.lock", LOCK_CONTENT);
    env.write_file("procman.toml", &env.descriptor(script));
    env
  }

  pub fn empty() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Descriptor text for a project building with `script`.
  pub fn descriptor(&self, script: &str) -> String {
    format!(
      r#"
name = "demo"
version = "1.2.3"
native_build_inputs = ["sh"]
build_inputs = ["openssl"]

[base]
url = "file://{mirror}/{{rev}}.tar.gz"
rev = "{rev}"
sha256 = "{base_sha}"

[lock]
sha256 = "{lock_sha}"

[env]
GREETING = "hi"

[build]
command = ["/bin/sh", "-c", '{script}']

[meta]
description = "A demo package"
licenses = ["MIT"]
"#,
      mirror = self.root_path().join("mirror").display(),
      rev = BASE_REV,
      base_sha = hash_bytes(BASE_CONTENT.as_bytes()),
      lock_sha = hash_bytes(LOCK_CONTENT.as_bytes()),
      script = script,
    )
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn root_path(&self) -> PathBuf {
    let p = self.temp.path().to_path_buf();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn cache_path(&self) -> PathBuf {
    self.root_path().join("cache")
  }

  pub fn out_path(&self) -> PathBuf {
    self.root_path().join("out")
  }

  /// A procman command running inside the project with an isolated cache.
  pub fn procman_cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("procman");
    cmd.current_dir(self.root_path());
    cmd.env("PROCMAN_CACHE_DIR", self.cache_path());
    cmd.env_remove("RUST_LOG");
    cmd
  }
}
