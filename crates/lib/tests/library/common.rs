//! Shared fixtures for library integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use procman::build::BuildContext;
use procman::descriptor::PackageSpec;
use procman::platform::Platform;
use procman::platform::arch::Arch;
use procman::platform::os::Os;
use procman::util::hash::hash_bytes;
use tempfile::TempDir;

pub const BASE_REV: &str = "abc123";
pub const OTHER_REV: &str = "def456";
pub const LOCK_CONTENT: &str = "# lock\nversion = 3\n";

pub fn base_content(rev: &str) -> String {
  format!("base environment at {}", rev)
}

/// Create an executable named `name` in `dir`.
///
/// Mirrors `procman::util::testutil::fake_tool`, which is `cfg(test)` and not
/// visible to integration tests.
#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str) -> PathBuf {
  use std::os::unix::fs::PermissionsExt;

  fs::create_dir_all(dir).unwrap();
  let path = dir.join(name);
  fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
  fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
  path
}

/// A throwaway project: descriptor, lock file, base mirror and a tool directory.
pub struct Project {
  pub temp: TempDir,
}

impl Project {
  /// Lay out a project whose build runs `script` through `/bin/sh`.
  pub fn new(script: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let project = Self { temp };

    let mirror = project.root().join("mirror");
    fs::create_dir_all(&mirror).unwrap();
    for rev in [BASE_REV, OTHER_REV] {
      fs::write(mirror.join(format!("{}.tar.gz", rev)), base_content(rev)).unwrap();
    }

    fs::write(project.root().join("Cargo.lock"), LOCK_CONTENT).unwrap();
    fake_tool(&project.tools_dir(), "asciidoctor");

    project.write_descriptor(&project.descriptor_text(script));
    project
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  pub fn descriptor_path(&self) -> PathBuf {
    self.root().join("procman.toml")
  }

  pub fn tools_dir(&self) -> PathBuf {
    self.root().join("tools")
  }

  pub fn cache_dir(&self) -> PathBuf {
    self.root().join("cache")
  }

  pub fn out_dir(&self) -> PathBuf {
    self.root().join("out")
  }

  pub fn descriptor_text(&self, script: &str) -> String {
    format!(
      r#"
name = "procman"
version = "0.0.1"
native_build_inputs = ["asciidoctor"]
build_inputs = ["openssl"]

[base]
url = "file://{mirror}/{{rev}}.tar.gz"
rev = "{rev}"
sha256 = "{base_sha}"

[lock]
sha256 = "{lock_sha}"

[platform_build_inputs]
darwin = ["Security"]

[env]
RUSTC_BOOTSTRAP = "1"

[build]
command = ["/bin/sh", "-c", '{script}']

[meta]
description = "Hello, world!"
homepage = "https://example.com/procman"
licenses = ["BSD-3-Clause"]
maintainers = ["procman developers"]
platforms = ["x86_64-linux", "aarch64-darwin"]
"#,
      mirror = self.root().join("mirror").display(),
      rev = BASE_REV,
      base_sha = hash_bytes(base_content(BASE_REV).as_bytes()),
      lock_sha = hash_bytes(LOCK_CONTENT.as_bytes()),
      script = script,
    )
  }

  pub fn write_descriptor(&self, text: &str) {
    fs::write(self.descriptor_path(), text).unwrap();
  }

  pub fn spec(&self) -> PackageSpec {
    PackageSpec::load(&self.descriptor_path()).unwrap()
  }

  pub fn context(&self) -> BuildContext {
    BuildContext::new(self.root(), Platform::new(Arch::X86_64, Os::Linux))
      .with_cache_dir(self.cache_dir())
      .with_search_path(self.tools_dir())
  }
}
