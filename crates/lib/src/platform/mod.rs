pub mod arch;
pub mod os;
pub mod paths;

use arch::Arch;
use os::Os;
use std::fmt;
use std::str::FromStr;

/// Platform identifier combining architecture and OS (e.g., "aarch64-darwin")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  /// Create a new platform identifier
  pub fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  /// Returns the platform triple string (e.g., "aarch64-darwin")
  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }

  /// Whether a platform selector matches this platform.
  ///
  /// A selector is either a bare OS name (`"darwin"`) or a full triple
  /// (`"aarch64-darwin"`).
  pub fn matches(&self, selector: &str) -> bool {
    selector == self.os.as_str() || selector == self.triple()
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}

impl FromStr for Platform {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (arch, os) = s
      .split_once('-')
      .ok_or_else(|| format!("invalid platform triple '{}', expected <arch>-<os>", s))?;
    Ok(Self::new(arch.parse()?, os.parse()?))
  }
}

/// Returns the platform triple for the current system (e.g., "aarch64-darwin")
///
/// Returns `None` if the current platform is not supported
pub fn platform_triple() -> Option<String> {
  Platform::current().map(|p| p.triple())
}
