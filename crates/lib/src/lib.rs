//! procman: process management and reproducible build descriptors
//!
//! This crate provides:
//! - `ProcessManager`: runs named child processes and reports their output
//!   and exits to a single director
//! - `PackageSpec`: a package descriptor pinning its base environment, lock
//!   state, build inputs and metadata
//! - `prepare` / `build`: fail-closed descriptor evaluation and build execution

pub mod build;
pub mod consts;
pub mod descriptor;
pub mod platform;
pub mod process;
pub mod util;

pub use build::{BuildContext, BuildError, BuildPlan, build, prepare};
pub use descriptor::{DescriptorError, PackageSpec};
pub use process::{ManagerError, OutputStream, ProcessError, ProcessEvent, ProcessManager, RunningProcess};
