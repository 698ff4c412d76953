//! Descriptor evaluation and build execution.
//!
//! A build happens in two phases. [`prepare`] checks every pin and
//! precondition of a [`crate::descriptor::PackageSpec`] and produces a
//! [`BuildPlan`]; it never runs anything. [`build`] then runs the plan's
//! command under a [`crate::process::ProcessManager`] and writes the package
//! metadata next to the output.
//!
//! # Submodules
//!
//! - [`fetch`] - base environment download and verification
//! - [`verify`] - platform, lock and tool checks
//! - [`plan`] - ordering of the checks into a plan
//! - [`execute`] - running the plan

pub mod execute;
pub mod fetch;
pub mod plan;
mod types;
pub mod verify;

pub use execute::build;
pub use plan::prepare;
pub use types::*;
