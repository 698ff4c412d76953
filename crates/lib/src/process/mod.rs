//! Managing a family of named child processes.
//!
//! A [`ProcessManager`] owns a table of running processes and one event queue.
//! Each process is pumped by its own task ([`RunningProcess::run`]), which
//! turns pipe reads and the final exit status into [`ProcessEvent`]s. A single
//! director ([`ProcessManager::run_director`]) drains the queue and returns once
//! every registered process has delivered its terminal event.
//!
//! Both sides accept an interceptor. On the process side it sees each event
//! before it is queued and decides whether (and in what form) to forward it.
//! On the director side it sees each queued event together with a `deliver`
//! continuation; only delivered terminal events unregister a process.
//!
//! ```ignore
//! let manager = ProcessManager::new();
//! let running = manager.start("greet", Command::new("echo").arg("hello"))?;
//! tokio::spawn(running.run());
//! manager.run_director().await;
//! ```

mod manager;
mod types;

pub use manager::{ProcessManager, RunningProcess};
pub use types::*;
