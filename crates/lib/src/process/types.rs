use std::borrow::Cow;
use std::fmt;
use std::io;
use std::process::ExitStatus;

use thiserror::Error;

/// Which pipe a chunk of output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
  Stdout,
  Stderr,
}

impl OutputStream {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Stdout => "stdout",
      Self::Stderr => "stderr",
    }
  }
}

impl fmt::Display for OutputStream {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Error returned by an event interceptor.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Something that went wrong in the life of a single process.
#[derive(Debug, Error)]
pub enum ProcessError {
  /// Reaping the child failed; the process is treated as finished.
  #[error("failed to wait for process: {0}")]
  Waiting(#[source] io::Error),

  /// Reading stdout or stderr failed; that stream is closed.
  #[error("failed to read {stream}: {source}")]
  Reading {
    stream: OutputStream,
    #[source]
    source: io::Error,
  },

  /// The process-side interceptor rejected an event.
  #[error("event handler failed: {0}")]
  Handling(#[source] HandlerError),
}

/// Errors from the process table itself.
#[derive(Debug, Error)]
pub enum ManagerError {
  #[error("no process named '{0}' is registered")]
  ProcessUnknown(String),

  #[error("a process named '{0}' is already registered")]
  DuplicateName(String),

  #[error("failed to spawn process '{name}': {source}")]
  Spawn {
    name: String,
    #[source]
    source: io::Error,
  },
}

/// A notable event in the life of a managed process.
#[derive(Debug)]
pub enum ProcessEvent {
  /// A non-empty chunk read from one of the child's pipes.
  Output { stream: OutputStream, data: Vec<u8> },
  /// The child exited. Always the last event for a process.
  Exited(ExitStatus),
  Error(ProcessError),
}

impl ProcessEvent {
  /// Whether this event ends the process's life.
  ///
  /// Delivering a terminal event to the director unregisters the process.
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Exited(_) | Self::Error(ProcessError::Waiting(_)))
  }

  /// Output data decoded lossily as UTF-8.
  pub fn text(&self) -> Option<Cow<'_, str>> {
    match self {
      Self::Output { data, .. } => Some(String::from_utf8_lossy(data)),
      _ => None,
    }
  }
}

impl fmt::Display for ProcessEvent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Output { stream, data } => {
        write!(f, "{} ({} bytes): {:?}", stream, data.len(), String::from_utf8_lossy(data))
      }
      Self::Exited(status) => write!(f, "exited: {}", status),
      Self::Error(err) => write!(f, "error: {}", err),
    }
  }
}
