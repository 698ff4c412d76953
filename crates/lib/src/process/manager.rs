use std::collections::HashMap;
use std::fmt;
use std::io;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::types::{HandlerError, ManagerError, OutputStream, ProcessError, ProcessEvent};
use crate::consts::{DEFAULT_POLL_INTERVAL_MS, KILL_GRACE_MS, READ_CHUNK_SIZE};

/// An event tagged with the registration that produced it.
struct Envelope {
  id: u64,
  name: String,
  event: ProcessEvent,
}

struct Registration {
  id: u64,
  pid: Option<u32>,
  kill: Option<oneshot::Sender<()>>,
}

struct Shared {
  processes: Mutex<HashMap<String, Registration>>,
  next_id: AtomicU64,
  events_tx: mpsc::UnboundedSender<Envelope>,
  events_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Envelope>>,
}

/// Runs a family of named processes and reports their events to a director.
///
/// Clones share the same process table and event queue.
#[derive(Clone)]
pub struct ProcessManager {
  shared: Arc<Shared>,
  poll_interval: Duration,
}

impl Default for ProcessManager {
  fn default() -> Self {
    Self::new()
  }
}

impl ProcessManager {
  pub fn new() -> Self {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    Self {
      shared: Arc::new(Shared {
        processes: Mutex::new(HashMap::new()),
        next_id: AtomicU64::new(0),
        events_tx,
        events_rx: tokio::sync::Mutex::new(events_rx),
      }),
      poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
    }
  }

  /// How often an idle director re-checks whether any process is left.
  pub fn with_poll_interval(mut self, interval: Duration) -> Self {
    self.poll_interval = interval;
    self
  }

  fn table(&self) -> MutexGuard<'_, HashMap<String, Registration>> {
    // The table is only mutated in short non-panicking sections.
    self.shared.processes.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Spawn `command` and register it under `name`.
  ///
  /// The child starts immediately with stdin closed and stdout/stderr piped.
  /// On unix it leads a new process group so stopping it also reaches its
  /// descendants. Nothing is read until the returned [`RunningProcess`] is run, so it
  /// should be handed to a task right away. A name that is still registered
  /// is rejected before anything is spawned.
  pub fn start(&self, name: impl Into<String>, command: &mut Command) -> Result<RunningProcess, ManagerError> {
    let name = name.into();
    let mut table = self.table();

    if table.contains_key(&name) {
      return Err(ManagerError::DuplicateName(name));
    }

    #[cfg(unix)]
    command.process_group(0);

    let child = command
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|source| ManagerError::Spawn {
        name: name.clone(),
        source,
      })?;

    let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
    let pid = child.id();
    let (kill_tx, kill_rx) = oneshot::channel();

    table.insert(
      name.clone(),
      Registration {
        id,
        pid,
        kill: Some(kill_tx),
      },
    );
    info!(name = %name, pid = ?pid, "process started");

    Ok(RunningProcess {
      id,
      name,
      child,
      kill_rx,
      events: self.shared.events_tx.clone(),
    })
  }

  /// Start a process and pump it until it exits, forwarding every event.
  pub async fn run_process(&self, name: impl Into<String>, command: &mut Command) -> Result<(), ManagerError> {
    self.start(name, command)?.run().await;
    Ok(())
  }

  /// Start a process and pump it until it exits, passing each event through
  /// `on_event` first. See [`RunningProcess::run_with_intercept`].
  pub async fn run_process_with_intercept<F>(
    &self,
    name: impl Into<String>,
    command: &mut Command,
    on_event: F,
  ) -> Result<(), ManagerError>
  where
    F: Fn(ProcessEvent, &dyn Fn(ProcessEvent)) -> Result<(), HandlerError>,
  {
    self.start(name, command)?.run_with_intercept(on_event).await;
    Ok(())
  }

  /// Unregister a process and kill it.
  ///
  /// On unix the whole process group is killed. The pump reaps the child
  /// and still reports the exit, but the director no longer waits for it.
  pub fn stop_process(&self, name: &str) -> Result<(), ManagerError> {
    let registration = self
      .table()
      .remove(name)
      .ok_or_else(|| ManagerError::ProcessUnknown(name.to_string()))?;

    signal_kill(name, registration);
    info!(name, "process stopped");
    Ok(())
  }

  /// Stop every registered process. Returns how many were stopped.
  pub fn stop_all(&self) -> usize {
    let drained: Vec<(String, Registration)> = self.table().drain().collect();
    let count = drained.len();
    for (name, registration) in drained {
      signal_kill(&name, registration);
    }
    if count > 0 {
      info!(count, "stopped all processes");
    }
    count
  }

  /// Names of the registered processes, sorted.
  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.table().keys().cloned().collect();
    names.sort();
    names
  }

  pub fn pid(&self, name: &str) -> Option<u32> {
    self.table().get(name).and_then(|r| r.pid)
  }

  pub fn len(&self) -> usize {
    self.table().len()
  }

  pub fn is_empty(&self) -> bool {
    self.table().is_empty()
  }

  /// Drain events until no process is left, logging each one.
  pub async fn run_director(&self) {
    self
      .run_director_with_intercept(|name, event, deliver| {
        match &event {
          ProcessEvent::Output { stream, .. } => {
            debug!(name, stream = %stream, output = %event.text().unwrap_or_default(), "process output")
          }
          ProcessEvent::Exited(status) => info!(name, status = %status, "process exited"),
          ProcessEvent::Error(err) => warn!(name, error = %err, "process error"),
        }
        deliver(event);
      })
      .await
  }

  /// Drain events until no process is left.
  ///
  /// `on_event` receives the process name, the event and a `deliver`
  /// continuation. Delivering a terminal event unregisters that process;
  /// an interceptor that swallows it keeps the director waiting until the
  /// process is stopped. Only one director drains at a time; a second call
  /// waits for the first to return.
  ///
  /// Processes must be registered (see [`ProcessManager::start`]) before the
  /// director runs, otherwise it may find the table empty and return at once.
  pub async fn run_director_with_intercept<F>(&self, mut on_event: F)
  where
    F: FnMut(&str, ProcessEvent, &mut dyn FnMut(ProcessEvent)),
  {
    let mut events = self.shared.events_rx.lock().await;

    loop {
      while let Ok(envelope) = events.try_recv() {
        self.dispatch(envelope, &mut on_event);
      }

      if self.is_empty() {
        debug!("no processes left, director returning");
        return;
      }

      match tokio::time::timeout(self.poll_interval, events.recv()).await {
        Ok(Some(envelope)) => self.dispatch(envelope, &mut on_event),
        // The manager keeps a sender alive, so the queue never closes while we hold it.
        Ok(None) => return,
        Err(_elapsed) => {}
      }
    }
  }

  fn dispatch<F>(&self, envelope: Envelope, on_event: &mut F)
  where
    F: FnMut(&str, ProcessEvent, &mut dyn FnMut(ProcessEvent)),
  {
    let Envelope { id, name, event } = envelope;

    let mut finished = false;
    let mut deliver = |delivered: ProcessEvent| {
      if delivered.is_terminal() {
        finished = true;
      }
    };
    on_event(&name, event, &mut deliver);

    if finished {
      self.unregister(&name, id);
    }
  }

  fn unregister(&self, name: &str, id: u64) {
    let mut table = self.table();
    // A stopped process may have been replaced by a new one with the same name.
    if table.get(name).is_some_and(|r| r.id == id) {
      table.remove(name);
      debug!(name, "process unregistered");
    }
  }
}

fn signal_kill(name: &str, mut registration: Registration) {
  if let Some(kill) = registration.kill.take() {
    if kill.send(()).is_err() {
      debug!(name, "process already finished");
    }
  }
}

enum Chunk {
  Data(OutputStream, Vec<u8>),
  Failed(OutputStream, io::Error),
}

async fn read_stream<R>(mut reader: R, stream: OutputStream, chunks: mpsc::UnboundedSender<Chunk>)
where
  R: AsyncRead + Unpin,
{
  let mut buf = vec![0u8; READ_CHUNK_SIZE];
  loop {
    match reader.read(&mut buf).await {
      Ok(0) => break,
      Ok(n) => {
        if chunks.send(Chunk::Data(stream, buf[..n].to_vec())).is_err() {
          break;
        }
      }
      Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
      Err(e) => {
        let _ = chunks.send(Chunk::Failed(stream, e));
        break;
      }
    }
  }
}

/// A spawned, registered process whose events have not been pumped yet.
pub struct RunningProcess {
  id: u64,
  name: String,
  child: Child,
  kill_rx: oneshot::Receiver<()>,
  events: mpsc::UnboundedSender<Envelope>,
}

impl fmt::Debug for RunningProcess {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RunningProcess")
      .field("id", &self.id)
      .field("name", &self.name)
      .field("pid", &self.child.id())
      .finish_non_exhaustive()
  }
}

impl RunningProcess {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn pid(&self) -> Option<u32> {
    self.child.id()
  }

  /// Pump the process until it exits, queueing every event unchanged.
  pub async fn run(self) {
    self
      .run_with_intercept(|event, forward| {
        forward(event);
        Ok(())
      })
      .await
  }

  /// Pump the process until it exits.
  ///
  /// Each non-empty read of at most 8192 bytes becomes an `Output` event; the
  /// exit status is reaped once both pipes have closed and reported last.
  /// `on_event` sees every event with a `forward` continuation that queues it
  /// for the director. If `on_event` fails, the failure is queued as a
  /// [`ProcessError::Handling`] event instead, followed by the original event
  /// when it was terminal and had not been forwarded.
  ///
  /// A stop request kills the process group and reaps the child without
  /// waiting for the pipes to close; output still buffered is drained for a
  /// short grace period and the rest is dropped.
  pub async fn run_with_intercept<F>(self, on_event: F)
  where
    F: Fn(ProcessEvent, &dyn Fn(ProcessEvent)) -> Result<(), HandlerError>,
  {
    let RunningProcess {
      id,
      name,
      mut child,
      mut kill_rx,
      events,
    } = self;

    let terminal_forwarded = AtomicBool::new(false);
    let forward = |event: ProcessEvent| {
      if event.is_terminal() {
        terminal_forwarded.store(true, Ordering::Relaxed);
      }
      // The receiving half lives as long as the manager; a dropped manager has no director to tell.
      let _ = events.send(Envelope {
        id,
        name: name.clone(),
        event,
      });
    };
    let emit = |event: ProcessEvent| {
      let terminal = terminal_copy(&event);
      if let Err(e) = on_event(event, &forward) {
        forward(ProcessEvent::Error(ProcessError::Handling(e)));
        // The director unregisters on the terminal event only.
        if let Some(terminal) = terminal {
          if !terminal_forwarded.load(Ordering::Relaxed) {
            forward(terminal);
          }
        }
      }
    };
    let on_chunk = |chunk: Chunk| match chunk {
      Chunk::Data(stream, data) => emit(ProcessEvent::Output { stream, data }),
      Chunk::Failed(stream, source) => {
        warn!(name = %name, stream = %stream, error = %source, "failed to read process output");
        emit(ProcessEvent::Error(ProcessError::Reading { stream, source }));
      }
    };

    let (chunk_tx, mut chunks) = mpsc::unbounded_channel();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
      readers.push(tokio::spawn(read_stream(stdout, OutputStream::Stdout, chunk_tx.clone())));
    }
    if let Some(stderr) = child.stderr.take() {
      readers.push(tokio::spawn(read_stream(stderr, OutputStream::Stderr, chunk_tx.clone())));
    }
    drop(chunk_tx);

    let mut kill_armed = true;
    let mut killed = false;
    loop {
      tokio::select! {
        chunk = chunks.recv() => match chunk {
          Some(chunk) => on_chunk(chunk),
          None => break,
        },
        signal = &mut kill_rx, if kill_armed => {
          kill_armed = false;
          if signal.is_ok() {
            debug!(name = %name, "killing process");
            if let Err(e) = kill_process_tree(&mut child) {
              warn!(name = %name, error = %e, "failed to kill process");
            }
            killed = true;
            break;
          }
        }
      }
    }

    let exit = match child.wait().await {
      Ok(status) => {
        debug!(name = %name, status = %status, "process reaped");
        ProcessEvent::Exited(status)
      }
      Err(e) => ProcessEvent::Error(ProcessError::Waiting(e)),
    };

    if killed {
      // Descendants that left the process group may still hold the pipes.
      let drain = async {
        while let Some(chunk) = chunks.recv().await {
          on_chunk(chunk);
        }
      };
      if tokio::time::timeout(Duration::from_millis(KILL_GRACE_MS), drain).await.is_err() {
        debug!(name = %name, "pipes still open after kill, closing them");
      }
      for reader in &readers {
        reader.abort();
      }
    }

    emit(exit);
  }
}

/// A copy of `event` if it is terminal, so it survives being handed to an interceptor.
fn terminal_copy(event: &ProcessEvent) -> Option<ProcessEvent> {
  match event {
    ProcessEvent::Exited(status) => Some(ProcessEvent::Exited(*status)),
    ProcessEvent::Error(ProcessError::Waiting(e)) => Some(ProcessEvent::Error(ProcessError::Waiting(
      io::Error::new(e.kind(), e.to_string()),
    ))),
    _ => None,
  }
}

/// Kill the child's process group, falling back to the child alone.
#[cfg(unix)]
fn kill_process_tree(child: &mut Child) -> io::Result<()> {
  use rustix::process::{Pid, Signal, kill_process_group};

  let group = child.id().and_then(|id| i32::try_from(id).ok()).and_then(Pid::from_raw);
  match group {
    Some(pid) => kill_process_group(pid, Signal::KILL).or_else(|_| child.start_kill()),
    None => child.start_kill(),
  }
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut Child) -> io::Result<()> {
  child.start_kill()
}
