//! `procman run`: run shell commands as a family of named processes.
//!
//! Every output line is printed prefixed with the name of the process that
//! wrote it. Ctrl-C stops every process that is still running.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tokio::process::Command;

use procman::process::{OutputStream, ProcessEvent, ProcessManager};

use crate::output::{OutputFormat, print_error, print_json, print_success, print_warning};

/// A process named on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProcessSpec {
  name: String,
  command: String,
}

/// How a process ended, as reported in JSON output.
#[derive(Debug, Default, Serialize)]
struct ProcessReport {
  success: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  exit_code: Option<i32>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  errors: Vec<String>,
  stdout: String,
  stderr: String,
}

pub fn cmd_run(processes: &[String], poll_interval: Duration, output: OutputFormat) -> Result<()> {
  let specs = processes
    .iter()
    .map(|arg| parse_process(arg))
    .collect::<Result<Vec<_>>>()?;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let (reports, interrupted) = rt.block_on(run_all(&specs, poll_interval, output))?;

  if output.is_json() {
    print_json(&reports)?;
  }

  if interrupted {
    bail!("interrupted, all processes stopped");
  }
  let failed: Vec<&str> = reports
    .iter()
    .filter(|(_, report)| !report.success)
    .map(|(name, _)| name.as_str())
    .collect();
  if !failed.is_empty() {
    bail!("{} process(es) failed: {}", failed.len(), failed.join(", "));
  }
  Ok(())
}

fn parse_process(arg: &str) -> Result<ProcessSpec> {
  let Some((name, command)) = arg.split_once('=') else {
    bail!("expected NAME=COMMAND, got '{}'", arg);
  };
  let (name, command) = (name.trim(), command.trim());
  if name.is_empty() || command.is_empty() {
    bail!("expected NAME=COMMAND, got '{}'", arg);
  }
  Ok(ProcessSpec {
    name: name.to_string(),
    command: command.to_string(),
  })
}

#[cfg(unix)]
fn shell(script: &str) -> Command {
  let mut cmd = Command::new("/bin/sh");
  cmd.arg("-c").arg(script);
  cmd
}

#[cfg(windows)]
fn shell(script: &str) -> Command {
  let mut cmd = Command::new("cmd.exe");
  cmd.arg("/C").arg(script);
  cmd
}

async fn run_all(
  specs: &[ProcessSpec],
  poll_interval: Duration,
  output: OutputFormat,
) -> Result<(BTreeMap<String, ProcessReport>, bool)> {
  let manager = ProcessManager::new().with_poll_interval(poll_interval);

  let mut pumps = Vec::with_capacity(specs.len());
  for spec in specs {
    let running = match manager.start(spec.name.clone(), &mut shell(&spec.command)) {
      Ok(running) => running,
      Err(e) => {
        manager.stop_all();
        return Err(e).context("Failed to start processes");
      }
    };
    pumps.push(tokio::spawn(running.run()));
  }

  let stopper = manager.clone();
  let interrupt = tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_err() {
      return false;
    }
    let stopped = stopper.stop_all();
    print_warning(&format!("interrupted, stopped {} process(es)", stopped));
    true
  });

  let mut reports: BTreeMap<String, ProcessReport> =
    specs.iter().map(|spec| (spec.name.clone(), ProcessReport::default())).collect();
  let mut partial: HashMap<(String, OutputStream), String> = HashMap::new();

  manager
    .run_director_with_intercept(|name, event, deliver| {
      let report = reports.entry(name.to_string()).or_default();
      match &event {
        ProcessEvent::Output { stream, .. } => {
          let text = event.text().unwrap_or_default();
          match stream {
            OutputStream::Stdout => report.stdout.push_str(&text),
            OutputStream::Stderr => report.stderr.push_str(&text),
          }
          if !output.is_json() {
            let pending = partial.entry((name.to_string(), *stream)).or_default();
            pending.push_str(&text);
            while let Some(end) = pending.find('\n') {
              let line: String = pending.drain(..=end).collect();
              print_line(name, *stream, line.trim_end_matches(['\r', '\n']));
            }
          }
        }
        ProcessEvent::Exited(status) => {
          report.success = status.success();
          report.exit_code = status.code();
          if !output.is_json() {
            for stream in [OutputStream::Stdout, OutputStream::Stderr] {
              if let Some(rest) = partial.remove(&(name.to_string(), stream)) {
                if !rest.is_empty() {
                  print_line(name, stream, &rest);
                }
              }
            }
            if status.success() {
              print_success(&format!("{} exited with {}", name, status));
            } else {
              print_error(&format!("{} exited with {}", name, status));
            }
          }
        }
        ProcessEvent::Error(err) => {
          report.errors.push(err.to_string());
          if !output.is_json() {
            print_error(&format!("{}: {}", name, err));
          }
        }
      }
      deliver(event);
    })
    .await;

  let interrupted = if interrupt.is_finished() {
    interrupt.await.unwrap_or(false)
  } else {
    interrupt.abort();
    false
  };
  for pump in pumps {
    pump.await.context("Process task panicked")?;
  }

  Ok((reports, interrupted))
}

fn print_line(name: &str, stream: OutputStream, line: &str) {
  match stream {
    OutputStream::Stdout => println!("{} | {}", name, line),
    OutputStream::Stderr => eprintln!("{} | {}", name, line),
  }
}
