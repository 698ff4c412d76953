use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn run_prefixes_output_with_process_name() {
  let env = TestEnv::empty();

  env
    .procman_cmd()
    .args(["run", "greeter=echo hello", "counter=printf '1\\n2\\n'"])
    .assert()
    .success()
    .stdout(predicate::str::contains("greeter | hello"))
    .stdout(predicate::str::contains("counter | 1"))
    .stdout(predicate::str::contains("counter | 2"));
}

#[test]
fn run_sends_stderr_lines_to_stderr() {
  let env = TestEnv::empty();

  env
    .procman_cmd()
    .args(["run", "noisy=echo warn >&2"])
    .assert()
    .success()
    .stderr(predicate::str::contains("noisy | warn"));
}

#[test]
fn run_prints_unterminated_last_line() {
  let env = TestEnv::empty();

  env
    .procman_cmd()
    .args(["run", "partial=printf done"])
    .assert()
    .success()
    .stdout(predicate::str::contains("partial | done"));
}

#[test]
fn run_fails_when_any_process_fails() {
  let env = TestEnv::empty();

  env
    .procman_cmd()
    .args(["run", "ok=true", "broken=exit 2"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("1 process(es) failed: broken"));
}

#[test]
fn run_rejects_duplicate_names() {
  let env = TestEnv::empty();

  env
    .procman_cmd()
    .args(["run", "same=sleep 5", "same=true"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("already registered"));
}

#[test]
fn run_json_reports_each_process() {
  let env = TestEnv::empty();

  let output = env
    .procman_cmd()
    .args(["run", "-o", "json", "--poll-interval", "50ms", "a=echo one", "b=exit 3"])
    .output()
    .unwrap();
  assert!(!output.status.success());

  let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(reports["a"]["success"], true);
  assert_eq!(reports["a"]["stdout"], "one\n");
  assert_eq!(reports["b"]["success"], false);
  assert_eq!(reports["b"]["exit_code"], 3);
}
