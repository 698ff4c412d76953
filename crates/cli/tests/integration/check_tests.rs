use predicates::prelude::*;

use super::common::{BASE_REV, TestEnv};

#[test]
fn check_verifies_pins() {
  let env = TestEnv::project("true");

  env
    .procman_cmd()
    .arg("check")
    .assert()
    .success()
    .stdout(predicate::str::contains("demo 1.2.3 is ready to build"))
    .stdout(predicate::str::contains(BASE_REV))
    .stdout(predicate::str::contains("sh →"));
}

#[test]
fn check_json_output_is_valid() {
  let env = TestEnv::project("true");

  let output = env.procman_cmd().args(["check", "-o", "json"]).output().unwrap();
  assert!(output.status.success());

  let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(plan["name"], "demo");
  assert_eq!(plan["build_inputs"], serde_json::json!(["openssl"]));
  assert_eq!(plan["fingerprint"].as_str().map(str::len), Some(20));
}

#[test]
fn check_is_deterministic() {
  let env = TestEnv::project("true");

  let first = env.procman_cmd().args(["check", "-o", "json"]).output().unwrap();
  let second = env.procman_cmd().args(["check", "-o", "json"]).output().unwrap();

  assert!(first.status.success());
  assert_eq!(first.stdout, second.stdout);
}

#[test]
fn check_accepts_explicit_descriptor_path() {
  let env = TestEnv::project("true");
  let other = TestEnv::empty();

  other
    .procman_cmd()
    .arg("check")
    .arg(env.root_path().join("procman.toml"))
    .env("PROCMAN_CACHE_DIR", env.cache_path())
    .assert()
    .success();
}

#[test]
fn check_rejects_tampered_base() {
  let env = TestEnv::project("true");
  env.write_file(&format!("mirror/{}.tar.gz", BASE_REV), "tampered");

  env
    .procman_cmd()
    .arg("check")
    .assert()
    .failure()
    .stderr(predicate::str::contains("hash mismatch"));
}

#[test]
fn check_rejects_unsupported_platform() {
  let env = TestEnv::project("true");
  let descriptor = env.descriptor("true").replace(
    "licenses = [\"MIT\"]",
    "licenses = [\"MIT\"]\nplatforms = [\"x86_64-windows\"]",
  );
  env.write_file("procman.toml", &descriptor);

  env
    .procman_cmd()
    .arg("check")
    .assert()
    .failure()
    .stderr(predicate::str::contains("is not supported"));
  assert!(!env.cache_path().exists());
}

#[test]
fn check_reports_missing_descriptor() {
  let env = TestEnv::empty();

  env
    .procman_cmd()
    .arg("check")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to load"));
}

#[test]
fn explicit_cache_dir_needs_no_home() {
  let env = TestEnv::project("true");
  let cache = env.root_path().join("explicit-cache");

  env
    .procman_cmd()
    .env_remove("HOME")
    .env_remove("XDG_CACHE_HOME")
    .env_remove("PROCMAN_CACHE_DIR")
    .arg("check")
    .arg("--cache-dir")
    .arg(&cache)
    .assert()
    .success();
  assert!(cache.exists());
}
