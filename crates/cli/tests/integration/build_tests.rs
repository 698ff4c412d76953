use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn build_writes_artifact_and_metadata() {
  let env = TestEnv::project(r#"echo "$GREETING $PROCMAN_BUILD_INPUTS" > "$out/result""#);

  env
    .procman_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Build complete!"));

  let result = std::fs::read_to_string(env.out_path().join("result")).unwrap();
  assert_eq!(result, "hi openssl\n");

  let metadata: serde_json::Value =
    serde_json::from_str(&std::fs::read_to_string(env.out_path().join("package.json")).unwrap()).unwrap();
  assert_eq!(metadata["name"], "demo");
  assert_eq!(metadata["version"], "1.2.3");
  assert_eq!(metadata["description"], "A demo package");
}

#[test]
fn build_honors_out_flag() {
  let env = TestEnv::project(r#"touch "$out/marker""#);
  let out = env.root_path().join("elsewhere");

  env.procman_cmd().arg("build").arg("--out").arg(&out).assert().success();

  assert!(out.join("marker").exists());
  assert!(out.join("package.json").exists());
}

#[test]
fn build_json_prints_metadata() {
  let env = TestEnv::project("true");

  let output = env.procman_cmd().args(["build", "-o", "json"]).output().unwrap();
  assert!(output.status.success());

  let metadata: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(metadata["name"], "demo");
  assert!(metadata["built_for"].is_string());
}

#[test]
fn failing_build_exits_non_zero() {
  let env = TestEnv::project("exit 7");

  env
    .procman_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Some(7)"));
  assert!(!env.out_path().join("package.json").exists());
}

#[test]
fn tampered_lock_stops_build_before_it_runs() {
  let env = TestEnv::project(r#"touch "$out/ran""#);
  env.write_file("Cargo.lock", "# lock\nversion = 4\n");

  env
    .procman_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("lock hash mismatch"));
  assert!(!env.out_path().join("ran").exists());
}
