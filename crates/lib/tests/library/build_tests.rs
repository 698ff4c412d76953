//! End-to-end descriptor evaluation and builds.

use std::fs;

use procman::build::{BuildError, PackageMetadata, build, prepare};
use procman::consts::PACKAGE_METADATA_FILENAME;
use procman::platform::Platform;
use procman::platform::arch::Arch;
use procman::platform::os::Os;
use procman::process::ProcessManager;

use super::common::{BASE_REV, OTHER_REV, Project, base_content};

const ARTIFACT_SCRIPT: &str =
  r#"echo "inputs=$PROCMAN_BUILD_INPUTS bootstrap=$RUSTC_BOOTSTRAP" > "$out/build.log" && asciidoctor && echo artifact > "$out/artifact""#;

#[tokio::test]
async fn evaluation_is_deterministic() {
  let project = Project::new(ARTIFACT_SCRIPT);
  let spec = project.spec();

  let first = prepare(&spec, &project.context()).await.unwrap();
  let second = prepare(&spec, &project.context()).await.unwrap();

  assert_eq!(first.base.sha256, second.base.sha256);
  assert_eq!(first.lock.sha256, second.lock.sha256);
  assert_eq!(first.fingerprint, second.fingerprint);
  assert_eq!(first, second);
}

#[tokio::test]
async fn plan_resolves_inputs_for_the_host() {
  let project = Project::new(ARTIFACT_SCRIPT);
  let spec = project.spec();

  let linux = prepare(&spec, &project.context()).await.unwrap();
  assert_eq!(linux.build_inputs, vec!["openssl"]);
  assert_eq!(linux.platform, "x86_64-linux");
  assert_eq!(linux.tools.get("asciidoctor"), Some(&project.tools_dir().join("asciidoctor")));

  let mut darwin_ctx = project.context();
  darwin_ctx.platform = Platform::new(Arch::Aarch64, Os::MacOs);
  let darwin = prepare(&spec, &darwin_ctx).await.unwrap();
  assert_eq!(darwin.build_inputs, vec!["openssl", "Security"]);
}

#[tokio::test]
async fn tampered_base_fails_before_building() {
  let project = Project::new(ARTIFACT_SCRIPT);
  fs::write(
    project.root().join("mirror").join(format!("{}.tar.gz", BASE_REV)),
    "tampered",
  )
  .unwrap();

  let err = prepare(&project.spec(), &project.context()).await.unwrap_err();

  assert!(matches!(err, BuildError::HashMismatch { .. }), "{err}");
  assert!(!project.out_dir().exists());
}

#[tokio::test]
async fn unsupported_platform_fails_before_fetching() {
  let project = Project::new(ARTIFACT_SCRIPT);
  let mut ctx = project.context();
  ctx.platform = Platform::new(Arch::Aarch64, Os::Windows);

  let err = prepare(&project.spec(), &ctx).await.unwrap_err();

  assert!(matches!(err, BuildError::UnsupportedPlatform { ref host, .. } if host == "aarch64-windows"));
  assert!(!project.cache_dir().exists());
}

#[tokio::test]
async fn bumped_revision_without_new_hash_fails() {
  let project = Project::new(ARTIFACT_SCRIPT);
  let mut spec = project.spec();
  spec.base.rev = OTHER_REV.to_string();

  let err = prepare(&spec, &project.context()).await.unwrap_err();
  assert!(matches!(err, BuildError::HashMismatch { .. }));

  // Pinning the new content makes the same revision acceptable.
  spec.base.sha256 = procman::util::hash::hash_bytes(base_content(OTHER_REV).as_bytes()).0;
  assert!(prepare(&spec, &project.context()).await.is_ok());
}

#[tokio::test]
async fn drifted_lock_file_fails() {
  let project = Project::new(ARTIFACT_SCRIPT);
  fs::write(project.root().join("Cargo.lock"), "# lock\nversion = 4\n").unwrap();

  let err = prepare(&project.spec(), &project.context()).await.unwrap_err();
  assert!(matches!(err, BuildError::LockHashMismatch { .. }));
}

#[tokio::test]
async fn missing_tool_fails_before_building() {
  let project = Project::new(ARTIFACT_SCRIPT);
  let mut spec = project.spec();
  spec.native_build_inputs.push("plantuml".to_string());

  let err = prepare(&spec, &project.context()).await.unwrap_err();
  assert!(matches!(err, BuildError::MissingTools(ref missing) if missing == &["plantuml"]));
}

#[tokio::test]
async fn build_runs_in_the_resolved_environment() {
  let project = Project::new(ARTIFACT_SCRIPT);
  let plan = prepare(&project.spec(), &project.context()).await.unwrap();

  let manager = ProcessManager::new();
  let outcome = build(&plan, &manager, &project.out_dir()).await.unwrap();

  assert_eq!(fs::read_to_string(project.out_dir().join("artifact")).unwrap(), "artifact\n");
  assert_eq!(
    fs::read_to_string(project.out_dir().join("build.log")).unwrap(),
    "inputs=openssl bootstrap=1\n"
  );

  let written: PackageMetadata =
    serde_json::from_str(&fs::read_to_string(project.out_dir().join(PACKAGE_METADATA_FILENAME)).unwrap()).unwrap();
  assert_eq!(written, outcome.metadata);
  assert_eq!(written.name, "procman");
  assert_eq!(written.description, "Hello, world!");
  assert_eq!(written.built_for, "x86_64-linux");
  assert_eq!(written.base_rev, BASE_REV);
  assert!(manager.is_empty());
}

#[tokio::test]
async fn descriptor_path_override_reaches_the_build() {
  let project = Project::new(r#"echo "$PATH" > "$out/path""#);
  let mut spec = project.spec();
  spec.env.insert("PATH".to_string(), "/opt/custom/bin".to_string());
  let plan = prepare(&spec, &project.context()).await.unwrap();

  build(&plan, &ProcessManager::new(), &project.out_dir()).await.unwrap();

  let path = fs::read_to_string(project.out_dir().join("path")).unwrap();
  let dirs: Vec<&str> = path.trim_end().split(':').collect();
  let tools_dir = project.tools_dir();
  assert_eq!(dirs[0], tools_dir.to_str().unwrap());
  assert_eq!(dirs[1], "/opt/custom/bin");
  assert!(dirs.len() > 2, "inherited PATH dropped: {path}");
}

#[tokio::test]
async fn failing_build_reports_exit_code() {
  let project = Project::new("echo compiling && exit 4");
  let plan = prepare(&project.spec(), &project.context()).await.unwrap();

  let err = build(&plan, &ProcessManager::new(), &project.out_dir()).await.unwrap_err();

  assert!(matches!(err, BuildError::BuildFailed { code: Some(4), .. }));
  assert!(!project.out_dir().join(PACKAGE_METADATA_FILENAME).exists());
}
