/// Application name, used for cache and config directory names.
pub const APP_NAME: &str = "procman";

/// Default descriptor file name looked up in the working directory.
pub const DESCRIPTOR_FILENAME: &str = "procman.toml";

/// Environment variable that overrides the download cache location.
pub const CACHE_DIR_ENV: &str = "PROCMAN_CACHE_DIR";

/// Length of the truncated object hash used for fingerprints and cache keys.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// Largest chunk read from a child's stdout or stderr in one go.
pub const READ_CHUNK_SIZE: usize = 8192;

/// How long the director waits for an event before re-checking the process table.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

/// Name of the metadata file written into a build's output directory.
pub const PACKAGE_METADATA_FILENAME: &str = "package.json";

/// Variables the build sets itself; descriptors may not override them.
pub const OUT_ENV: &str = "out";
pub const BASE_ENV: &str = "PROCMAN_BASE";
pub const BUILD_INPUTS_ENV: &str = "PROCMAN_BUILD_INPUTS";
pub const RESERVED_ENV: &[&str] = &[OUT_ENV, BASE_ENV, BUILD_INPUTS_ENV];

/// How long a killed process's pipes are drained before they are abandoned.
pub const KILL_GRACE_MS: u64 = 100;
