#[cfg(unix)]
mod build_tests;
#[cfg(unix)]
mod common;
