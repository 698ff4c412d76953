//! Shared utilities.
//!
//! Content hashing used by descriptor pins, plus test helpers.

pub mod hash;
