//! Common test utilities for Scout integration tests
//!
//! This module provides a pipeline harness over the mock provider and an
//! in-memory store, plus a builder for on-disk log directories.

#![allow(dead_code)]

pub mod harness;
pub mod log_dir;

pub use harness::{case, minutes_after_epoch, Harness};
pub use log_dir::LogDir;
