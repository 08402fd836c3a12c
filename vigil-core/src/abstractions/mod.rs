//! Trait abstractions that let the pipeline run against virtual time
//!
//! Every delay in the incident pipeline goes through [`time::Clock`], so tests
//! can drive the monitor, executor and verification loop deterministically.

pub mod time;

pub use time::*;
