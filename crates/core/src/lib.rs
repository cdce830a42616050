//! Core utilities for the trowel crates: canonical source-name manipulation,
//! deterministic filesystem helpers, Solidity source analysis and
//! package-`exports` subpath resolution.
//!
//! Nothing in this crate knows about packages or remappings; it is the leaf
//! layer the resolver crates build on.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

pub mod analyzer;

mod error;
pub use error::IoError;

pub mod exports;

pub mod fs;

pub mod source_name;
