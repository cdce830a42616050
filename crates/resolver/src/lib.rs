//! Resolution of npm-installed Solidity sources for compilation.
//!
//! This crate answers two questions for every Solidity file a compiler may
//! need inside an npm-style workspace: where the file lives on disk, and
//! which canonical, OS-independent source name identifies it, including
//! when the same physical package is reachable under several installation
//! names.
//!
//! The two central types are [`RemappedPackageMap`], which discovers the
//! installed package graph and resolves every `remappings.txt` against it,
//! and [`Resolver`], which classifies import strings, applies the best
//! matching remapping, validates paths on disk (existence and true casing)
//! and interns the resolved files.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

pub mod error;

mod map;
pub use map::{DependencyResolution, InstallationEdge, RemappedPackageMap};

mod package;
pub use package::{LOCAL_VERSION_SENTINEL, PROJECT_ROOT_SOURCE_NAME, Package};

pub mod remappings;

mod resolver;
pub use resolver::{FileContent, ResolvedFile, ResolvedImport, Resolver};
