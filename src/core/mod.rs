//! Core building blocks shared by all commands
//!
//! - **config**: prerelease.toml parsing and validation
//! - **context**: application context with the real collaborators
//! - **error**: error types with exit codes and contextual help
//! - **vcs**: Subversion access behind the `Scm` trait

pub mod config;
pub mod context;
pub mod error;
pub mod vcs;
