//! Maven side of a prerelease
//!
//! - **pom**: effective pom model plus version/scm rewriting of the staged pom
//! - **changes**: release stamping of `src/changes/changes.xml`
//! - **runner**: `mvn` invocation behind the `BuildRunner` trait
//! - **deploy**: publishing collected artifacts behind the `Deployer` trait

pub mod changes;
pub mod deploy;
pub mod pom;
pub mod runner;

/// Name of the repository the build deploys into while staging
pub const STAGING_REPOSITORY_ID: &str = "prerelease";
