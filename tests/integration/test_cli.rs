//! Configuration and error reporting

use crate::helpers::*;
use anyhow::Result;

#[test]
fn test_config_file_provides_storages() -> Result<()> {
  let storage = TestStorage::new(1)?;
  storage.add_prerelease(0, "org.example", "app", 10, "1.0.0")?;
  std::fs::write(
    storage.root.join("prerelease.toml"),
    format!("storages = [\"{}\"]\n", storage.tiers[0].display()),
  )?;

  let output = run_prerelease(&storage.root, &["list", "--json"])?;
  assert!(output.status.success());
  let entries: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  assert_eq!(entries.as_array().map(Vec::len), Some(1));
  Ok(())
}

#[test]
fn test_unreadable_config_exits_with_user_error() -> Result<()> {
  let storage = TestStorage::new(1)?;
  let output = run_prerelease(&storage.root, &["--config", "/nonexistent/prerelease.toml", "list"])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(String::from_utf8_lossy(&output.stderr).contains("/nonexistent/prerelease.toml"));
  Ok(())
}

#[test]
fn test_invalid_config_is_rejected() -> Result<()> {
  let storage = TestStorage::new(1)?;
  std::fs::write(storage.root.join("prerelease.toml"), "storages = [\"relative/path\"]\n")?;
  let output = run_prerelease(&storage.root, &["list"])?;
  assert_eq!(output.status.code(), Some(1));
  Ok(())
}

#[test]
fn test_status_outside_working_copy_fails() -> Result<()> {
  let storage = TestStorage::new(1)?;
  let output = storage.run_raw(&["status"])?;
  // no svn, or not a working copy: either way a failure, never a panic
  assert!(!output.status.success());
  assert_ne!(output.status.code(), Some(101));
  Ok(())
}
