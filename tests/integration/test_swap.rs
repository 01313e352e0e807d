//! Tests for the `swap` command

use crate::helpers::*;
use anyhow::Result;

#[test]
fn test_swap_moves_old_prereleases_down() -> Result<()> {
  let storage = TestStorage::new(3)?;
  let old = storage.add_prerelease(0, "org.example", "app", 10, "1.0.0")?;
  age(&old, 10)?;
  storage.add_prerelease(0, "org.example", "app", 20, "1.1.0")?;

  let output = storage.run(&["swap", "--days", "5"])?;
  assert!(stdout(&output).contains("Swapped 1 prerelease(s)"));

  assert!(!old.exists());
  let moved = storage.archive(1, "org.example", "app").join("10");
  assert!(moved.join("prerelease.properties").is_file());
  // one tier per run
  assert!(!storage.archive(2, "org.example", "app").join("10").exists());
  assert!(storage.archive(0, "org.example", "app").join("20").is_dir());
  Ok(())
}

#[test]
fn test_swap_single_tier_is_a_no_op() -> Result<()> {
  let storage = TestStorage::new(1)?;
  let old = storage.add_prerelease(0, "org.example", "app", 10, "1.0.0")?;
  age(&old, 10)?;

  let output = storage.run(&["swap", "--days", "1"])?;
  assert!(stdout(&output).contains("nothing to swap"));
  assert!(old.is_dir());
  Ok(())
}

#[test]
fn test_swapped_prerelease_is_still_listed() -> Result<()> {
  let storage = TestStorage::new(2)?;
  let old = storage.add_prerelease(0, "org.example", "app", 10, "1.0.0")?;
  age(&old, 3)?;

  storage.run(&["swap", "--days", "2"])?;

  let output = storage.run(&["list", "--json"])?;
  let entries: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  assert_eq!(entries[0]["revision"], 10);
  assert_eq!(entries[0]["tier"], 1);
  Ok(())
}
