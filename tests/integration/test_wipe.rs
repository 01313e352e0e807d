//! Tests for the `wipe` command

use crate::helpers::*;
use anyhow::Result;

#[test]
fn test_wipe_keeps_newest() -> Result<()> {
  let storage = TestStorage::new(1)?;
  for revision in [10, 20, 30] {
    storage.add_prerelease(0, "org.example", "app", revision, "1.0.0")?;
  }

  storage.run(&["wipe", "--keep", "1"])?;

  let archive = storage.archive(0, "org.example", "app");
  assert!(archive.join("30").is_dir());
  assert!(!archive.join("20").exists());
  assert!(!archive.join("10").exists());
  // only the last staged target is still around
  let cause = std::fs::read_to_string(archive.join("REMOVE/CAUSE"))?;
  assert!(cause.starts_with("wiped"));
  // the lock was released
  assert!(!storage.lock_file(0, "org.example", "app").exists());
  Ok(())
}

#[test]
fn test_wipe_keep_zero_across_tiers() -> Result<()> {
  let storage = TestStorage::new(2)?;
  storage.add_prerelease(0, "org.example", "app", 20, "1.0.0")?;
  storage.add_prerelease(1, "org.example", "app", 10, "1.0.0")?;

  storage.run(&["wipe", "--keep", "0"])?;

  assert!(!storage.archive(0, "org.example", "app").join("20").exists());
  assert!(!storage.archive(1, "org.example", "app").join("10").exists());
  Ok(())
}

#[test]
fn test_wipe_skips_busy_archives() -> Result<()> {
  let storage = TestStorage::new(1)?;
  storage.add_prerelease(0, "org.example", "app", 10, "1.0.0")?;
  storage.add_prerelease(0, "org.example", "app", 20, "1.0.0")?;
  storage.add_prerelease(0, "org.example", "lib", 10, "1.0.0")?;
  storage.add_prerelease(0, "org.example", "lib", 20, "1.0.0")?;
  let pid = std::process::id().to_string();
  let lock = storage.add_lock(0, "org.example", "lib", &pid)?;

  let output = storage.run(&["wipe", "--keep", "1"])?;
  assert!(stdout(&output).contains("busy"));

  assert!(!storage.archive(0, "org.example", "app").join("10").exists());
  assert!(storage.archive(0, "org.example", "lib").join("10").is_dir());
  // a lock held by somebody else stays
  assert_eq!(std::fs::read_to_string(lock)?, pid);
  Ok(())
}
