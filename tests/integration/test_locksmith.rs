//! Tests for the `locksmith` command

use crate::helpers::*;
use anyhow::Result;

#[test]
fn test_locksmith_reports_without_deleting() -> Result<()> {
  let storage = TestStorage::new(1)?;
  let dead = storage.add_lock(0, "org.example", "app", DEAD_PID)?;

  let output = storage.run(&["locksmith"])?;
  let text = stdout(&output);
  assert!(text.contains("1 stale"));
  assert!(text.contains("not running"));
  assert!(dead.exists());
  Ok(())
}

#[test]
fn test_locksmith_deletes_only_stale_locks() -> Result<()> {
  let storage = TestStorage::new(2)?;
  let dead = storage.add_lock(0, "org.example", "app", DEAD_PID)?;
  let alive = storage.add_lock(1, "org.example", "lib", &std::process::id().to_string())?;

  let output = storage.run(&["locksmith", "--delete"])?;
  assert!(stdout(&output).contains("2 lock(s), 1 stale"));

  assert!(!dead.exists());
  assert!(alive.exists());
  Ok(())
}

#[test]
fn test_stale_lock_no_longer_blocks_wipe() -> Result<()> {
  let storage = TestStorage::new(1)?;
  storage.add_prerelease(0, "org.example", "app", 10, "1.0.0")?;
  storage.add_prerelease(0, "org.example", "app", 20, "1.0.0")?;
  storage.add_lock(0, "org.example", "app", DEAD_PID)?;

  storage.run(&["wipe", "--keep", "1"])?;
  assert!(storage.archive(0, "org.example", "app").join("10").is_dir());

  storage.run(&["locksmith", "--delete"])?;
  storage.run(&["wipe", "--keep", "1"])?;
  assert!(!storage.archive(0, "org.example", "app").join("10").exists());
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_locksmith_ps_reads_short_start_column() -> Result<()> {
  use std::os::unix::fs::PermissionsExt;

  let storage = TestStorage::new(1)?;
  let dead = storage.add_lock(0, "org.example", "app", DEAD_PID)?;
  let alive = storage.add_lock(0, "org.example", "lib", "4711")?;

  // a ps without lstart, like BusyBox
  let ps = storage.root.join("fake-ps");
  std::fs::write(
    &ps,
    "#!/bin/sh\ncase \"$*\" in *lstart*) echo 'ps: bad -o argument' >&2; exit 1 ;; esac\necho '   1 Jan 1'\necho '4711 Jan 1'\n",
  )?;
  std::fs::set_permissions(&ps, std::fs::Permissions::from_mode(0o755))?;
  std::fs::write(
    storage.root.join("prerelease.toml"),
    format!("storages = [\"{}\"]\n\n[tools]\nps = \"{}\"\n", storage.tiers[0].display(), ps.display()),
  )?;

  let output = storage.run(&["locksmith", "--ps", "--delete"])?;
  assert!(stdout(&output).contains("2 lock(s), 1 stale"));
  assert!(!dead.exists());
  assert!(alive.exists());
  Ok(())
}
