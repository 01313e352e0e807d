//! Tests for the `list` command

use crate::helpers::*;
use anyhow::Result;

#[test]
fn test_list_empty_storage() -> Result<()> {
  let storage = TestStorage::new(1)?;
  let output = storage.run(&["list"])?;
  assert!(stdout(&output).contains("No prereleases."));
  Ok(())
}

#[test]
fn test_list_all_tiers() -> Result<()> {
  let storage = TestStorage::new(2)?;
  storage.add_prerelease(0, "org.example", "app", 120, "1.2.0")?;
  storage.add_prerelease(1, "org.example", "app", 100, "1.1.0")?;
  storage.add_prerelease(0, "org.example", "lib", 7, "3.0")?;
  storage.add_incomplete(0, "org.example", "lib", 9)?;

  let output = storage.run(&["list"])?;
  let text = stdout(&output);
  assert!(text.contains("org.example:app"));
  assert!(text.contains("1.2.0"));
  assert!(text.contains("1.1.0"));
  assert!(text.contains("(building)"));
  Ok(())
}

#[test]
fn test_list_json() -> Result<()> {
  let storage = TestStorage::new(2)?;
  storage.add_prerelease(1, "org.example", "app", 100, "1.1.0")?;
  storage.add_incomplete(0, "org.example", "app", 120)?;

  let output = storage.run(&["list", "--json"])?;
  let entries: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  let entries = entries.as_array().expect("array");
  assert_eq!(entries.len(), 2);

  let done = entries.iter().find(|e| e["revision"] == 100).expect("r100");
  assert_eq!(done["tier"], 1);
  assert_eq!(done["version"], "1.1.0");
  assert_eq!(done["tag"], "https://svn.example.org/repo/app/tags/app-1.1.0");
  assert_eq!(done["complete"], true);
  assert_eq!(done["project"]["group_id"], "org.example");

  let building = entries.iter().find(|e| e["revision"] == 120).expect("r120");
  assert_eq!(building["complete"], false);
  assert!(building["version"].is_null());
  Ok(())
}

#[test]
fn test_list_ignores_removed() -> Result<()> {
  let storage = TestStorage::new(1)?;
  storage.add_prerelease(0, "org.example", "app", 100, "1.1.0")?;
  let remove = storage.archive(0, "org.example", "app").join("REMOVE");
  std::fs::create_dir_all(&remove)?;
  std::fs::write(remove.join("CAUSE"), "replaced by 100")?;

  let output = storage.run(&["list", "--json"])?;
  let entries: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  assert_eq!(entries.as_array().map(Vec::len), Some(1));
  Ok(())
}
