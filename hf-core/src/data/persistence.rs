//! JSON persistence for profiles
//!
//! One file per profile, named `<name>.json`, inside the configured profiles directory.
//! Writes go through a temp-file-then-rename so readers never observe a partially written
//! file.

use crate::data::Profile;
use crate::error::{HyperfanError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn profile_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.json"))
}

/// List the names of all profiles present in `dir`, sorted.
pub fn list_profiles(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| HyperfanError::FileRead {
        path: dir.to_path_buf(),
        source: e,
    })? {
        let entry = entry.map_err(|e| HyperfanError::FileRead {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Load a profile by name from `dir`.
pub fn load_profile(dir: &Path, name: &str) -> Result<Profile> {
    let path = profile_path(dir, name);
    if !path.exists() {
        return Err(HyperfanError::FileNotFound(path));
    }
    let contents = fs::read_to_string(&path).map_err(|e| HyperfanError::FileRead {
        path: path.clone(),
        source: e,
    })?;
    let profile: Profile = serde_json::from_str(&contents)?;
    Ok(profile)
}

/// Write `profile` to `<dir>/<profile.name>.json`, creating `dir` if necessary.
pub fn save_profile(dir: &Path, profile: &Profile) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| HyperfanError::FileWrite {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let path = profile_path(dir, &profile.name);
    let json = serde_json::to_string_pretty(profile)?;
    write_atomic(&path, json.as_bytes())?;
    debug!("saved profile {} to {:?}", profile.name, path);
    Ok(())
}

/// Delete a profile by name. Returns `false` if it did not exist.
pub fn delete_profile(dir: &Path, name: &str) -> Result<bool> {
    let path = profile_path(dir, name);
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(&path).map_err(|e| HyperfanError::FileWrite {
        path: path.clone(),
        source: e,
    })?;
    info!("deleted profile {}", name);
    Ok(true)
}

/// Rename a profile on disk, rewriting its internal `name` field too.
pub fn rename_profile(dir: &Path, old_name: &str, new_name: &str) -> Result<()> {
    let mut profile = load_profile(dir, old_name)?;
    profile.name = new_name.to_string();
    save_profile(dir, &profile)?;
    delete_profile(dir, old_name)?;
    Ok(())
}

/// Write `bytes` to `path` via a temp file in the same directory, fsync, then atomic rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("json.tmp");
    let mut file = fs::File::create(&temp_path).map_err(|e| HyperfanError::FileWrite {
        path: temp_path.clone(),
        source: e,
    })?;
    file.write_all(bytes).map_err(|e| HyperfanError::FileWrite {
        path: temp_path.clone(),
        source: e,
    })?;
    file.sync_all().map_err(|e| HyperfanError::FileWrite {
        path: temp_path.clone(),
        source: e,
    })?;
    drop(file);
    fs::rename(&temp_path, path).map_err(|e| HyperfanError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::{Control, Curve, CurvePoint, MixCombinator, SensorSource};
    use std::collections::HashMap;

    fn sample_profile(name: &str) -> Profile {
        let mut curves = HashMap::new();
        curves.insert(
            "cpu".to_string(),
            Curve::Graph {
                points: vec![
                    CurvePoint { temperature: 30.0, fan_percent: 20.0 },
                    CurvePoint { temperature: 80.0, fan_percent: 100.0 },
                ],
                sources: vec![SensorSource::Symbolic { id: "cpu_temp".to_string() }],
                smoothing_tau_ms: 0,
            },
        );
        Profile {
            name: name.to_string(),
            schema: 1,
            tool_version: "test".to_string(),
            curves,
            controls: vec![Control {
                name: "cpu_fan".to_string(),
                pwm_path: "/sys/class/hwmon/hwmon0/pwm1".to_string(),
                curve: "cpu".to_string(),
                enabled: true,
                manual: false,
                manual_percent: 0.0,
                hidden: false,
                spin_up_percent: None,
                spin_up_dwell_ms: 2000,
            }],
            captured_chips: Vec::new(),
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let profile = sample_profile("roundtrip");
        save_profile(dir.path(), &profile).unwrap();
        let loaded = load_profile(dir.path(), "roundtrip").unwrap();
        assert_eq!(loaded, profile);
    }

    #[test]
    fn list_profiles_sees_saved_names() {
        let dir = tempfile::tempdir().unwrap();
        save_profile(dir.path(), &sample_profile("alpha")).unwrap();
        save_profile(dir.path(), &sample_profile("beta")).unwrap();
        let names = list_profiles(dir.path()).unwrap();
        assert_eq!(names, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn delete_profile_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        save_profile(dir.path(), &sample_profile("gone")).unwrap();
        assert!(delete_profile(dir.path(), "gone").unwrap());
        assert!(!delete_profile(dir.path(), "gone").unwrap());
        assert!(load_profile(dir.path(), "gone").is_err());
    }

    #[test]
    fn rename_profile_moves_file_and_name_field() {
        let dir = tempfile::tempdir().unwrap();
        save_profile(dir.path(), &sample_profile("old")).unwrap();
        rename_profile(dir.path(), "old", "new").unwrap();
        assert!(load_profile(dir.path(), "old").is_err());
        let renamed = load_profile(dir.path(), "new").unwrap();
        assert_eq!(renamed.name, "new");
    }

    #[test]
    fn load_missing_profile_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_profile(dir.path(), "missing").is_err());
    }
}
