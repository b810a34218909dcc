//! hwmon inventory scanning
//!
//! # Sensor Types
//!
//! - **Temperature**: `tempN_input` files (millidegrees Celsius)
//! - **Fan**: `fanN_input` files (RPM)
//! - **PWM**: `pwmN` files (0-255, or 0-`pwmN_max` when present)
//!
//! `scan()` builds an `Inventory` from scratch by walking `/sys/class/hwmon`.
//! `refresh_values()` re-reads every entry already in an `Inventory` in place, dropping
//! entries whose backing file has disappeared (`NotFound`) without rediscovering anything -
//! a full `scan()` is the only way new hardware gets picked up.

use crate::error::Result;
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

use crate::constants::{paths, temperature};
use crate::data::{FanSensor, HwmonChip, Inventory, PwmController, TempSensor};
use crate::hw::control;

/// Scan `/sys/class/hwmon` and build a fresh inventory.
pub fn scan() -> Result<Inventory> {
    let hwmon_path = Path::new(paths::HWMON_BASE);
    let mut inventory = Inventory::default();

    if !hwmon_path.exists() || !hwmon_path.is_dir() {
        debug!("no hwmon interface at {:?}", hwmon_path);
        return Ok(inventory);
    }

    for entry in fs::read_dir(hwmon_path)? {
        let entry = entry?;
        let chip_path = entry.path();
        scan_chip(&chip_path, &mut inventory)?;
    }

    debug!(
        chips = inventory.chips.len(),
        temps = inventory.temps.len(),
        fans = inventory.fans.len(),
        pwms = inventory.pwms.len(),
        "hwmon scan complete"
    );
    Ok(inventory)
}

fn scan_chip(chip_path: &Path, inventory: &mut Inventory) -> Result<()> {
    let name_path = chip_path.join("name");
    let name = if name_path.exists() {
        fs::read_to_string(&name_path)?.trim().to_string()
    } else {
        chip_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    };

    let mut all_files = Vec::new();
    for entry in fs::read_dir(chip_path)? {
        let entry = entry?;
        all_files.push(entry.file_name().to_string_lossy().to_string());
    }

    let mut found_any = false;
    for file_name in &all_files {
        if file_name.starts_with("temp") && file_name.ends_with("_input") {
            inventory.temps.push(read_temp(chip_path, &name, file_name));
            found_any = true;
        } else if file_name.starts_with("fan") && file_name.ends_with("_input") {
            inventory.fans.push(read_fan(chip_path, &name, file_name));
            found_any = true;
        } else if file_name.starts_with("pwm") && !file_name.contains('_') {
            inventory.pwms.push(read_pwm(chip_path, &name, file_name));
            found_any = true;
        }
    }

    if found_any {
        inventory.chips.push(HwmonChip {
            vendor: name.clone(),
            name,
            path: chip_path.to_path_buf(),
        });
    } else {
        trace!(path = ?chip_path, "skipped hwmon directory with no sensors");
    }
    Ok(())
}

fn read_temp(chip_path: &Path, chip_name: &str, input_file: &str) -> TempSensor {
    let input_path = chip_path.join(input_file);
    let base_name = input_file.replace("_input", "");
    let label = read_label(chip_path, &base_name);
    let current_temp = fs::read_to_string(&input_path)
        .ok()
        .and_then(|s| s.trim().parse::<i32>().ok())
        .map(|md| md as f32 / temperature::MILLIDEGREE_DIVISOR);

    TempSensor {
        chip_path: chip_path.to_path_buf(),
        chip_name: chip_name.to_string(),
        name: base_name,
        input_path,
        label,
        current_temp,
    }
}

fn read_fan(chip_path: &Path, chip_name: &str, input_file: &str) -> FanSensor {
    let input_path = chip_path.join(input_file);
    let base_name = input_file.replace("_input", "");
    let label = read_label(chip_path, &base_name);
    let current_rpm = fs::read_to_string(&input_path)
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok());

    FanSensor {
        chip_path: chip_path.to_path_buf(),
        chip_name: chip_name.to_string(),
        name: base_name,
        input_path,
        label,
        current_rpm,
    }
}

fn read_pwm(chip_path: &Path, chip_name: &str, pwm_file: &str) -> PwmController {
    let pwm_path = chip_path.join(pwm_file);
    let enable_path = chip_path.join(format!("{}_enable", pwm_file));
    let label = read_label(chip_path, pwm_file);

    let current_value = fs::read_to_string(&pwm_path)
        .ok()
        .and_then(|s| s.trim().parse::<u8>().ok());
    let max_raw = control::read_pwm_max(&pwm_path);
    let current_percent = current_value.map(|v| control::raw_to_percent(v as u32, max_raw));
    let enable_mode = control::read_pwm_enable(&enable_path);

    PwmController {
        chip_path: chip_path.to_path_buf(),
        chip_name: chip_name.to_string(),
        name: pwm_file.to_string(),
        pwm_path,
        enable_path,
        max_raw,
        label,
        current_value,
        current_percent,
        enable_mode,
    }
}

fn read_label(chip_path: &Path, base_name: &str) -> Option<String> {
    let label_path = chip_path.join(format!("{}_label", base_name));
    if !label_path.exists() {
        return None;
    }
    fs::read_to_string(&label_path).ok().map(|s| s.trim().to_string())
}

/// Re-read every value already present in `inventory`, in place. An entry whose file has
/// disappeared (`NotFound`) is dropped; any other read error just leaves the prior value
/// untouched since it's assumed to be a transient glitch.
pub fn refresh_values(inventory: &mut Inventory) {
    inventory.temps.retain_mut(|t| match fs::read_to_string(&t.input_path) {
        Ok(s) => {
            if let Ok(md) = s.trim().parse::<i32>() {
                t.current_temp = Some(md as f32 / temperature::MILLIDEGREE_DIVISOR);
            }
            true
        }
        Err(e) => e.kind() != std::io::ErrorKind::NotFound,
    });

    inventory.fans.retain_mut(|f| match fs::read_to_string(&f.input_path) {
        Ok(s) => {
            if let Ok(rpm) = s.trim().parse::<u32>() {
                f.current_rpm = Some(rpm);
            }
            true
        }
        Err(e) => e.kind() != std::io::ErrorKind::NotFound,
    });

    inventory.pwms.retain_mut(|p| match fs::read_to_string(&p.pwm_path) {
        Ok(s) => {
            if let Ok(v) = s.trim().parse::<u8>() {
                p.current_value = Some(v);
                p.current_percent = Some(control::raw_to_percent(v as u32, p.max_raw));
            }
            p.enable_mode = control::read_pwm_enable(&p.enable_path);
            p.max_raw = control::read_pwm_max(&p.pwm_path);
            true
        }
        Err(e) => e.kind() != std::io::ErrorKind::NotFound,
    });
}

/// Check if we have write permissions to PWM controls (non-destructive)
pub fn check_pwm_permissions(inventory: &Inventory) -> bool {
    use std::fs::OpenOptions;

    for pwm in &inventory.pwms {
        if pwm.enable_path.exists() && OpenOptions::new().write(true).open(&pwm.enable_path).is_err() {
            return false;
        }
        if OpenOptions::new().write(true).open(&pwm.pwm_path).is_err() {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_drops_vanished_temp_entry() {
        let dir = tempfile::tempdir().unwrap();
        let temp_file = dir.path().join("temp1_input");
        std::fs::write(&temp_file, "45000").unwrap();

        let mut inventory = Inventory::default();
        inventory.temps.push(TempSensor {
            chip_path: dir.path().to_path_buf(),
            chip_name: "test".to_string(),
            name: "temp1".to_string(),
            input_path: temp_file.clone(),
            label: None,
            current_temp: None,
        });

        refresh_values(&mut inventory);
        assert_eq!(inventory.temps[0].current_temp, Some(45.0));

        std::fs::remove_file(&temp_file).unwrap();
        refresh_values(&mut inventory);
        assert!(inventory.temps.is_empty());
    }
}
