//! Core data types for Hyperfan
//!
//! Two families of types live here:
//!
//! - the **inventory** tables (`HwmonChip`, `TempSensor`, `FanSensor`, `PwmController`) that
//!   mirror the kernel's hwmon layout, scanned once and refreshed in place;
//! - the **profile model** (`Curve`, `Control`, `Profile`) that a user edits and the engine
//!   evaluates every tick.
//!
//! Identity for inventory entries is `(chip path, file path)`; nothing here ever rebinds an
//! entry across a rescan, it is either refreshed or dropped.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

// ============================================================================
// Inventory: one entry per chip/temp/fan/pwm, identity = (chip path, file path)
// ============================================================================

/// A hwmon chip directory: a textual name plus a derived vendor string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HwmonChip {
    pub name: String,
    pub vendor: String,
    pub path: PathBuf,
}

/// A temperature input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempSensor {
    pub chip_path: PathBuf,
    pub chip_name: String,
    pub name: String,
    pub input_path: PathBuf,
    pub label: Option<String>,
    pub current_temp: Option<f32>,
}

/// A fan tachometer input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanSensor {
    pub chip_path: PathBuf,
    pub chip_name: String,
    pub name: String,
    pub input_path: PathBuf,
    pub label: Option<String>,
    pub current_rpm: Option<u32>,
}

/// A PWM output, with its enable mode and raw duty ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PwmController {
    pub chip_path: PathBuf,
    pub chip_name: String,
    pub name: String,
    pub pwm_path: PathBuf,
    pub enable_path: PathBuf,
    /// Raw duty ceiling read from the `pwmN_max` sibling file, 255 if absent.
    pub max_raw: u32,
    pub label: Option<String>,
    pub current_value: Option<u8>,
    pub current_percent: Option<f32>,
    pub enable_mode: Option<u8>,
}

/// The four semantic tables the inventory owns. `scan()` builds one from scratch;
/// `refresh_values` re-reads in place and drops entries whose file vanished.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub chips: Vec<HwmonChip>,
    pub temps: Vec<TempSensor>,
    pub fans: Vec<FanSensor>,
    pub pwms: Vec<PwmController>,
}

impl Inventory {
    pub fn find_pwm(&self, pwm_path: &str) -> Option<&PwmController> {
        self.pwms.iter().find(|p| p.pwm_path.to_string_lossy() == pwm_path)
    }

    pub fn find_pwm_mut(&mut self, pwm_path: &str) -> Option<&mut PwmController> {
        self.pwms.iter_mut().find(|p| p.pwm_path.to_string_lossy() == pwm_path)
    }

    /// Fan tachs that live on the same chip as the given PWM path.
    pub fn fans_on_same_chip(&self, pwm_path: &str) -> Vec<&FanSensor> {
        let chip = match self.find_pwm(pwm_path) {
            Some(p) => &p.chip_path,
            None => return Vec::new(),
        };
        self.fans.iter().filter(|f| &f.chip_path == chip).collect()
    }

    /// Resolve a curve's sensor source against the inventory. A direct path matches a
    /// temperature input path exactly; a symbolic id matches a temperature entry's name.
    pub fn resolve_source(&self, source: &SensorSource) -> Option<f32> {
        match source {
            SensorSource::Path { path } => self
                .temps
                .iter()
                .find(|t| t.input_path.to_string_lossy() == *path)
                .and_then(|t| t.current_temp),
            SensorSource::Symbolic { id } => self
                .temps
                .iter()
                .find(|t| &t.name == id)
                .and_then(|t| t.current_temp),
        }
    }
}

// ============================================================================
// Profile model: curves, controls, the aggregate profile
// ============================================================================

/// A point on a Graph curve: `(temperature in degrees C, duty in %)`.
///
/// `fan_percent` accepts either an integer or floating-point JSON number on read (older
/// exporters emitted whole-number percentages) but is always re-serialized as a float.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct CurvePoint {
    pub temperature: f32,
    pub fan_percent: f32,
}

impl<'de> Deserialize<'de> for CurvePoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            temperature: f32,
            fan_percent: serde_json::Value,
        }
        let raw = Raw::deserialize(deserializer)?;
        let fan_percent = raw
            .fan_percent
            .as_f64()
            .map(|v| v as f32)
            .ok_or_else(|| serde::de::Error::custom("fan_percent must be a number"))?;
        Ok(CurvePoint {
            temperature: raw.temperature,
            fan_percent,
        })
    }
}

/// A curve's temperature input: either a direct sysfs path or a symbolic inventory id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorSource {
    Path { path: String },
    Symbolic { id: String },
}

/// How a Mix curve combines its referenced curves' evaluated duties.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MixCombinator {
    Min,
    Avg,
    Max,
}

/// A named function from temperature to duty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Curve {
    /// Monotonic list of points, linearly interpolated and clamped at both ends.
    Graph {
        points: Vec<CurvePoint>,
        sources: Vec<SensorSource>,
        #[serde(default)]
        smoothing_tau_ms: u32,
    },
    /// Two-state switch with hysteresis between `idle_temperature` and `load_temperature`.
    Trigger {
        idle_temperature: f32,
        load_temperature: f32,
        idle_duty: f32,
        load_duty: f32,
        sources: Vec<SensorSource>,
        #[serde(default)]
        smoothing_tau_ms: u32,
    },
    /// Combines other curves, referenced by name, via `{min, avg, max}`.
    Mix {
        curves: Vec<String>,
        combinator: MixCombinator,
    },
}

impl Curve {
    pub fn sources(&self) -> &[SensorSource] {
        match self {
            Curve::Graph { sources, .. } | Curve::Trigger { sources, .. } => sources,
            Curve::Mix { .. } => &[],
        }
    }

    pub fn smoothing_tau_ms(&self) -> u32 {
        match self {
            Curve::Graph { smoothing_tau_ms, .. } | Curve::Trigger { smoothing_tau_ms, .. } => {
                *smoothing_tau_ms
            }
            Curve::Mix { .. } => 0,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_spin_up_dwell_ms() -> u32 {
    crate::constants::curve::DEFAULT_SPIN_UP_DWELL_MS
}

/// A named binding of a PWM output to a curve, plus engine-facing flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Control {
    pub name: String,
    pub pwm_path: String,
    pub curve: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub manual: bool,
    #[serde(default)]
    pub manual_percent: f32,
    #[serde(default)]
    pub hidden: bool,
    /// Hardware minimum spin-up duty percent; `None` disables spin-up correction.
    #[serde(default)]
    pub spin_up_percent: Option<f32>,
    /// Minimum time to hold the spin-up duty before easing back.
    #[serde(default = "default_spin_up_dwell_ms")]
    pub spin_up_dwell_ms: u32,
}

/// hwmon device metadata captured into a profile for display/reference purposes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CapturedChip {
    pub name: String,
    pub path: String,
}

fn default_schema() -> u32 {
    1
}

/// A named aggregate of curves, controls, and captured hwmon metadata. Profiles are value
/// types: loading one replaces the engine's active profile atomically at a tick boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub name: String,
    #[serde(default = "default_schema")]
    pub schema: u32,
    #[serde(default)]
    pub tool_version: String,
    #[serde(default)]
    pub curves: HashMap<String, Curve>,
    #[serde(default)]
    pub controls: Vec<Control>,
    #[serde(default)]
    pub captured_chips: Vec<CapturedChip>,
}

impl Profile {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: default_schema(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            curves: HashMap::new(),
            controls: Vec::new(),
            captured_chips: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_point_accepts_integer_percent() {
        let json = r#"{"temperature": 40.0, "fan_percent": 60}"#;
        let point: CurvePoint = serde_json::from_str(json).unwrap();
        assert_eq!(point.fan_percent, 60.0);
    }

    #[test]
    fn curve_point_accepts_float_percent() {
        let json = r#"{"temperature": 40.0, "fan_percent": 60.5}"#;
        let point: CurvePoint = serde_json::from_str(json).unwrap();
        assert_eq!(point.fan_percent, 60.5);
    }

    #[test]
    fn mix_combinator_round_trips() {
        let json = serde_json::to_string(&MixCombinator::Avg).unwrap();
        assert_eq!(json, "\"avg\"");
    }
}
