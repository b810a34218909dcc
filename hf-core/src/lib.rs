//! Hyperfan core library
//!
//! The pieces shared between the daemon and any client: hwmon scanning, the PWM/sensor
//! control primitives, the profile data model, the curve evaluation engine, and PWM-to-fan
//! detection.
//!
//! # Module structure
//!
//! - `hw/` - hwmon scanning, PWM/sensor read-write, GPU vendor bridging, detection
//! - `data/` - profile/curve/inventory types, config, persistence, validation
//! - `engine/` - the tick-time control loop
//! - `constants` - every tunable default and threshold in one place

pub mod constants;
pub mod data;
pub mod engine;
pub mod error;
pub mod hw;

pub use data::{
    validate_curve, validate_curve_points, validate_fan_path, validate_file_size,
    validate_percentage, validate_profile, validate_pwm_path, validate_pwm_value,
    validate_sensor_name, validate_temp_path,
};
pub use data::{delete_profile, list_profiles, load_profile, rename_profile, save_profile};
pub use data::{expand_path, load_config, resolve_config_path, shm_leaf_name, DaemonConfig};
pub use data::{
    CapturedChip, Control, Curve, CurvePoint, FanSensor, HwmonChip, Inventory, MixCombinator,
    Profile, PwmController, SensorSource, TempSensor,
};
pub use data::{GpuDevice, GpuFan, GpuSnapshot, GpuTemperature, GpuVendor};

pub use error::{HyperfanError, Result};

pub use engine::Engine;

pub use hw::{
    check_pwm_permissions, enable_manual_pwm, heuristic_controls, read_fan_rpm, read_temperature,
    run_detection, scan, set_pwm_percent, DetectionOutcome, DetectionProgress,
};
pub use hw::{
    capture_gpu_snapshot, enumerate_gpu_pwm_controllers, enumerate_gpus, reset_amd_fan_auto,
    reset_nvidia_fan_auto, set_amd_fan_speed, set_gpu_fan_speed_by_id, set_nvidia_fan_speed,
    GpuPwmController,
};
