//! Data types, configuration, and validation modules
//!
//! Contains all core data structures and configuration management.

mod config;
mod persistence;
mod types;
mod validation;

pub use config::{expand_path, load_config, resolve_config_path, shm_leaf_name, DaemonConfig};
pub use types::{
    CapturedChip, Control, Curve, CurvePoint, FanSensor, HwmonChip, Inventory, MixCombinator,
    Profile, PwmController, SensorSource, TempSensor,
};

// Re-export GPU types from hf-gpu crate
pub use hf_gpu::{GpuDevice, GpuFan, GpuSnapshot, GpuTemperature, GpuVendor};
pub use persistence::{delete_profile, list_profiles, load_profile, rename_profile, save_profile};
pub use validation::{
    validate_curve, validate_curve_points, validate_fan_path, validate_file_size,
    validate_percentage, validate_profile, validate_pwm_path, validate_pwm_value,
    validate_sensor_name, validate_temp_path,
};
