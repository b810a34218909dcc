//! Hardware interaction modules
//!
//! Contains all low-level hardware access for hwmon devices and GPUs.

pub mod control;
pub mod detection;
pub mod gpu;
pub mod hardware;

pub use control::{
    enable_manual_pwm, percent_to_raw, raw_to_percent, read_fan_rpm, read_pwm_enable,
    read_pwm_max, read_pwm_value, read_temperature, set_pwm_percent, set_pwm_raw, set_pwm_value,
    write_pwm_enable,
};
pub use detection::{heuristic_controls, run as run_detection, DetectionOutcome, DetectionProgress};
pub use gpu::{
    capture_gpu_snapshot, enumerate_gpu_pwm_controllers, enumerate_gpus, reset_amd_fan_auto,
    reset_nvidia_fan_auto, set_amd_fan_speed, set_gpu_fan_speed_by_id, set_nvidia_fan_speed,
    GpuPwmController,
};
pub use hardware::{check_pwm_permissions, refresh_values, scan};
