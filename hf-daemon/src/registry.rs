//! Command registry.
//!
//! Every RPC method the daemon understands is matched here by name and turned into a
//! `serde_json::Value` payload or a `HyperfanError` (mapped to a wire error code by the
//! transport via [`HyperfanError::rpc_code`]). Handlers are synchronous: the state they touch
//! is either a brief `parking_lot` lock or a small, local filesystem operation under
//! `profilesPath`, never a long-running scan - detection and import are pushed onto their own
//! job managers precisely so this dispatch path never blocks a connection for long.

use std::sync::atomic::Ordering;

use serde_json::{json, Value};

use hf_core::data::validate_profile;
use hf_error::{HyperfanError, Result};
use hf_protocol::{FanSensorDto, GpuSampleDto, PwmControlDto, TempSensorDto};

use crate::import_job::ImportRequest;
use crate::state::SharedState;

/// `(method name, one-line description)`, also the source of truth for `commands`/`help`.
pub const METHODS: &[(&str, &str)] = &[
    ("commands", "list every method this daemon understands"),
    ("help", "describe one method, or all methods if none given"),
    ("ping", "liveness check, replies \"pong\""),
    ("version", "daemon crate version"),
    ("config.get", "return the running configuration"),
    ("config.set", "merge fields into the running configuration"),
    ("config.save", "persist the running configuration to disk"),
    ("engine.enable", "turn on automatic control, capturing current PWM modes"),
    ("engine.disable", "turn off automatic control, restoring captured PWM modes"),
    ("engine.reset", "disable the engine and clear the active profile"),
    ("engine.status", "engine enabled state, tick cadence, and last-tick counters"),
    ("list.sensor", "list temperature sensors from the last inventory refresh"),
    ("list.fan", "list fan tachometers from the last inventory refresh"),
    ("list.pwm", "list PWM controllers from the last inventory refresh"),
    ("gpu.list", "list GPUs from the last GPU refresh"),
    ("gpu.setFan", "set a GPU fan's duty by controller id"),
    ("gpu.resetFanAuto", "return a GPU fan to its firmware automatic control"),
    ("detect.start", "begin a detection pass over the current inventory"),
    ("detect.status", "report progress of the most recent detection pass"),
    ("detect.abort", "cancel a detection pass in progress"),
    ("detect.results", "return the profile produced by a finished detection pass"),
    ("profile.list", "list profile names on disk"),
    ("profile.load", "read a profile from disk"),
    ("profile.save", "validate and write a profile to disk"),
    ("profile.delete", "remove a profile from disk"),
    ("profile.rename", "rename a profile on disk"),
    ("profile.getActive", "name of the profile currently driving the engine"),
    ("profile.setActive", "load a profile from disk and make it the engine's active profile"),
    ("profile.importAs", "start a job translating a foreign export into a native profile"),
    ("profile.importStatus", "report progress of one import job"),
    ("profile.importJobs", "list all import jobs"),
    ("profile.importCancel", "cancel an import job"),
    ("profile.importCommit", "persist a finished import job's profile and activate it"),
    ("telemetry.json", "return the same document published to shared memory"),
    ("daemon.shutdown", "request an orderly shutdown"),
    ("daemon.restart", "request an orderly restart"),
];

pub fn dispatch(state: &SharedState, method: &str, params: Option<Value>) -> Result<Value> {
    match method {
        "commands" => Ok(json!(METHODS.iter().map(|(name, _)| *name).collect::<Vec<_>>())),
        "help" => help(params),
        "ping" => Ok(json!("pong")),
        "version" => Ok(json!(env!("CARGO_PKG_VERSION"))),

        "config.get" => Ok(serde_json::to_value(&*state.config.read())?),
        "config.set" => config_set(state, params),
        "config.save" => config_save(state),

        "engine.enable" => {
            state.engine.lock().enable(true);
            Ok(json!({"enabled": true}))
        }
        "engine.disable" => {
            state.engine.lock().enable(false);
            Ok(json!({"enabled": false}))
        }
        "engine.reset" => engine_reset(state),
        "engine.status" => engine_status(state),

        "list.sensor" => list_sensors(state),
        "list.fan" => list_fans(state),
        "list.pwm" => list_pwms(state),

        "gpu.list" => gpu_list(state),
        "gpu.setFan" => gpu_set_fan(params),
        "gpu.resetFanAuto" => gpu_reset_fan_auto(params),

        "detect.start" => detect_start(state),
        "detect.status" => Ok(serde_json::to_value(state.detect_job.status()?)?),
        "detect.abort" => {
            state.detect_job.abort()?;
            Ok(json!({"aborted": true}))
        }
        "detect.results" => Ok(serde_json::to_value(state.detect_job.results()?)?),

        "profile.list" => profile_list(state),
        "profile.load" => profile_load(state, params),
        "profile.save" => profile_save(state, params),
        "profile.delete" => profile_delete(state, params),
        "profile.rename" => profile_rename(state, params),
        "profile.getActive" => Ok(json!(state.engine.lock().profile().name.clone())),
        "profile.setActive" => profile_set_active(state, params),
        "profile.importAs" => profile_import_as(state, params),
        "profile.importStatus" => profile_import_status(state, params),
        "profile.importJobs" => Ok(serde_json::to_value(state.import_jobs.list())?),
        "profile.importCancel" => profile_import_cancel(state, params),
        "profile.importCommit" => profile_import_commit(state, params),

        "telemetry.json" => telemetry_json(state),

        "daemon.shutdown" => {
            state.shutdown.store(true, Ordering::SeqCst);
            Ok(json!({"shuttingDown": true}))
        }
        "daemon.restart" => {
            state.shutdown.store(true, Ordering::SeqCst);
            state.restart_requested.store(true, Ordering::SeqCst);
            Ok(json!({"restarting": true}))
        }

        other => Err(HyperfanError::RpcMethodNotFound(other.to_string())),
    }
}

fn help(params: Option<Value>) -> Result<Value> {
    let wanted = params.as_ref().and_then(|p| p.get("method")).and_then(|v| v.as_str());
    match wanted {
        Some(name) => METHODS
            .iter()
            .find(|(method, _)| *method == name)
            .map(|(method, desc)| json!({"method": method, "description": desc}))
            .ok_or_else(|| HyperfanError::RpcMethodNotFound(name.to_string())),
        None => Ok(json!(METHODS
            .iter()
            .map(|(method, desc)| json!({"method": method, "description": desc}))
            .collect::<Vec<_>>())),
    }
}

fn require_params(params: Option<Value>) -> Result<Value> {
    params.ok_or_else(|| HyperfanError::RpcInvalidRequest("missing params".into()))
}

fn require_str<'a>(value: &'a Value, field: &str) -> Result<&'a str> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HyperfanError::RpcInvalidRequest(format!("missing or non-string field {field}")))
}

fn config_set(state: &SharedState, params: Option<Value>) -> Result<Value> {
    let patch = require_params(params)?;
    let Value::Object(patch_map) = patch else {
        return Err(HyperfanError::RpcInvalidRequest("params must be an object".into()));
    };
    let mut merged = serde_json::to_value(&*state.config.read())?;
    if let Value::Object(ref mut base_map) = merged {
        for (key, value) in patch_map {
            base_map.insert(key, value);
        }
    }
    let new_config: hf_core::DaemonConfig = serde_json::from_value(merged)?;
    *state.config.write() = new_config.clone();
    Ok(serde_json::to_value(new_config)?)
}

fn config_save(state: &SharedState) -> Result<Value> {
    let config = state.config.read().clone();
    let path = state
        .config_path
        .read()
        .clone()
        .unwrap_or_else(|| std::path::PathBuf::from("/etc/hyperfan/hyperfand.json"));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| HyperfanError::FileWrite { path: parent.to_path_buf(), source: e })?;
    }
    let json = serde_json::to_string_pretty(&config)?;
    std::fs::write(&path, json).map_err(|e| HyperfanError::FileWrite { path: path.clone(), source: e })?;
    Ok(json!({"path": path.to_string_lossy()}))
}

fn engine_reset(state: &SharedState) -> Result<Value> {
    let profile_name = state.config.read().profile_name.clone();
    let mut engine = state.engine.lock();
    engine.enable(false);
    engine.apply_profile(hf_core::Profile::empty(profile_name));
    Ok(json!({"enabled": false}))
}

fn engine_status(state: &SharedState) -> Result<Value> {
    let config = state.config.read();
    let engine = state.engine.lock();
    let stats = *state.last_tick_stats.lock();
    Ok(json!({
        "enabled": engine.is_enabled(),
        "tickMs": config.tick_ms,
        "forceTickMs": config.force_tick_ms,
        "deltaC": config.delta_c,
        "profile": engine.profile().name,
        "lastTick": stats,
    }))
}

fn list_sensors(state: &SharedState) -> Result<Value> {
    let inventory = state.inventory_snapshot.read();
    let dtos: Vec<TempSensorDto> = inventory
        .temps
        .iter()
        .map(|t| TempSensorDto {
            name: t.name.clone(),
            label: t.label.clone(),
            path: t.input_path.to_string_lossy().to_string(),
            celsius: t.current_temp,
        })
        .collect();
    Ok(serde_json::to_value(dtos)?)
}

fn list_fans(state: &SharedState) -> Result<Value> {
    let inventory = state.inventory_snapshot.read();
    let dtos: Vec<FanSensorDto> = inventory
        .fans
        .iter()
        .map(|f| FanSensorDto {
            name: f.name.clone(),
            label: f.label.clone(),
            path: f.input_path.to_string_lossy().to_string(),
            rpm: f.current_rpm,
        })
        .collect();
    Ok(serde_json::to_value(dtos)?)
}

fn list_pwms(state: &SharedState) -> Result<Value> {
    let inventory = state.inventory_snapshot.read();
    let dtos: Vec<PwmControlDto> = inventory
        .pwms
        .iter()
        .map(|p| PwmControlDto {
            name: p.name.clone(),
            path: p.pwm_path.to_string_lossy().to_string(),
            enable_path: p.enable_path.to_string_lossy().to_string(),
            duty_percent: p.current_percent,
            enable_mode: p.enable_mode,
        })
        .collect();
    Ok(serde_json::to_value(dtos)?)
}

fn gpu_list(state: &SharedState) -> Result<Value> {
    let snapshot = state.gpu_snapshot.read();
    let dtos: Vec<GpuSampleDto> = snapshot
        .as_ref()
        .map(|s| {
            s.gpus
                .iter()
                .map(|g| GpuSampleDto {
                    index: g.index,
                    name: g.name.clone(),
                    vendor: g.vendor.to_string(),
                    pci_bus_id: g.pci_bus_id.clone(),
                    temp_celsius: g.temperatures.first().and_then(|t| t.current_temp),
                    fan_percent: g.fans.first().and_then(|f| f.speed_percent),
                    fan_rpm: g.fans.first().and_then(|f| f.rpm),
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(serde_json::to_value(dtos)?)
}

fn gpu_set_fan(params: Option<Value>) -> Result<Value> {
    let params = require_params(params)?;
    let controller_id = require_str(&params, "controllerId")?;
    let percent = params
        .get("percent")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HyperfanError::RpcInvalidRequest("missing or non-numeric field percent".into()))?;
    hf_core::set_gpu_fan_speed_by_id(controller_id, percent as u32)?;
    Ok(json!({"controllerId": controller_id, "percent": percent}))
}

fn gpu_reset_fan_auto(params: Option<Value>) -> Result<Value> {
    let params = require_params(params)?;
    let controller_id = require_str(&params, "controllerId")?;
    let parts: Vec<&str> = controller_id.split(':').collect();
    if parts.len() != 3 {
        return Err(HyperfanError::RpcInvalidRequest("controllerId must be vendor:gpu_index:fan_index".into()));
    }
    let gpu_index: u32 = parts[1]
        .parse()
        .map_err(|_| HyperfanError::RpcInvalidRequest("invalid gpu index".into()))?;
    match parts[0] {
        "nvidia" => hf_core::reset_nvidia_fan_auto(gpu_index)?,
        "amd" => {
            let controllers = hf_core::enumerate_gpu_pwm_controllers();
            let controller = controllers
                .iter()
                .find(|c| c.id == controller_id)
                .ok_or_else(|| HyperfanError::HardwareNotFound(controller_id.to_string()))?;
            let chip_path = std::path::Path::new(&controller.pwm_path)
                .parent()
                .ok_or_else(|| HyperfanError::HardwareNotFound(controller_id.to_string()))?;
            hf_core::reset_amd_fan_auto(chip_path)?;
        }
        other => return Err(HyperfanError::NotSupported(format!("resetFanAuto for vendor {other}"))),
    }
    Ok(json!({"controllerId": controller_id}))
}

fn detect_start(state: &SharedState) -> Result<Value> {
    let inventory = state.inventory_snapshot.read().clone();
    state.detect_job.start(inventory)?;
    Ok(json!({"started": true}))
}

fn profile_list(state: &SharedState) -> Result<Value> {
    let dir = state.config.read().profiles_dir();
    Ok(serde_json::to_value(hf_core::list_profiles(&dir)?)?)
}

fn profile_load(state: &SharedState, params: Option<Value>) -> Result<Value> {
    let params = require_params(params)?;
    let name = require_str(&params, "name")?;
    let dir = state.config.read().profiles_dir();
    let profile = hf_core::load_profile(&dir, name)?;
    Ok(serde_json::to_value(profile)?)
}

fn profile_save(state: &SharedState, params: Option<Value>) -> Result<Value> {
    let params = require_params(params)?;
    let profile_value = params
        .get("profile")
        .cloned()
        .ok_or_else(|| HyperfanError::RpcInvalidRequest("missing field profile".into()))?;
    let profile: hf_core::Profile = serde_json::from_value(profile_value)?;
    validate_profile(&profile)?;
    let dir = state.config.read().profiles_dir();
    hf_core::save_profile(&dir, &profile)?;
    Ok(json!({"name": profile.name}))
}

fn profile_delete(state: &SharedState, params: Option<Value>) -> Result<Value> {
    let params = require_params(params)?;
    let name = require_str(&params, "name")?;
    let dir = state.config.read().profiles_dir();
    let deleted = hf_core::delete_profile(&dir, name)?;
    Ok(json!({"deleted": deleted}))
}

fn profile_rename(state: &SharedState, params: Option<Value>) -> Result<Value> {
    let params = require_params(params)?;
    let old_name = require_str(&params, "oldName")?;
    let new_name = require_str(&params, "newName")?;
    let dir = state.config.read().profiles_dir();
    hf_core::rename_profile(&dir, old_name, new_name)?;
    Ok(json!({"name": new_name}))
}

fn profile_set_active(state: &SharedState, params: Option<Value>) -> Result<Value> {
    let params = require_params(params)?;
    let name = require_str(&params, "name")?;
    let dir = state.config.read().profiles_dir();
    let profile = hf_core::load_profile(&dir, name)?;
    validate_profile(&profile)?;
    state.config.write().profile_name = profile.name.clone();
    state.engine.lock().apply_profile(profile);
    Ok(json!({"active": name}))
}

fn profile_import_as(state: &SharedState, params: Option<Value>) -> Result<Value> {
    let params = require_params(params)?;
    let request: ImportRequest = serde_json::from_value(params)?;
    let inventory = state.inventory_snapshot.read().clone();
    let job_id = state.import_jobs.create(request, inventory);
    Ok(json!({"jobId": job_id}))
}

fn profile_import_status(state: &SharedState, params: Option<Value>) -> Result<Value> {
    let params = require_params(params)?;
    let job_id = require_str(&params, "jobId")?;
    Ok(serde_json::to_value(state.import_jobs.status(job_id)?)?)
}

fn profile_import_cancel(state: &SharedState, params: Option<Value>) -> Result<Value> {
    let params = require_params(params)?;
    let job_id = require_str(&params, "jobId")?;
    state.import_jobs.cancel(job_id)?;
    Ok(json!({"canceled": true}))
}

fn profile_import_commit(state: &SharedState, params: Option<Value>) -> Result<Value> {
    let params = require_params(params)?;
    let job_id = require_str(&params, "jobId")?;
    let dir = state.config.read().profiles_dir();
    let mut activated_name = String::new();
    state.import_jobs.commit(job_id, |profile| {
        validate_profile(&profile)?;
        hf_core::save_profile(&dir, &profile)?;
        activated_name = profile.name.clone();
        state.config.write().profile_name = profile.name.clone();
        state.engine.lock().apply_profile(profile);
        Ok(())
    })?;
    Ok(json!({"active": activated_name}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DaemonState;
    use std::sync::Arc;

    fn test_state() -> (tempfile::TempDir, SharedState) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = hf_core::DaemonConfig::default();
        config.profiles_path = dir.path().to_string_lossy().to_string();
        (dir, Arc::new(DaemonState::new(config, None)))
    }

    fn sample_profile(name: &str) -> hf_core::Profile {
        let mut profile = hf_core::Profile::empty(name);
        profile.curves.insert(
            "cpu".into(),
            hf_core::Curve::Graph {
                points: vec![hf_core::CurvePoint { temperature: 30.0, fan_percent: 20.0 }],
                sources: vec![hf_core::SensorSource::Symbolic { id: "cpu_temp".into() }],
                smoothing_tau_ms: 0,
            },
        );
        profile.controls.push(hf_core::Control {
            name: "cpu_fan".into(),
            pwm_path: "/sys/class/hwmon/hwmon0/pwm1".into(),
            curve: "cpu".into(),
            enabled: true,
            manual: false,
            manual_percent: 0.0,
            hidden: false,
            spin_up_percent: None,
            spin_up_dwell_ms: 2000,
        });
        profile
    }

    #[test]
    fn commands_and_help_introspect_the_registry() {
        let (_dir, state) = test_state();
        let commands = dispatch(&state, "commands", None).unwrap();
        assert!(commands.as_array().unwrap().iter().any(|v| v == "ping"));

        let help_all = dispatch(&state, "help", None).unwrap();
        assert_eq!(help_all.as_array().unwrap().len(), METHODS.len());

        let help_one = dispatch(&state, "help", Some(json!({"method": "ping"}))).unwrap();
        assert_eq!(help_one["method"], "ping");

        assert!(dispatch(&state, "help", Some(json!({"method": "nope"}))).is_err());
    }

    #[test]
    fn ping_and_version() {
        let (_dir, state) = test_state();
        assert_eq!(dispatch(&state, "ping", None).unwrap(), json!("pong"));
        assert_eq!(dispatch(&state, "version", None).unwrap(), json!(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn unknown_method_is_method_not_found() {
        let (_dir, state) = test_state();
        let err = dispatch(&state, "nonexistent.method", None).unwrap_err();
        assert_eq!(err.rpc_code(), -32601);
    }

    #[test]
    fn engine_status_reports_defaults_before_enable() {
        let (_dir, state) = test_state();
        let status = dispatch(&state, "engine.status", None).unwrap();
        assert_eq!(status["enabled"], json!(false));
        assert_eq!(status["tickMs"], json!(hf_core::DaemonConfig::default().tick_ms));
    }

    #[test]
    fn profile_save_load_list_delete_round_trip() {
        let (_dir, state) = test_state();
        let profile = sample_profile("roundtrip");
        dispatch(&state, "profile.save", Some(json!({"profile": profile}))).unwrap();

        let listed = dispatch(&state, "profile.list", None).unwrap();
        assert_eq!(listed, json!(["roundtrip"]));

        let loaded = dispatch(&state, "profile.load", Some(json!({"name": "roundtrip"}))).unwrap();
        assert_eq!(loaded["name"], json!("roundtrip"));

        dispatch(&state, "profile.delete", Some(json!({"name": "roundtrip"}))).unwrap();
        let listed_after = dispatch(&state, "profile.list", None).unwrap();
        assert_eq!(listed_after, json!([]));
    }

    #[test]
    fn profile_set_active_drives_get_active() {
        let (_dir, state) = test_state();
        let profile = sample_profile("active-me");
        dispatch(&state, "profile.save", Some(json!({"profile": profile}))).unwrap();
        dispatch(&state, "profile.setActive", Some(json!({"name": "active-me"}))).unwrap();
        let active = dispatch(&state, "profile.getActive", None).unwrap();
        assert_eq!(active, json!("active-me"));
    }

    #[test]
    fn profile_load_missing_params_is_invalid_request() {
        let (_dir, state) = test_state();
        let err = dispatch(&state, "profile.load", None).unwrap_err();
        assert_eq!(err.rpc_code(), -32600);
    }

    #[test]
    fn config_set_merges_and_config_get_reflects_it() {
        let (_dir, state) = test_state();
        dispatch(&state, "config.set", Some(json!({"deltaC": 7.5}))).unwrap();
        let got = dispatch(&state, "config.get", None).unwrap();
        assert_eq!(got["deltaC"], json!(7.5));
    }

    #[test]
    fn engine_enable_then_disable_round_trips() {
        let (_dir, state) = test_state();
        dispatch(&state, "engine.enable", None).unwrap();
        assert!(dispatch(&state, "engine.status", None).unwrap()["enabled"].as_bool().unwrap());
        dispatch(&state, "engine.disable", None).unwrap();
        assert!(!dispatch(&state, "engine.status", None).unwrap()["enabled"].as_bool().unwrap());
    }

    #[test]
    fn telemetry_json_matches_the_published_document_shape() {
        let (_dir, state) = test_state();
        let rpc_doc = dispatch(&state, "telemetry.json", None).unwrap();
        assert!(rpc_doc["engineEnabled"].is_boolean());
        assert!(rpc_doc["hwmon"].is_array());
        assert!(rpc_doc["gpus"].is_array());
        assert!(rpc_doc["profile"]["name"].is_string());

        let engine = state.engine.lock();
        let inventory = state.inventory_snapshot.read();
        let gpu_snapshot = state.gpu_snapshot.read();
        let published = crate::telemetry::build_document(&engine, &inventory, gpu_snapshot.as_ref());
        assert_eq!(rpc_doc, serde_json::to_value(published).unwrap());
    }
}

/// Returns the same document the telemetry publisher serializes to shared memory, per §6 -
/// this handler is the pull counterpart to that push.
fn telemetry_json(state: &SharedState) -> Result<Value> {
    let engine = state.engine.lock();
    let inventory = state.inventory_snapshot.read();
    let gpu_snapshot = state.gpu_snapshot.read();
    let doc = crate::telemetry::build_document(&engine, &inventory, gpu_snapshot.as_ref());
    Ok(serde_json::to_value(doc)?)
}
