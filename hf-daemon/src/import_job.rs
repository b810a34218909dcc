//! Import job manager.
//!
//! Translates a file on disk into a native profile, optionally validating the mapped PWMs
//! against live hardware before the caller commits it. Unlike detection, several imports may be
//! in flight (and waiting on a commit) at once, so jobs are keyed by id rather than singleton.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use hf_core::{Control, Curve, CurvePoint, Inventory, MixCombinator, Profile, SensorSource};
use hf_error::{HyperfanError, Result};

use crate::detect_job::JobState;

const CANCEL_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub validate: bool,
    #[serde(default)]
    pub rpm_threshold: Option<u32>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

struct ImportJobRecord {
    id: String,
    source_path: String,
    target_name: String,
    state: JobState,
    percent: u8,
    message: String,
    error: Option<String>,
    profile: Option<Profile>,
    cancel: Arc<AtomicBool>,
}

#[derive(Debug, Serialize)]
pub struct ImportStatusDto {
    pub id: String,
    pub source_path: String,
    pub target_name: String,
    pub state: JobState,
    pub percent: u8,
    pub message: String,
    pub error: Option<String>,
}

fn status_dto(record: &ImportJobRecord) -> ImportStatusDto {
    ImportStatusDto {
        id: record.id.clone(),
        source_path: record.source_path.clone(),
        target_name: record.target_name.clone(),
        state: record.state,
        percent: record.percent,
        message: record.message.clone(),
        error: record.error.clone(),
    }
}

pub struct ImportJobManager {
    jobs: Arc<Mutex<HashMap<String, ImportJobRecord>>>,
    next_id: AtomicU64,
}

impl ImportJobManager {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Queue an import job. `inventory` is a priming snapshot used only if `validate` is set.
    pub fn create(&self, request: ImportRequest, inventory: Inventory) -> String {
        let id = format!("import-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let cancel = Arc::new(AtomicBool::new(false));
        {
            let mut jobs = self.jobs.lock();
            jobs.insert(
                id.clone(),
                ImportJobRecord {
                    id: id.clone(),
                    source_path: request.path.clone(),
                    target_name: request.name.clone(),
                    state: JobState::Pending,
                    percent: 0,
                    message: "queued".into(),
                    error: None,
                    profile: None,
                    cancel: cancel.clone(),
                },
            );
        }

        let jobs = self.jobs.clone();
        let job_id = id.clone();
        thread::spawn(move || run_import(jobs, job_id, request, inventory, cancel));

        id
    }

    pub fn status(&self, id: &str) -> Result<ImportStatusDto> {
        let jobs = self.jobs.lock();
        let record = jobs
            .get(id)
            .ok_or_else(|| HyperfanError::JobNotFound(id.to_string()))?;
        Ok(status_dto(record))
    }

    pub fn list(&self) -> Vec<ImportStatusDto> {
        let jobs = self.jobs.lock();
        jobs.values().map(status_dto).collect()
    }

    pub fn cancel(&self, id: &str) -> Result<()> {
        let mut jobs = self.jobs.lock();
        let record = jobs
            .get_mut(id)
            .ok_or_else(|| HyperfanError::JobNotFound(id.to_string()))?;
        match record.state {
            JobState::Pending | JobState::Running => {
                record.cancel.store(true, Ordering::SeqCst);
                record.state = JobState::Error;
                record.error = Some("canceled".into());
                Ok(())
            }
            JobState::Done | JobState::Error => {
                Err(HyperfanError::JobConflict(format!("job {id} already finished")))
            }
        }
    }

    /// Remove a finished job and hand its profile to `apply`, which is expected to persist and
    /// activate it. The job is removed whether or not `apply` succeeds.
    pub fn commit(&self, id: &str, apply: impl FnOnce(Profile) -> Result<()>) -> Result<()> {
        let profile = {
            let mut jobs = self.jobs.lock();
            let record = jobs
                .get(id)
                .ok_or_else(|| HyperfanError::JobNotFound(id.to_string()))?;
            if record.state != JobState::Done {
                return Err(HyperfanError::JobConflict(format!(
                    "job {id} is not done (state {:?})",
                    record.state
                )));
            }
            let profile = record.profile.clone().ok_or_else(|| {
                HyperfanError::JobConflict(format!("job {id} has no produced profile"))
            })?;
            jobs.remove(id);
            profile
        };
        apply(profile)
    }
}

impl Default for ImportJobManager {
    fn default() -> Self {
        Self::new()
    }
}

fn run_import(
    jobs: Arc<Mutex<HashMap<String, ImportJobRecord>>>,
    id: String,
    request: ImportRequest,
    inventory: Inventory,
    cancel: Arc<AtomicBool>,
) {
    set_progress(&jobs, &id, JobState::Running, 10, "reading file");

    let outcome = (|| -> Result<Profile> {
        let contents = std::fs::read_to_string(&request.path).map_err(|e| HyperfanError::FileRead {
            path: request.path.clone().into(),
            source: e,
        })?;
        let value: serde_json::Value = serde_json::from_str(&contents)?;

        set_progress(&jobs, &id, JobState::Running, 40, "translating profile");
        if cancel.load(Ordering::SeqCst) {
            return Err(HyperfanError::Canceled("canceled".into()));
        }
        let mut profile = translate(value, &request.name)?;
        profile.name = request.name.clone();

        if request.validate {
            set_progress(&jobs, &id, JobState::Running, 70, "validating mapped PWMs");
            validate_mapped_pwms(&profile, &inventory, &request, &cancel)?;
        }

        Ok(profile)
    })();

    let mut jobs_guard = jobs.lock();
    if let Some(record) = jobs_guard.get_mut(&id) {
        // A concurrent cancel() may already have moved the job to Error; don't clobber it.
        if record.state == JobState::Running {
            match outcome {
                Ok(profile) => {
                    record.profile = Some(profile);
                    record.state = JobState::Done;
                    record.percent = 100;
                    record.message = "done".into();
                }
                Err(e) => {
                    record.state = JobState::Error;
                    record.error = Some(e.to_string());
                }
            }
        }
    }
}

fn set_progress(
    jobs: &Arc<Mutex<HashMap<String, ImportJobRecord>>>,
    id: &str,
    state: JobState,
    percent: u8,
    message: &str,
) {
    let mut guard = jobs.lock();
    if let Some(record) = guard.get_mut(id) {
        record.state = state;
        record.percent = percent;
        record.message = message.to_string();
    }
}

/// Classify and translate the parsed JSON document into the native profile model. A document
/// that already matches the native schema parses directly; anything else is assumed to be the
/// older flat `fan_curves` export shape this codebase's importable format predates.
fn translate(value: serde_json::Value, fallback_name: &str) -> Result<Profile> {
    if value.get("schema").is_some() && value.get("curves").is_some() {
        let profile: Profile = serde_json::from_value(value)?;
        return Ok(profile);
    }
    translate_legacy(&value, fallback_name)
}

#[derive(Debug, Deserialize)]
struct LegacyDocument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    fan_curves: Vec<LegacyFanCurve>,
}

#[derive(Debug, Deserialize)]
struct LegacyFanCurve {
    pwm_path: String,
    points: Vec<(f32, f32)>,
    #[serde(default)]
    sensor: Option<String>,
}

fn translate_legacy(value: &serde_json::Value, fallback_name: &str) -> Result<Profile> {
    let doc: LegacyDocument = serde_json::from_value(value.clone()).map_err(|e| {
        HyperfanError::Generic(format!("unrecognized profile import format: {e}"))
    })?;

    let mut profile = Profile::empty(doc.name.unwrap_or_else(|| fallback_name.to_string()));
    let mut curve_names = Vec::new();

    for (index, fan_curve) in doc.fan_curves.iter().enumerate() {
        let curve_name = format!("imported_curve_{index}");
        let control_name = format!("imported_control_{index}");
        let source = SensorSource::Symbolic {
            id: fan_curve.sensor.clone().unwrap_or_else(|| "cpu_temp".to_string()),
        };
        let points: Vec<CurvePoint> = fan_curve
            .points
            .iter()
            .map(|&(temperature, fan_percent)| CurvePoint { temperature, fan_percent })
            .collect();
        profile.curves.insert(
            curve_name.clone(),
            Curve::Graph { points, sources: vec![source], smoothing_tau_ms: 0 },
        );
        profile.controls.push(Control {
            name: control_name,
            pwm_path: fan_curve.pwm_path.clone(),
            curve: curve_name.clone(),
            enabled: true,
            manual: false,
            manual_percent: 0.0,
            hidden: false,
            spin_up_percent: None,
            spin_up_dwell_ms: hf_core::constants::curve::DEFAULT_SPIN_UP_DWELL_MS,
        });
        curve_names.push(curve_name);
    }

    if curve_names.len() > 1 {
        profile.curves.insert(
            "imported_worst_case".to_string(),
            Curve::Mix { curves: curve_names, combinator: MixCombinator::Max },
        );
    }

    Ok(profile)
}

/// Drive each mapped PWM to maximum duty and confirm a responsive fan crosses
/// `rpm_threshold` within `timeout_ms`, then restore its captured enable mode/duty.
fn validate_mapped_pwms(
    profile: &Profile,
    inventory: &Inventory,
    request: &ImportRequest,
    cancel: &AtomicBool,
) -> Result<()> {
    use hf_core::hw::control as hwctl;

    let threshold = request
        .rpm_threshold
        .unwrap_or(hf_core::constants::import_job::DEFAULT_VALIDATE_RPM_THRESHOLD);
    let timeout = Duration::from_millis(
        request
            .timeout_ms
            .unwrap_or(hf_core::constants::import_job::DEFAULT_VALIDATE_TIMEOUT_MS),
    );

    for control in &profile.controls {
        let Some(pwm) = inventory.find_pwm(&control.pwm_path) else { continue };
        let fans = inventory.fans_on_same_chip(&control.pwm_path);
        if fans.is_empty() {
            continue;
        }

        let captured_mode = hwctl::read_pwm_enable(&pwm.enable_path);
        let captured_duty = hwctl::read_pwm_value(&pwm.pwm_path).ok();

        hwctl::write_pwm_enable(&pwm.enable_path, hf_core::constants::pwm::enable::MANUAL)?;
        hwctl::set_pwm_raw(&pwm.pwm_path, pwm.max_raw)?;

        let mut waited = Duration::ZERO;
        let mut crossed = false;
        while waited < timeout {
            if cancel.load(Ordering::SeqCst) {
                restore(pwm, captured_mode, captured_duty);
                return Err(HyperfanError::Canceled("canceled".into()));
            }
            thread::sleep(CANCEL_POLL);
            waited += CANCEL_POLL;
            if fans
                .iter()
                .any(|f| f.input_path.exists() && hwctl::read_fan_rpm(&f.input_path).map(|r| r >= threshold).unwrap_or(false))
            {
                crossed = true;
                break;
            }
        }

        restore(pwm, captured_mode, captured_duty);

        if !crossed {
            return Err(HyperfanError::Generic(format!(
                "control {} did not cross RPM threshold {} within {:?}",
                control.name, threshold, timeout
            )));
        }
    }
    Ok(())
}

fn restore(pwm: &hf_core::PwmController, captured_mode: Option<u8>, captured_duty: Option<u8>) {
    use hf_core::hw::control as hwctl;
    if let Some(mode) = captured_mode {
        let _ = hwctl::write_pwm_enable(&pwm.enable_path, mode);
    }
    if let Some(duty) = captured_duty {
        let _ = hwctl::set_pwm_value(&pwm.pwm_path, duty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn wait_for_terminal(manager: &ImportJobManager, id: &str) -> ImportStatusDto {
        for _ in 0..200 {
            let status = manager.status(id).unwrap();
            if matches!(status.state, JobState::Done | JobState::Error) {
                return status;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("import job {id} never reached a terminal state");
    }

    #[test]
    fn translate_legacy_builds_one_control_per_fan_curve() {
        let doc = serde_json::json!({
            "name": "legacy",
            "fan_curves": [
                {"pwm_path": "/sys/class/hwmon/hwmon0/pwm1", "points": [[30.0, 20.0], [80.0, 100.0]], "sensor": "cpu_temp"},
                {"pwm_path": "/sys/class/hwmon/hwmon0/pwm2", "points": [[30.0, 20.0], [80.0, 100.0]]},
            ],
        });
        let profile = translate(doc, "fallback").unwrap();
        assert_eq!(profile.name, "legacy");
        assert_eq!(profile.controls.len(), 2);
        assert!(profile.curves.contains_key("imported_worst_case"));
    }

    #[test]
    fn translate_native_profile_passes_through() {
        let doc = serde_json::json!({
            "name": "native",
            "schema": 1,
            "tool_version": "test",
            "curves": {},
            "controls": [],
            "captured_chips": [],
        });
        let profile = translate(doc, "fallback").unwrap();
        assert_eq!(profile.name, "native");
    }

    #[test]
    fn import_job_round_trips_to_done_and_commits() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("legacy.json");
        std::fs::write(
            &source,
            serde_json::json!({
                "name": "ignored",
                "fan_curves": [
                    {"pwm_path": "/sys/class/hwmon/hwmon0/pwm1", "points": [[30.0, 20.0], [80.0, 100.0]]},
                ],
            })
            .to_string(),
        )
        .unwrap();

        let manager = ImportJobManager::new();
        let request = ImportRequest {
            path: source.to_string_lossy().to_string(),
            name: "imported".to_string(),
            validate: false,
            rpm_threshold: None,
            timeout_ms: None,
        };
        let id = manager.create(request, Inventory::default());
        let status = wait_for_terminal(&manager, &id);
        assert_eq!(status.state, JobState::Done);

        let mut committed_name = String::new();
        manager
            .commit(&id, |profile| {
                committed_name = profile.name.clone();
                Ok(())
            })
            .unwrap();
        assert_eq!(committed_name, "imported");
        assert!(manager.status(&id).is_err(), "commit should remove the job");
    }

    #[test]
    fn import_job_missing_file_ends_in_error() {
        let manager = ImportJobManager::new();
        let request = ImportRequest {
            path: "/nonexistent/path/does-not-exist.json".to_string(),
            name: "imported".to_string(),
            validate: false,
            rpm_threshold: None,
            timeout_ms: None,
        };
        let id = manager.create(request, Inventory::default());
        let status = wait_for_terminal(&manager, &id);
        assert_eq!(status.state, JobState::Error);
        assert!(status.error.is_some());
    }

    #[test]
    fn cancel_before_completion_marks_job_canceled() {
        // Insert a still-running job record directly rather than going through `create()`,
        // which spawns a background thread that could race `cancel()` on a fast-failing import.
        let manager = ImportJobManager::new();
        let id = "import-test".to_string();
        manager.jobs.lock().insert(
            id.clone(),
            ImportJobRecord {
                id: id.clone(),
                source_path: "/nonexistent".into(),
                target_name: "imported".into(),
                state: JobState::Running,
                percent: 40,
                message: "translating profile".into(),
                error: None,
                profile: None,
                cancel: Arc::new(AtomicBool::new(false)),
            },
        );

        manager.cancel(&id).unwrap();
        let status = manager.status(&id).unwrap();
        assert_eq!(status.state, JobState::Error);
        assert_eq!(status.error.as_deref(), Some("canceled"));
        assert!(manager.cancel(&id).is_err(), "cancel on an already-finished job should fail");
    }
}
