//! Detection job manager.
//!
//! Only one detection pass may run at a time - `start()` returns a conflict error if one is
//! already pending or running. The pass itself runs on its own OS thread since
//! [`hf_core::run_detection`] is a blocking, cooperatively-cancellable walk full of
//! `thread::sleep` calls; running it on a tokio worker would starve the runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use serde::Serialize;

use hf_core::{DetectionOutcome, DetectionProgress, Inventory};
use hf_error::{HyperfanError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Done,
    Error,
}

struct DetectionJobRecord {
    state: JobState,
    progress: DetectionProgress,
    outcome: Option<DetectionOutcome>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DetectionStatusDto {
    pub state: JobState,
    pub percent: u8,
    pub stage: String,
    pub message: String,
    pub error: Option<String>,
}

pub struct DetectionJobManager {
    record: Arc<Mutex<Option<DetectionJobRecord>>>,
    cancel: Arc<AtomicBool>,
}

impl DetectionJobManager {
    pub fn new() -> Self {
        Self {
            record: Arc::new(Mutex::new(None)),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Begin a detection pass over `inventory` (a priming snapshot handed in by the caller so
    /// the job doesn't force its own re-scan). Fails with `JobConflict` if one is already active.
    pub fn start(&self, inventory: Inventory) -> Result<()> {
        {
            let mut guard = self.record.lock();
            if let Some(existing) = guard.as_ref() {
                if existing.state == JobState::Pending || existing.state == JobState::Running {
                    return Err(HyperfanError::JobConflict(
                        "detection already in progress".into(),
                    ));
                }
            }
            *guard = Some(DetectionJobRecord {
                state: JobState::Pending,
                progress: DetectionProgress { percent: 0, stage: "pending".into(), message: String::new() },
                outcome: None,
                error: None,
            });
        }
        self.cancel.store(false, Ordering::SeqCst);

        let record = self.record.clone();
        let cancel = self.cancel.clone();
        thread::spawn(move || {
            {
                let mut guard = record.lock();
                if let Some(r) = guard.as_mut() {
                    r.state = JobState::Running;
                }
            }
            let record_for_progress = record.clone();
            let result = hf_core::run_detection(&inventory, &cancel, move |progress| {
                let mut guard = record_for_progress.lock();
                if let Some(r) = guard.as_mut() {
                    r.progress = progress;
                }
            });
            let mut guard = record.lock();
            if let Some(r) = guard.as_mut() {
                match result {
                    Ok(outcome) => {
                        r.state = JobState::Done;
                        r.outcome = Some(outcome);
                    }
                    Err(e) => {
                        r.state = JobState::Error;
                        r.error = Some(e.to_string());
                    }
                }
            }
        });
        Ok(())
    }

    pub fn status(&self) -> Result<DetectionStatusDto> {
        let guard = self.record.lock();
        let record = guard
            .as_ref()
            .ok_or_else(|| HyperfanError::JobNotFound("no detection has been run".into()))?;
        Ok(DetectionStatusDto {
            state: record.state,
            percent: record.progress.percent,
            stage: record.progress.stage.clone(),
            message: record.progress.message.clone(),
            error: record.error.clone(),
        })
    }

    pub fn abort(&self) -> Result<()> {
        let guard = self.record.lock();
        let record = guard
            .as_ref()
            .ok_or_else(|| HyperfanError::JobNotFound("no detection has been run".into()))?;
        if record.state != JobState::Pending && record.state != JobState::Running {
            return Err(HyperfanError::JobNotFound("no detection in progress".into()));
        }
        self.cancel.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn results(&self) -> Result<DetectionOutcome> {
        let guard = self.record.lock();
        let record = guard
            .as_ref()
            .ok_or_else(|| HyperfanError::JobNotFound("no detection has been run".into()))?;
        match record.state {
            JobState::Done => Ok(record.outcome.clone().expect("done implies outcome set")),
            JobState::Error => Err(HyperfanError::JobNotFound(
                record.error.clone().unwrap_or_else(|| "detection failed".into()),
            )),
            JobState::Pending | JobState::Running => {
                Err(HyperfanError::JobConflict("detection still in progress".into()))
            }
        }
    }
}

impl Default for DetectionJobManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn wait_for_terminal(manager: &DetectionJobManager) -> DetectionStatusDto {
        for _ in 0..200 {
            let status = manager.status().unwrap();
            if matches!(status.state, JobState::Done | JobState::Error) {
                return status;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("detection job never reached a terminal state");
    }

    #[test]
    fn status_before_any_run_is_not_found() {
        let manager = DetectionJobManager::new();
        assert!(manager.status().is_err());
        assert!(manager.abort().is_err());
        assert!(manager.results().is_err());
    }

    #[test]
    fn empty_inventory_ends_in_error() {
        let manager = DetectionJobManager::new();
        manager.start(Inventory::default()).unwrap();
        let status = wait_for_terminal(&manager);
        assert_eq!(status.state, JobState::Error);
        assert!(manager.results().is_err());
    }

    #[test]
    fn starting_twice_while_active_is_a_conflict() {
        let manager = DetectionJobManager::new();
        // Insert a still-running record directly so the conflict check doesn't race the
        // background thread's near-instant failure on an empty inventory.
        *manager.record.lock() = Some(DetectionJobRecord {
            state: JobState::Running,
            progress: DetectionProgress { percent: 10, stage: "probe".into(), message: String::new() },
            outcome: None,
            error: None,
        });
        assert!(manager.start(Inventory::default()).is_err());
    }
}
