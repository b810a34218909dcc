//! Shared daemon state.
//!
//! One `DaemonState` is constructed at startup and handed to every task as an `Arc`. The tick
//! task is the only writer of the engine's live view and of sysfs; RPC handlers reach the engine
//! only through `apply_profile`/`enable`/read-only status, matching the single-writer-lock
//! profile model and the double-buffered inventory snapshot described for this daemon.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use hf_core::engine::TickStats;
use hf_core::{DaemonConfig, Engine, GpuSnapshot, Inventory};

use crate::detect_job::DetectionJobManager;
use crate::import_job::ImportJobManager;

pub struct DaemonState {
    pub config: RwLock<DaemonConfig>,
    /// Where `config` was loaded from, if anywhere - `config.save` writes back here, falling
    /// back to the well-known system path when the daemon started from built-in defaults.
    pub config_path: RwLock<Option<PathBuf>>,
    /// The live engine. Locked briefly by the tick task once per tick and by RPC handlers for
    /// profile/enable mutations and status reads - never held across I/O.
    pub engine: Mutex<Engine>,
    /// Read-only copy of the inventory as of the last tick boundary, for handlers that list
    /// hwmon state without touching the tick task's live structures.
    pub inventory_snapshot: RwLock<Inventory>,
    pub gpu_snapshot: RwLock<Option<GpuSnapshot>>,
    pub last_tick_stats: Mutex<TickStats>,
    pub detect_job: DetectionJobManager,
    pub import_jobs: ImportJobManager,
    pub shutdown: AtomicBool,
    pub restart_requested: AtomicBool,
    pub started_at: Instant,
}

impl DaemonState {
    pub fn new(config: DaemonConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            config: RwLock::new(config),
            config_path: RwLock::new(config_path),
            engine: Mutex::new(Engine::new()),
            inventory_snapshot: RwLock::new(Inventory::default()),
            gpu_snapshot: RwLock::new(None),
            last_tick_stats: Mutex::new(TickStats::default()),
            detect_job: DetectionJobManager::new(),
            import_jobs: ImportJobManager::new(),
            shutdown: AtomicBool::new(false),
            restart_requested: AtomicBool::new(false),
            started_at: Instant::now(),
        }
    }
}

pub type SharedState = Arc<DaemonState>;
