//! Tick task.
//!
//! Owns the inventory refresh, GPU sampling, engine evaluation, and telemetry publication
//! cadences. Each runs on its own configured interval (`tickMs`, `hwmonRefreshMs`,
//! `gpuRefreshMs`) rather than being locked together, since a full hwmon/GPU rescan is far
//! more expensive than one curve evaluation pass and has no reason to run at the same rate.
//!
//! This task is the sole sysfs writer outside a running detection or import job; those jobs
//! borrow a priming inventory snapshot instead of racing this task for hardware access.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use hf_core::data::expand_path;
use hf_core::hw::refresh_values;
use hf_core::{capture_gpu_snapshot, scan};

use crate::state::DaemonState;
use crate::telemetry::TelemetryPublisher;

pub async fn run(state: Arc<DaemonState>) {
    let (tick_ms, hwmon_refresh_ms, gpu_refresh_ms, shm_leaf, shm_fallback_path) = {
        let config = state.config.read();
        (
            config.tick_ms,
            config.hwmon_refresh_ms,
            config.gpu_refresh_ms,
            config.shm_leaf_name(),
            std::path::PathBuf::from(expand_path(&config.shm_path)),
        )
    };

    match scan() {
        Ok(inventory) => {
            state.engine.lock().set_view(inventory.temps.clone(), inventory.fans.clone(), inventory.pwms.clone());
            *state.inventory_snapshot.write() = inventory;
        }
        Err(e) => warn!(error = %e, "initial hwmon scan failed"),
    }
    if let Ok(snapshot) = capture_gpu_snapshot() {
        *state.gpu_snapshot.write() = Some(snapshot);
    }

    let mut telemetry = TelemetryPublisher::new(&shm_leaf, shm_fallback_path);

    let mut tick_interval = tokio::time::interval(Duration::from_millis(tick_ms.max(1)));
    let mut hwmon_interval = tokio::time::interval(Duration::from_millis(hwmon_refresh_ms.max(1)));
    let mut gpu_interval = tokio::time::interval(Duration::from_millis(gpu_refresh_ms.max(1)));
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    hwmon_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    gpu_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        if state.shutdown.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }
        tokio::select! {
            _ = tick_interval.tick() => {
                let (delta_c, force_tick_ms) = {
                    let config = state.config.read();
                    (config.delta_c, config.force_tick_ms)
                };
                let (_, stats) = state.engine.lock().tick(delta_c, Duration::from_millis(force_tick_ms));
                *state.last_tick_stats.lock() = stats;
                if stats.write_errors > 0 {
                    debug!(errors = stats.write_errors, "tick produced write errors");
                }
                telemetry.publish(&state.engine.lock(), &state.inventory_snapshot.read(), state.gpu_snapshot.read().as_ref());
            }
            _ = hwmon_interval.tick() => {
                let mut inventory = state.inventory_snapshot.read().clone();
                refresh_values(&mut inventory);
                state.engine.lock().set_view(inventory.temps.clone(), inventory.fans.clone(), inventory.pwms.clone());
                *state.inventory_snapshot.write() = inventory;
            }
            _ = gpu_interval.tick() => {
                match capture_gpu_snapshot() {
                    Ok(snapshot) => *state.gpu_snapshot.write() = Some(snapshot),
                    Err(e) => debug!(error = %e, "GPU snapshot failed"),
                }
            }
        }
    }
}
