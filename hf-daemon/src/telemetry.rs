//! Telemetry publisher.
//!
//! Serializes a snapshot `{engineEnabled, hwmon, gpus, profile}` and publishes it to a POSIX
//! shared-memory object so unprivileged readers (a GUI, a CLI) can poll state without an RPC
//! round trip. Publication is single-producer (the tick task): each publish writes the full
//! document into a staging shared-memory object, then renames that object over the published
//! name; readers see either the old complete document or the new one, never a partial write,
//! because the published name is never mutated in place.
//!
//! When `shm_open` fails (sandboxed container, restrictive `/dev/shm`), publication falls back
//! to a plain file at the unmodified configured `shmPath`.

use std::ffi::CString;
use std::io::Write;

use serde::Serialize;
use tracing::{debug, warn};

use hf_core::data::{GpuSnapshot, Inventory};
use hf_core::Engine;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TelemetryDoc {
    engine_enabled: bool,
    hwmon: Vec<TelemetryChip>,
    gpus: Vec<GpuSampleDoc>,
    profile: TelemetryProfile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TelemetryChip {
    name: String,
    path: String,
    temperatures: Vec<TelemetryTemp>,
    fans: Vec<TelemetryFan>,
    pwms: Vec<TelemetryPwm>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TelemetryTemp {
    name: String,
    label: Option<String>,
    celsius: Option<f32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TelemetryFan {
    name: String,
    label: Option<String>,
    rpm: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TelemetryPwm {
    name: String,
    duty_percent: Option<f32>,
    enable_mode: Option<u8>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GpuSampleDoc {
    index: u32,
    name: String,
    vendor: String,
    pci_bus_id: Option<String>,
    temp_celsius: Option<f32>,
    fan_percent: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TelemetryProfile {
    name: String,
    control_count: usize,
    curve_count: usize,
}

pub(crate) fn build_document(engine: &Engine, inventory: &Inventory, gpus: Option<&GpuSnapshot>) -> TelemetryDoc {
    let hwmon = inventory
        .chips
        .iter()
        .map(|chip| TelemetryChip {
            name: chip.name.clone(),
            path: chip.path.to_string_lossy().to_string(),
            temperatures: inventory
                .temps
                .iter()
                .filter(|t| t.chip_path == chip.path)
                .map(|t| TelemetryTemp { name: t.name.clone(), label: t.label.clone(), celsius: t.current_temp })
                .collect(),
            fans: inventory
                .fans
                .iter()
                .filter(|f| f.chip_path == chip.path)
                .map(|f| TelemetryFan { name: f.name.clone(), label: f.label.clone(), rpm: f.current_rpm })
                .collect(),
            pwms: inventory
                .pwms
                .iter()
                .filter(|p| p.chip_path == chip.path)
                .map(|p| TelemetryPwm {
                    name: p.name.clone(),
                    duty_percent: p.current_percent,
                    enable_mode: p.enable_mode,
                })
                .collect(),
        })
        .collect();

    let gpu_docs = gpus
        .map(|snapshot| {
            snapshot
                .gpus
                .iter()
                .map(|g| GpuSampleDoc {
                    index: g.index,
                    name: g.name.clone(),
                    vendor: g.vendor.to_string(),
                    pci_bus_id: g.pci_bus_id.clone(),
                    temp_celsius: g.temperatures.first().and_then(|t| t.current_temp),
                    fan_percent: g.fans.first().and_then(|f| f.speed_percent),
                })
                .collect()
        })
        .unwrap_or_default();

    let profile = engine.profile();
    TelemetryDoc {
        engine_enabled: engine.is_enabled(),
        hwmon,
        gpus: gpu_docs,
        profile: TelemetryProfile {
            name: profile.name.clone(),
            control_count: profile.controls.len(),
            curve_count: profile.curves.len(),
        },
    }
}

pub struct TelemetryPublisher {
    shm_name: CString,
    fallback_path: std::path::PathBuf,
    shm_available: bool,
}

impl TelemetryPublisher {
    /// `leaf_name` is the derived POSIX shared-memory object name (see
    /// [`hf_core::data::shm_leaf_name`]); `fallback_path` is the unmodified configured `shmPath`,
    /// used verbatim - not basenamed, not relocated under `/tmp` - when shm creation fails.
    pub fn new(leaf_name: &str, fallback_path: std::path::PathBuf) -> Self {
        let shm_name = CString::new(leaf_name).unwrap_or_else(|_| CString::new("/hyperfand").unwrap());
        Self {
            shm_name,
            fallback_path,
            shm_available: true,
        }
    }

    pub fn publish(&mut self, engine: &Engine, inventory: &Inventory, gpus: Option<&GpuSnapshot>) {
        let doc = build_document(engine, inventory, gpus);
        let bytes = match serde_json::to_vec(&doc) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "failed to serialize telemetry document");
                return;
            }
        };

        if self.shm_available {
            if let Err(e) = self.publish_shm(&bytes) {
                warn!(error = %e, "shared-memory telemetry publish failed, falling back to file");
                self.shm_available = false;
            } else {
                return;
            }
        }
        if let Err(e) = self.publish_file(&bytes) {
            warn!(error = %e, "file-fallback telemetry publish failed");
        }
    }

    /// Writes into a staging shared-memory object, then renames it over the published name so
    /// a reader that has the published name open only ever sees a complete document - never
    /// this write in progress. POSIX shared memory on Linux is backed by tmpfs files under
    /// `/dev/shm`, so a plain rename gives the same old-or-new atomicity a file publish would.
    ///
    /// SAFETY: every libc call below operates on parameters we constructed ourselves (a
    /// null-terminated name, a length derived from `bytes.len()`, standard mmap flags) and the
    /// mapped pointer is unmapped before returning in every path, including on write failure.
    fn publish_shm(&self, bytes: &[u8]) -> std::io::Result<()> {
        let leaf = self.shm_name.to_string_lossy();
        let staging_name = CString::new(format!("{leaf}.staging-{}", std::process::id()))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        unsafe {
            let fd = libc::shm_open(staging_name.as_ptr(), libc::O_CREAT | libc::O_RDWR, 0o644);
            if fd < 0 {
                return Err(std::io::Error::last_os_error());
            }
            let len = bytes.len() as libc::size_t;
            let result = (|| -> std::io::Result<()> {
                if libc::ftruncate(fd, len as libc::off_t) != 0 {
                    return Err(std::io::Error::last_os_error());
                }
                let addr = libc::mmap(
                    std::ptr::null_mut(),
                    len,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_SHARED,
                    fd,
                    0,
                );
                if addr == libc::MAP_FAILED {
                    return Err(std::io::Error::last_os_error());
                }
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), addr as *mut u8, bytes.len());
                libc::munmap(addr, len);
                Ok(())
            })();
            libc::close(fd);
            if let Err(e) = result {
                libc::shm_unlink(staging_name.as_ptr());
                return Err(e);
            }
        }

        let shm_dir = std::path::Path::new("/dev/shm");
        let staging_path = shm_dir.join(staging_name.to_string_lossy().trim_start_matches('/'));
        let published_path = shm_dir.join(leaf.trim_start_matches('/'));
        std::fs::rename(&staging_path, &published_path)?;

        debug!(bytes = bytes.len(), "published telemetry to shared memory");
        Ok(())
    }

    fn publish_file(&self, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.fallback_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.fallback_path.with_extension("tmp");
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp, &self.fallback_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hf_core::Engine;

    #[test]
    fn document_always_has_engine_enabled_field() {
        let engine = Engine::new();
        let inventory = Inventory::default();
        let doc = build_document(&engine, &inventory, None);
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("engineEnabled").is_some());
        assert_eq!(value["engineEnabled"], serde_json::json!(false));
    }

    #[test]
    fn file_fallback_round_trips_through_a_rename() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("telemetry.json");
        let mut publisher = TelemetryPublisher::new("telemetry-test", fallback);
        publisher.shm_available = false;

        let engine = Engine::new();
        let inventory = Inventory::default();
        publisher.publish(&engine, &inventory, None);

        let contents = std::fs::read_to_string(&publisher.fallback_path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["engineEnabled"], serde_json::json!(false));
    }
}
