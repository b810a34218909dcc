//! PWM-to-fan detection
//!
//! For each PWM output, probes which fan tachs (if any) respond to it and walks a duty ramp
//! to build a starting curve. The whole procedure is cooperative: every sleep checks a
//! cancellation flag, so an RPC abort takes effect within one poll interval rather than at
//! the next PWM boundary.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::constants::{default_curve, detect_job, pwm as pwm_const, temperature};
use crate::data::{Control, Curve, CurvePoint, Inventory, MixCombinator, Profile, SensorSource};
use crate::error::{HyperfanError, Result};
use crate::hw::control as hwctl;

/// Emitted at each meaningful step so an RPC caller can render a progress bar.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DetectionProgress {
    pub percent: u8,
    pub stage: String,
    pub message: String,
}

/// What came out of a full detection pass.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionOutcome {
    pub profile: Profile,
    pub mapped_pwms: usize,
    pub mapped_temps: usize,
}

struct PwmProbeResult {
    chip_name: String,
    pwm_name: String,
    pwm_path: PathBuf,
    max_raw: u32,
    points: Vec<(f32, u32)>,
    usable: bool,
}

/// Sleep for `dur`, polling `cancel` every 50ms. Returns `false` if canceled before `dur`
/// elapsed, `true` if the sleep ran to completion.
fn cancellable_sleep(dur: Duration, cancel: &AtomicBool) -> bool {
    const POLL: Duration = Duration::from_millis(50);
    let mut remaining = dur;
    while remaining > Duration::ZERO {
        if cancel.load(Ordering::SeqCst) {
            return false;
        }
        let step = remaining.min(POLL);
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    !cancel.load(Ordering::SeqCst)
}

/// Restore a PWM's enable mode and raw duty, logging but not failing the whole pass on error.
fn restore(pwm_name: &str, enable_path: &std::path::Path, pwm_path: &std::path::Path, enable_mode: Option<u8>, duty: Option<u8>) {
    if let Some(mode) = enable_mode {
        if let Err(e) = hwctl::write_pwm_enable(enable_path, mode) {
            warn!(pwm = %pwm_name, error = %e, "failed to restore PWM enable mode after detection");
        }
    }
    if let Some(value) = duty {
        if let Err(e) = hwctl::set_pwm_value(pwm_path, value) {
            warn!(pwm = %pwm_name, error = %e, "failed to restore PWM duty after detection");
        }
    }
}

/// Force manual mode on a PWM, retrying up to `detect_job::MAX_PWM_TOGGLE_TRIES` times.
fn force_manual(enable_path: &std::path::Path) -> Result<()> {
    let mut last_err = None;
    for _ in 0..detect_job::MAX_PWM_TOGGLE_TRIES {
        match hwctl::write_pwm_enable(enable_path, pwm_const::enable::MANUAL) {
            Ok(()) => return Ok(()),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| HyperfanError::PwmWrite {
        path: enable_path.to_path_buf(),
        reason: "failed to force manual mode".into(),
    }))
}

/// Run the full detection pass over every PWM in `inventory`. Returns
/// `Err(HyperfanError::Canceled(_))` if `cancel` is set before completion; any PWM already
/// probed by that point is restored before the error propagates.
pub fn run(
    inventory: &Inventory,
    cancel: &AtomicBool,
    mut progress: impl FnMut(DetectionProgress),
) -> Result<DetectionOutcome> {
    if inventory.pwms.is_empty() {
        return Err(HyperfanError::HardwareNotFound(
            "no PWM controllers found on this system".into(),
        ));
    }

    progress(DetectionProgress {
        percent: 0,
        stage: "start".into(),
        message: format!("probing {} PWM controller(s)", inventory.pwms.len()),
    });

    let total = inventory.pwms.len();
    let mut results = Vec::with_capacity(total);

    for (index, pwm) in inventory.pwms.iter().enumerate() {
        let pwm_name = format!("{}/{}", pwm.chip_name, pwm.name);
        let base_percent = ((index * 100) / total) as u8;
        progress(DetectionProgress {
            percent: base_percent,
            stage: "probe".into(),
            message: format!("probing {pwm_name}"),
        });

        let captured_enable = hwctl::read_pwm_enable(&pwm.enable_path);
        let captured_duty = hwctl::read_pwm_value(&pwm.pwm_path).ok();

        let outcome = probe_one(pwm, inventory, cancel, &mut progress, base_percent, total);

        restore(&pwm_name, &pwm.enable_path, &pwm.pwm_path, captured_enable, captured_duty);

        match outcome {
            Ok(Some(result)) => results.push(result),
            Ok(None) => {
                debug!(pwm = %pwm_name, "no responsive fan found");
            }
            Err(e) => return Err(e),
        }
    }

    progress(DetectionProgress {
        percent: 100,
        stage: "done".into(),
        message: "detection complete".into(),
    });

    // Active probing found no PWM with a responsive tach at all (as opposed to some PWMs
    // probing as "unusable" - those still get a stock curve in `build_profile`). Fall back to
    // index-matched heuristic pairing so the caller gets a best-effort profile instead of an
    // empty one.
    let (profile, mapped_pwms) = if results.is_empty() {
        warn!("no PWM produced a responsive fan; falling back to index-matched heuristic pairing");
        let controls = heuristic_controls(inventory);
        let mapped = controls.len();
        (build_heuristic_profile(inventory, controls), mapped)
    } else {
        let mapped = results.iter().filter(|r| r.usable).count();
        (build_profile(&results, inventory), mapped)
    };
    let mapped_temps = if mapped_pwms > 0 { inventory.temps.len() } else { 0 };

    Ok(DetectionOutcome { profile, mapped_pwms, mapped_temps })
}

fn probe_one(
    pwm: &crate::data::PwmController,
    inventory: &Inventory,
    cancel: &AtomicBool,
    progress: &mut impl FnMut(DetectionProgress),
    base_percent: u8,
    total: usize,
) -> Result<Option<PwmProbeResult>> {
    let pwm_name = format!("{}/{}", pwm.chip_name, pwm.name);
    let fans = inventory.fans_on_same_chip(&pwm.pwm_path.to_string_lossy());
    if fans.is_empty() {
        return Ok(None);
    }

    force_manual(&pwm.enable_path)?;

    let start_raw = hwctl::percent_to_raw(detect_job::RAMP_START_PERCENT, pwm.max_raw);
    hwctl::set_pwm_raw(&pwm.pwm_path, start_raw)?;
    if !cancellable_sleep(Duration::from_millis(detect_job::SETTLE_MS), cancel) {
        return Err(HyperfanError::Canceled("detection canceled during settle".into()));
    }

    // Spin-up check: drive to 100% and poll for any responsive tach.
    hwctl::set_pwm_raw(&pwm.pwm_path, pwm.max_raw)?;
    let mut responsive: Vec<&str> = Vec::new();
    let mut waited = Duration::ZERO;
    let poll = Duration::from_millis(detect_job::SPINUP_POLL_MS);
    let deadline = Duration::from_millis(detect_job::SPINUP_CHECK_MS);
    while waited < deadline && responsive.is_empty() {
        if !cancellable_sleep(poll, cancel) {
            return Err(HyperfanError::Canceled("detection canceled during spin-up check".into()));
        }
        waited += poll;
        for fan in &fans {
            if let Ok(rpm) = hwctl::read_fan_rpm(&fan.input_path) {
                if rpm >= detect_job::MIN_VALID_RPM && !responsive.contains(&fan.name.as_str()) {
                    responsive.push(&fan.name);
                }
            }
        }
    }

    if responsive.is_empty() {
        return Ok(None);
    }
    info!(pwm = %pwm_name, fans = ?responsive, "PWM has responsive fan(s)");

    // Measure curve: walk the duty ramp, dwelling at each step and taking the peak RPM seen.
    let mut points = Vec::with_capacity(detect_job::RAMP_STEPS as usize + 1);
    let span = detect_job::RAMP_END_PERCENT - detect_job::RAMP_START_PERCENT;
    for step in 0..=detect_job::RAMP_STEPS {
        let fraction = step as f32 / detect_job::RAMP_STEPS as f32;
        let duty_percent = detect_job::RAMP_START_PERCENT + fraction * span;
        let raw = hwctl::percent_to_raw(duty_percent, pwm.max_raw);
        hwctl::set_pwm_raw(&pwm.pwm_path, raw)?;

        let denom = (total * (detect_job::RAMP_STEPS as usize + 1)).max(1);
        let step_percent = base_percent.saturating_add(((step as usize * 100) / denom) as u8);
        progress(DetectionProgress {
            percent: step_percent,
            stage: "measure".into(),
            message: format!("{pwm_name}: duty {duty_percent:.0}%"),
        });

        let mut peak_rpm = 0u32;
        let mut waited = Duration::ZERO;
        let sample = Duration::from_millis(detect_job::SPINUP_POLL_MS);
        let dwell = Duration::from_millis(detect_job::MODE_DWELL_MS);
        while waited < dwell {
            if !cancellable_sleep(sample, cancel) {
                return Err(HyperfanError::Canceled("detection canceled during measurement".into()));
            }
            waited += sample;
            for fan in &fans {
                if responsive.contains(&fan.name.as_str()) {
                    if let Ok(rpm) = hwctl::read_fan_rpm(&fan.input_path) {
                        peak_rpm = peak_rpm.max(rpm);
                    }
                }
            }
        }
        points.push((duty_percent, peak_rpm));
    }

    // Discard points from the bottom while they read below the valid-RPM floor.
    let first_valid = points.iter().position(|(_, rpm)| *rpm >= detect_job::MIN_VALID_RPM);
    let trimmed: Vec<(f32, u32)> = match first_valid {
        Some(idx) => points[idx..].to_vec(),
        None => Vec::new(),
    };
    let usable = trimmed.len() >= detect_job::MIN_VALID_POINTS;

    Ok(Some(PwmProbeResult {
        chip_name: pwm.chip_name.clone(),
        pwm_name: pwm.name.clone(),
        pwm_path: pwm.pwm_path.clone(),
        max_raw: pwm.max_raw,
        points: if usable { trimmed } else { Vec::new() },
        usable,
    }))
}

/// Build a synthesized profile from probe results. Each usable PWM gets its own Graph curve,
/// its measured duty values resampled onto a synthetic temperature axis spanning the
/// low-to-high thermal thresholds; unusable ones fall back to the stock "balanced" curve so
/// the control is still present and controllable, just without a derived response shape.
fn build_profile(results: &[PwmProbeResult], inventory: &Inventory) -> Profile {
    let mut profile = Profile::empty("detected");
    let sources: Vec<SensorSource> = inventory
        .temps
        .iter()
        .map(|t| SensorSource::Symbolic { id: t.name.clone() })
        .collect();

    for result in results {
        let curve_name = format!("{}_{}_curve", result.chip_name, result.pwm_name);
        let control_name = format!("{}_{}", result.chip_name, result.pwm_name);

        let points = if result.usable {
            resample_onto_temperature_axis(&result.points, result.max_raw)
        } else {
            default_curve::balanced()
        };

        profile.curves.insert(
            curve_name.clone(),
            Curve::Graph {
                points,
                sources: sources.clone(),
                smoothing_tau_ms: 0,
            },
        );
        profile.controls.push(Control {
            name: control_name,
            pwm_path: result.pwm_path.to_string_lossy().to_string(),
            curve: curve_name,
            enabled: true,
            manual: false,
            manual_percent: 0.0,
            hidden: false,
            spin_up_percent: None,
            spin_up_dwell_ms: crate::constants::curve::DEFAULT_SPIN_UP_DWELL_MS,
        });
    }

    if results.len() > 1 {
        let worst_case_name = "worst_case".to_string();
        profile.curves.insert(
            worst_case_name,
            Curve::Mix {
                curves: profile.curves.keys().cloned().collect(),
                combinator: MixCombinator::Max,
            },
        );
    }

    profile
}

/// Build a profile from a heuristic (non-probed) control list: one shared "balanced" curve
/// referencing every known temperature sensor, since there's no measured per-PWM response to
/// derive individual curves from.
fn build_heuristic_profile(inventory: &Inventory, controls: Vec<Control>) -> Profile {
    let mut profile = Profile::empty("detected");
    if controls.is_empty() {
        return profile;
    }
    let sources: Vec<SensorSource> = inventory
        .temps
        .iter()
        .map(|t| SensorSource::Symbolic { id: t.name.clone() })
        .collect();
    profile.curves.insert(
        "balanced".to_string(),
        Curve::Graph { points: default_curve::balanced(), sources, smoothing_tau_ms: 0 },
    );
    profile.controls = controls;
    profile
}

/// Map measured (duty%, rpm) points onto `[LOW_THRESHOLD, HIGH_THRESHOLD]` proportionally by
/// ramp position, since detection measures a duty response curve, not a thermal one - the
/// synthesized curve only needs to be monotonic and plausible as a starting point for editing.
fn resample_onto_temperature_axis(points: &[(f32, u32)], _max_raw: u32) -> Vec<CurvePoint> {
    if points.is_empty() {
        return default_curve::balanced();
    }
    let low = temperature::LOW_THRESHOLD;
    let high = temperature::HIGH_THRESHOLD;
    let span = high - low;
    let n = points.len();
    let mut out: Vec<CurvePoint> = points
        .iter()
        .enumerate()
        .map(|(i, (duty_percent, _rpm))| {
            let fraction = if n > 1 { i as f32 / (n - 1) as f32 } else { 0.0 };
            CurvePoint {
                temperature: low + fraction * span,
                fan_percent: *duty_percent,
            }
        })
        .collect();
    // Measured duty is already non-decreasing by construction (we walk the ramp upward);
    // guard anyway in case trimming left a non-monotonic tail.
    for i in 1..out.len() {
        if out[i].fan_percent < out[i - 1].fan_percent {
            out[i].fan_percent = out[i - 1].fan_percent;
        }
    }
    out
}

/// Build a heuristic mapping without probing hardware, used only when active probing isn't
/// possible (e.g. insufficient permissions): pairs fans and PWMs by trailing numeric index.
pub fn heuristic_controls(inventory: &Inventory) -> Vec<Control> {
    let mut fans_by_index: HashMap<u32, &str> = HashMap::new();
    for fan in &inventory.fans {
        if let Some(index) = trailing_index(&fan.name) {
            fans_by_index.insert(index, fan.name.as_str());
        }
    }
    let mut controls = Vec::new();
    for pwm in &inventory.pwms {
        if let Some(index) = trailing_index(&pwm.name) {
            if fans_by_index.contains_key(&index) {
                controls.push(Control {
                    name: format!("{}_{}", pwm.chip_name, pwm.name),
                    pwm_path: pwm.pwm_path.to_string_lossy().to_string(),
                    curve: "balanced".into(),
                    enabled: true,
                    manual: false,
                    manual_percent: 0.0,
                    hidden: false,
                    spin_up_percent: None,
                    spin_up_dwell_ms: crate::constants::curve::DEFAULT_SPIN_UP_DWELL_MS,
                });
            }
        }
    }
    controls
}

fn trailing_index(name: &str) -> Option<u32> {
    let digits: String = name.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.chars().rev().collect::<String>().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_is_monotonic_and_spans_threshold_range() {
        let points = vec![(20.0, 400), (50.0, 800), (100.0, 1600)];
        let curve = resample_onto_temperature_axis(&points, 255);
        assert_eq!(curve.first().unwrap().temperature, temperature::LOW_THRESHOLD);
        assert_eq!(curve.last().unwrap().temperature, temperature::HIGH_THRESHOLD);
        for w in curve.windows(2) {
            assert!(w[1].fan_percent >= w[0].fan_percent);
        }
    }

    #[test]
    fn empty_points_fall_back_to_default_curve() {
        let curve = resample_onto_temperature_axis(&[], 255);
        assert_eq!(curve, default_curve::balanced());
    }

    #[test]
    fn trailing_index_parses_suffix_digits() {
        assert_eq!(trailing_index("fan1"), Some(1));
        assert_eq!(trailing_index("pwm12"), Some(12));
        assert_eq!(trailing_index("temp"), None);
    }

    #[test]
    fn cancellable_sleep_returns_false_when_already_canceled() {
        let cancel = AtomicBool::new(true);
        assert!(!cancellable_sleep(Duration::from_millis(10), &cancel));
    }
}
