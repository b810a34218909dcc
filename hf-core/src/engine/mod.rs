//! The control engine: per-tick evaluation of curves over live sensor readings, with
//! hysteresis, mixing, smoothing, dead-banding and spin-up correction, ending in PWM writes.
//!
//! The engine owns no sysfs handles directly - it resolves sensor sources and PWM targets
//! against the inventory view installed by [`Engine::set_view`], and leaves scanning and
//! refreshing that view to the caller (the daemon's tick task, per the inventory cadence
//! described alongside [`crate::hw::hardware`]).

mod curve;

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::constants::pwm;
use crate::data::{Control, Curve, FanSensor, Inventory, MixCombinator, PwmController, Profile, TempSensor};
use crate::hw::control as hwctl;

/// Curve preset kept for the daemon's "seed a starting profile" path - the only surviving
/// teacher concept that still maps cleanly onto the canonical profile model.
pub use crate::constants::default_curve;

/// Log a repeated write failure on the same control once every this many ticks.
const WRITE_FAILURE_LOG_INTERVAL: u32 = 20;

#[derive(Debug, Clone, Default)]
struct RuleState {
    last_written_duty: f32,
    last_write_time: Option<Instant>,
    last_smoothed_duty: Option<f32>,
    spin_up_until: Option<Instant>,
    write_failures: u32,
}

fn rule_key(control: &Control) -> String {
    format!("{}\u{0}{}", control.name, control.pwm_path)
}

fn combine(values: &[f32], combinator: MixCombinator) -> f32 {
    match combinator {
        MixCombinator::Min => values.iter().cloned().fold(f32::INFINITY, f32::min),
        MixCombinator::Max => values.iter().cloned().fold(f32::NEG_INFINITY, f32::max),
        MixCombinator::Avg => values.iter().sum::<f32>() / values.len() as f32,
    }
}

/// Counters surfaced through telemetry for a tick that just ran.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct TickStats {
    pub controls_evaluated: usize,
    pub writes: usize,
    pub write_errors: usize,
}

/// The per-tick control loop. One instance lives in the daemon's tick task; RPC handlers
/// reach it only through [`apply_profile`], [`enable`], and read-only status accessors.
pub struct Engine {
    profile: Profile,
    view: Inventory,
    enabled: bool,
    rule_states: HashMap<String, RuleState>,
    /// Curve-name-keyed hysteresis state for `Trigger` curves: `true` means currently in the
    /// load band. Keyed by curve name rather than control so a `Trigger` referenced from
    /// inside a `Mix` shares one hysteresis state across every control that reaches it.
    trigger_states: HashMap<String, bool>,
    /// enable_path -> enable mode captured the moment engine-enable was requested.
    captured_enable_modes: HashMap<String, u8>,
    last_tick_instant: Option<Instant>,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            profile: Profile::empty("default"),
            view: Inventory::default(),
            enabled: false,
            rule_states: HashMap::new(),
            trigger_states: HashMap::new(),
            captured_enable_modes: HashMap::new(),
            last_tick_instant: None,
        }
    }

    /// Install the inventory tables the engine resolves curve sources and PWM targets
    /// against. Called once per refresh cadence by the tick task - never by RPC handlers.
    pub fn set_view(&mut self, temps: Vec<TempSensor>, fans: Vec<FanSensor>, pwms: Vec<PwmController>) {
        self.view.temps = temps;
        self.view.fans = fans;
        self.view.pwms = pwms;
    }

    /// Atomically replace the active profile. Per-rule state carries over for any control
    /// whose `(name, pwm_path)` identity already existed; everything else starts fresh. No
    /// I/O happens here - the next `tick()` picks up the new profile.
    pub fn apply_profile(&mut self, profile: Profile) {
        let was_enabled = self.enabled;
        if was_enabled {
            // Disable-then-enable semantics at the tick boundary, but the *original*
            // captured enable modes survive untouched - only the "which PWMs are
            // currently manual" bookkeeping needs to be redone against the new control
            // list, not re-captured from (already-manual) hardware state.
            let existing_paths: std::collections::HashSet<&str> = profile
                .controls
                .iter()
                .filter_map(|c| self.view.find_pwm(&c.pwm_path))
                .map(|p| p.enable_path.to_str().unwrap_or(""))
                .collect();
            self.captured_enable_modes
                .retain(|path, _| existing_paths.contains(path.as_str()));
        }
        let mut new_states = HashMap::with_capacity(profile.controls.len());
        for control in &profile.controls {
            let key = rule_key(control);
            let state = self.rule_states.remove(&key).unwrap_or_default();
            new_states.insert(key, state);
        }
        self.rule_states = new_states;
        self.profile = profile;
        if was_enabled {
            self.capture_and_set_manual();
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// `true`: capture each controlled PWM's current enable mode and force manual. `false`:
    /// restore every captured mode and forget the capture.
    pub fn enable(&mut self, enabled: bool) {
        if enabled == self.enabled {
            return;
        }
        if enabled {
            self.capture_and_set_manual();
            self.enabled = true;
        } else {
            for (enable_path, mode) in self.captured_enable_modes.drain() {
                let _ = hwctl::write_pwm_enable(Path::new(&enable_path), mode);
            }
            self.enabled = false;
        }
    }

    fn capture_and_set_manual(&mut self) {
        let pwm_paths: Vec<String> = self.profile.controls.iter().map(|c| c.pwm_path.clone()).collect();
        for pwm_path in pwm_paths {
            let Some(pwm) = self.view.find_pwm(&pwm_path) else { continue };
            let enable_path = pwm.enable_path.to_string_lossy().to_string();
            let original = pwm.enable_mode.unwrap_or(pwm::enable::AUTOMATIC);
            self.captured_enable_modes.entry(enable_path.clone()).or_insert(original);
            let _ = hwctl::write_pwm_enable(Path::new(&enable_path), pwm::enable::MANUAL);
        }
    }

    /// Perform one evaluation round. Returns whether any duty was actually written.
    /// `force_tick_interval` is the separate "write at least this often" knob of §4.2 step 6;
    /// it lives alongside `delta_c` rather than being folded into the engine's own state so
    /// that a live `config.set` RPC can change it without resetting rule state.
    pub fn tick(&mut self, delta_c: f32, force_tick_interval: Duration) -> (bool, TickStats) {
        let now = Instant::now();
        let dt = self
            .last_tick_instant
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or_default();
        self.last_tick_instant = Some(now);

        if !self.enabled {
            return (false, TickStats::default());
        }

        let profile = self.profile.clone();
        let mut stats = TickStats::default();
        for control in &profile.controls {
            stats.controls_evaluated += 1;
            match self.tick_control(&profile, control, delta_c, force_tick_interval, dt, now) {
                WriteOutcome::Wrote => {
                    stats.writes += 1;
                }
                WriteOutcome::Failed => {
                    stats.write_errors += 1;
                }
                WriteOutcome::Skipped => {}
            }
        }
        (stats.writes > 0, stats)
    }

    fn tick_control(
        &mut self,
        profile: &Profile,
        control: &Control,
        delta_c: f32,
        force_tick_interval: Duration,
        dt: Duration,
        now: Instant,
    ) -> WriteOutcome {
        if !control.enabled {
            return WriteOutcome::Skipped;
        }
        let Some(pwm) = self.view.find_pwm(&control.pwm_path).cloned() else {
            return WriteOutcome::Skipped;
        };
        let key = rule_key(control);

        if control.manual {
            let target = control.manual_percent.clamp(0.0, 100.0);
            return self.write_duty(&pwm, &key, target, now);
        }

        let Some(curve) = profile.curves.get(&control.curve) else {
            return WriteOutcome::Skipped;
        };

        let Some(raw_target) = self.evaluate_curve(&control.curve, curve, profile) else {
            // Every source unavailable: hold at last written duty, no write.
            return WriteOutcome::Skipped;
        };

        let tau_ms = curve.smoothing_tau_ms();
        let smoothed = {
            let state = self.rule_states.entry(key.clone()).or_default();
            if tau_ms > 0 {
                let tau = tau_ms as f32 / 1000.0;
                let prev = state.last_smoothed_duty.unwrap_or(raw_target);
                let alpha = 1.0 - (-dt.as_secs_f32() / tau).exp();
                let y = prev + alpha * (raw_target - prev);
                state.last_smoothed_duty = Some(y);
                y
            } else {
                state.last_smoothed_duty = Some(raw_target);
                raw_target
            }
        };

        let mut final_duty = smoothed;
        if let Some(spin_pct) = control.spin_up_percent {
            let fans = self.view.fans_on_same_chip(&control.pwm_path);
            let stalled = smoothed > 0.0 && fans.iter().any(|f| f.current_rpm == Some(0));
            let state = self.rule_states.get_mut(&key).unwrap();
            let in_dwell = state.spin_up_until.map(|deadline| now < deadline).unwrap_or(false);
            if stalled && smoothed < spin_pct {
                final_duty = spin_pct;
                state.spin_up_until = Some(now + Duration::from_millis(control.spin_up_dwell_ms as u64));
            } else if in_dwell {
                final_duty = final_duty.max(spin_pct);
            }
        }

        let state = self.rule_states.get(&key).cloned().unwrap_or_default();
        let delta = (final_duty - state.last_written_duty).abs();
        let should_write = match state.last_write_time {
            None => true,
            Some(last) => delta >= delta_c || now.saturating_duration_since(last) >= force_tick_interval,
        };
        if !should_write {
            return WriteOutcome::Skipped;
        }

        self.write_duty(&pwm, &key, final_duty, now)
    }

    /// Resolve a curve's value recursively, `Mix` branches excluding any referenced curve
    /// whose own sources are all unavailable rather than treating it as zero.
    fn evaluate_curve(&mut self, name: &str, curve: &Curve, profile: &Profile) -> Option<f32> {
        match curve {
            Curve::Graph { points, sources, .. } => {
                let temps = self.collect_temps(sources);
                if temps.is_empty() {
                    return None;
                }
                let reduced = temps.into_iter().fold(f32::NEG_INFINITY, f32::max);
                Some(curve::interpolate(points, reduced))
            }
            Curve::Trigger {
                idle_temperature,
                load_temperature,
                idle_duty,
                load_duty,
                sources,
                ..
            } => {
                let temps = self.collect_temps(sources);
                if temps.is_empty() {
                    return None;
                }
                let reduced = temps.into_iter().fold(f32::NEG_INFINITY, f32::max);
                let loaded = self.trigger_states.entry(name.to_string()).or_insert(false);
                if *loaded {
                    if reduced <= *idle_temperature {
                        *loaded = false;
                    }
                } else if reduced >= *load_temperature {
                    *loaded = true;
                }
                Some(if *loaded { *load_duty } else { *idle_duty })
            }
            Curve::Mix { curves, combinator } => {
                let mut values = Vec::with_capacity(curves.len());
                for child_name in curves {
                    if let Some(child) = profile.curves.get(child_name) {
                        if let Some(v) = self.evaluate_curve(child_name, child, profile) {
                            values.push(v);
                        }
                    }
                }
                if values.is_empty() {
                    None
                } else {
                    Some(combine(&values, *combinator))
                }
            }
        }
    }

    fn collect_temps(&self, sources: &[crate::data::SensorSource]) -> Vec<f32> {
        sources.iter().filter_map(|s| self.view.resolve_source(s)).collect()
    }

    fn write_duty(&mut self, pwm: &PwmController, key: &str, percent: f32, now: Instant) -> WriteOutcome {
        let clamped = percent.clamp(0.0, 100.0);
        let raw = hwctl::percent_to_raw(clamped, pwm.max_raw);
        let state = self.rule_states.entry(key.to_string()).or_default();
        match hwctl::set_pwm_raw(&pwm.pwm_path, raw) {
            Ok(()) => {
                state.last_written_duty = clamped;
                state.last_write_time = Some(now);
                state.write_failures = 0;
                WriteOutcome::Wrote
            }
            Err(e) => {
                state.write_failures += 1;
                if state.write_failures % WRITE_FAILURE_LOG_INTERVAL == 1 {
                    warn!(pwm = %pwm.pwm_path.display(), error = %e, "repeated PWM write failure");
                }
                WriteOutcome::Failed
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

enum WriteOutcome {
    Wrote,
    Failed,
    Skipped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CurvePoint, SensorSource};
    use std::path::PathBuf;

    fn temp_sensor(name: &str, c: f32) -> TempSensor {
        TempSensor {
            chip_path: PathBuf::from("/sys/class/hwmon/hwmon0"),
            chip_name: "test".into(),
            name: name.into(),
            input_path: PathBuf::from(format!("/sys/class/hwmon/hwmon0/{name}_input")),
            label: None,
            current_temp: Some(c),
        }
    }

    fn pwm_ctrl(path: &str) -> PwmController {
        PwmController {
            chip_path: PathBuf::from("/sys/class/hwmon/hwmon0"),
            chip_name: "test".into(),
            name: "pwm1".into(),
            pwm_path: PathBuf::from(path),
            enable_path: PathBuf::from(format!("{path}_enable")),
            max_raw: 255,
            label: None,
            current_value: Some(0),
            current_percent: Some(0.0),
            enable_mode: Some(2),
        }
    }

    fn graph_profile() -> Profile {
        let mut profile = Profile::empty("p");
        profile.curves.insert(
            "cpu".into(),
            Curve::Graph {
                points: vec![
                    CurvePoint { temperature: 40.0, fan_percent: 40.0 },
                    CurvePoint { temperature: 60.0, fan_percent: 80.0 },
                ],
                sources: vec![SensorSource::Symbolic { id: "cpu_temp".into() }],
                smoothing_tau_ms: 0,
            },
        );
        profile.controls.push(Control {
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
    fn tick_is_noop_when_disabled() {
        let mut engine = Engine::new();
        engine.set_view(vec![temp_sensor("cpu_temp", 50.0)], vec![], vec![pwm_ctrl("/sys/class/hwmon/hwmon0/pwm1")]);
        engine.apply_profile(graph_profile());
        let (wrote, _) = engine.tick(1.0, Duration::from_secs(30));
        assert!(!wrote);
    }

    #[test]
    fn every_source_unavailable_holds_last_duty() {
        let mut engine = Engine::new();
        engine.set_view(vec![], vec![], vec![pwm_ctrl("/sys/class/hwmon/hwmon0/pwm1")]);
        engine.apply_profile(graph_profile());
        engine.enable(true);
        let (wrote, stats) = engine.tick(1.0, Duration::from_secs(30));
        assert!(!wrote);
        assert_eq!(stats.writes, 0);
    }

    #[test]
    fn dead_band_suppresses_small_changes() {
        let mut engine = Engine::new();
        engine.set_view(
            vec![temp_sensor("cpu_temp", 50.0)],
            vec![],
            vec![pwm_ctrl("/sys/class/hwmon/hwmon0/nonexistent_dir_pwm1")],
        );
        // PWM write will fail (path doesn't exist) but dead-band accounting still happens
        // against `last_written_duty`/`last_write_time`, which only advance on success - so
        // this test exercises the gate/resolve/reduce/evaluate pipeline up to the write call.
        engine.apply_profile(graph_profile());
        engine.enable(true);
        let (_, stats) = engine.tick(1.0, Duration::from_secs(30));
        assert_eq!(stats.controls_evaluated, 1);
    }

    #[test]
    fn trigger_hysteresis_follows_temperature_path() {
        let mut engine = Engine::new();
        let mut profile = Profile::empty("p");
        profile.curves.insert(
            "cpu".into(),
            Curve::Trigger {
                idle_temperature: 30.0,
                load_temperature: 70.0,
                idle_duty: 20.0,
                load_duty: 90.0,
                sources: vec![SensorSource::Symbolic { id: "cpu_temp".into() }],
                smoothing_tau_ms: 0,
            },
        );
        profile.controls.push(Control {
            name: "cpu_fan".into(),
            pwm_path: "/sys/class/hwmon/hwmon0/pwm1".into(),
            curve: "cpu".into(),
            enabled: true,
            manual: false,
            manual_percent: 0.0,
            hidden: false,
            spin_up_percent: None,
            spin_up_dwell_ms: 0,
        });
        engine.apply_profile(profile);

        let path = [20.0, 50.0, 80.0, 50.0, 20.0];
        let expected = [20.0, 20.0, 90.0, 90.0, 20.0];
        for (temp, want) in path.iter().zip(expected.iter()) {
            engine.set_view(vec![temp_sensor("cpu_temp", *temp)], vec![], vec![pwm_ctrl("/sys/class/hwmon/hwmon0/pwm1")]);
            let got = engine
                .evaluate_curve("cpu", engine.profile.curves.get("cpu").unwrap(), &engine.profile.clone())
                .unwrap();
            assert_eq!(got, *want, "temperature {temp} expected duty {want}, got {got}");
        }
    }

    #[test]
    fn mix_max_falls_back_to_the_one_available_curve() {
        let mut engine = Engine::new();
        let mut profile = Profile::empty("p");
        profile.curves.insert(
            "available".into(),
            Curve::Graph {
                points: vec![CurvePoint { temperature: 0.0, fan_percent: 55.0 }],
                sources: vec![SensorSource::Symbolic { id: "cpu_temp".into() }],
                smoothing_tau_ms: 0,
            },
        );
        profile.curves.insert(
            "unavailable".into(),
            Curve::Graph {
                points: vec![CurvePoint { temperature: 0.0, fan_percent: 99.0 }],
                sources: vec![SensorSource::Symbolic { id: "missing_temp".into() }],
                smoothing_tau_ms: 0,
            },
        );
        profile.curves.insert(
            "mix".into(),
            Curve::Mix { curves: vec!["available".into(), "unavailable".into()], combinator: MixCombinator::Max },
        );
        engine.set_view(vec![temp_sensor("cpu_temp", 50.0)], vec![], vec![]);
        engine.apply_profile(profile.clone());

        let got = engine.evaluate_curve("mix", profile.curves.get("mix").unwrap(), &profile).unwrap();
        assert_eq!(got, 55.0);
    }

    #[test]
    fn apply_profile_resets_state_for_new_controls() {
        let mut engine = Engine::new();
        engine.apply_profile(graph_profile());
        assert_eq!(engine.rule_states.len(), 1);
        let mut other = Profile::empty("other");
        other.curves.insert(
            "x".into(),
            Curve::Graph {
                points: vec![CurvePoint { temperature: 10.0, fan_percent: 10.0 }],
                sources: vec![],
                smoothing_tau_ms: 0,
            },
        );
        other.controls.push(Control {
            name: "different".into(),
            pwm_path: "/sys/class/hwmon/hwmon0/pwm2".into(),
            curve: "x".into(),
            enabled: true,
            manual: false,
            manual_percent: 0.0,
            hidden: false,
            spin_up_percent: None,
            spin_up_dwell_ms: 0,
        });
        engine.apply_profile(other);
        assert_eq!(engine.rule_states.len(), 1);
        assert!(engine.rule_states.contains_key(&rule_key(&Control {
            name: "different".into(),
            pwm_path: "/sys/class/hwmon/hwmon0/pwm2".into(),
            curve: "x".into(),
            enabled: true,
            manual: false,
            manual_percent: 0.0,
            hidden: false,
            spin_up_percent: None,
            spin_up_dwell_ms: 0,
        })));
    }
}
