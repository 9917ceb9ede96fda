//! Environment variable loading helpers shared by every binary in the
//! workspace. The Affect Core itself mandates no particular filesystem
//! layout or env var names (spec §6); these helpers exist so the enclosing
//! service (the `vesper` binary) can load its own configuration the same
//! way the teacher codebase does.

use crate::{Dimension, Result, VesperError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::Path;

/// Load environment variables from a `.env` file in the current directory
/// or a parent directory. Safe to call multiple times.
pub fn load_env() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::info!(path = %path.display(), "loaded .env file");
            Ok(())
        }
        Err(dotenvy::Error::LineParse(line, pos)) => Err(VesperError::config(format!(
            "failed to parse .env file at line {line}, position {pos}"
        ))),
        Err(dotenvy::Error::Io(_)) => {
            tracing::warn!("no .env file found, using system environment variables only");
            Ok(())
        }
        Err(e) => Err(VesperError::config(format!("failed to load .env file: {e}"))),
    }
}

/// Load environment variables from a specific file.
pub fn load_env_from_path<P: AsRef<Path>>(path: P) -> Result<()> {
    match dotenvy::from_path(path.as_ref()) {
        Ok(_) => {
            tracing::info!(path = %path.as_ref().display(), "loaded environment file");
            Ok(())
        }
        Err(e) => Err(VesperError::config(format!(
            "failed to load {} environment file: {e}",
            path.as_ref().display()
        ))),
    }
}

/// Get a required environment variable.
pub fn get_required_env(key: &str) -> Result<String> {
    env::var(key)
        .map_err(|_| VesperError::config(format!("required environment variable '{key}' is not set")))
}

/// Get an optional environment variable with a default.
pub fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an environment variable as a boolean.
pub fn get_env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| match v.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

/// Get an environment variable parsed as any `FromStr` type, e.g. integers.
pub fn get_env_int<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Get an environment variable as an `f64`.
pub fn get_env_float(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

/// Validate that every named variable is set, returning one combined error
/// listing whatever is missing.
pub fn validate_env(required_vars: &[&str]) -> Result<()> {
    let missing: Vec<&str> = required_vars
        .iter()
        .copied()
        .filter(|v| env::var(v).is_err())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(VesperError::config(format!(
            "missing required environment variables: {}",
            missing.join(", ")
        )))
    }
}

/// Mirrors `vesper_affect::modulator::GenerationParams`. Duplicated here
/// (rather than imported) because `vesper-core` sits below `vesper-affect`
/// in the dependency order (§0 of the expanded spec); `vesper-affect`
/// converts this into its own type via `From`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParamsRow {
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling cutoff.
    pub top_p: f64,
    /// Target response length, in characters.
    pub response_length: f64,
    /// Repetition penalty.
    pub repetition_penalty: f64,
}

impl Default for GenerationParamsRow {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            response_length: 140.0,
            repetition_penalty: 1.1,
        }
    }
}

/// Decay Engine tunables (spec §4.2, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayParams {
    /// Per-dimension base decay rate, applied per `decay_step_seconds`.
    pub decay_rates: HashMap<Dimension, f64>,
    /// Length of one decay step, in seconds.
    pub decay_step_seconds: f64,
    /// Extreme-emotion inertia threshold.
    pub inertia_threshold: f64,
    /// Inertia-regime rate multiplier.
    pub inertia_factor: f64,
    /// Seconds of no interaction before idle drift begins.
    pub idle_threshold_seconds: f64,
    /// Per-dimension idle drift rate, in value-per-minute.
    pub idle_rates_per_minute: HashMap<Dimension, f64>,
    /// Safety cap on a single catch-up, in days.
    pub saturation_cap_days: f64,
}

impl Default for DecayParams {
    fn default() -> Self {
        use Dimension::*;
        Self {
            decay_rates: HashMap::from([
                (Loneliness, 0.02),
                (Excitement, 0.06),
                (Frustration, 0.04),
                (Jealousy, 0.03),
                (Vulnerability, 0.08),
                (Confidence, 0.03),
                (Curiosity, 0.05),
                (Affection, 0.04),
                (Defensiveness, 0.05),
            ]),
            decay_step_seconds: 300.0,
            inertia_threshold: 0.8,
            inertia_factor: 0.5,
            idle_threshold_seconds: 300.0,
            idle_rates_per_minute: HashMap::from([(Loneliness, 0.01), (Excitement, -0.02)]),
            saturation_cap_days: 30.0,
        }
    }
}

/// Interaction Handler tunables (spec §4.3, §6). The per-kind delta table
/// itself is not in this list — spec §6 names only these three knobs as
/// configurable, leaving the nominal delta table a fixed reference table
/// (`vesper_affect::interaction::DeltaTable::default`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionParams {
    /// How many prior events of the dampening history to consider.
    pub dampening_window: usize,
    /// Per-consecutive-match dampening slope.
    pub dampening_slope: f64,
    /// Momentum amplification coefficient.
    pub momentum_amplification: f64,
}

impl Default for InteractionParams {
    fn default() -> Self {
        Self {
            dampening_window: 8,
            dampening_slope: 0.2,
            momentum_amplification: 0.5,
        }
    }
}

/// Modulator tunables (spec §4.4, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulationParams {
    /// Baseline generation parameters a neutral state reduces to.
    pub baseline: GenerationParamsRow,
    /// Per-dimension linear coefficients.
    pub deltas: HashMap<Dimension, GenerationParamsRow>,
    /// Tokens that force the situational gate when present in the prompt.
    pub serious_tokens: Vec<String>,
    /// Per-dimension tone-flag thresholds.
    pub tone_thresholds: HashMap<Dimension, f64>,
    /// Minimum dominant-dimension deviation before a self-awareness line
    /// surfaces.
    pub self_awareness_threshold: f64,
    /// Allowed fractional variance around baseline, as `(low, high)`.
    pub variance_bounds: (f64, f64),
}

impl Default for ModulationParams {
    fn default() -> Self {
        use Dimension::*;
        let deltas = HashMap::from([
            (
                Loneliness,
                GenerationParamsRow { temperature: 0.05, top_p: 0.0, response_length: 40.0, repetition_penalty: 0.0 },
            ),
            (
                Excitement,
                GenerationParamsRow { temperature: 0.15, top_p: 0.05, response_length: 30.0, repetition_penalty: 0.05 },
            ),
            (
                Frustration,
                GenerationParamsRow { temperature: -0.10, top_p: -0.05, response_length: -40.0, repetition_penalty: 0.1 },
            ),
            (
                Jealousy,
                GenerationParamsRow { temperature: 0.05, top_p: 0.0, response_length: 10.0, repetition_penalty: 0.0 },
            ),
            (
                Vulnerability,
                GenerationParamsRow { temperature: -0.05, top_p: -0.05, response_length: 20.0, repetition_penalty: 0.0 },
            ),
            (
                Confidence,
                GenerationParamsRow { temperature: 0.05, top_p: 0.05, response_length: -10.0, repetition_penalty: -0.05 },
            ),
            (
                Curiosity,
                GenerationParamsRow { temperature: 0.10, top_p: 0.05, response_length: 25.0, repetition_penalty: 0.0 },
            ),
            (
                Affection,
                GenerationParamsRow { temperature: 0.05, top_p: 0.0, response_length: 15.0, repetition_penalty: 0.0 },
            ),
            (
                Defensiveness,
                GenerationParamsRow { temperature: -0.10, top_p: -0.10, response_length: -30.0, repetition_penalty: 0.15 },
            ),
        ]);
        let tone_thresholds = HashMap::from([
            (Loneliness, 0.65),
            (Excitement, 0.65),
            (Frustration, 0.65),
            (Vulnerability, 0.65),
            (Defensiveness, 0.65),
        ]);
        Self {
            baseline: GenerationParamsRow::default(),
            deltas,
            serious_tokens: vec![
                "suicide".to_string(),
                "self-harm".to_string(),
                "self harm".to_string(),
                "emergency".to_string(),
                "overdose".to_string(),
                "abuse".to_string(),
            ],
            tone_thresholds,
            self_awareness_threshold: 0.15,
            variance_bounds: (0.7, 1.3),
        }
    }
}

/// Scheduler tunables (spec §4.6, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerParams {
    /// Tick cadence, in seconds.
    pub tick_interval_seconds: u64,
    /// Idle threshold before a `long_idle` event synthesizes, in seconds.
    pub idle_threshold_seconds: u64,
    /// Allowed clock skew for an inbound event's `instant`, in seconds.
    pub event_skew_tolerance_seconds: u64,
    /// Deadline for the `Generate` call, in seconds.
    pub generate_timeout_seconds: u64,
    /// Deadline for a transport `deliver` call, in seconds.
    pub send_timeout_seconds: u64,
    /// Hard deadline for draining on shutdown, in seconds.
    pub shutdown_drain_seconds: u64,
    /// High-water mark for the event funnel.
    pub funnel_high_water_mark: usize,
    /// Periodic snapshot cadence: interaction-count threshold.
    pub snapshot_interaction_threshold: u32,
    /// Periodic snapshot cadence: wall-clock fallback, in minutes.
    pub snapshot_hourly_interval_minutes: i64,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self {
            tick_interval_seconds: 5,
            idle_threshold_seconds: 300,
            event_skew_tolerance_seconds: 60,
            generate_timeout_seconds: 30,
            send_timeout_seconds: 10,
            shutdown_drain_seconds: 5,
            funnel_high_water_mark: 1024,
            snapshot_interaction_threshold: 20,
            snapshot_hourly_interval_minutes: 60,
        }
    }
}

/// Autonomy trigger thresholds and cooldowns (spec §6 `autonomy_triggers`).
/// The four triggers themselves (and the compound loneliness+silence shape
/// of `guilt_trip`) stay fixed, representative predicates per spec §4.6 —
/// only the numbers that parameterize them are config-driven.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerParams {
    /// `loneliness` trigger: fires above this value.
    pub loneliness_threshold: f64,
    /// `loneliness` trigger cooldown, in minutes.
    pub loneliness_cooldown_minutes: i64,
    /// `excitement` trigger: fires above this value.
    pub excitement_threshold: f64,
    /// `excitement` trigger cooldown, in minutes.
    pub excitement_cooldown_minutes: i64,
    /// `frustration` trigger: fires above this value.
    pub frustration_threshold: f64,
    /// `frustration` trigger cooldown, in minutes.
    pub frustration_cooldown_minutes: i64,
    /// `guilt_trip` trigger: loneliness must exceed this value.
    pub guilt_trip_loneliness_threshold: f64,
    /// `guilt_trip` trigger: hours since the last interaction required.
    pub guilt_trip_silence_hours: i64,
    /// `guilt_trip` trigger cooldown, in minutes.
    pub guilt_trip_cooldown_minutes: i64,
}

impl Default for TriggerParams {
    fn default() -> Self {
        Self {
            loneliness_threshold: 0.70,
            loneliness_cooldown_minutes: 30,
            excitement_threshold: 0.80,
            excitement_cooldown_minutes: 20,
            frustration_threshold: 0.60,
            frustration_cooldown_minutes: 45,
            guilt_trip_loneliness_threshold: 0.80,
            guilt_trip_silence_hours: 24,
            guilt_trip_cooldown_minutes: 360,
        }
    }
}

/// Every tunable parameter the Affect Core's components read (spec §6), as
/// a single struct with reference defaults matching spec.md §4.2-§4.6.
/// `vesper-core` only loads this from a TOML file or the built-in
/// defaults; it never reads `VESPER_CONFIG_PATH` itself — the `vesper`
/// binary is the only caller that decides where the path comes from
/// (env var, CLI flag, or a fixed location), matching "no CLI,
/// environment variables, or filesystem layout is mandated by the core."
///
/// Not configurable here, by design: the per-dimension floors stay a fixed
/// `Dimension::floor()` invariant rather than a runtime value, since
/// `EmotionState`'s clamp-on-every-mutation enforcement is written directly
/// against it throughout `vesper-affect` — turning it into config would mean
/// threading a floors map through every `EmotionState` constructor and
/// mutation, a structural change to the invariant-enforcement layer itself
/// rather than an additive one. The Interaction Handler's nominal delta
/// table likewise stays fixed (spec §6 names only `dampening_window`/
/// `dampening_slope`/`momentum_amplification` as configurable, not the table
/// of per-kind deltas). Trigger thresholds and cooldowns, by contrast, are
/// configurable via `triggers` below; only the predicate *shapes* (which
/// dimensions, which compound condition) stay fixed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AffectConfig {
    /// Decay Engine tunables.
    pub decay: DecayParams,
    /// Interaction Handler tunables.
    pub interaction: InteractionParams,
    /// Modulator tunables.
    pub modulation: ModulationParams,
    /// Scheduler tunables.
    pub scheduler: SchedulerParams,
    /// Autonomy trigger thresholds and cooldowns.
    pub triggers: TriggerParams,
}

impl AffectConfig {
    /// Load from a TOML file at `path`, or fall back to [`AffectConfig::default`]
    /// if the file is absent. A malformed file is a hard `VesperError::Config`,
    /// since a present-but-broken config is an operator error distinct from
    /// "unconfigured."
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| {
            VesperError::config(format!("failed to parse config file {}: {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_bool_parses_common_spellings() {
        env::set_var("VESPER_TEST_BOOL_TRUE", "true");
        env::set_var("VESPER_TEST_BOOL_FALSE", "0");
        assert!(get_env_bool("VESPER_TEST_BOOL_TRUE", false));
        assert!(!get_env_bool("VESPER_TEST_BOOL_FALSE", true));
        assert!(get_env_bool("VESPER_TEST_BOOL_MISSING", true));
        env::remove_var("VESPER_TEST_BOOL_TRUE");
        env::remove_var("VESPER_TEST_BOOL_FALSE");
    }

    #[test]
    fn env_int_falls_back_to_default() {
        env::set_var("VESPER_TEST_INT", "42");
        assert_eq!(get_env_int("VESPER_TEST_INT", 0), 42);
        assert_eq!(get_env_int::<i64>("VESPER_TEST_INT_MISSING", 7), 7);
        env::remove_var("VESPER_TEST_INT");
    }

    #[test]
    fn validate_env_reports_all_missing() {
        env::remove_var("VESPER_TEST_MISSING_A");
        env::remove_var("VESPER_TEST_MISSING_B");
        let err = validate_env(&["VESPER_TEST_MISSING_A", "VESPER_TEST_MISSING_B"]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("VESPER_TEST_MISSING_A"));
        assert!(msg.contains("VESPER_TEST_MISSING_B"));
    }

    #[test]
    fn affect_config_round_trips_through_toml() {
        let config = AffectConfig::default();
        let serialized = toml::to_string(&config).expect("serialize default config");
        let parsed: AffectConfig = toml::from_str(&serialized).expect("parse serialized config");
        assert_eq!(parsed.decay.decay_step_seconds, config.decay.decay_step_seconds);
        assert_eq!(parsed.scheduler.tick_interval_seconds, 5);
        assert_eq!(parsed.triggers.loneliness_threshold, 0.70);
    }

    #[test]
    fn load_with_no_path_returns_defaults() {
        let config = AffectConfig::load(None).unwrap();
        assert_eq!(config.interaction.dampening_window, 8);
    }

    #[test]
    fn load_with_missing_file_falls_back_to_defaults() {
        let config = AffectConfig::load(Some(Path::new("/nonexistent/vesper-test.toml"))).unwrap();
        assert_eq!(config.modulation.self_awareness_threshold, 0.15);
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let dir = std::env::temp_dir();
        let path = dir.join("vesper_affect_config_malformed_test.toml");
        std::fs::write(&path, "not = [valid toml").unwrap();
        let result = AffectConfig::load(Some(&path));
        assert!(result.is_err());
        std::fs::remove_file(&path).ok();
    }
}
