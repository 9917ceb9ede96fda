//! Decay Engine: pure functions that advance an [`EmotionState`] by a
//! duration, applying per-dimension decay toward the neutral midpoint,
//! extreme-value inertia, and idle drift (spec §4.2).

use crate::state::EmotionState;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use vesper_core::Dimension;

/// Decay Engine parameters. Defaults mirror the reference values in spec
/// §4.2, given per 5-minute tick.
#[derive(Debug, Clone)]
pub struct DecayConfig {
    /// Per-dimension base decay rate, applied per `decay_step_seconds`.
    pub decay_rates: HashMap<Dimension, f64>,
    /// Length of one decay step, in seconds. Default `300`.
    pub decay_step_seconds: f64,
    /// Value at or above which a dimension is in the extreme-emotion
    /// inertia regime. Default `0.8`.
    pub inertia_threshold: f64,
    /// Multiplier applied to the base rate while in the inertia regime.
    /// Default `0.5`.
    pub inertia_factor: f64,
    /// Seconds of no interaction before idle drift begins. Default `300`.
    pub idle_threshold_seconds: f64,
    /// Per-dimension idle drift rate, in value-per-minute. Dimensions absent
    /// from the map drift at zero.
    pub idle_rates_per_minute: HashMap<Dimension, f64>,
    /// Safety cap on a single catch-up, in days. Beyond this, additional
    /// elapsed time is discarded and the result is marked saturated.
    /// Default `30`.
    pub saturation_cap_days: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        use Dimension::*;
        let decay_rates = HashMap::from([
            (Loneliness, 0.02),
            (Excitement, 0.06),
            (Frustration, 0.04),
            (Jealousy, 0.03),
            (Vulnerability, 0.08),
            (Confidence, 0.03),
            (Curiosity, 0.05),
            (Affection, 0.04),
            (Defensiveness, 0.05),
        ]);
        let idle_rates_per_minute = HashMap::from([(Loneliness, 0.01), (Excitement, -0.02)]);

        Self {
            decay_rates,
            decay_step_seconds: 300.0,
            inertia_threshold: 0.8,
            inertia_factor: 0.5,
            idle_threshold_seconds: 300.0,
            idle_rates_per_minute,
            saturation_cap_days: 30.0,
        }
    }
}

impl From<&vesper_core::DecayParams> for DecayConfig {
    fn from(params: &vesper_core::DecayParams) -> Self {
        Self {
            decay_rates: params.decay_rates.clone(),
            decay_step_seconds: params.decay_step_seconds,
            inertia_threshold: params.inertia_threshold,
            inertia_factor: params.inertia_factor,
            idle_threshold_seconds: params.idle_threshold_seconds,
            idle_rates_per_minute: params.idle_rates_per_minute.clone(),
            saturation_cap_days: params.saturation_cap_days,
        }
    }
}

/// Result of advancing an [`EmotionState`] through the Decay Engine.
#[derive(Debug, Clone)]
pub struct DecayOutcome {
    /// The advanced state.
    pub state: EmotionState,
    /// Set when the requested `Δt` exceeded `saturation_cap_days`; the
    /// engine discarded the excess and Persistence should record a
    /// `saturated_catchup` autonomy event.
    pub saturated: bool,
}

/// Advance `state` by `delta_t_seconds`, treating `idle_elapsed_at_start_seconds`
/// as how long it has already been since the last interaction at the moment
/// this call begins (so idle drift engages partway through a long catch-up
/// if it wasn't already active). `now` stamps the returned state's
/// `last_mutated`.
pub fn advance(
    state: &EmotionState,
    delta_t_seconds: f64,
    idle_elapsed_at_start_seconds: f64,
    params: &DecayConfig,
    now: DateTime<Utc>,
) -> DecayOutcome {
    if delta_t_seconds <= 0.0 {
        return DecayOutcome {
            state: state.clone(),
            saturated: false,
        };
    }

    let cap_seconds = params.saturation_cap_days * 86_400.0;
    let saturated = delta_t_seconds > cap_seconds;
    let bounded_delta = delta_t_seconds.min(cap_seconds);

    let t = params.decay_step_seconds;
    let whole_ticks = (bounded_delta / t).floor() as u64;
    let residual_fraction = (bounded_delta / t) - whole_ticks as f64;

    let mut working = state.clone();
    let mut idle_elapsed = idle_elapsed_at_start_seconds;

    for _ in 0..whole_ticks {
        step(&mut working, 1.0, idle_elapsed, params, now);
        idle_elapsed += t;
    }
    if residual_fraction > 1e-12 {
        step(&mut working, residual_fraction, idle_elapsed, params, now);
    }

    DecayOutcome {
        state: working,
        saturated,
    }
}

/// One decay step, scaled by `fraction` of a full `decay_step_seconds` tick.
fn step(
    state: &mut EmotionState,
    fraction: f64,
    idle_elapsed_seconds: f64,
    params: &DecayConfig,
    now: DateTime<Utc>,
) {
    let idle_active = idle_elapsed_seconds >= params.idle_threshold_seconds;

    for d in Dimension::ALL {
        let value = state.value(d);
        let base_rate = params.decay_rates.get(&d).copied().unwrap_or(0.0);
        let effective_rate = if value >= params.inertia_threshold {
            base_rate * params.inertia_factor
        } else {
            base_rate
        };
        let step_rate = effective_rate * fraction;

        let mut new_value = if value > 0.5 {
            (value - step_rate).max(0.5)
        } else if value < 0.5 {
            (value + step_rate).min(0.5)
        } else {
            value
        };

        if idle_active {
            let rate_per_min = params.idle_rates_per_minute.get(&d).copied().unwrap_or(0.0);
            new_value += rate_per_min * (fraction * t_minutes(params));
        }

        state.set_absolute(d, new_value, now);
    }
}

fn t_minutes(params: &DecayConfig) -> f64 {
    params.decay_step_seconds / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn decay_config_from_params_preserves_reference_defaults() {
        let params = vesper_core::DecayParams::default();
        let config = DecayConfig::from(&params);
        assert_eq!(config.decay_step_seconds, 300.0);
        assert_eq!(config.saturation_cap_days, 30.0);
    }

    #[test]
    fn decaying_at_the_floor_returns_exactly_the_floor() {
        let mut state = EmotionState::neutral(now());
        state.set_absolute(Dimension::Loneliness, Dimension::Loneliness.floor(), now());
        let params = DecayConfig::default();
        let out = advance(&state, 300.0, 0.0, &params, now());
        assert_eq!(
            out.state.value(Dimension::Loneliness),
            Dimension::Loneliness.floor()
        );
    }

    #[test]
    fn decay_never_breaches_invariants() {
        let mut state = EmotionState::neutral(now());
        state.set_absolute(Dimension::Excitement, 0.99, now());
        let params = DecayConfig::default();
        let out = advance(&state, 3600.0 * 24.0, 0.0, &params, now());
        for d in Dimension::ALL {
            let v = out.state.value(d);
            assert!(v >= d.floor() - 1e-9 && v <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn saturation_cap_discards_excess_and_marks_result() {
        let state = EmotionState::neutral(now());
        let params = DecayConfig::default();
        let cap_seconds = params.saturation_cap_days * 86_400.0;
        let at_cap = advance(&state, cap_seconds, 100_000.0, &params, now());
        let past_cap = advance(&state, cap_seconds + 12345.0, 100_000.0, &params, now());
        assert!(!at_cap.saturated);
        assert!(past_cap.saturated);
        for d in Dimension::ALL {
            assert!((at_cap.state.value(d) - past_cap.state.value(d)).abs() < 1e-9);
        }
    }

    #[test]
    fn idle_drift_moves_loneliness_up_and_excitement_down() {
        let state = EmotionState::neutral(now());
        let params = DecayConfig::default();
        // idle_elapsed_at_start already past threshold, one hour of drift.
        let out = advance(&state, 3600.0, 10_000.0, &params, now());
        assert!(out.state.value(Dimension::Loneliness) > 0.5);
        assert!(out.state.value(Dimension::Excitement) < 0.5);
    }

    #[test]
    fn inertia_slows_decay_above_threshold() {
        let mut high = EmotionState::neutral(now());
        high.set_absolute(Dimension::Frustration, 0.9, now());
        let mut mid = EmotionState::neutral(now());
        mid.set_absolute(Dimension::Frustration, 0.79, now());
        let params = DecayConfig::default();

        let high_out = advance(&high, 300.0, 0.0, &params, now());
        let mid_out = advance(&mid, 300.0, 0.0, &params, now());

        let high_drop = 0.9 - high_out.state.value(Dimension::Frustration);
        let mid_drop = 0.79 - mid_out.state.value(Dimension::Frustration);
        assert!(high_drop < mid_drop);
    }
}
