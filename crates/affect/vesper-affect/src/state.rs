//! Emotion State: the in-memory mood vector plus momentum, with invariant
//! enforcement on every mutation (spec §4.1).

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vesper_core::Dimension;

/// The realized effect of an [`EmotionState::apply_delta`] call: what was
/// actually added to the stored value, and how much overflowed past `1.0`
/// (which becomes momentum).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaOutcome {
    /// The delta actually reflected in the stored value (after clamping).
    pub realized_delta: f64,
    /// The portion of the requested delta that overflowed past `1.0`, if
    /// any. Zero when the delta didn't push the dimension above its ceiling.
    pub overflow: f64,
}

/// The nine-dimensional mood vector plus per-dimension momentum and the
/// instant of last mutation.
///
/// Invariants enforced on every mutation: `floor_d <= value_d <= 1.0` for
/// every dimension, and `momentum_d >= 0`, never auto-decayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionState {
    values: HashMap<Dimension, f64>,
    momentum: HashMap<Dimension, f64>,
    /// Wall-clock instant of the last mutation (decay or interaction).
    pub last_mutated: DateTime<Utc>,
    /// Wall-clock instant of the last *interaction* specifically (used by
    /// the Decay Engine's idle-drift rule; distinct from `last_mutated`,
    /// which decay ticks also update).
    pub last_interaction: DateTime<Utc>,
}

impl EmotionState {
    /// The neutral baseline: every dimension at `0.5`, momentum zero.
    pub fn neutral(now: DateTime<Utc>) -> Self {
        let values = Dimension::ALL.iter().map(|d| (*d, 0.5)).collect();
        let momentum = Dimension::ALL.iter().map(|d| (*d, 0.0)).collect();
        Self {
            values,
            momentum,
            last_mutated: now,
            last_interaction: now,
        }
    }

    /// Current value of a dimension.
    pub fn value(&self, d: Dimension) -> f64 {
        self.values[&d]
    }

    /// Current momentum of a dimension.
    pub fn momentum(&self, d: Dimension) -> f64 {
        self.momentum[&d]
    }

    /// O(1) deep copy, safe to share across boundaries (the snapshot the
    /// Modulator and Persistence both read from).
    pub fn snapshot(&self) -> EmotionState {
        self.clone()
    }

    /// Mark `now` as the instant of a real inbound interaction, resetting
    /// the idle clock the Decay Engine's drift rule reads. Synthesized
    /// `long_idle` events must not call this — they represent the absence
    /// of an interaction, not one.
    pub fn touch_interaction(&mut self, now: DateTime<Utc>) {
        self.last_interaction = now;
    }

    /// Clamp `v` to `[floor_d, 1.0]` and store it directly. Silent clamp, no
    /// error (spec §4.1).
    pub fn set_absolute(&mut self, d: Dimension, v: f64, now: DateTime<Utc>) {
        let clamped = v.clamp(d.floor(), 1.0);
        self.values.insert(d, clamped);
        self.last_mutated = now;
    }

    /// Apply a delta to dimension `d`. If the result would exceed `1.0`, the
    /// overflow is compared against the existing momentum and the larger is
    /// retained; the stored value clamps to `1.0`. If the result would drop
    /// below the floor, the stored value clamps to the floor and momentum is
    /// unaffected. Returns the realized delta and the overflow for this
    /// call (spec §4.1).
    pub fn apply_delta(&mut self, d: Dimension, delta: f64, now: DateTime<Utc>) -> DeltaOutcome {
        let before = self.values[&d];
        let raw = before + delta;
        let floor = d.floor();

        let (clamped, overflow) = if raw > 1.0 {
            let overflow = raw - 1.0;
            let existing = self.momentum[&d];
            if overflow > existing {
                self.momentum.insert(d, overflow);
            }
            (1.0, overflow)
        } else if raw < floor {
            (floor, 0.0)
        } else {
            (raw, 0.0)
        };

        self.values.insert(d, clamped);
        self.last_mutated = now;

        DeltaOutcome {
            realized_delta: clamped - before,
            overflow,
        }
    }

    /// Zero a specific dimension's momentum, or every dimension's if `None`.
    /// Deliberate only — never called implicitly by decay or interaction
    /// handling.
    pub fn clear_momentum(&mut self, d: Option<Dimension>) {
        match d {
            Some(d) => {
                self.momentum.insert(d, 0.0);
            }
            None => {
                for dim in Dimension::ALL {
                    self.momentum.insert(dim, 0.0);
                }
            }
        }
    }

    /// Deterministic top-`n` dimensions by `abs(value_d - 0.5)` descending;
    /// ties break by canonical dimension order.
    pub fn dominant_emotions(&self, n: usize) -> Vec<Dimension> {
        let mut dims: Vec<Dimension> = Dimension::ALL.to_vec();
        dims.sort_by_key(|d| {
            let deviation = (self.values[d] - 0.5).abs();
            (std::cmp::Reverse(OrderedFloat(deviation)), d.order())
        });
        dims.truncate(n);
        dims
    }

    /// Iterate `(dimension, value)` pairs in canonical order.
    pub fn iter_values(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        Dimension::ALL.iter().map(move |d| (*d, self.values[d]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn neutral_state_is_all_half_with_zero_momentum() {
        let state = EmotionState::neutral(now());
        for d in Dimension::ALL {
            assert_eq!(state.value(d), 0.5);
            assert_eq!(state.momentum(d), 0.0);
        }
    }

    #[test]
    fn set_absolute_clamps_silently() {
        let mut state = EmotionState::neutral(now());
        state.set_absolute(Dimension::Loneliness, 5.0, now());
        assert_eq!(state.value(Dimension::Loneliness), 1.0);
        state.set_absolute(Dimension::Loneliness, -5.0, now());
        assert_eq!(state.value(Dimension::Loneliness), Dimension::Loneliness.floor());
    }

    #[test]
    fn apply_delta_overflow_becomes_momentum() {
        let mut state = EmotionState::neutral(now());
        state.set_absolute(Dimension::Excitement, 0.95, now());
        let outcome = state.apply_delta(Dimension::Excitement, 0.2, now());
        assert_eq!(state.value(Dimension::Excitement), 1.0);
        assert!((outcome.overflow - 0.15).abs() < 1e-9);
        assert!((state.momentum(Dimension::Excitement) - 0.15).abs() < 1e-9);
    }

    #[test]
    fn momentum_only_grows_retaining_the_larger_overflow() {
        let mut state = EmotionState::neutral(now());
        state.set_absolute(Dimension::Excitement, 0.95, now());
        state.apply_delta(Dimension::Excitement, 0.2, now()); // overflow 0.15
        state.set_absolute(Dimension::Excitement, 0.98, now());
        state.apply_delta(Dimension::Excitement, 0.05, now()); // overflow 0.03, smaller
        assert!((state.momentum(Dimension::Excitement) - 0.15).abs() < 1e-9);
    }

    #[test]
    fn clear_momentum_is_the_only_way_it_decreases() {
        let mut state = EmotionState::neutral(now());
        state.set_absolute(Dimension::Excitement, 0.95, now());
        state.apply_delta(Dimension::Excitement, 0.2, now());
        assert!(state.momentum(Dimension::Excitement) > 0.0);
        state.clear_momentum(Some(Dimension::Excitement));
        assert_eq!(state.momentum(Dimension::Excitement), 0.0);
    }

    #[test]
    fn touch_interaction_moves_last_interaction_but_not_last_mutated_alone() {
        let mut state = EmotionState::neutral(now());
        let later = now() + chrono::Duration::minutes(10);
        state.touch_interaction(later);
        assert_eq!(state.last_interaction, later);
        assert_eq!(state.last_mutated, now());
    }

    #[test]
    fn floor_contact_does_not_affect_momentum() {
        let mut state = EmotionState::neutral(now());
        state.apply_delta(Dimension::Loneliness, -10.0, now());
        assert_eq!(state.value(Dimension::Loneliness), Dimension::Loneliness.floor());
        assert_eq!(state.momentum(Dimension::Loneliness), 0.0);
    }

    #[test]
    fn dominant_emotions_breaks_ties_by_canonical_order() {
        let state = EmotionState::neutral(now());
        // all dimensions tied at deviation 0.0; order should be declaration order
        let top = state.dominant_emotions(3);
        assert_eq!(top, vec![Dimension::Loneliness, Dimension::Excitement, Dimension::Frustration]);
    }
}
