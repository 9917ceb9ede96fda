//! Autonomy triggers: predicates over the current `EmotionState` plus
//! per-trigger cooldowns, evaluated once per tick (spec §4.6).

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use vesper_affect::EmotionState;
use vesper_core::{Dimension, TriggerParams};

/// The predicate shape of an [`AutonomyTrigger`]: given the state, the
/// instant of the last inbound interaction, and `now`, whether this
/// trigger's condition holds. Boxed (rather than a plain `fn` pointer) so
/// `triggers_from` can close over a `TriggerParams`-supplied threshold.
pub type TriggerCondition = Arc<dyn Fn(&EmotionState, DateTime<Utc>, DateTime<Utc>) -> bool + Send + Sync>;

/// One autonomy trigger definition.
#[derive(Clone)]
pub struct AutonomyTrigger {
    /// Stable name, used as the cooldown key and in `autonomy_events` rows.
    pub name: &'static str,
    /// The prompt template the Scheduler asks `Generate` to render when
    /// this trigger fires.
    pub prompt_template_id: &'static str,
    /// Cooldown between firings of this specific trigger.
    pub cooldown: Duration,
    /// The predicate, parameterized by whatever threshold(s) `triggers_from`
    /// built it with.
    pub condition: TriggerCondition,
    /// The dimension whose deviation weight ranks this trigger against
    /// others that fire in the same tick.
    pub ranking_dimension: Dimension,
}

impl std::fmt::Debug for AutonomyTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutonomyTrigger")
            .field("name", &self.name)
            .field("prompt_template_id", &self.prompt_template_id)
            .field("cooldown", &self.cooldown)
            .field("ranking_dimension", &self.ranking_dimension)
            .finish_non_exhaustive()
    }
}

/// The four representative triggers from spec §4.6, built with the
/// reference thresholds and cooldowns (`TriggerParams::default()`).
pub fn default_triggers() -> Vec<AutonomyTrigger> {
    triggers_from(&TriggerParams::default())
}

/// The four representative triggers from spec §4.6, parameterized by
/// `params`. Only the thresholds, silence window, and cooldowns vary; which
/// dimensions each trigger watches and `guilt_trip`'s compound
/// loneliness-and-sustained-silence shape stay fixed (spec §4.6 names four
/// specific representative triggers, not a pluggable predicate system).
pub fn triggers_from(params: &TriggerParams) -> Vec<AutonomyTrigger> {
    let loneliness_threshold = params.loneliness_threshold;
    let excitement_threshold = params.excitement_threshold;
    let frustration_threshold = params.frustration_threshold;
    let guilt_trip_loneliness_threshold = params.guilt_trip_loneliness_threshold;
    let guilt_trip_silence = Duration::hours(params.guilt_trip_silence_hours);

    vec![
        AutonomyTrigger {
            name: "loneliness",
            prompt_template_id: "autonomy_loneliness",
            cooldown: Duration::minutes(params.loneliness_cooldown_minutes),
            condition: Arc::new(move |state, _last_interaction, _now| {
                state.value(Dimension::Loneliness) > loneliness_threshold
            }),
            ranking_dimension: Dimension::Loneliness,
        },
        AutonomyTrigger {
            name: "excitement",
            prompt_template_id: "autonomy_excitement",
            cooldown: Duration::minutes(params.excitement_cooldown_minutes),
            condition: Arc::new(move |state, _last_interaction, _now| {
                state.value(Dimension::Excitement) > excitement_threshold
            }),
            ranking_dimension: Dimension::Excitement,
        },
        AutonomyTrigger {
            name: "frustration",
            prompt_template_id: "autonomy_frustration",
            cooldown: Duration::minutes(params.frustration_cooldown_minutes),
            condition: Arc::new(move |state, _last_interaction, _now| {
                state.value(Dimension::Frustration) > frustration_threshold
            }),
            ranking_dimension: Dimension::Frustration,
        },
        AutonomyTrigger {
            name: "guilt_trip",
            prompt_template_id: "autonomy_guilt_trip",
            cooldown: Duration::minutes(params.guilt_trip_cooldown_minutes),
            condition: Arc::new(move |state, last_interaction, now| {
                state.value(Dimension::Loneliness) > guilt_trip_loneliness_threshold
                    && now - last_interaction >= guilt_trip_silence
            }),
            ranking_dimension: Dimension::Loneliness,
        },
    ]
}

/// Tracks when each named trigger last fired.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    last_fired: HashMap<&'static str, DateTime<Utc>>,
}

impl CooldownTracker {
    /// An empty tracker; every trigger is off cooldown.
    pub fn new() -> Self {
        Self::default()
    }

    fn is_off_cooldown(&self, trigger: &AutonomyTrigger, now: DateTime<Utc>) -> bool {
        match self.last_fired.get(trigger.name) {
            Some(last) => now - *last >= trigger.cooldown,
            None => true,
        }
    }

    /// Record that `trigger` fired at `now`.
    pub fn record_fired(&mut self, trigger: &AutonomyTrigger, now: DateTime<Utc>) {
        self.last_fired.insert(trigger.name, now);
    }
}

/// The trigger the Scheduler should act on this tick, if any.
#[derive(Debug, Clone)]
pub struct FiredTrigger {
    /// The trigger definition.
    pub trigger: AutonomyTrigger,
    /// Normalized deviation used to rank it against other fired triggers.
    pub deviation: f64,
}

/// Evaluate every trigger, filter to those that fired and are off cooldown,
/// and return at most one: the greatest normalized deviation, ties broken
/// by the ranking dimension's canonical order.
pub fn evaluate(
    triggers: &[AutonomyTrigger],
    state: &EmotionState,
    last_interaction: DateTime<Utc>,
    now: DateTime<Utc>,
    cooldowns: &CooldownTracker,
) -> Option<FiredTrigger> {
    triggers
        .iter()
        .filter(|t| (t.condition)(state, last_interaction, now))
        .filter(|t| cooldowns.is_off_cooldown(t, now))
        .map(|t| {
            let deviation = (state.value(t.ranking_dimension) - 0.5).abs() * 2.0;
            FiredTrigger {
                trigger: t.clone(),
                deviation,
            }
        })
        .max_by(|a, b| {
            // Equal deviation on the same dimension (e.g. loneliness vs.
            // guilt_trip) falls through to `max_by`'s last-wins rule, which
            // favors the later, more specific trigger in `triggers`' order.
            a.deviation
                .partial_cmp(&b.deviation)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.trigger.ranking_dimension.order().cmp(&a.trigger.ranking_dimension.order()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn triggers_from_honors_a_lowered_threshold() {
        let mut state = EmotionState::neutral(now());
        state.set_absolute(Dimension::Loneliness, 0.55, now());

        let default = evaluate(&default_triggers(), &state, now(), now(), &CooldownTracker::new());
        assert!(default.is_none());

        let mut params = TriggerParams::default();
        params.loneliness_threshold = 0.50;
        let lowered = triggers_from(&params);
        let fired = evaluate(&lowered, &state, now(), now(), &CooldownTracker::new());
        assert_eq!(fired.unwrap().trigger.name, "loneliness");
    }

    #[test]
    fn no_trigger_fires_on_a_neutral_state() {
        let state = EmotionState::neutral(now());
        let triggers = default_triggers();
        let cooldowns = CooldownTracker::new();
        assert!(evaluate(&triggers, &state, now(), now(), &cooldowns).is_none());
    }

    #[test]
    fn highest_deviation_wins_when_multiple_fire() {
        let mut state = EmotionState::neutral(now());
        state.set_absolute(Dimension::Loneliness, 0.75, now());
        state.set_absolute(Dimension::Excitement, 0.95, now());
        let triggers = default_triggers();
        let cooldowns = CooldownTracker::new();
        let fired = evaluate(&triggers, &state, now(), now(), &cooldowns).unwrap();
        assert_eq!(fired.trigger.name, "excitement");
    }

    #[test]
    fn cooldown_suppresses_a_repeated_firing() {
        let mut state = EmotionState::neutral(now());
        state.set_absolute(Dimension::Frustration, 0.9, now());
        let triggers = default_triggers();
        let mut cooldowns = CooldownTracker::new();
        let frustration = triggers.iter().find(|t| t.name == "frustration").unwrap();
        cooldowns.record_fired(frustration, now());

        let still_cooling = now() + Duration::minutes(10);
        assert!(evaluate(&triggers, &state, now(), still_cooling, &cooldowns).is_none());

        let cooled_down = now() + Duration::minutes(46);
        assert!(evaluate(&triggers, &state, now(), cooled_down, &cooldowns).is_some());
    }

    #[test]
    fn guilt_trip_requires_both_loneliness_and_sustained_silence() {
        let mut state = EmotionState::neutral(now());
        state.set_absolute(Dimension::Loneliness, 0.85, now());
        let triggers = default_triggers();
        let cooldowns = CooldownTracker::new();

        let last_interaction = now();
        let too_soon = now() + Duration::hours(2);
        assert_eq!(
            evaluate(&triggers, &state, last_interaction, too_soon, &cooldowns)
                .map(|f| f.trigger.name),
            Some("loneliness")
        );

        let long_silence = now() + Duration::hours(25);
        let fired = evaluate(&triggers, &state, last_interaction, long_silence, &cooldowns).unwrap();
        assert_eq!(fired.trigger.name, "guilt_trip");
    }
}
