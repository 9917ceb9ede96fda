//! Interaction Handler: applies a validated [`InteractionEvent`] to the
//! current [`EmotionState`] with dampening and momentum amplification,
//! producing an [`InteractionRecord`] (spec §4.3).

use crate::state::EmotionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::OnceLock;
use vesper_core::{Dimension, EventKind};

/// Per-dimension nominal delta table, keyed by event kind.
#[derive(Debug, Clone)]
pub struct DeltaTable {
    rows: HashMap<EventKind, HashMap<Dimension, f64>>,
    confidence: HashMap<EventKind, f64>,
}

impl Default for DeltaTable {
    fn default() -> Self {
        use Dimension::*;
        use EventKind::*;

        let mut rows: HashMap<EventKind, HashMap<Dimension, f64>> = HashMap::new();
        rows.insert(
            PositiveMessage,
            HashMap::from([(Excitement, 0.15), (Affection, 0.12), (Loneliness, -0.10)]),
        );
        rows.insert(
            NegativeMessage,
            HashMap::from([(Frustration, 0.10), (Vulnerability, 0.08), (Affection, -0.05)]),
        );
        rows.insert(
            CodeUpdate,
            HashMap::from([(Jealousy, -0.30), (Excitement, 0.10), (Affection, 0.15)]),
        );
        rows.insert(
            ErrorOccurred,
            HashMap::from([(Frustration, 0.15), (Confidence, -0.10)]),
        );
        rows.insert(
            SuccessfulHelp,
            HashMap::from([(Confidence, 0.15), (Excitement, 0.08), (Curiosity, 0.05)]),
        );
        rows.insert(
            UserRefusal,
            HashMap::from([(Defensiveness, 0.12), (Vulnerability, 0.10), (Confidence, -0.05)]),
        );
        rows.insert(
            LongIdle,
            HashMap::from([(Loneliness, 0.20), (Excitement, -0.15), (Confidence, -0.10)]),
        );
        rows.insert(
            RapidErrors,
            HashMap::from([(Frustration, 0.25), (Defensiveness, 0.15), (Confidence, -0.15)]),
        );

        let confidence = HashMap::from([
            (PositiveMessage, 0.9),
            (NegativeMessage, 0.9),
            (CodeUpdate, 0.8),
            (ErrorOccurred, 0.85),
            (SuccessfulHelp, 0.85),
            (UserRefusal, 0.8),
            (LongIdle, 1.0),
            (RapidErrors, 0.9),
        ]);

        Self { rows, confidence }
    }
}

impl DeltaTable {
    /// The nominal delta row for `kind`, empty if the kind has no configured
    /// deltas.
    pub fn deltas_for(&self, kind: EventKind) -> &HashMap<Dimension, f64> {
        static EMPTY: OnceLock<HashMap<Dimension, f64>> = OnceLock::new();
        self.rows.get(&kind).unwrap_or_else(|| EMPTY.get_or_init(HashMap::new))
    }

    /// Nominal confidence for `kind`, defaulting to `0.5` if unconfigured.
    pub fn confidence_for(&self, kind: EventKind) -> f64 {
        self.confidence.get(&kind).copied().unwrap_or(0.5)
    }
}

/// Interaction Handler configuration (spec §6).
#[derive(Debug, Clone)]
pub struct InteractionConfig {
    /// Static per-kind delta table.
    pub delta_table: DeltaTable,
    /// Length of the recent-event history used for dampening. Default `8`.
    pub dampening_window: usize,
    /// Slope in the dampening multiplier `max(0.5, 1.0 - slope * c)`.
    /// Default `0.2`.
    pub dampening_slope: f64,
    /// Coefficient in the momentum amplification formula
    /// `1 + coefficient * min(momentum_d, 1.0)`. Default `0.5`.
    pub momentum_amplification: f64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            delta_table: DeltaTable::default(),
            dampening_window: 8,
            dampening_slope: 0.2,
            momentum_amplification: 0.5,
        }
    }
}

impl From<&vesper_core::InteractionParams> for InteractionConfig {
    /// Builds from the configurable scalar knobs; the delta table isn't one
    /// of them (spec §6 names only `dampening_window`, `dampening_slope`,
    /// `momentum_amplification`), so it stays the fixed reference table.
    fn from(params: &vesper_core::InteractionParams) -> Self {
        Self {
            delta_table: DeltaTable::default(),
            dampening_window: params.dampening_window,
            dampening_slope: params.dampening_slope,
            momentum_amplification: params.momentum_amplification,
        }
    }
}

/// A validated inbound interaction event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEvent {
    /// The event kind.
    pub kind: EventKind,
    /// Originating transport identifier.
    pub transport: String,
    /// When the event occurred.
    pub instant: DateTime<Utc>,
    /// Opaque metadata the core treats as a black box.
    pub metadata: Value,
}

/// An append-only audit row for an applied event. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// The event kind.
    pub kind: EventKind,
    /// When the event occurred.
    pub instant: DateTime<Utc>,
    /// Originating transport identifier.
    pub transport: String,
    /// State snapshot immediately before application.
    pub before: EmotionState,
    /// State snapshot immediately after application.
    pub after: EmotionState,
    /// Momentum overflow realized per dimension, for dimensions where the
    /// event's delta produced any overflow.
    pub overflow: HashMap<Dimension, f64>,
    /// Nominal confidence for this event kind.
    pub confidence: f64,
    /// Opaque context carried from the inbound event.
    pub context: Value,
}

/// Applies events to an [`EmotionState`], maintaining the short bounded
/// history dampening depends on.
pub struct InteractionHandler {
    config: InteractionConfig,
    history: VecDeque<EventKind>,
}

impl InteractionHandler {
    /// Build a handler with the given configuration and empty history.
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            history: VecDeque::new(),
        }
    }

    /// How many of the most recent consecutive history entries (at the
    /// tail) match `kind`.
    fn consecutive_matches(&self, kind: EventKind) -> u32 {
        let mut count = 0;
        for entry in self.history.iter().rev() {
            if *entry == kind {
                count += 1;
            } else {
                break;
            }
        }
        count
    }

    /// Apply `event` to `state`, following the fixed application order:
    /// (1) dampening factor, (2) momentum-amplified deltas, (3) per-dimension
    /// `ApplyDelta` in canonical dimension order, (4) record construction.
    pub fn apply(&mut self, state: &mut EmotionState, event: InteractionEvent) -> InteractionRecord {
        let before = state.snapshot();

        let consecutive = self.consecutive_matches(event.kind);
        let dampening = (1.0 - self.config.dampening_slope * consecutive as f64).max(0.5);

        let nominal = self.config.delta_table.deltas_for(event.kind).clone();
        let mut overflow = HashMap::new();

        for d in Dimension::ALL {
            let Some(&raw_delta) = nominal.get(&d) else {
                continue;
            };
            let dampened = raw_delta * dampening;
            let momentum = state.momentum(d);
            let amplified =
                dampened * (1.0 + self.config.momentum_amplification * momentum.min(1.0));

            if amplified.abs() < 1e-9 {
                continue;
            }

            let outcome = state.apply_delta(d, amplified, event.instant);
            if outcome.overflow > 0.0 {
                overflow.insert(d, outcome.overflow);
            }
        }

        self.history.push_back(event.kind);
        while self.history.len() > self.config.dampening_window {
            self.history.pop_front();
        }

        InteractionRecord {
            kind: event.kind,
            instant: event.instant,
            transport: event.transport,
            before,
            after: state.snapshot(),
            overflow,
            confidence: self.config.delta_table.confidence_for(event.kind),
            context: event.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn positive_event() -> InteractionEvent {
        InteractionEvent {
            kind: EventKind::PositiveMessage,
            transport: "terminal".to_string(),
            instant: now(),
            metadata: Value::Null,
        }
    }

    #[test]
    fn interaction_config_from_params_preserves_reference_defaults() {
        let params = vesper_core::InteractionParams::default();
        let config = InteractionConfig::from(&params);
        assert_eq!(config.dampening_window, 8);
        assert!((config.momentum_amplification - 0.5).abs() < 1e-9);
    }

    #[test]
    fn neutral_plus_single_positive_matches_the_scenario() {
        let mut state = EmotionState::neutral(now());
        let mut handler = InteractionHandler::new(InteractionConfig::default());
        handler.apply(&mut state, positive_event());

        assert!((state.value(Dimension::Excitement) - 0.65).abs() < 1e-9);
        assert!((state.value(Dimension::Affection) - 0.62).abs() < 1e-9);
        assert!((state.value(Dimension::Loneliness) - 0.40).abs() < 1e-9);
    }

    #[test]
    fn dampening_never_multiplies_below_the_floor() {
        // Exercise the multiplier formula directly (`max(0.5, 1 - slope*c)`)
        // rather than a realized delta, which would also be subject to
        // ceiling clamping and momentum amplification once `c` grows.
        let slope = InteractionConfig::default().dampening_slope;
        let dampening = |consecutive: u32| (1.0 - slope * consecutive as f64).max(0.5);

        // multipliers: 1.0, 0.8, 0.6, 0.5, 0.5, 0.5 (floor holds from the 4th on)
        assert!((dampening(0) - 1.0).abs() < 1e-9);
        assert!((dampening(1) - 0.8).abs() < 1e-9);
        assert!((dampening(2) - 0.6).abs() < 1e-9);
        assert!((dampening(3) - 0.5).abs() < 1e-9);
        assert!((dampening(4) - 0.5).abs() < 1e-9);
        assert!((dampening(5) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn record_captures_before_and_after_snapshots() {
        let mut state = EmotionState::neutral(now());
        let mut handler = InteractionHandler::new(InteractionConfig::default());
        let record = handler.apply(&mut state, positive_event());

        assert_eq!(record.before.value(Dimension::Excitement), 0.5);
        assert!((record.after.value(Dimension::Excitement) - 0.65).abs() < 1e-9);
        assert_eq!(record.transport, "terminal");
    }

    #[test]
    fn tiny_deltas_below_threshold_are_dropped() {
        let mut state = EmotionState::neutral(now());
        let mut config = InteractionConfig::default();
        config
            .delta_table
            .rows
            .insert(EventKind::UserRefusal, HashMap::from([(Dimension::Confidence, 1e-10)]));
        let mut handler = InteractionHandler::new(config);
        let event = InteractionEvent {
            kind: EventKind::UserRefusal,
            transport: "terminal".to_string(),
            instant: now(),
            metadata: Value::Null,
        };
        handler.apply(&mut state, event);
        assert_eq!(state.value(Dimension::Confidence), 0.5);
    }
}
