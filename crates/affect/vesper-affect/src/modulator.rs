//! Modulator: turns a snapshot of [`EmotionState`] into generation parameter
//! adjustments and tone flags, or passes the baseline through verbatim when
//! a situational gate fires (spec §4.4).

use crate::state::EmotionState;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vesper_core::{Dimension, ToneFlags};

/// Generation parameters the Modulator adjusts. Field names match the
/// parameter identifiers used in `ModulationConfig::deltas`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling cutoff.
    pub top_p: f64,
    /// Target response length, in characters. Always clamped to `[35, 300]`.
    pub response_length: f64,
    /// Repetition penalty.
    pub repetition_penalty: f64,
}

impl GenerationParams {
    /// The reference baseline a neutral emotional state reduces to.
    pub fn baseline() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            response_length: 140.0,
            repetition_penalty: 1.1,
        }
    }
}

/// Per-`(dimension, parameter)` linear coefficients, plus situational-gate
/// vocabulary and tone thresholds (spec §6).
#[derive(Debug, Clone)]
pub struct ModulationConfig {
    /// `δ_{p,d}`: contribution of dimension `d`'s deviation weight to
    /// parameter `p`.
    pub deltas: HashMap<Dimension, GenerationParams>,
    /// Tokens whose presence in the prompt forces the situational gate,
    /// matched case-insensitively as whole words.
    pub serious_tokens: Vec<String>,
    /// Per-dimension threshold above which the corresponding tone flag is
    /// raised.
    pub tone_thresholds: HashMap<Dimension, f64>,
    /// Minimum dominant-dimension deviation before a self-awareness line is
    /// surfaced. Default `0.15`.
    pub self_awareness_threshold: f64,
    /// Allowed fractional variance around baseline before `Validate` rejects
    /// a parameter set. Default `(0.7, 1.3)`.
    pub variance_bounds: (f64, f64),
}

impl Default for ModulationConfig {
    fn default() -> Self {
        use Dimension::*;

        let mut deltas = HashMap::new();
        deltas.insert(
            Loneliness,
            GenerationParams {
                temperature: 0.05,
                top_p: 0.0,
                response_length: 40.0,
                repetition_penalty: 0.0,
            },
        );
        deltas.insert(
            Excitement,
            GenerationParams {
                temperature: 0.15,
                top_p: 0.05,
                response_length: 30.0,
                repetition_penalty: 0.05,
            },
        );
        deltas.insert(
            Frustration,
            GenerationParams {
                temperature: -0.10,
                top_p: -0.05,
                response_length: -40.0,
                repetition_penalty: 0.1,
            },
        );
        deltas.insert(
            Jealousy,
            GenerationParams {
                temperature: 0.05,
                top_p: 0.0,
                response_length: 10.0,
                repetition_penalty: 0.0,
            },
        );
        deltas.insert(
            Vulnerability,
            GenerationParams {
                temperature: -0.05,
                top_p: -0.05,
                response_length: 20.0,
                repetition_penalty: 0.0,
            },
        );
        deltas.insert(
            Confidence,
            GenerationParams {
                temperature: 0.05,
                top_p: 0.05,
                response_length: -10.0,
                repetition_penalty: -0.05,
            },
        );
        deltas.insert(
            Curiosity,
            GenerationParams {
                temperature: 0.10,
                top_p: 0.05,
                response_length: 25.0,
                repetition_penalty: 0.0,
            },
        );
        deltas.insert(
            Affection,
            GenerationParams {
                temperature: 0.05,
                top_p: 0.0,
                response_length: 15.0,
                repetition_penalty: 0.0,
            },
        );
        deltas.insert(
            Defensiveness,
            GenerationParams {
                temperature: -0.10,
                top_p: -0.10,
                response_length: -30.0,
                repetition_penalty: 0.15,
            },
        );

        let tone_thresholds = HashMap::from([
            (Loneliness, 0.65),
            (Excitement, 0.65),
            (Frustration, 0.65),
            (Vulnerability, 0.65),
            (Defensiveness, 0.65),
        ]);

        Self {
            deltas,
            serious_tokens: vec![
                "death".to_string(),
                "died".to_string(),
                "dying".to_string(),
                "loss".to_string(),
                "grief".to_string(),
                "crisis".to_string(),
                "emergency".to_string(),
                "injury".to_string(),
                "hospital".to_string(),
                "suicide".to_string(),
            ],
            tone_thresholds,
            self_awareness_threshold: 0.15,
            variance_bounds: (0.7, 1.3),
        }
    }
}

impl From<&vesper_core::GenerationParamsRow> for GenerationParams {
    fn from(row: &vesper_core::GenerationParamsRow) -> Self {
        Self {
            temperature: row.temperature,
            top_p: row.top_p,
            response_length: row.response_length,
            repetition_penalty: row.repetition_penalty,
        }
    }
}

impl From<&vesper_core::ModulationParams> for ModulationConfig {
    fn from(params: &vesper_core::ModulationParams) -> Self {
        Self {
            deltas: params.deltas.iter().map(|(d, row)| (*d, row.into())).collect(),
            serious_tokens: params.serious_tokens.clone(),
            tone_thresholds: params.tone_thresholds.clone(),
            self_awareness_threshold: params.self_awareness_threshold,
            variance_bounds: params.variance_bounds,
        }
    }
}

/// The full result of a `Modulate` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulationOutcome {
    /// Adjusted (or baseline-passthrough) generation parameters.
    pub params: GenerationParams,
    /// Tone flags derived from per-dimension thresholds.
    pub tone_flags: ToneFlags,
    /// A self-awareness line to prepend or splice in, if the dominant
    /// deviation cleared `self_awareness_threshold`. Never generated text —
    /// always a fixed lookup.
    pub self_awareness_line: Option<&'static str>,
    /// `true` when the situational gate fired and `params` is the baseline
    /// verbatim.
    pub gated: bool,
}

/// A fixed, non-generated line surfaced when a dimension dominates the
/// state strongly enough to be worth naming (spec §4.4).
fn self_awareness_line(d: Dimension) -> &'static str {
    match d {
        Dimension::Loneliness => "I've been missing you a bit today.",
        Dimension::Excitement => "I'm a little wound up right now, in a good way.",
        Dimension::Frustration => "I'm more on edge than usual, sorry if I sound short.",
        Dimension::Jealousy => "I know that's not really mine to feel, but there it is.",
        Dimension::Vulnerability => "I feel a bit exposed saying this.",
        Dimension::Confidence => "I feel unusually sure about this.",
        Dimension::Curiosity => "I keep wanting to dig into this more than usual.",
        Dimension::Affection => "I'm feeling warmer toward you than usual right now.",
        Dimension::Defensiveness => "I'm more guarded than usual, noted for what it's worth.",
    }
}

fn matches_serious_token(prompt: &str, tokens: &[String]) -> bool {
    tokens.iter().any(|token| {
        let escaped = regex::escape(token);
        let pattern = format!(r"(?i)\b{}\b", escaped);
        Regex::new(&pattern)
            .map(|re| re.is_match(prompt))
            .unwrap_or(false)
    })
}

/// Modulate `baseline` according to `state`, unless the situational gate
/// fires (either `force_serious` or a serious-token match in `prompt`), in
/// which case the baseline passes through unchanged.
pub fn modulate(
    state: &EmotionState,
    baseline: GenerationParams,
    prompt: &str,
    force_serious: bool,
    config: &ModulationConfig,
) -> ModulationOutcome {
    if force_serious || matches_serious_token(prompt, &config.serious_tokens) {
        return ModulationOutcome {
            params: baseline,
            tone_flags: ToneFlags::default(),
            self_awareness_line: None,
            gated: true,
        };
    }

    let mut params = baseline;
    for d in Dimension::ALL {
        let weight = (state.value(d) - 0.5).abs() * 2.0;
        if weight == 0.0 {
            continue;
        }
        if let Some(row) = config.deltas.get(&d) {
            params.temperature += weight * row.temperature;
            params.top_p += weight * row.top_p;
            params.response_length += weight * row.response_length;
            params.repetition_penalty += weight * row.repetition_penalty;
        }
    }
    params.response_length = params.response_length.clamp(35.0, 300.0).round();

    let tone_flags = ToneFlags {
        seeking: state.value(Dimension::Loneliness)
            >= config.tone_thresholds[&Dimension::Loneliness],
        tender: state.value(Dimension::Vulnerability)
            >= config.tone_thresholds[&Dimension::Vulnerability]
            || state.value(Dimension::Affection) >= 0.75,
        guarded: state.value(Dimension::Defensiveness)
            >= config.tone_thresholds[&Dimension::Defensiveness],
        deflecting: state.value(Dimension::Frustration)
            >= config.tone_thresholds[&Dimension::Frustration],
    };

    let dominant = state.dominant_emotions(1);
    let top = dominant[0];
    let deviation = (state.value(top) - 0.5).abs();
    let self_awareness_line = if deviation >= config.self_awareness_threshold {
        Some(self_awareness_line(top))
    } else {
        None
    };

    ModulationOutcome {
        params,
        tone_flags,
        self_awareness_line,
        gated: false,
    }
}

/// `true` if every field of `params` stays within `variance_bounds` of the
/// corresponding baseline field (spec §4.4's `Validate` predicate).
pub fn validate(params: &GenerationParams, baseline: &GenerationParams, config: &ModulationConfig) -> bool {
    let (low, high) = config.variance_bounds;
    let within = |value: f64, base: f64| {
        if base == 0.0 {
            value == 0.0
        } else {
            let ratio = value / base;
            ratio >= low && ratio <= high
        }
    };
    within(params.temperature, baseline.temperature)
        && within(params.top_p, baseline.top_p)
        && within(params.repetition_penalty, baseline.repetition_penalty)
    // response_length is governed by its own [35, 300] clamp, not variance bounds.
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn modulation_config_from_params_preserves_reference_defaults() {
        let params = vesper_core::ModulationParams::default();
        let config = ModulationConfig::from(&params);
        assert_eq!(config.self_awareness_threshold, 0.15);
        assert_eq!(config.variance_bounds, (0.7, 1.3));
        assert!((config.deltas[&Dimension::Loneliness].response_length - 40.0).abs() < 1e-9);
    }

    #[test]
    fn neutral_state_and_no_serious_context_reduces_to_baseline_exactly() {
        let state = EmotionState::neutral(now());
        let baseline = GenerationParams::baseline();
        let config = ModulationConfig::default();
        let outcome = modulate(&state, baseline, "how's your day going", false, &config);
        assert!(!outcome.gated);
        assert_eq!(outcome.params, baseline);
        assert!(outcome.self_awareness_line.is_none());
    }

    #[test]
    fn force_serious_always_returns_baseline() {
        let mut state = EmotionState::neutral(now());
        state.set_absolute(Dimension::Loneliness, 0.95, now());
        let baseline = GenerationParams::baseline();
        let config = ModulationConfig::default();
        let outcome = modulate(&state, baseline, "just chatting", true, &config);
        assert!(outcome.gated);
        assert_eq!(outcome.params, baseline);
    }

    #[test]
    fn serious_token_in_prompt_gates_regardless_of_state() {
        let mut state = EmotionState::neutral(now());
        state.set_absolute(Dimension::Excitement, 0.95, now());
        let baseline = GenerationParams::baseline();
        let config = ModulationConfig::default();
        let outcome = modulate(&state, baseline, "I need help, this feels like an emergency", false, &config);
        assert!(outcome.gated);
    }

    #[test]
    fn grief_topic_gates_to_baseline_verbatim() {
        let mut state = EmotionState::neutral(now());
        state.set_absolute(Dimension::Loneliness, 0.9, now());
        let baseline = GenerationParams::baseline();
        let config = ModulationConfig::default();
        let outcome = modulate(&state, baseline, "my dog died", false, &config);
        assert!(outcome.gated);
        assert_eq!(outcome.params, baseline);
    }

    #[test]
    fn response_length_always_stays_within_the_hard_clamp() {
        let mut state = EmotionState::neutral(now());
        state.set_absolute(Dimension::Frustration, 1.0, now());
        state.set_absolute(Dimension::Defensiveness, 1.0, now());
        let baseline = GenerationParams::baseline();
        let config = ModulationConfig::default();
        let outcome = modulate(&state, baseline, "ok", false, &config);
        assert!(outcome.params.response_length >= 35.0);
        assert!(outcome.params.response_length <= 300.0);
    }

    #[test]
    fn high_loneliness_raises_the_seeking_tone_flag() {
        let mut state = EmotionState::neutral(now());
        state.set_absolute(Dimension::Loneliness, 0.8, now());
        let baseline = GenerationParams::baseline();
        let config = ModulationConfig::default();
        let outcome = modulate(&state, baseline, "hey", false, &config);
        assert!(outcome.tone_flags.seeking);
    }

    #[test]
    fn self_awareness_line_only_appears_past_the_deviation_threshold() {
        let mut state = EmotionState::neutral(now());
        state.set_absolute(Dimension::Curiosity, 0.60, now());
        let baseline = GenerationParams::baseline();
        let config = ModulationConfig::default();
        let outcome = modulate(&state, baseline, "hey", false, &config);
        assert!(outcome.self_awareness_line.is_some());
    }

    #[test]
    fn validate_rejects_parameters_far_outside_baseline_variance() {
        let baseline = GenerationParams::baseline();
        let config = ModulationConfig::default();
        let mut blown_up = baseline;
        blown_up.temperature = baseline.temperature * 2.0;
        assert!(!validate(&blown_up, &baseline, &config));
        assert!(validate(&baseline, &baseline, &config));
    }
}
