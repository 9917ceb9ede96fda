//! Wire types for the `Generate` and `Deliver` external contracts (spec §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Boolean tone flags attached to a modulated response (spec §3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToneFlags {
    /// Companion is seeking reassurance or connection.
    pub seeking: bool,
    /// Companion is being affectionate/tender.
    pub tender: bool,
    /// Companion is guarded, holding back.
    pub guarded: bool,
    /// Companion is deflecting rather than engaging directly.
    pub deflecting: bool,
}

/// A request to the external text generator. `prompt_template_id` names a
/// template the enclosing service resolves; the core never builds prompt
/// text itself, only the variables that go into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Identifies which prompt template to render.
    pub prompt_template_id: String,
    /// Named variables substituted into the template.
    pub variables: HashMap<String, String>,
}

impl GenerateRequest {
    /// Build a request with no variables.
    pub fn new(prompt_template_id: impl Into<String>) -> Self {
        Self {
            prompt_template_id: prompt_template_id.into(),
            variables: HashMap::new(),
        }
    }

    /// Attach a variable, builder-style.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }
}

/// A payload handed to a `Transport` for delivery to the end user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverPayload {
    /// The generated text.
    pub text: String,
    /// Tone flags the transport may use for presentation (e.g. emoji, voice
    /// inflection); plain text remains the substance of the payload.
    pub tone_flags: ToneFlags,
}

/// The result of a delivery attempt (spec §6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    /// Whether the transport confirmed delivery.
    pub delivered: bool,
    /// The instant the transport recorded the attempt.
    pub instant: DateTime<Utc>,
}
