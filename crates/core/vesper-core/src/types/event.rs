//! The closed set of interaction event kinds (spec §3).

use serde::{Deserialize, Serialize};

/// An inbound interaction event kind. Closed set; an unrecognized kind is
/// rejected at the Scheduler boundary rather than accepted as a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A message judged positive in sentiment.
    PositiveMessage,
    /// A message judged negative in sentiment.
    NegativeMessage,
    /// The user pushed or described a code change.
    CodeUpdate,
    /// An error occurred during a task the companion was helping with.
    ErrorOccurred,
    /// The companion successfully helped with something.
    SuccessfulHelp,
    /// The user refused or declined a suggestion.
    UserRefusal,
    /// No inbound event for at least the idle threshold (synthesized by the
    /// Scheduler, not delivered by a transport).
    LongIdle,
    /// Several errors occurred in rapid succession.
    RapidErrors,
}

impl EventKind {
    /// All eight kinds, for iteration in tests and config validation.
    pub const ALL: [EventKind; 8] = [
        EventKind::PositiveMessage,
        EventKind::NegativeMessage,
        EventKind::CodeUpdate,
        EventKind::ErrorOccurred,
        EventKind::SuccessfulHelp,
        EventKind::UserRefusal,
        EventKind::LongIdle,
        EventKind::RapidErrors,
    ];

    /// Parse a wire-format kind string against the closed set. Unknown
    /// strings are the caller's cue to reject the event at ingress.
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "positive_message" => EventKind::PositiveMessage,
            "negative_message" => EventKind::NegativeMessage,
            "code_update" => EventKind::CodeUpdate,
            "error_occurred" => EventKind::ErrorOccurred,
            "successful_help" => EventKind::SuccessfulHelp,
            "user_refusal" => EventKind::UserRefusal,
            "long_idle" => EventKind::LongIdle,
            "rapid_errors" => EventKind::RapidErrors,
            _ => return None,
        })
    }

    /// Lowercase wire identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::PositiveMessage => "positive_message",
            EventKind::NegativeMessage => "negative_message",
            EventKind::CodeUpdate => "code_update",
            EventKind::ErrorOccurred => "error_occurred",
            EventKind::SuccessfulHelp => "successful_help",
            EventKind::UserRefusal => "user_refusal",
            EventKind::LongIdle => "long_idle",
            EventKind::RapidErrors => "rapid_errors",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_kind() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert_eq!(EventKind::parse("teleported"), None);
    }
}
