//! A concrete `Transport`: delivers to stdout and classifies stdin lines
//! into inbound `InteractionEvent`s. Local/demo stand-in for the real wire
//! transports (Discord, mobile, voice) spec §6 treats as opaque edges.

#![warn(missing_docs)]

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use vesper_affect::InteractionEvent;
use vesper_core::{Clock, DeliverPayload, DeliveryOutcome, EventKind, Result, Transport};
use vesper_scheduler::{EventFunnel, FunnelOutcome};

/// Delivers companion output to stdout. `availability_rank` is fixed at 1
/// since a local terminal session has no notion of competing instances.
pub struct TerminalTransport {
    clock: Arc<dyn Clock>,
}

impl TerminalTransport {
    /// Build a terminal transport against `clock`, used to stamp delivery
    /// instants and classified inbound events.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Spawn a background task that reads lines from stdin, classifies each
    /// into an `InteractionEvent`, and pushes it onto `funnel`. Runs until
    /// stdin hits EOF; has no shutdown coordination of its own because the
    /// Scheduler's tick loop drains the funnel independently and an idle
    /// reader blocked on stdin costs nothing at process exit.
    pub fn spawn_stdin_reader(&self, funnel: Arc<EventFunnel>) -> JoinHandle<()> {
        let clock = Arc::clone(&self.clock);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        let event = InteractionEvent {
                            kind: classify(trimmed),
                            transport: "terminal".to_string(),
                            instant: clock.now(),
                            metadata: serde_json::json!({ "text": trimmed }),
                        };
                        if matches!(funnel.push(event), FunnelOutcome::Rejected) {
                            tracing::warn!("event funnel full, dropped a stdin line");
                        }
                    }
                    Ok(None) => break,
                    Err(error) => {
                        tracing::warn!(%error, "stdin read error, stopping terminal reader");
                        break;
                    }
                }
            }
        })
    }
}

/// Crude keyword classifier standing in for the sentiment/intent
/// classification a real transport or upstream NLU layer would do before
/// calling into the core; the core itself never learns this mapping (spec
/// §1 Non-goals).
fn classify(line: &str) -> EventKind {
    let lower = line.to_lowercase();
    if lower.contains("error") || lower.contains("broke") || lower.contains("failed") {
        EventKind::ErrorOccurred
    } else if lower.contains("fixed") || lower.contains("works now") || lower.contains("solved") {
        EventKind::SuccessfulHelp
    } else if lower.contains("commit") || lower.contains("pushed") || lower.contains("merged") {
        EventKind::CodeUpdate
    } else if lower.contains("no thanks") || lower.contains("don't") || lower.contains("stop") {
        EventKind::UserRefusal
    } else if lower.contains("hate") || lower.contains("annoying") || lower.contains("ugh") {
        EventKind::NegativeMessage
    } else {
        EventKind::PositiveMessage
    }
}

#[async_trait]
impl Transport for TerminalTransport {
    fn name(&self) -> &str {
        "terminal"
    }

    fn availability_rank(&self) -> u8 {
        1
    }

    async fn deliver(&self, payload: DeliverPayload, _deadline: Duration) -> Result<DeliveryOutcome> {
        let mut line = payload.text;
        let flags = payload.tone_flags;
        if flags.seeking || flags.tender || flags.guarded || flags.deflecting {
            let mut tags = Vec::new();
            if flags.tender {
                tags.push("tender");
            }
            if flags.seeking {
                tags.push("seeking");
            }
            if flags.guarded {
                tags.push("guarded");
            }
            if flags.deflecting {
                tags.push("deflecting");
            }
            line = format!("[{}] {}", tags.join(","), line);
        }
        println!("{line}");
        Ok(DeliveryOutcome {
            delivered: true,
            instant: self.clock.now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_core::{FakeClock, ToneFlags};

    #[test]
    fn classifies_error_keywords() {
        assert_eq!(classify("ugh this totally broke again"), EventKind::ErrorOccurred);
    }

    #[test]
    fn classifies_code_update_keywords() {
        assert_eq!(classify("just pushed the fix"), EventKind::CodeUpdate);
    }

    #[test]
    fn falls_back_to_positive_message() {
        assert_eq!(classify("good morning!"), EventKind::PositiveMessage);
    }

    #[tokio::test]
    async fn deliver_reports_delivered_true() {
        let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
        let transport = TerminalTransport::new(clock);
        let payload = DeliverPayload {
            text: "hey, how's the refactor going?".to_string(),
            tone_flags: ToneFlags::default(),
        };
        let outcome = transport.deliver(payload, Duration::from_secs(10)).await.unwrap();
        assert!(outcome.delivered);
    }

    #[test]
    fn name_and_rank_are_fixed() {
        let clock = Arc::new(FakeClock::new(chrono::Utc::now()));
        let transport = TerminalTransport::new(clock);
        assert_eq!(transport.name(), "terminal");
        assert_eq!(transport.availability_rank(), 1);
    }
}
