//! The two external collaborator contracts the Affect Core calls out to:
//! text generation and message delivery (spec §6). Both are thin, bounded
//! by a caller-supplied deadline, and treated as opaque edges.

use crate::types::{DeliverPayload, DeliveryOutcome, GenerateRequest};
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

/// A pure-with-respect-to-the-core text generator. Timeouts are errors; the
/// core never retries a failed generation itself (the Scheduler decides
/// whether to skip the autonomy emission for this tick).
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate text for the given request, bounded by `deadline`.
    async fn generate(&self, request: GenerateRequest, deadline: Duration) -> Result<String>;
}

/// A wire transport to end users. A transport both delivers outbound
/// messages and is the origin of inbound `InteractionEvent`s, but the
/// inbound direction is modeled by the Scheduler's event funnel, not by this
/// trait — `Transport` here covers only the outbound half the Scheduler
/// calls.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Stable identifier for this transport (used in `InteractionRecord`s
    /// and availability ranking).
    fn name(&self) -> &str;

    /// Relative availability rank; higher is preferred when the Scheduler
    /// must pick one transport among several for an autonomous send.
    fn availability_rank(&self) -> u8;

    /// Deliver a payload, bounded by `deadline`. Must be idempotent on
    /// retries within a delivery window (spec §6); the core itself never
    /// retries a failed autonomous send.
    async fn deliver(&self, payload: DeliverPayload, deadline: Duration) -> Result<DeliveryOutcome>;
}
