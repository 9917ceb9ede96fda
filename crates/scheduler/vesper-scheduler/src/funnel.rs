//! Inbound event funnel: one serialization point every transport feeds,
//! with backpressure shedding beyond a high-water mark (spec §4.6).

use std::collections::VecDeque;
use std::sync::Mutex;
use vesper_affect::InteractionEvent;
use vesper_core::EventKind;

/// What happened when an event was pushed onto the funnel.
#[derive(Debug)]
pub enum FunnelOutcome {
    /// Queued normally.
    Accepted,
    /// Queued, but the high-water mark was exceeded so the oldest
    /// non-`error_occurred` event already in the queue was dropped.
    AcceptedWithShed(InteractionEvent),
    /// The queue was at capacity and entirely `error_occurred` events (never
    /// shed), so this new event was itself dropped.
    Rejected,
}

/// Per-transport FIFO funnel. Transports push from any task; exactly one
/// tick loop drains it in order.
pub struct EventFunnel {
    queue: Mutex<VecDeque<InteractionEvent>>,
    high_water_mark: usize,
}

impl EventFunnel {
    /// Build an empty funnel with the given high-water mark.
    pub fn new(high_water_mark: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            high_water_mark,
        }
    }

    /// Push one event, applying the shedding policy if the queue is full.
    pub fn push(&self, event: InteractionEvent) -> FunnelOutcome {
        let mut queue = self.queue.lock().expect("event funnel mutex poisoned");
        if queue.len() < self.high_water_mark {
            queue.push_back(event);
            return FunnelOutcome::Accepted;
        }

        let shed_index = queue.iter().position(|e| e.kind != EventKind::ErrorOccurred);
        match shed_index {
            Some(index) => {
                let shed = queue.remove(index).expect("index came from position()");
                queue.push_back(event);
                FunnelOutcome::AcceptedWithShed(shed)
            }
            None => FunnelOutcome::Rejected,
        }
    }

    /// Drain every currently-queued event, in FIFO order.
    pub fn drain(&self) -> Vec<InteractionEvent> {
        let mut queue = self.queue.lock().expect("event funnel mutex poisoned");
        queue.drain(..).collect()
    }

    /// Current queue depth.
    pub fn len(&self) -> usize {
        self.queue.lock().expect("event funnel mutex poisoned").len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::Value;

    fn event(kind: EventKind) -> InteractionEvent {
        InteractionEvent {
            kind,
            transport: "terminal".to_string(),
            instant: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            metadata: Value::Null,
        }
    }

    #[test]
    fn sheds_oldest_non_error_event_first() {
        let funnel = EventFunnel::new(2);
        funnel.push(event(EventKind::PositiveMessage));
        funnel.push(event(EventKind::ErrorOccurred));
        let outcome = funnel.push(event(EventKind::NegativeMessage));
        assert!(matches!(outcome, FunnelOutcome::AcceptedWithShed(_)));
        let drained = funnel.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].kind, EventKind::ErrorOccurred);
        assert_eq!(drained[1].kind, EventKind::NegativeMessage);
    }

    #[test]
    fn rejects_new_event_when_queue_is_all_errors() {
        let funnel = EventFunnel::new(1);
        funnel.push(event(EventKind::ErrorOccurred));
        let outcome = funnel.push(event(EventKind::PositiveMessage));
        assert!(matches!(outcome, FunnelOutcome::Rejected));
        assert_eq!(funnel.len(), 1);
    }

    #[test]
    fn drains_in_fifo_order() {
        let funnel = EventFunnel::new(10);
        funnel.push(event(EventKind::PositiveMessage));
        funnel.push(event(EventKind::NegativeMessage));
        funnel.push(event(EventKind::CodeUpdate));
        let drained = funnel.drain();
        assert_eq!(
            drained.iter().map(|e| e.kind).collect::<Vec<_>>(),
            vec![EventKind::PositiveMessage, EventKind::NegativeMessage, EventKind::CodeUpdate]
        );
        assert!(funnel.is_empty());
    }
}
