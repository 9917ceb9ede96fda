//! The Scheduler: sole mutator of `EmotionState`, tick loop driver, event
//! funnel consumer, autonomy trigger evaluator, and shutdown coordinator
//! (spec §4.6).

use crate::config::SchedulerConfig;
use crate::funnel::{EventFunnel, FunnelOutcome};
use crate::triggers::{self, AutonomyTrigger, CooldownTracker};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use vesper_affect::{
    modulate, DecayConfig, EmotionState, GenerationParams, InteractionConfig, InteractionEvent,
    InteractionHandler, ModulationConfig,
};
use vesper_core::{
    Clock, DeliverPayload, EventKind, GenerateRequest, Generator, Result, Service, ServiceHealth,
    ShutdownCoordinator, Transport,
};
use vesper_storage_sqlite::{SnapshotCadence, SnapshotKind, SqliteStore};

struct SchedulerState {
    emotion: EmotionState,
    handler: InteractionHandler,
    cadence: SnapshotCadence,
    cooldowns: CooldownTracker,
    last_decay_instant: DateTime<Utc>,
    long_idle_emitted_this_window: bool,
}

/// The Affect Core's long-lived service. One instance owns exactly one
/// `EmotionState`.
pub struct Scheduler {
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    store: Arc<SqliteStore>,
    generator: Arc<dyn Generator>,
    transports: Vec<Arc<dyn Transport>>,
    funnel: Arc<EventFunnel>,
    shutdown: ShutdownCoordinator,
    triggers: Vec<AutonomyTrigger>,
    decay_config: DecayConfig,
    modulation_config: ModulationConfig,
    state: Mutex<SchedulerState>,
    running: AtomicBool,
}

impl Scheduler {
    /// Build a scheduler, restoring `EmotionState` from `store` and aging it
    /// forward to the clock's current instant.
    ///
    /// `affect_config` supplies the scheduler's own tunables plus the Decay
    /// Engine, Interaction Handler, and Modulation Engine configs (spec §6);
    /// the fixed reference delta table, trigger predicates, and per-dimension
    /// floors are never sourced from it (see `vesper_core::AffectConfig`'s
    /// own doc comment for why).
    pub async fn new(
        affect_config: &vesper_core::AffectConfig,
        clock: Arc<dyn Clock>,
        store: Arc<SqliteStore>,
        generator: Arc<dyn Generator>,
        transports: Vec<Arc<dyn Transport>>,
    ) -> Result<Self> {
        let config = SchedulerConfig::from(&affect_config.scheduler);
        let decay_config = DecayConfig::from(&affect_config.decay);
        let interaction_config = InteractionConfig::from(&affect_config.interaction);
        let modulation_config = ModulationConfig::from(&affect_config.modulation);

        let now = clock.now();
        let restored = store.restore(&decay_config, now).await?;
        tracing::info!(source = ?restored.source, saturated = restored.saturated, "restored emotion state");

        let cadence = SnapshotCadence::new(
            config.snapshot_interaction_threshold,
            config.snapshot_hourly_interval,
            now,
        );

        Ok(Self {
            shutdown: ShutdownCoordinator::new(config.shutdown_drain),
            funnel: Arc::new(EventFunnel::new(config.funnel_high_water_mark)),
            triggers: triggers::triggers_from(&affect_config.triggers),
            decay_config,
            modulation_config,
            state: Mutex::new(SchedulerState {
                emotion: restored.state,
                handler: InteractionHandler::new(interaction_config),
                cadence,
                cooldowns: CooldownTracker::new(),
                last_decay_instant: now,
                long_idle_emitted_this_window: false,
            }),
            config,
            clock,
            store,
            generator,
            transports,
            running: AtomicBool::new(false),
        })
    }

    /// Submit an inbound event from a transport. Non-blocking; queues onto
    /// the event funnel for the tick loop to apply.
    pub fn submit_event(&self, event: InteractionEvent) {
        match self.funnel.push(event) {
            FunnelOutcome::Accepted => {}
            FunnelOutcome::AcceptedWithShed(shed) => {
                tracing::warn!(kind = %shed.kind, "event funnel at capacity, shed oldest non-error event")
            }
            FunnelOutcome::Rejected => {
                tracing::warn!("event funnel saturated with error_occurred events, dropping new event")
            }
        }
    }

    /// A snapshot of the current emotional state, for callers that just
    /// need to read it (e.g. a health endpoint).
    pub async fn current_state(&self) -> EmotionState {
        self.state.lock().await.emotion.snapshot()
    }

    /// The shared inbound event funnel, for a transport's own background
    /// reader task to push onto directly rather than routing every event
    /// back through `submit_event`.
    pub fn funnel(&self) -> Arc<EventFunnel> {
        Arc::clone(&self.funnel)
    }

    /// Run the tick loop until a shutdown signal arrives.
    pub async fn run(self: Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut ticker = tokio::time::interval(self.config.tick_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.tick().await {
                        tracing::error!(error = %err, "tick failed");
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("scheduler received shutdown signal, finishing up");
                    break;
                }
            }
        }

        if let Err(err) = self.finish_shutdown().await {
            tracing::error!(error = %err, "error while finishing shutdown");
        }
        self.running.store(false, Ordering::SeqCst);
    }

    /// Run exactly one tick: apply queued events, advance decay, evaluate
    /// idle and autonomy, and write a periodic snapshot if due.
    pub async fn tick(&self) -> Result<()> {
        let now = self.clock.now();
        let mut guard = self.state.lock().await;

        self.apply_queued_events(&mut guard, now).await?;
        self.apply_decay(&mut guard, now);
        self.evaluate_idle(&mut guard, now);

        if let Some(fired) = triggers::evaluate(
            &self.triggers,
            &guard.emotion,
            guard.emotion.last_interaction,
            now,
            &guard.cooldowns,
        ) {
            guard.cooldowns.record_fired(&fired.trigger, now);
            let snapshot = guard.emotion.snapshot();
            drop(guard);
            self.fire_autonomy_trigger(fired.trigger.prompt_template_id, fired.trigger.name, &snapshot, now)
                .await?;
            guard = self.state.lock().await;
        }

        if guard.cadence.is_due(now) {
            self.store.save_snapshot(&guard.emotion, SnapshotKind::Periodic, now).await?;
            guard.cadence.mark_written(now);
        }

        Ok(())
    }

    async fn apply_queued_events(&self, guard: &mut SchedulerState, now: DateTime<Utc>) -> Result<()> {
        for event in self.funnel.drain() {
            let skew = (now - event.instant).num_milliseconds().unsigned_abs();
            if skew > self.config.event_skew_tolerance.as_millis() as u64 {
                tracing::warn!(kind = %event.kind, "rejected event outside skew tolerance");
                continue;
            }

            let is_long_idle = event.kind == EventKind::LongIdle;
            let record = guard.handler.apply(&mut guard.emotion, event);
            if !is_long_idle {
                guard.emotion.touch_interaction(now);
                guard.long_idle_emitted_this_window = false;
            }

            if let Err(err) = self.store.record_interaction(&record).await {
                tracing::error!(error = %err, "failed to persist interaction record, continuing in-memory");
            }
            if guard.cadence.record_interaction(now) {
                self.store.save_snapshot(&guard.emotion, SnapshotKind::Periodic, now).await?;
                guard.cadence.mark_written(now);
            }
        }
        Ok(())
    }

    fn apply_decay(&self, guard: &mut SchedulerState, now: DateTime<Utc>) {
        let delta_t = (now - guard.last_decay_instant).num_milliseconds() as f64 / 1000.0;
        if delta_t <= 0.0 {
            return;
        }
        let idle_at_start =
            (guard.last_decay_instant - guard.emotion.last_interaction).num_milliseconds() as f64 / 1000.0;
        let outcome = vesper_affect::advance(
            &guard.emotion,
            delta_t,
            idle_at_start.max(0.0),
            &self.decay_config,
            now,
        );
        guard.emotion = outcome.state;
        guard.last_decay_instant = now;
    }

    fn evaluate_idle(&self, guard: &mut SchedulerState, now: DateTime<Utc>) {
        let idle_elapsed = now - guard.emotion.last_interaction;
        if idle_elapsed.num_seconds() < self.config.idle_threshold.as_secs() as i64 {
            guard.long_idle_emitted_this_window = false;
            return;
        }
        if guard.long_idle_emitted_this_window {
            return;
        }

        let synthesized = InteractionEvent {
            kind: EventKind::LongIdle,
            transport: "scheduler".to_string(),
            instant: now,
            metadata: json!({ "idle_seconds": idle_elapsed.num_seconds() }),
        };
        let _record = guard.handler.apply(&mut guard.emotion, synthesized);
        guard.long_idle_emitted_this_window = true;
    }

    async fn fire_autonomy_trigger(
        &self,
        prompt_template_id: &str,
        trigger_name: &str,
        snapshot: &EmotionState,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let baseline = GenerationParams::baseline();
        let modulation = modulate(snapshot, baseline, "", false, &self.modulation_config);

        let transport = self.transports.iter().max_by_key(|t| t.availability_rank());

        let guard = self.shutdown.track();
        let generated = self
            .generator
            .generate(
                GenerateRequest::new(prompt_template_id),
                self.config.generate_timeout,
            )
            .await;

        let delivered = match (generated, transport) {
            (Ok(text), Some(transport)) => {
                let payload = DeliverPayload {
                    text,
                    tone_flags: modulation.tone_flags,
                };
                match transport.deliver(payload, self.config.send_timeout).await {
                    Ok(outcome) => outcome.delivered,
                    Err(err) => {
                        tracing::warn!(error = %err, trigger = trigger_name, "autonomy delivery failed");
                        false
                    }
                }
            }
            (Err(err), _) => {
                tracing::warn!(error = %err, trigger = trigger_name, "autonomy generation failed");
                false
            }
            (Ok(_), None) => {
                tracing::warn!(trigger = trigger_name, "no transport available for autonomy delivery");
                false
            }
        };
        drop(guard);

        self.store
            .record_autonomy_event(trigger_name, Some(&format!("delivered={delivered}")), now)
            .await?;
        Ok(())
    }

    /// Broadcast the shutdown signal (if not already broadcast), drain
    /// in-flight external calls, apply whatever is still queued, and write
    /// the final `shutdown` snapshot. Safe to call from both `run`'s own
    /// loop exit and an external `Service::stop`, since the broadcast half
    /// is skipped on a second call rather than erroring.
    async fn finish_shutdown(&self) -> Result<()> {
        if !self.shutdown.is_shutting_down() {
            let remaining = self.shutdown.begin_shutdown().await?;
            if remaining > 0 {
                tracing::warn!(remaining, "shutdown drain deadline reached with in-flight work outstanding");
            }
        }

        let now = self.clock.now();
        let mut guard = self.state.lock().await;
        self.apply_queued_events(&mut guard, now).await?;
        self.store.save_snapshot(&guard.emotion, SnapshotKind::Shutdown, now).await?;
        Ok(())
    }
}

// `Service::start` takes `&self`, but the tick loop needs to hold an
// `Arc<Scheduler>` to spawn itself (see `Scheduler::run`). The binary crate
// calls `Scheduler::run(Arc::clone(&scheduler))` directly instead of going
// through the trait for startup; `Service` here covers health reporting and
// the shutdown half, which don't need the owning `Arc`.
#[async_trait]
impl Service for Scheduler {
    fn service_type(&self) -> &str {
        "scheduler"
    }

    async fn stop(&self) -> Result<()> {
        self.finish_shutdown().await
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn health_check(&self) -> Result<ServiceHealth> {
        if self.is_running() {
            Ok(ServiceHealth::Healthy)
        } else {
            Ok(ServiceHealth::Degraded)
        }
    }
}
