//! Scheduler tunables (spec §4.6, §6).

use std::time::Duration;

/// Everything the tick loop and autonomy evaluation need, with reference
/// defaults lifted straight from the spec.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Tick cadence. Default `5s` — distinct from the Decay Engine's
    /// 300-second step.
    pub tick_interval: Duration,
    /// Idle threshold before a `long_idle` event synthesizes. Default
    /// `300s`, matching the Decay Engine's own idle threshold.
    pub idle_threshold: Duration,
    /// Allowed clock skew for an inbound event's `instant`. Default `60s`.
    pub event_skew_tolerance: Duration,
    /// Deadline for the `Generate` call. Default `30s`.
    pub generate_timeout: Duration,
    /// Deadline for a transport `deliver` call. Default `10s`.
    pub send_timeout: Duration,
    /// Hard deadline for draining the event funnel and in-flight external
    /// calls on shutdown. Default `5s`.
    pub shutdown_drain: Duration,
    /// High-water mark for the event funnel; beyond this, the oldest
    /// non-`error_occurred` event is shed. Default `1024`.
    pub funnel_high_water_mark: usize,
    /// Periodic snapshot cadence: interaction-count threshold. Default `20`.
    pub snapshot_interaction_threshold: u32,
    /// Periodic snapshot cadence: wall-clock fallback. Default `1h`.
    pub snapshot_hourly_interval: chrono::Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            idle_threshold: Duration::from_secs(300),
            event_skew_tolerance: Duration::from_secs(60),
            generate_timeout: Duration::from_secs(30),
            send_timeout: Duration::from_secs(10),
            shutdown_drain: Duration::from_secs(5),
            funnel_high_water_mark: 1024,
            snapshot_interaction_threshold: 20,
            snapshot_hourly_interval: chrono::Duration::hours(1),
        }
    }
}

impl From<&vesper_core::SchedulerParams> for SchedulerConfig {
    fn from(params: &vesper_core::SchedulerParams) -> Self {
        Self {
            tick_interval: Duration::from_secs(params.tick_interval_seconds),
            idle_threshold: Duration::from_secs(params.idle_threshold_seconds),
            event_skew_tolerance: Duration::from_secs(params.event_skew_tolerance_seconds),
            generate_timeout: Duration::from_secs(params.generate_timeout_seconds),
            send_timeout: Duration::from_secs(params.send_timeout_seconds),
            shutdown_drain: Duration::from_secs(params.shutdown_drain_seconds),
            funnel_high_water_mark: params.funnel_high_water_mark,
            snapshot_interaction_threshold: params.snapshot_interaction_threshold,
            snapshot_hourly_interval: chrono::Duration::minutes(params.snapshot_hourly_interval_minutes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_config_from_params_preserves_reference_defaults() {
        let params = vesper_core::SchedulerParams::default();
        let config = SchedulerConfig::from(&params);
        assert_eq!(config.tick_interval, Duration::from_secs(5));
        assert_eq!(config.snapshot_hourly_interval, chrono::Duration::hours(1));
    }
}
