//! Persistence: snapshots plus an append-only interaction/autonomy event
//! log, backed by SQLite (spec §4.5).
//!
//! Three relations: `snapshots` (point-in-time `EmotionState` captures),
//! `interactions` (one row per applied [`InteractionRecord`]), and
//! `autonomy_events` (one row per emitted or noted autonomous occurrence,
//! including the `saturated_catchup`/`recovered_from_backup`/
//! `persistence_degraded` markers the Decay Engine and restore protocol
//! raise).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;
use vesper_affect::{interaction::InteractionRecord, DecayConfig, EmotionState};
use vesper_core::{Result, VesperError};

/// How a snapshot row came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    /// Written on the periodic cadence (interaction count or hourly).
    Periodic,
    /// Written during graceful shutdown.
    Shutdown,
    /// Written once the restore protocol finishes, capturing the aged state
    /// at the current instant.
    Startup,
    /// Written on an explicit manual trigger.
    Manual,
}

impl SnapshotKind {
    fn as_str(self) -> &'static str {
        match self {
            SnapshotKind::Periodic => "periodic",
            SnapshotKind::Shutdown => "shutdown",
            SnapshotKind::Startup => "startup",
            SnapshotKind::Manual => "manual",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "periodic" => SnapshotKind::Periodic,
            "shutdown" => SnapshotKind::Shutdown,
            "startup" => SnapshotKind::Startup,
            "manual" => SnapshotKind::Manual,
            _ => return None,
        })
    }
}

/// Where the restored state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreSource {
    /// The most recent `shutdown`-kind snapshot.
    ShutdownSnapshot,
    /// The most recent snapshot of any kind (no `shutdown` snapshot found).
    AnySnapshot,
    /// No usable snapshot at all; started from the neutral baseline.
    NeutralBaseline,
    /// The preferred snapshot was corrupt; recovered from an older
    /// `periodic` snapshot.
    RecoveredFromBackup,
}

/// The result of running the restore protocol at startup.
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    /// The state, aged forward to `now` via the Decay Engine.
    pub state: EmotionState,
    /// Where it came from.
    pub source: RestoreSource,
    /// Whether aging forward exceeded the Decay Engine's saturation cap.
    pub saturated: bool,
}

struct SnapshotRow {
    state_json: String,
    last_interaction: DateTime<Utc>,
    created_at: DateTime<Utc>,
    kind: SnapshotKind,
}

/// SQLite-backed store for the three Affect Core relations.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if absent) the SQLite database at `database_url` and
    /// run schema initialization.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| VesperError::persistence(format!("invalid database url: {e}")))?
            .create_if_missing(true);
        // A single connection, matching the single-writer design: the
        // Scheduler is the only caller and it never issues concurrent
        // writes. This also sidesteps sqlite's per-connection `:memory:`
        // database semantics, where a pooled connection would otherwise see
        // an empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                state_json TEXT NOT NULL,
                last_interaction TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_snapshots_kind_created
                ON snapshots (kind, created_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS interactions (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                transport TEXT NOT NULL,
                instant TEXT NOT NULL,
                record_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS autonomy_events (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                detail TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Persist a snapshot of `state`.
    pub async fn save_snapshot(
        &self,
        state: &EmotionState,
        kind: SnapshotKind,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let state_json = serde_json::to_string(state)?;
        sqlx::query(
            r#"
            INSERT INTO snapshots (id, kind, state_json, last_interaction, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(kind.as_str())
        .bind(state_json)
        .bind(state.last_interaction.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Append an [`InteractionRecord`] to the interaction log.
    pub async fn record_interaction(&self, record: &InteractionRecord) -> Result<()> {
        let record_json = serde_json::to_string(record)?;
        sqlx::query(
            r#"
            INSERT INTO interactions (id, kind, transport, instant, record_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(record.kind.as_str())
        .bind(&record.transport)
        .bind(record.instant.to_rfc3339())
        .bind(record_json)
        // No clock of its own here; the event's own instant stands in for
        // write time, since this crate doesn't depend on `vesper_core::Clock`.
        .bind(record.instant.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Append an autonomy event (emitted message, or a marker like
    /// `saturated_catchup` / `recovered_from_backup` / `persistence_degraded`).
    pub async fn record_autonomy_event(
        &self,
        kind: &str,
        detail: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO autonomy_events (id, kind, detail, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(kind)
        .bind(detail)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_latest(&self, kind: Option<SnapshotKind>) -> Result<Option<SnapshotRow>> {
        let row = match kind {
            Some(k) => {
                sqlx::query(
                    "SELECT state_json, last_interaction, created_at, kind FROM snapshots \
                     WHERE kind = ?1 ORDER BY created_at DESC LIMIT 1",
                )
                .bind(k.as_str())
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT state_json, last_interaction, created_at, kind FROM snapshots \
                     ORDER BY created_at DESC LIMIT 1",
                )
                .fetch_optional(&self.pool)
                .await?
            }
        };

        let Some(row) = row else { return Ok(None) };
        let state_json: String = row.try_get("state_json")?;
        let last_interaction: String = row.try_get("last_interaction")?;
        let created_at: String = row.try_get("created_at")?;
        let kind_raw: String = row.try_get("kind")?;

        Ok(Some(SnapshotRow {
            state_json,
            last_interaction: DateTime::parse_from_rfc3339(&last_interaction)
                .map_err(|e| VesperError::persistence(format!("corrupt timestamp: {e}")))?
                .with_timezone(&Utc),
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| VesperError::persistence(format!("corrupt timestamp: {e}")))?
                .with_timezone(&Utc),
            kind: SnapshotKind::parse(&kind_raw)
                .ok_or_else(|| VesperError::persistence(format!("unknown snapshot kind: {kind_raw}")))?,
        }))
    }

    /// Older `periodic` snapshots than `before`, newest first, for the
    /// corruption recovery walk.
    async fn fetch_older_periodic(&self, before: DateTime<Utc>) -> Result<Vec<SnapshotRow>> {
        let rows = sqlx::query(
            "SELECT state_json, last_interaction, created_at, kind FROM snapshots \
             WHERE kind = 'periodic' AND created_at < ?1 ORDER BY created_at DESC",
        )
        .bind(before.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let state_json: String = row.try_get("state_json")?;
            let last_interaction: String = row.try_get("last_interaction")?;
            let created_at: String = row.try_get("created_at")?;
            let kind_raw: String = row.try_get("kind")?;
            out.push(SnapshotRow {
                state_json,
                last_interaction: DateTime::parse_from_rfc3339(&last_interaction)
                    .map_err(|e| VesperError::persistence(format!("corrupt timestamp: {e}")))?
                    .with_timezone(&Utc),
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map_err(|e| VesperError::persistence(format!("corrupt timestamp: {e}")))?
                    .with_timezone(&Utc),
                kind: SnapshotKind::parse(&kind_raw).unwrap_or(SnapshotKind::Periodic),
            });
        }
        Ok(out)
    }

    fn try_deserialize(row: &SnapshotRow) -> Option<EmotionState> {
        serde_json::from_str(&row.state_json).ok()
    }

    /// Run the restore protocol: latest `shutdown` snapshot, else latest
    /// snapshot of any kind, else the neutral baseline; age the result
    /// forward to `now` via the Decay Engine. A corrupt preferred snapshot
    /// triggers a backward walk through older `periodic` snapshots. Finishes
    /// by writing a `startup` snapshot of the aged state at `now` (spec
    /// §4.5 restore step 5).
    pub async fn restore(&self, decay_config: &DecayConfig, now: DateTime<Utc>) -> Result<RestoreOutcome> {
        let outcome = self.restore_without_startup_snapshot(decay_config, now).await?;
        self.save_snapshot(&outcome.state, SnapshotKind::Startup, now).await?;
        Ok(outcome)
    }

    async fn restore_without_startup_snapshot(
        &self,
        decay_config: &DecayConfig,
        now: DateTime<Utc>,
    ) -> Result<RestoreOutcome> {
        if let Some(row) = self.fetch_latest(Some(SnapshotKind::Shutdown)).await? {
            if let Some(state) = Self::try_deserialize(&row) {
                return self.age_and_finish(state, row.last_interaction, row.created_at, RestoreSource::ShutdownSnapshot, decay_config, now).await;
            }
            tracing::warn!("shutdown snapshot failed to deserialize, walking back through periodic snapshots");
            return self.recover_from_corruption(row.created_at, decay_config, now).await;
        }

        if let Some(row) = self.fetch_latest(None).await? {
            if let Some(state) = Self::try_deserialize(&row) {
                return self.age_and_finish(state, row.last_interaction, row.created_at, RestoreSource::AnySnapshot, decay_config, now).await;
            }
            tracing::warn!("latest snapshot failed to deserialize, walking back through periodic snapshots");
            return self.recover_from_corruption(row.created_at, decay_config, now).await;
        }

        Ok(RestoreOutcome {
            state: EmotionState::neutral(now),
            source: RestoreSource::NeutralBaseline,
            saturated: false,
        })
    }

    async fn recover_from_corruption(
        &self,
        before: DateTime<Utc>,
        decay_config: &DecayConfig,
        now: DateTime<Utc>,
    ) -> Result<RestoreOutcome> {
        for row in self.fetch_older_periodic(before).await? {
            if let Some(state) = Self::try_deserialize(&row) {
                self.record_autonomy_event(
                    "recovered_from_backup",
                    Some("preferred snapshot was corrupt"),
                    now,
                )
                .await?;
                return self
                    .age_and_finish(
                        state,
                        row.last_interaction,
                        row.created_at,
                        RestoreSource::RecoveredFromBackup,
                        decay_config,
                        now,
                    )
                    .await;
            }
        }

        self.record_autonomy_event(
            "recovered_from_backup",
            Some("no usable snapshot found, fell back to neutral baseline"),
            now,
        )
        .await?;
        Ok(RestoreOutcome {
            state: EmotionState::neutral(now),
            source: RestoreSource::NeutralBaseline,
            saturated: false,
        })
    }

    async fn age_and_finish(
        &self,
        state: EmotionState,
        last_interaction: DateTime<Utc>,
        snapshot_instant: DateTime<Utc>,
        source: RestoreSource,
        decay_config: &DecayConfig,
        now: DateTime<Utc>,
    ) -> Result<RestoreOutcome> {
        let delta_t = (now - snapshot_instant).num_milliseconds() as f64 / 1000.0;
        let idle_at_start = (snapshot_instant - last_interaction).num_milliseconds() as f64 / 1000.0;
        let outcome = vesper_affect::advance(&state, delta_t.max(0.0), idle_at_start.max(0.0), decay_config, now);

        if outcome.saturated {
            self.record_autonomy_event(
                "saturated_catchup",
                Some(&format!("offline gap exceeded the {}-day cap", decay_config.saturation_cap_days)),
                now,
            )
            .await?;
        }

        Ok(RestoreOutcome {
            state: outcome.state,
            source,
            saturated: outcome.saturated,
        })
    }
}

/// Tracks how many interactions have been applied and when the last hourly
/// write happened, so the caller can decide when to call
/// [`SqliteStore::save_snapshot`] on the periodic cadence (spec §4.5: every
/// `N` interactions, or hourly, whichever comes first — shutdown and manual
/// triggers are the caller's own direct calls).
#[derive(Debug, Clone)]
pub struct SnapshotCadence {
    interactions_since_write: u32,
    last_write: DateTime<Utc>,
    interaction_threshold: u32,
    hourly_interval: chrono::Duration,
}

impl SnapshotCadence {
    /// Build a cadence tracker starting fresh at `now`.
    pub fn new(interaction_threshold: u32, hourly_interval: chrono::Duration, now: DateTime<Utc>) -> Self {
        Self {
            interactions_since_write: 0,
            last_write: now,
            interaction_threshold,
            hourly_interval,
        }
    }

    /// Record that one interaction was just applied, returning whether a
    /// periodic snapshot write is now due.
    pub fn record_interaction(&mut self, now: DateTime<Utc>) -> bool {
        self.interactions_since_write += 1;
        self.is_due(now)
    }

    /// Whether a periodic write is due purely from elapsed time (used by the
    /// Scheduler's own timer, independent of interaction volume).
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.interactions_since_write >= self.interaction_threshold
            || now - self.last_write >= self.hourly_interval
    }

    /// Reset the counters after a write (periodic, shutdown, or manual).
    pub fn mark_written(&mut self, now: DateTime<Utc>) {
        self.interactions_since_write = 0;
        self.last_write = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Value;
    use vesper_core::EventKind;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    async fn memory_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn restore_with_no_snapshots_returns_neutral_baseline() {
        let store = memory_store().await;
        let outcome = store.restore(&DecayConfig::default(), now()).await.unwrap();
        assert_eq!(outcome.source, RestoreSource::NeutralBaseline);
        assert!(!outcome.saturated);
        assert_eq!(outcome.state.value(vesper_core::Dimension::Loneliness), 0.5);
    }

    #[tokio::test]
    async fn restore_writes_a_startup_snapshot_of_the_aged_state() {
        let store = memory_store().await;
        let mut state = EmotionState::neutral(now());
        state.set_absolute(vesper_core::Dimension::Frustration, 0.9, now());
        store.save_snapshot(&state, SnapshotKind::Shutdown, now()).await.unwrap();

        let restore_at = now() + chrono::Duration::hours(1);
        store.restore(&DecayConfig::default(), restore_at).await.unwrap();

        let startup_row = store.fetch_latest(Some(SnapshotKind::Startup)).await.unwrap().unwrap();
        assert_eq!(startup_row.created_at, restore_at);
    }

    #[tokio::test]
    async fn shutdown_snapshot_is_preferred_over_periodic() {
        let store = memory_store().await;
        let mut periodic_state = EmotionState::neutral(now());
        periodic_state.set_absolute(vesper_core::Dimension::Excitement, 0.9, now());
        store
            .save_snapshot(&periodic_state, SnapshotKind::Periodic, now())
            .await
            .unwrap();

        let later = now() + chrono::Duration::minutes(5);
        let mut shutdown_state = EmotionState::neutral(later);
        shutdown_state.set_absolute(vesper_core::Dimension::Confidence, 0.9, later);
        store
            .save_snapshot(&shutdown_state, SnapshotKind::Shutdown, later)
            .await
            .unwrap();

        let restore_at = later + chrono::Duration::seconds(1);
        let outcome = store.restore(&DecayConfig::default(), restore_at).await.unwrap();
        assert_eq!(outcome.source, RestoreSource::ShutdownSnapshot);
        assert!(outcome.state.value(vesper_core::Dimension::Confidence) > 0.5);
    }

    #[tokio::test]
    async fn restore_ages_state_forward_via_decay() {
        let store = memory_store().await;
        let mut state = EmotionState::neutral(now());
        state.set_absolute(vesper_core::Dimension::Frustration, 0.9, now());
        store.save_snapshot(&state, SnapshotKind::Shutdown, now()).await.unwrap();

        let restore_at = now() + chrono::Duration::hours(2);
        let outcome = store.restore(&DecayConfig::default(), restore_at).await.unwrap();
        assert!(outcome.state.value(vesper_core::Dimension::Frustration) < 0.9);
    }

    #[tokio::test]
    async fn record_interaction_round_trips() {
        let store = memory_store().await;
        let record = InteractionRecord {
            kind: EventKind::PositiveMessage,
            instant: now(),
            transport: "terminal".to_string(),
            before: EmotionState::neutral(now()),
            after: EmotionState::neutral(now()),
            overflow: Default::default(),
            confidence: 0.9,
            context: Value::Null,
        };
        store.record_interaction(&record).await.unwrap();
    }

    #[test]
    fn snapshot_cadence_fires_on_interaction_threshold() {
        let mut cadence = SnapshotCadence::new(20, chrono::Duration::hours(1), now());
        for _ in 0..19 {
            assert!(!cadence.record_interaction(now()));
        }
        assert!(cadence.record_interaction(now()));
    }

    #[test]
    fn snapshot_cadence_fires_hourly_even_with_few_interactions() {
        let mut cadence = SnapshotCadence::new(20, chrono::Duration::hours(1), now());
        cadence.record_interaction(now());
        assert!(cadence.is_due(now() + chrono::Duration::hours(2)));
    }
}
