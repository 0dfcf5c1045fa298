//! Activity log.
//!
//! Tracks what the agent observed and emitted, so a user can see why the
//! stream looks the way it does without any raw payloads being stored.

use crate::core::state::ActivityState;
use crate::source::types::SourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for the current session.
#[derive(Debug)]
pub struct ActivityLog {
    /// Observations received from the notification listener
    notification_observations: AtomicU64,
    /// Observations received from the audio session
    audio_session_observations: AtomicU64,
    /// Observations dropped because the feed was full
    dropped_observations: AtomicU64,
    /// Observations with no candidate state
    ignored_observations: AtomicU64,
    /// Observations that repeated the last emitted state
    suppressed_observations: AtomicU64,
    /// START tokens emitted
    start_emitted: AtomicU64,
    /// STOP tokens emitted
    stop_emitted: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl ActivityLog {
    /// Create a new activity log.
    pub fn new() -> Self {
        Self {
            notification_observations: AtomicU64::new(0),
            audio_session_observations: AtomicU64::new(0),
            dropped_observations: AtomicU64::new(0),
            ignored_observations: AtomicU64::new(0),
            suppressed_observations: AtomicU64::new(0),
            start_emitted: AtomicU64::new(0),
            stop_emitted: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create an activity log that accumulates into `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous activity stats: {e}");
        }

        log
    }

    /// Record an observation accepted into the feed.
    pub fn record_observation(&self, source: SourceKind) {
        let counter = match source {
            SourceKind::Notification => &self.notification_observations,
            SourceKind::AudioSession => &self.audio_session_observations,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an observation lost to a full feed.
    pub fn record_dropped(&self) {
        self.dropped_observations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ignored(&self) {
        self.ignored_observations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self) {
        self.suppressed_observations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an emission.
    pub fn record_emitted(&self, state: ActivityState) {
        let counter = match state {
            ActivityState::Playing => &self.start_emitted,
            ActivityState::Stopped => &self.stop_emitted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> ActivityStats {
        ActivityStats {
            notification_observations: self.notification_observations.load(Ordering::Relaxed),
            audio_session_observations: self.audio_session_observations.load(Ordering::Relaxed),
            dropped_observations: self.dropped_observations.load(Ordering::Relaxed),
            ignored_observations: self.ignored_observations.load(Ordering::Relaxed),
            suppressed_observations: self.suppressed_observations.load(Ordering::Relaxed),
            start_emitted: self.start_emitted.load(Ordering::Relaxed),
            stop_emitted: self.stop_emitted.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Notification observations: {}\n\
             - Audio session observations: {}\n\
             - Dropped (feed full): {}\n\
             - Ignored (unrecognized): {}\n\
             - Suppressed (no change): {}\n\
             - START emitted: {}\n\
             - STOP emitted: {}\n\
             - Session duration: {} seconds",
            stats.notification_observations,
            stats.audio_session_observations,
            stats.dropped_observations,
            stats.ignored_observations,
            stats.suppressed_observations,
            stats.start_emitted,
            stats.stop_emitted,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                notification_observations: stats.notification_observations,
                audio_session_observations: stats.audio_session_observations,
                dropped_observations: stats.dropped_observations,
                ignored_observations: stats.ignored_observations,
                suppressed_observations: stats.suppressed_observations,
                start_emitted: stats.start_emitted,
                stop_emitted: stats.stop_emitted,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load stats from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.notification_observations
                    .store(persisted.notification_observations, Ordering::Relaxed);
                self.audio_session_observations
                    .store(persisted.audio_session_observations, Ordering::Relaxed);
                self.dropped_observations
                    .store(persisted.dropped_observations, Ordering::Relaxed);
                self.ignored_observations
                    .store(persisted.ignored_observations, Ordering::Relaxed);
                self.suppressed_observations
                    .store(persisted.suppressed_observations, Ordering::Relaxed);
                self.start_emitted
                    .store(persisted.start_emitted, Ordering::Relaxed);
                self.stop_emitted
                    .store(persisted.stop_emitted, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.notification_observations.store(0, Ordering::Relaxed);
        self.audio_session_observations.store(0, Ordering::Relaxed);
        self.dropped_observations.store(0, Ordering::Relaxed);
        self.ignored_observations.store(0, Ordering::Relaxed);
        self.suppressed_observations.store(0, Ordering::Relaxed);
        self.start_emitted.store(0, Ordering::Relaxed);
        self.stop_emitted.store(0, Ordering::Relaxed);
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of activity statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityStats {
    pub notification_observations: u64,
    pub audio_session_observations: u64,
    pub dropped_observations: u64,
    pub ignored_observations: u64,
    pub suppressed_observations: u64,
    pub start_emitted: u64,
    pub stop_emitted: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

impl ActivityStats {
    pub fn total_observations(&self) -> u64 {
        self.notification_observations + self.audio_session_observations
    }
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    notification_observations: u64,
    audio_session_observations: u64,
    dropped_observations: u64,
    ignored_observations: u64,
    suppressed_observations: u64,
    start_emitted: u64,
    stop_emitted: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared activity log.
pub type SharedActivityLog = Arc<ActivityLog>;

/// Create a new shared activity log.
pub fn create_shared_log() -> SharedActivityLog {
    Arc::new(ActivityLog::new())
}

/// Create a new shared activity log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedActivityLog {
    Arc::new(ActivityLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_log_counting() {
        let log = ActivityLog::new();

        log.record_observation(SourceKind::Notification);
        log.record_observation(SourceKind::Notification);
        log.record_observation(SourceKind::AudioSession);
        log.record_emitted(ActivityState::Playing);
        log.record_suppressed();

        let stats = log.stats();
        assert_eq!(stats.notification_observations, 2);
        assert_eq!(stats.audio_session_observations, 1);
        assert_eq!(stats.total_observations(), 3);
        assert_eq!(stats.start_emitted, 1);
        assert_eq!(stats.stop_emitted, 0);
        assert_eq!(stats.suppressed_observations, 1);
    }

    #[test]
    fn test_activity_log_reset() {
        let log = ActivityLog::new();

        log.record_dropped();
        log.record_ignored();
        log.record_emitted(ActivityState::Stopped);
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.dropped_observations, 0);
        assert_eq!(stats.ignored_observations, 0);
        assert_eq!(stats.stop_emitted, 0);
    }

    #[test]
    fn test_persistence_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats").join("activity_stats.json");

        let log = ActivityLog::with_persistence(path.clone());
        log.record_observation(SourceKind::AudioSession);
        log.record_emitted(ActivityState::Playing);
        log.save().unwrap();

        let reloaded = ActivityLog::with_persistence(path);
        let stats = reloaded.stats();
        assert_eq!(stats.audio_session_observations, 1);
        assert_eq!(stats.start_emitted, 1);
    }

    #[test]
    fn test_summary_format() {
        let summary = ActivityLog::new().summary();
        assert!(summary.contains("Notification observations"));
        assert!(summary.contains("START emitted"));
        assert!(summary.contains("STOP emitted"));
    }
}
