//! Raw observation types for the Media Activity Agent.
//!
//! These types carry ONLY what a platform callback told us - they are not yet
//! normalized into a playback state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification playback-state code meaning "playing".
pub const PLAYBACK_STATE_PLAYING: i32 = 3;

/// Notification playback-state code meaning "paused".
pub const PLAYBACK_STATE_PAUSED: i32 = 2;

/// Which native signal provider produced an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Media notification listener (playback codes, removals)
    Notification,
    /// Audio session observer (interruptions, route changes)
    AudioSession,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Notification => "notification",
            SourceKind::AudioSession => "audio_session",
        }
    }
}

/// One raw, platform-sourced fact about audio/media state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawObservation {
    /// Playback-state code embedded in a media notification.
    /// Only [`PLAYBACK_STATE_PLAYING`] and [`PLAYBACK_STATE_PAUSED`] carry meaning.
    NotificationPlaybackState { code: i32 },
    /// The media notification disappeared.
    NotificationRemoved,
    /// Another process interrupted the audio session.
    InterruptionBegan,
    /// The interruption ended.
    InterruptionEnded { should_resume: bool },
    /// An output device appeared or went away.
    RouteChanged { other_audio_playing: bool },
}

impl RawObservation {
    /// The source this kind of observation comes from.
    pub fn source(&self) -> SourceKind {
        match self {
            RawObservation::NotificationPlaybackState { .. } | RawObservation::NotificationRemoved => {
                SourceKind::Notification
            }
            RawObservation::InterruptionBegan
            | RawObservation::InterruptionEnded { .. }
            | RawObservation::RouteChanged { .. } => SourceKind::AudioSession,
        }
    }
}

/// An observation as it travels through the feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Signal provider that produced it
    pub source: SourceKind,
    /// The raw fact
    pub raw: RawObservation,
    /// When the callback handed it to us
    pub observed_at: DateTime<Utc>,
}

impl Observation {
    pub fn new(raw: RawObservation) -> Self {
        Self {
            source: raw.source(),
            raw,
            observed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_source_tagging() {
        let obs = Observation::new(RawObservation::NotificationPlaybackState { code: 3 });
        assert_eq!(obs.source, SourceKind::Notification);

        let obs = Observation::new(RawObservation::RouteChanged {
            other_audio_playing: false,
        });
        assert_eq!(obs.source, SourceKind::AudioSession);
    }

    #[test]
    fn test_raw_observation_json_shape() {
        let json = serde_json::to_value(RawObservation::InterruptionEnded {
            should_resume: true,
        })
        .unwrap();
        assert_eq!(json["type"], "interruption_ended");
        assert_eq!(json["should_resume"], true);
    }
}
