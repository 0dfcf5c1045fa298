//! Playback activity state and the observation-to-candidate mapping.

use crate::source::types::{RawObservation, PLAYBACK_STATE_PAUSED, PLAYBACK_STATE_PLAYING};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether audio media is playing somewhere on the device.
///
/// The "unknown" condition before the first observation is represented as
/// `Option<ActivityState>::None` by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityState {
    #[serde(rename = "START")]
    Playing,
    #[serde(rename = "STOP")]
    Stopped,
}

impl ActivityState {
    /// The outbound token for this state.
    pub fn token(&self) -> &'static str {
        match self {
            ActivityState::Playing => "START",
            ActivityState::Stopped => "STOP",
        }
    }

    /// Parse an outbound token back into a state.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "START" => Some(ActivityState::Playing),
            "STOP" => Some(ActivityState::Stopped),
            _ => None,
        }
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl RawObservation {
    /// Map an observation to the state it suggests, before suppression.
    ///
    /// Returns `None` for observations whose meaning cannot be determined.
    pub fn candidate(&self) -> Option<ActivityState> {
        match *self {
            RawObservation::NotificationPlaybackState { code } => match code {
                PLAYBACK_STATE_PLAYING => Some(ActivityState::Playing),
                PLAYBACK_STATE_PAUSED => Some(ActivityState::Stopped),
                _ => None,
            },
            RawObservation::NotificationRemoved => Some(ActivityState::Stopped),
            // Something else grabbed the audio session.
            RawObservation::InterruptionBegan => Some(ActivityState::Playing),
            RawObservation::InterruptionEnded { should_resume } => Some(if should_resume {
                ActivityState::Playing
            } else {
                ActivityState::Stopped
            }),
            RawObservation::RouteChanged {
                other_audio_playing,
            } => Some(if other_audio_playing {
                ActivityState::Playing
            } else {
                ActivityState::Stopped
            }),
        }
    }
}

/// A single emission, as written by the JSON output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub event: ActivityState,
    pub at: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn now(event: ActivityState) -> Self {
        Self {
            event,
            at: Utc::now(),
        }
    }
}
