//! Media notification listener adapter.
//!
//! Translates posted/removed notification payloads into raw observations.
//! Only notifications that carry a media session are considered; everything
//! else on the notification shade is noise.

use crate::source::feed::ObservationSender;
use crate::source::types::RawObservation;
use serde::{Deserialize, Serialize};

/// Playback-state code reported when the payload has none.
pub const PLAYBACK_STATE_MISSING: i32 = -1;

/// The parts of a notification's extras the agent looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Whether the extras carry a media-session token
    pub has_media_session: bool,
    /// Embedded playback-state code, if any
    #[serde(default)]
    pub playback_state: Option<i32>,
}

impl NotificationPayload {
    pub fn media(playback_state: i32) -> Self {
        Self {
            has_media_session: true,
            playback_state: Some(playback_state),
        }
    }
}

/// Observation for a posted notification, if it is a media notification.
pub fn posted_observation(payload: &NotificationPayload) -> Option<RawObservation> {
    if !payload.has_media_session {
        return None;
    }
    Some(RawObservation::NotificationPlaybackState {
        code: payload.playback_state.unwrap_or(PLAYBACK_STATE_MISSING),
    })
}

/// Observation for a removed notification, if it was a media notification.
pub fn removed_observation(payload: &NotificationPayload) -> Option<RawObservation> {
    payload
        .has_media_session
        .then_some(RawObservation::NotificationRemoved)
}

/// Feeds notification-listener callbacks into the observation feed.
#[derive(Clone)]
pub struct NotificationSource {
    feed: ObservationSender,
    enabled: bool,
}

impl NotificationSource {
    pub fn new(feed: ObservationSender, enabled: bool) -> Self {
        Self { feed, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// A notification was posted or updated.
    pub fn on_posted(&self, payload: &NotificationPayload) -> bool {
        self.forward(posted_observation(payload))
    }

    /// A notification was removed.
    pub fn on_removed(&self, payload: &NotificationPayload) -> bool {
        self.forward(removed_observation(payload))
    }

    fn forward(&self, observation: Option<RawObservation>) -> bool {
        match observation {
            Some(raw) if self.enabled => self.feed.push(raw),
            Some(raw) => {
                tracing::trace!(?raw, "Notification source disabled, dropping");
                false
            }
            None => false,
        }
    }
}
