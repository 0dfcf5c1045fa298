//! Audio session observer adapter.
//!
//! Decodes interruption and route-change notifications from their raw
//! integer encodings. Route changes are filtered here so only device
//! arrivals and departures reach the normalizer.

use crate::source::feed::ObservationSender;
use crate::source::types::RawObservation;
use std::fmt::Display;

/// Interruption type raw values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptionType {
    Ended,
    Began,
}

impl InterruptionType {
    pub fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            0 => Some(InterruptionType::Ended),
            1 => Some(InterruptionType::Began),
            _ => None,
        }
    }
}

/// Interruption option bit meaning the interrupted audio may resume.
pub const INTERRUPTION_OPTION_SHOULD_RESUME: u64 = 1;

/// Route change reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteChangeReason {
    Unknown,
    NewDeviceAvailable,
    OldDeviceUnavailable,
    CategoryChange,
    Override,
    WakeFromSleep,
    NoSuitableRouteForCategory,
    RouteConfigurationChange,
}

impl RouteChangeReason {
    pub fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            0 => Some(RouteChangeReason::Unknown),
            1 => Some(RouteChangeReason::NewDeviceAvailable),
            2 => Some(RouteChangeReason::OldDeviceUnavailable),
            3 => Some(RouteChangeReason::CategoryChange),
            4 => Some(RouteChangeReason::Override),
            6 => Some(RouteChangeReason::WakeFromSleep),
            7 => Some(RouteChangeReason::NoSuitableRouteForCategory),
            8 => Some(RouteChangeReason::RouteConfigurationChange),
            _ => None,
        }
    }

    /// Only device arrivals/departures say anything about playback.
    pub fn is_device_change(&self) -> bool {
        matches!(
            self,
            RouteChangeReason::NewDeviceAvailable | RouteChangeReason::OldDeviceUnavailable
        )
    }
}

/// Decode an interruption notification.
///
/// An ended interruption without an options value is treated as "do not resume".
pub fn interruption_observation(
    interruption_type: Option<u64>,
    options: Option<u64>,
) -> Option<RawObservation> {
    match InterruptionType::from_raw(interruption_type?)? {
        InterruptionType::Began => Some(RawObservation::InterruptionBegan),
        InterruptionType::Ended => Some(RawObservation::InterruptionEnded {
            should_resume: options
                .is_some_and(|bits| bits & INTERRUPTION_OPTION_SHOULD_RESUME != 0),
        }),
    }
}

/// Decode a route-change notification, sampling the other-audio flag.
pub fn route_change_observation(
    reason: Option<u64>,
    other_audio_playing: bool,
) -> Option<RawObservation> {
    let reason = RouteChangeReason::from_raw(reason?)?;
    reason.is_device_change().then_some(RawObservation::RouteChanged {
        other_audio_playing,
    })
}

/// Feeds audio-session callbacks into the observation feed.
#[derive(Clone)]
pub struct AudioSessionSource {
    feed: ObservationSender,
    enabled: bool,
    degraded: bool,
}

impl AudioSessionSource {
    pub fn new(feed: ObservationSender, enabled: bool) -> Self {
        Self {
            feed,
            enabled,
            degraded: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Run the platform's session setup.
    ///
    /// A failure is logged and the source keeps running in degraded mode:
    /// whatever callbacks still arrive are forwarded as usual.
    pub fn activate<F, E>(&mut self, setup: F) -> bool
    where
        F: FnOnce() -> Result<(), E>,
        E: Display,
    {
        match setup() {
            Ok(()) => {
                self.degraded = false;
                true
            }
            Err(e) => {
                tracing::warn!("Failed to set up audio session: {e}");
                self.degraded = true;
                false
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// An interruption notification arrived.
    pub fn on_interruption(&self, interruption_type: Option<u64>, options: Option<u64>) -> bool {
        let observation = interruption_observation(interruption_type, options);
        if observation.is_none() {
            tracing::debug!(?interruption_type, ?options, "Dropping unrecognized interruption");
        }
        self.forward(observation)
    }

    /// A route-change notification arrived.
    pub fn on_route_change(&self, reason: Option<u64>, other_audio_playing: bool) -> bool {
        let observation = route_change_observation(reason, other_audio_playing);
        if observation.is_none() {
            tracing::trace!(?reason, "Filtering route change");
        }
        self.forward(observation)
    }

    fn forward(&self, observation: Option<RawObservation>) -> bool {
        match observation {
            Some(raw) if self.enabled => self.feed.push(raw),
            Some(raw) => {
                tracing::trace!(?raw, "Audio session source disabled, dropping");
                false
            }
            None => false,
        }
    }
}
