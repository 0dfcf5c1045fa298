//! Bounded observation feed shared by all signal sources.
//!
//! Platform callbacks must never stall, so pushing is always non-blocking: a
//! full feed drops the observation instead of waiting.

use crate::source::types::{Observation, RawObservation};
use crate::stats::SharedActivityLog;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Default number of observations buffered before the feed starts dropping.
pub const DEFAULT_FEED_CAPACITY: usize = 1024;

/// Cloneable producer side of the feed, handed to each signal source.
#[derive(Clone)]
pub struct ObservationSender {
    sender: Sender<Observation>,
    log: Option<SharedActivityLog>,
}

impl ObservationSender {
    /// Push a raw observation without blocking.
    ///
    /// Returns `false` if it was dropped (feed full or consumer gone).
    pub fn push(&self, raw: RawObservation) -> bool {
        let observation = Observation::new(raw);
        let source = observation.source;

        match self.sender.try_send(observation) {
            Ok(()) => {
                if let Some(ref log) = self.log {
                    log.record_observation(source);
                }
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(source = source.as_str(), ?raw, "Observation feed full, dropping");
                if let Some(ref log) = self.log {
                    log.record_dropped();
                }
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!(source = source.as_str(), "Observation feed closed");
                false
            }
        }
    }
}

/// Create a bounded feed with `capacity` slots.
pub fn observation_feed(
    capacity: usize,
    log: Option<SharedActivityLog>,
) -> (ObservationSender, Receiver<Observation>) {
    let (sender, receiver) = bounded(capacity.max(1));
    (ObservationSender { sender, log }, receiver)
}
