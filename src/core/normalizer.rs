//! Activity normalizer: collapses raw observations into a deduplicated
//! `START`/`STOP` stream.
//!
//! The normalizer remembers the last state it *emitted* (not the last one it
//! observed) and only produces output on a transition. Bursts of redundant
//! observations from either source, e.g. a paused code followed by the
//! notification being removed, collapse into a single emission.

use crate::core::state::ActivityState;
use crate::core::subscriber::{Subscriber, SubscriberSlot, SubscriptionId};
use crate::source::types::RawObservation;

/// Owns the last-emitted state and the subscriber slot.
///
/// Callers must serialize `observe` calls; see [`crate::core::ActivityEngine`]
/// for the threaded front end.
pub struct ActivityNormalizer {
    /// `None` until the first candidate arrives
    last_emitted: Option<ActivityState>,
    subscribers: SubscriberSlot,
}

impl ActivityNormalizer {
    /// Create a normalizer with its own, empty subscriber slot.
    pub fn new() -> Self {
        Self::with_slot(SubscriberSlot::new())
    }

    /// Create a normalizer delivering into a slot shared with other handles.
    pub fn with_slot(subscribers: SubscriberSlot) -> Self {
        Self {
            last_emitted: None,
            subscribers,
        }
    }

    /// Feed one observation.
    ///
    /// Returns the new state when it differs from the last emission. The value
    /// is handed to the attached subscriber, if any, before returning.
    pub fn observe(&mut self, raw: &RawObservation) -> Option<ActivityState> {
        let state = self.advance(raw)?;
        self.publish(state);
        Some(state)
    }

    /// Record a transition without delivering it. Pair with [`Self::publish`].
    pub fn advance(&mut self, raw: &RawObservation) -> Option<ActivityState> {
        let Some(candidate) = raw.candidate() else {
            tracing::debug!(?raw, "Ignoring unrecognized observation");
            return None;
        };

        if self.last_emitted == Some(candidate) {
            tracing::trace!(?raw, state = %candidate, "Suppressing repeated state");
            return None;
        }

        self.last_emitted = Some(candidate);
        Some(candidate)
    }

    /// Hand an emitted state to the attached subscriber.
    pub fn publish(&self, state: ActivityState) {
        if !self.subscribers.deliver(state) {
            tracing::debug!(state = %state, "No subscriber attached, recorded only");
        }
    }

    /// Attach a subscriber, replacing any existing one. No backlog is replayed.
    pub fn attach<S>(&self, subscriber: S) -> SubscriptionId
    where
        S: Subscriber + 'static,
    {
        self.subscribers.attach(Box::new(subscriber))
    }

    /// Detach `id` if it is still the current subscription.
    pub fn detach(&self, id: SubscriptionId) {
        self.subscribers.detach(id);
    }

    /// The last emitted state, `None` while still unknown.
    pub fn last_emitted(&self) -> Option<ActivityState> {
        self.last_emitted
    }

    pub fn slot(&self) -> &SubscriberSlot {
        &self.subscribers
    }
}

impl Default for ActivityNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::subscriber::ChannelSubscriber;
    use crossbeam_channel::{bounded, unbounded, Receiver};
    use std::sync::{Arc, OnceLock};

    fn playing_code() -> RawObservation {
        RawObservation::NotificationPlaybackState { code: 3 }
    }

    fn paused_code() -> RawObservation {
        RawObservation::NotificationPlaybackState { code: 2 }
    }

    fn attached() -> (ActivityNormalizer, Receiver<ActivityState>) {
        let normalizer = ActivityNormalizer::new();
        let (tx, rx) = unbounded();
        normalizer.attach(ChannelSubscriber::new(tx));
        (normalizer, rx)
    }

    fn drain(rx: &Receiver<ActivityState>) -> Vec<ActivityState> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_first_playing_code_emits() {
        let (mut normalizer, rx) = attached();
        assert_eq!(
            normalizer.observe(&playing_code()),
            Some(ActivityState::Playing)
        );
        assert_eq!(drain(&rx), vec![ActivityState::Playing]);
    }

    #[test]
    fn test_repeated_playing_code_is_suppressed() {
        let (mut normalizer, rx) = attached();
        normalizer.observe(&playing_code());
        assert_eq!(normalizer.observe(&playing_code()), None);
        assert_eq!(drain(&rx), vec![ActivityState::Playing]);
    }

    #[test]
    fn test_removal_after_playing_stops() {
        let (mut normalizer, rx) = attached();
        normalizer.observe(&playing_code());
        assert_eq!(
            normalizer.observe(&RawObservation::NotificationRemoved),
            Some(ActivityState::Stopped)
        );
        assert_eq!(
            drain(&rx),
            vec![ActivityState::Playing, ActivityState::Stopped]
        );
    }

    #[test]
    fn test_interruption_end_without_resume_when_stopped() {
        let (mut normalizer, rx) = attached();
        normalizer.observe(&paused_code());
        let ended = RawObservation::InterruptionEnded {
            should_resume: false,
        };
        assert_eq!(normalizer.observe(&ended), None);
        assert_eq!(drain(&rx), vec![ActivityState::Stopped]);
    }

    #[test]
    fn test_unknown_code_keeps_state() {
        let (mut normalizer, rx) = attached();
        let route = RawObservation::RouteChanged {
            other_audio_playing: true,
        };
        assert_eq!(normalizer.observe(&route), Some(ActivityState::Playing));
        assert_eq!(
            normalizer.observe(&RawObservation::NotificationPlaybackState { code: 99 }),
            None
        );
        assert_eq!(normalizer.last_emitted(), Some(ActivityState::Playing));

        // Still deduplicating against Playing after the unknown code.
        assert_eq!(normalizer.observe(&playing_code()), None);
        assert_eq!(drain(&rx), vec![ActivityState::Playing]);
    }

    #[test]
    fn test_paused_then_removed_collapses() {
        let (mut normalizer, rx) = attached();
        normalizer.observe(&playing_code());
        normalizer.observe(&paused_code());
        normalizer.observe(&RawObservation::NotificationRemoved);
        assert_eq!(
            drain(&rx),
            vec![ActivityState::Playing, ActivityState::Stopped]
        );
    }

    #[test]
    fn test_state_recorded_without_subscriber() {
        let mut normalizer = ActivityNormalizer::new();
        assert_eq!(
            normalizer.observe(&playing_code()),
            Some(ActivityState::Playing)
        );

        let (tx, rx) = unbounded();
        normalizer.attach(ChannelSubscriber::new(tx));

        // Baseline survives the attach, and nothing is replayed.
        assert_eq!(normalizer.observe(&playing_code()), None);
        assert!(drain(&rx).is_empty());
        assert_eq!(
            normalizer.observe(&paused_code()),
            Some(ActivityState::Stopped)
        );
        assert_eq!(drain(&rx), vec![ActivityState::Stopped]);
    }

    #[test]
    fn test_attach_replaces_previous_subscriber() {
        let (mut normalizer, first_rx) = attached();
        normalizer.observe(&playing_code());

        let (tx, second_rx) = unbounded();
        normalizer.attach(ChannelSubscriber::new(tx));
        normalizer.observe(&paused_code());

        assert_eq!(drain(&first_rx), vec![ActivityState::Playing]);
        assert_eq!(drain(&second_rx), vec![ActivityState::Stopped]);
    }

    #[test]
    fn test_detach_is_idempotent() {
        let mut normalizer = ActivityNormalizer::new();
        let (tx, rx) = unbounded();
        let id = normalizer.attach(ChannelSubscriber::new(tx));

        normalizer.detach(id);
        normalizer.detach(id);
        assert_eq!(
            normalizer.observe(&playing_code()),
            Some(ActivityState::Playing)
        );
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn test_stale_detach_keeps_new_subscriber() {
        let mut normalizer = ActivityNormalizer::new();
        let stale = normalizer.attach(|_: ActivityState| {});
        let (tx, rx) = unbounded();
        normalizer.attach(ChannelSubscriber::new(tx));

        normalizer.detach(stale);
        normalizer.observe(&playing_code());
        assert_eq!(drain(&rx), vec![ActivityState::Playing]);
    }

    #[test]
    fn test_no_adjacent_duplicates_in_mixed_burst() {
        let (mut normalizer, rx) = attached();
        let burst = [
            RawObservation::InterruptionBegan,
            playing_code(),
            RawObservation::RouteChanged {
                other_audio_playing: true,
            },
            RawObservation::NotificationPlaybackState { code: 7 },
            paused_code(),
            RawObservation::NotificationRemoved,
            RawObservation::RouteChanged {
                other_audio_playing: false,
            },
            RawObservation::InterruptionEnded {
                should_resume: true,
            },
            RawObservation::InterruptionBegan,
            paused_code(),
        ];
        for raw in &burst {
            normalizer.observe(raw);
        }

        let emitted = drain(&rx);
        assert_eq!(
            emitted,
            vec![
                ActivityState::Playing,
                ActivityState::Stopped,
                ActivityState::Playing,
                ActivityState::Stopped,
            ]
        );
        assert!(emitted.windows(2).all(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn test_slow_bounded_consumer_sees_no_repeat() {
        let mut normalizer = ActivityNormalizer::new();
        let (tx, rx) = bounded(1);
        normalizer.attach(ChannelSubscriber::new(tx));

        let mut seen = Vec::new();

        // The receiver is full when Stopped is emitted.
        normalizer.observe(&playing_code());
        normalizer.observe(&paused_code());
        seen.extend(rx.try_iter());

        normalizer.observe(&playing_code());
        seen.extend(rx.try_iter());
        normalizer.observe(&paused_code());
        seen.extend(rx.try_iter());

        assert_eq!(seen, vec![ActivityState::Playing, ActivityState::Stopped]);
    }

    #[test]
    fn test_advance_records_without_delivering() {
        let (mut normalizer, rx) = attached();
        assert_eq!(
            normalizer.advance(&playing_code()),
            Some(ActivityState::Playing)
        );
        assert!(drain(&rx).is_empty());
        assert_eq!(normalizer.last_emitted(), Some(ActivityState::Playing));

        normalizer.publish(ActivityState::Playing);
        assert_eq!(drain(&rx), vec![ActivityState::Playing]);
    }

    #[test]
    fn test_subscriber_detaching_itself_does_not_hang() {
        let mut normalizer = ActivityNormalizer::new();
        let slot = normalizer.slot().clone();
        let (tx, rx) = unbounded();
        let id = Arc::new(OnceLock::new());

        let own_id = id.clone();
        let subscription = normalizer.attach(move |state: ActivityState| {
            let _ = tx.send(state);
            if let Some(id) = own_id.get() {
                slot.detach(*id);
            }
        });
        id.set(subscription).unwrap();

        assert_eq!(
            normalizer.observe(&RawObservation::InterruptionBegan),
            Some(ActivityState::Playing)
        );
        assert!(!normalizer.slot().is_attached());
        normalizer.observe(&paused_code());
        assert_eq!(drain(&rx), vec![ActivityState::Playing]);
    }
}
