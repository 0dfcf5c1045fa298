//! Threaded front end for the normalizer.
//!
//! Sources push into a bounded feed from whatever callback context they run
//! on; a single worker thread drains the feed into one [`ActivityNormalizer`],
//! so observations are serialized without locking the normalizer state.
//! Attach/detach go straight to the shared subscriber slot and take effect
//! before they return.

use crate::core::normalizer::ActivityNormalizer;
use crate::core::state::ActivityState;
use crate::core::subscriber::{Subscriber, SubscriberSlot, SubscriptionId};
use crate::source::feed::{observation_feed, ObservationSender, DEFAULT_FEED_CAPACITY};
use crate::source::types::Observation;
use crate::stats::SharedActivityLog;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

/// How often the worker re-checks the running flag while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Observations buffered before sources start dropping
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_FEED_CAPACITY,
        }
    }
}

/// Errors that can occur when starting the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to spawn normalizer thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Last emitted state, readable from any thread. Zero means unknown.
#[derive(Debug, Default)]
struct StateCell(AtomicU8);

impl StateCell {
    const PLAYING: u8 = 1;
    const STOPPED: u8 = 2;

    fn store(&self, state: ActivityState) {
        let raw = match state {
            ActivityState::Playing => Self::PLAYING,
            ActivityState::Stopped => Self::STOPPED,
        };
        self.0.store(raw, Ordering::Release);
    }

    fn load(&self) -> Option<ActivityState> {
        match self.0.load(Ordering::Acquire) {
            Self::PLAYING => Some(ActivityState::Playing),
            Self::STOPPED => Some(ActivityState::Stopped),
            _ => None,
        }
    }
}

/// Owns the normalizer worker thread.
pub struct ActivityEngine {
    sender: ObservationSender,
    slot: SubscriberSlot,
    state: Arc<StateCell>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ActivityEngine {
    /// Spawn the worker and return a handle to it.
    pub fn start(config: EngineConfig, log: SharedActivityLog) -> Result<Self, EngineError> {
        let (sender, receiver) = observation_feed(config.queue_capacity, Some(log.clone()));
        let slot = SubscriberSlot::new();
        let normalizer = ActivityNormalizer::with_slot(slot.clone());
        let state = Arc::new(StateCell::default());
        let running = Arc::new(AtomicBool::new(true));

        let worker = Worker {
            normalizer,
            receiver,
            state: state.clone(),
            running: running.clone(),
            log,
        };

        let handle = thread::Builder::new()
            .name("activity-normalizer".to_string())
            .spawn(move || worker.run())?;

        tracing::debug!(capacity = config.queue_capacity, "Activity engine started");

        Ok(Self {
            sender,
            slot,
            state,
            running,
            thread_handle: Some(handle),
        })
    }

    /// Producer handle for signal sources.
    pub fn sender(&self) -> ObservationSender {
        self.sender.clone()
    }

    /// Attach a subscriber, replacing any existing one.
    pub fn attach<S>(&self, subscriber: S) -> SubscriptionId
    where
        S: Subscriber + 'static,
    {
        self.slot.attach(Box::new(subscriber))
    }

    /// Detach `id` if it is still current. No event reaches it after this returns.
    pub fn detach(&self, id: SubscriptionId) {
        self.slot.detach(id);
    }

    /// The last emitted state, `None` while still unknown.
    pub fn last_state(&self) -> Option<ActivityState> {
        self.state.load()
    }

    /// Check if the worker is still accepting observations.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the worker after it has processed everything already queued.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                tracing::error!("Normalizer thread panicked");
            }
            tracing::debug!("Activity engine stopped");
        }
    }
}

impl Drop for ActivityEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    normalizer: ActivityNormalizer,
    receiver: Receiver<Observation>,
    state: Arc<StateCell>,
    running: Arc<AtomicBool>,
    log: SharedActivityLog,
}

impl Worker {
    fn run(mut self) {
        while self.running.load(Ordering::SeqCst) {
            match self.receiver.recv_timeout(POLL_INTERVAL) {
                Ok(observation) => self.process(&observation),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        while let Ok(observation) = self.receiver.try_recv() {
            self.process(&observation);
        }
    }

    fn process(&mut self, observation: &Observation) {
        let candidate = observation.raw.candidate();

        match self.normalizer.advance(&observation.raw) {
            Some(state) => {
                // Readable through `last_state` before the subscriber hears of it.
                self.state.store(state);
                self.normalizer.publish(state);
                self.log.record_emitted(state);
                tracing::info!(
                    source = observation.source.as_str(),
                    event = %state,
                    "Playback state changed"
                );
            }
            None if candidate.is_none() => self.log.record_ignored(),
            None => self.log.record_suppressed(),
        }
    }
}
