//! Signal sources for the Media Activity Agent.
//!
//! Each native provider gets a thin adapter that turns its callback payloads
//! into [`RawObservation`]s and pushes them into the shared, non-blocking
//! observation feed. Registering for the OS callbacks themselves is left to
//! the host integration.

pub mod audio_session;
pub mod feed;
pub mod notification;
pub mod script;
pub mod types;

// Re-export commonly used types
pub use audio_session::{AudioSessionSource, InterruptionType, RouteChangeReason};
pub use feed::{observation_feed, ObservationSender, DEFAULT_FEED_CAPACITY};
pub use notification::{NotificationPayload, NotificationSource};
pub use script::{NativeSignal, ScriptEntry, ScriptReport, ScriptSource, SignalTargets, SourceError};
pub use types::{Observation, RawObservation, SourceKind};

use crate::config::SourceConfig;

/// Build both adapters on top of one feed, honouring `config`.
pub fn signal_targets(feed: &ObservationSender, config: &SourceConfig) -> SignalTargets {
    SignalTargets {
        notification: NotificationSource::new(feed.clone(), config.notification),
        audio_session: AudioSessionSource::new(feed.clone(), config.audio_session),
    }
}
