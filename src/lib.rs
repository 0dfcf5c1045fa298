//! Media Activity Agent - is audio media playing somewhere on this device?
//!
//! The only evidence available comes from two unrelated, noisy platform
//! signal sources: media notifications (playback-state codes, removals) and
//! the audio session (interruptions, route changes). This crate normalizes
//! both into one deduplicated `START`/`STOP` stream for a single subscriber.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Media Activity Agent                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐                                            │
//! │  │ Notification │──┐                                         │
//! │  │   adapter    │  │   ┌──────────┐   ┌──────────────┐       │
//! │  └──────────────┘  ├──▶│   Feed   │──▶│  Normalizer  │──▶ sub │
//! │  ┌──────────────┐  │   │ (bounded)│   │ (one thread) │       │
//! │  │ AudioSession │──┘   └──────────┘   └──────────────┘       │
//! │  │   adapter    │                            │               │
//! │  └──────────────┘                            ▼               │
//! │                                      ┌──────────────┐        │
//! │                                      │ Activity log │        │
//! │                                      └──────────────┘        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use media_activity_agent::{
//!     core::{ActivityEngine, EngineConfig},
//!     source::{NotificationPayload, NotificationSource},
//!     stats::create_shared_log,
//! };
//!
//! let engine = ActivityEngine::start(EngineConfig::default(), create_shared_log())
//!     .expect("Failed to start engine");
//! engine.attach(|state: media_activity_agent::ActivityState| println!("{state}"));
//!
//! // Called from the platform's notification-listener callback
//! let notifications = NotificationSource::new(engine.sender(), true);
//! notifications.on_posted(&NotificationPayload::media(3));
//! ```

pub mod config;
pub mod core;
pub mod source;
pub mod stats;

// Re-export key types at crate root for convenience
pub use config::{Config, OutputFormat, SourceConfig};
pub use crate::core::{
    ActivityEngine, ActivityEvent, ActivityNormalizer, ActivityState, EngineConfig, Subscriber,
    SubscriptionId,
};
pub use source::{Observation, RawObservation, SourceKind};
pub use stats::{ActivityLog, ActivityStats, SharedActivityLog};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
