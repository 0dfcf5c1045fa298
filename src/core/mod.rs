//! Core functionality for the Media Activity Agent.
//!
//! This module contains:
//! - The playback state and observation-to-candidate mapping
//! - The normalizer that deduplicates emissions
//! - The single-subscriber slot
//! - The threaded engine that serializes observations from all sources

pub mod engine;
pub mod normalizer;
pub mod state;
pub mod subscriber;

// Re-export commonly used types
pub use engine::{ActivityEngine, EngineConfig, EngineError};
pub use normalizer::ActivityNormalizer;
pub use state::{ActivityEvent, ActivityState};
pub use subscriber::{ChannelSubscriber, Subscriber, SubscriberSlot, SubscriptionId};
