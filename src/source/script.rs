//! Scripted signal source.
//!
//! Replays recorded native signals from JSON Lines through the same adapters
//! a live platform integration would use. One entry per line:
//!
//! ```text
//! {"signal":"notification_posted","has_media_session":true,"playback_state":3}
//! {"signal":"interruption","interruption_type":0,"options":1,"delay_ms":250}
//! {"signal":"route_change","reason":2,"other_audio_playing":false}
//! {"signal":"notification_removed","has_media_session":true}
//! ```
//!
//! Blank lines and `#` comments are skipped. Malformed lines are logged and
//! skipped.

use crate::source::audio_session::AudioSessionSource;
use crate::source::notification::{NotificationPayload, NotificationSource};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

/// A native signal as a platform callback would have delivered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum NativeSignal {
    NotificationPosted {
        has_media_session: bool,
        #[serde(default)]
        playback_state: Option<i32>,
    },
    NotificationRemoved {
        has_media_session: bool,
    },
    Interruption {
        #[serde(default)]
        interruption_type: Option<u64>,
        #[serde(default)]
        options: Option<u64>,
    },
    RouteChange {
        #[serde(default)]
        reason: Option<u64>,
        other_audio_playing: bool,
    },
}

/// One line of a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptEntry {
    /// Pause before dispatching this signal
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(flatten)]
    pub signal: NativeSignal,
}

impl ScriptEntry {
    /// Parse one script line. `Ok(None)` for blank and comment lines.
    pub fn parse_line(line: &str) -> Result<Option<Self>, serde_json::Error> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        serde_json::from_str(line).map(Some)
    }
}

/// The adapters a script dispatches into.
#[derive(Clone)]
pub struct SignalTargets {
    pub notification: NotificationSource,
    pub audio_session: AudioSessionSource,
}

impl SignalTargets {
    /// Route one native signal to the matching adapter.
    pub fn dispatch(&self, signal: &NativeSignal) -> bool {
        match *signal {
            NativeSignal::NotificationPosted {
                has_media_session,
                playback_state,
            } => self.notification.on_posted(&NotificationPayload {
                has_media_session,
                playback_state,
            }),
            NativeSignal::NotificationRemoved { has_media_session } => {
                self.notification.on_removed(&NotificationPayload {
                    has_media_session,
                    playback_state: None,
                })
            }
            NativeSignal::Interruption {
                interruption_type,
                options,
            } => self.audio_session.on_interruption(interruption_type, options),
            NativeSignal::RouteChange {
                reason,
                other_audio_playing,
            } => self
                .audio_session
                .on_route_change(reason, other_audio_playing),
        }
    }
}

/// Errors that can occur while running a script.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Script source is already running")]
    AlreadyRunning,
    #[error("Failed to open script input: {0}")]
    Open(#[from] std::io::Error),
}

/// Replays a script on a background thread.
pub struct ScriptSource {
    targets: SignalTargets,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<ScriptReport>>,
}

/// What a finished replay did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptReport {
    /// Signals that produced an observation
    pub forwarded: u64,
    /// Signals filtered by the adapters
    pub filtered: u64,
    /// Lines that could not be parsed
    pub malformed: u64,
}

impl ScriptSource {
    pub fn new(targets: SignalTargets) -> Self {
        Self {
            targets,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Start replaying the file at `path`.
    pub fn start_file(&mut self, path: &Path) -> Result<(), SourceError> {
        let file = std::fs::File::open(path)?;
        self.start(std::io::BufReader::new(file))
    }

    /// Start replaying from any line reader, e.g. stdin.
    pub fn start<R>(&mut self, reader: R) -> Result<(), SourceError>
    where
        R: BufRead + Send + 'static,
    {
        if self.running.load(Ordering::SeqCst) {
            return Err(SourceError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);

        let targets = self.targets.clone();
        let running = self.running.clone();

        let handle = thread::spawn(move || {
            let report = replay(reader, &targets, &running);
            running.store(false, Ordering::SeqCst);
            report
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Ask the replay to stop after the current line and wait for it.
    pub fn stop(&mut self) -> Option<ScriptReport> {
        self.running.store(false, Ordering::SeqCst);
        self.wait()
    }

    /// Ask the replay to stop without waiting for it.
    ///
    /// A reader blocked on input (e.g. an open stdin) is left to finish on
    /// its own.
    pub fn cancel(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if self
            .thread_handle
            .as_ref()
            .is_some_and(|handle| handle.is_finished())
        {
            self.wait();
        }
    }

    /// Wait for the replay to reach the end of its input.
    pub fn wait(&mut self) -> Option<ScriptReport> {
        let handle = self.thread_handle.take()?;
        match handle.join() {
            Ok(report) => Some(report),
            Err(_) => {
                tracing::error!("Script replay thread panicked");
                None
            }
        }
    }

    /// Check if the replay is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for ScriptSource {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Replay every line of `reader` until it ends or `running` is cleared.
fn replay<R: BufRead>(reader: R, targets: &SignalTargets, running: &AtomicBool) -> ScriptReport {
    let mut report = ScriptReport::default();

    for (index, line) in reader.lines().enumerate() {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Stopping script replay, read failed: {e}");
                break;
            }
        };

        let entry = match ScriptEntry::parse_line(&line) {
            Ok(Some(entry)) => entry,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(line = index + 1, "Skipping malformed script line: {e}");
                report.malformed += 1;
                continue;
            }
        };

        if entry.delay_ms > 0 {
            sleep_while_running(Duration::from_millis(entry.delay_ms), running);
            if !running.load(Ordering::SeqCst) {
                break;
            }
        }

        if targets.dispatch(&entry.signal) {
            report.forwarded += 1;
        } else {
            report.filtered += 1;
        }
    }

    report
}

// Sleep in short slices so `stop` is not held up by long delays.
fn sleep_while_running(total: Duration, running: &AtomicBool) {
    let slice = Duration::from_millis(50);
    let mut remaining = total;
    while !remaining.is_zero() && running.load(Ordering::SeqCst) {
        let step = remaining.min(slice);
        thread::sleep(step);
        remaining -= step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::feed::observation_feed;
    use crate::source::types::{Observation, RawObservation};
    use crossbeam_channel::Receiver;
    use std::io::Cursor;

    fn targets(capacity: usize) -> (SignalTargets, Receiver<Observation>) {
        let (sender, receiver) = observation_feed(capacity, None);
        let targets = SignalTargets {
            notification: NotificationSource::new(sender.clone(), true),
            audio_session: AudioSessionSource::new(sender, true),
        };
        (targets, receiver)
    }

    #[test]
    fn test_parse_lines() {
        assert_eq!(ScriptEntry::parse_line("   ").unwrap(), None);
        assert_eq!(ScriptEntry::parse_line("# comment").unwrap(), None);

        let entry = ScriptEntry::parse_line(
            r#"{"signal":"route_change","reason":1,"other_audio_playing":true,"delay_ms":5}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(entry.delay_ms, 5);
        assert_eq!(
            entry.signal,
            NativeSignal::RouteChange {
                reason: Some(1),
                other_audio_playing: true
            }
        );

        assert!(ScriptEntry::parse_line(r#"{"signal":"volume_changed"}"#).is_err());
    }

    #[test]
    fn test_replay_dispatches_through_adapters() {
        let (targets, receiver) = targets(16);
        let script = "\
{\"signal\":\"notification_posted\",\"has_media_session\":true,\"playback_state\":3}
{\"signal\":\"notification_posted\",\"has_media_session\":false,\"playback_state\":2}
not json
{\"signal\":\"route_change\",\"reason\":3,\"other_audio_playing\":false}
{\"signal\":\"interruption\",\"interruption_type\":0}
";
        let mut source = ScriptSource::new(targets);
        source.start(Cursor::new(script.to_string())).unwrap();
        let report = source.wait().unwrap();

        assert_eq!(
            report,
            ScriptReport {
                forwarded: 2,
                filtered: 2,
                malformed: 1,
            }
        );

        let raws: Vec<_> = receiver.try_iter().map(|o| o.raw).collect();
        assert_eq!(
            raws,
            vec![
                RawObservation::NotificationPlaybackState { code: 3 },
                RawObservation::InterruptionEnded {
                    should_resume: false
                },
            ]
        );
        assert!(!source.is_running());
    }

    #[test]
    fn test_cannot_start_twice() {
        let (targets, _receiver) = targets(4);
        let mut source = ScriptSource::new(targets);
        let slow = "{\"signal\":\"interruption\",\"interruption_type\":1,\"delay_ms\":2000}\n";
        source.start(Cursor::new(slow.to_string())).unwrap();

        assert!(matches!(
            source.start(Cursor::new(String::new())),
            Err(SourceError::AlreadyRunning)
        ));

        // Stop interrupts the pending delay before anything is dispatched.
        let report = source.stop().unwrap();
        assert_eq!(report.forwarded, 0);
    }

    #[test]
    fn test_missing_file() {
        let (targets, _receiver) = targets(4);
        let mut source = ScriptSource::new(targets);
        assert!(matches!(
            source.start_file(Path::new("/nonexistent/signals.jsonl")),
            Err(SourceError::Open(_))
        ));
    }
}
