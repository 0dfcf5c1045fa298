//! The single-subscriber slot that receives normalized emissions.

use crate::core::state::ActivityState;
use crossbeam_channel::{unbounded, Receiver, Sender, TrySendError};
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

/// A consumer of the normalized `START`/`STOP` stream.
///
/// `deliver` runs on the normalizer's thread and must not block. It may call
/// `attach`/`detach` on the slot it is attached to; those take effect once
/// the current delivery returns.
pub trait Subscriber: Send {
    fn deliver(&self, state: ActivityState);
}

impl<F> Subscriber for F
where
    F: Fn(ActivityState) + Send,
{
    fn deliver(&self, state: ActivityState) {
        self(state)
    }
}

/// Forwards emissions into a crossbeam channel without blocking.
///
/// With a bounded channel a full queue drops the token. The transition back
/// is then skipped as well, so the receiver never sees the same token twice
/// in a row; it only lags until the next transition fits.
pub struct ChannelSubscriber {
    sender: Sender<ActivityState>,
    last_sent: Cell<Option<ActivityState>>,
}

impl ChannelSubscriber {
    pub fn new(sender: Sender<ActivityState>) -> Self {
        Self {
            sender,
            last_sent: Cell::new(None),
        }
    }

    /// Subscriber over an unbounded channel, which never drops a transition.
    pub fn unbounded() -> (Self, Receiver<ActivityState>) {
        let (tx, rx) = unbounded();
        (Self::new(tx), rx)
    }
}

impl Subscriber for ChannelSubscriber {
    fn deliver(&self, state: ActivityState) {
        if self.last_sent.get() == Some(state) {
            tracing::debug!(event = %state, "Receiver already has this state, skipping");
            return;
        }

        match self.sender.try_send(state) {
            Ok(()) => self.last_sent.set(Some(state)),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(event = %state, "Subscriber channel full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!(event = %state, "Subscriber channel closed");
            }
        }
    }
}

/// Identifies one `attach` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Attached {
    id: SubscriptionId,
    subscriber: Box<dyn Subscriber>,
}

/// Slot change requested by a subscriber from inside its own delivery.
enum Deferred {
    Detach,
    Replace(Attached),
}

/// The delivery in progress, if any.
struct Delivery {
    thread: ThreadId,
    /// Subscription current once `deferred` is applied
    current: Option<SubscriptionId>,
    deferred: Option<Deferred>,
}

/// Shared, at-most-one subscriber slot.
///
/// Delivery holds the slot lock, so once `attach` or `detach` returns the
/// previous subscriber never sees another event. Calls made by the
/// subscriber itself during delivery are recorded and applied when the
/// delivery returns, before the lock is released.
#[derive(Clone, Default)]
pub struct SubscriberSlot {
    inner: Arc<Mutex<Option<Attached>>>,
    delivery: Arc<Mutex<Option<Delivery>>>,
    next_id: Arc<AtomicU64>,
}

impl SubscriberSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any current subscriber.
    pub fn attach(&self, subscriber: Box<dyn Subscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut pending = Some(Attached { id, subscriber });

        self.on_delivery_thread(|active| {
            active.current = Some(id);
            active.deferred = pending.take().map(Deferred::Replace);
        });

        if let Some(attached) = pending {
            let previous = self.lock().replace(attached);
            if previous.is_some() {
                tracing::debug!("Replaced previous subscriber");
            }
        }
        id
    }

    /// Clear the slot if `id` is the current subscription. Idempotent.
    pub fn detach(&self, id: SubscriptionId) -> bool {
        let reentrant = self.on_delivery_thread(|active| {
            if active.current != Some(id) {
                return false;
            }
            active.current = None;
            active.deferred = Some(Deferred::Detach);
            true
        });
        if let Some(detached) = reentrant {
            return detached;
        }

        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|a| a.id == id) {
            *slot = None;
            true
        } else {
            false
        }
    }

    pub fn is_attached(&self) -> bool {
        if let Some(attached) = self.on_delivery_thread(|active| active.current.is_some()) {
            return attached;
        }
        self.lock().is_some()
    }

    /// Hand `state` to the current subscriber. Returns whether anyone got it.
    pub fn deliver(&self, state: ActivityState) -> bool {
        let mut slot = self.lock();
        let Some(attached) = slot.as_ref() else {
            return false;
        };

        *self.delivery() = Some(Delivery {
            thread: thread::current().id(),
            current: Some(attached.id),
            deferred: None,
        });
        attached.subscriber.deliver(state);

        let finished = self.delivery().take();
        match finished.and_then(|d| d.deferred) {
            Some(Deferred::Detach) => {
                *slot = None;
                tracing::debug!("Subscriber detached itself");
            }
            Some(Deferred::Replace(next)) => {
                *slot = Some(next);
                tracing::debug!("Subscriber replaced itself");
            }
            None => {}
        }
        true
    }

    /// Run `f` against the in-progress delivery if it belongs to this thread.
    fn on_delivery_thread<R>(&self, f: impl FnOnce(&mut Delivery) -> R) -> Option<R> {
        let mut delivery = self.delivery();
        match delivery.as_mut() {
            Some(active) if active.thread == thread::current().id() => Some(f(active)),
            _ => None,
        }
    }

    // Recover the slot if a subscriber panicked mid-delivery.
    fn lock(&self) -> MutexGuard<'_, Option<Attached>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn delivery(&self) -> MutexGuard<'_, Option<Delivery>> {
        self.delivery
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
