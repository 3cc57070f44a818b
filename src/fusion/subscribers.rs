//! Synchronous subscriber fan-out

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use tracing::error;

use crate::types::FusionResult;

pub type SubscriberId = u64;

type Callback = Box<dyn FnMut(&FusionResult)>;

struct Subscriber {
    id: SubscriberId,
    active: Rc<Cell<bool>>,
    callback: Callback,
}

/// Handle returned by `subscribe`; dropping it does not unsubscribe
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriberId,
    active: Rc<Cell<bool>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Detach the callback; it receives no further results
    pub fn unsubscribe(&self) {
        self.active.set(false);
    }
}

/// Registered callbacks, notified in registration order
#[derive(Default)]
pub struct SubscriberList {
    next_id: SubscriberId,
    subscribers: Vec<Subscriber>,
}

impl SubscriberList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, callback: F) -> Subscription
    where
        F: FnMut(&FusionResult) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        let active = Rc::new(Cell::new(true));
        self.subscribers.push(Subscriber {
            id,
            active: Rc::clone(&active),
            callback: Box::new(callback),
        });
        Subscription { id, active }
    }

    pub fn remove(&mut self, id: SubscriberId) -> bool {
        let Some(index) = self.subscribers.iter().position(|s| s.id == id) else {
            return false;
        };
        let removed = self.subscribers.remove(index);
        removed.active.set(false);
        true
    }

    pub fn len(&self) -> usize {
        self.subscribers.iter().filter(|s| s.active.get()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `result` to the subscriber `id` only
    pub fn notify_one(&mut self, id: SubscriberId, result: &FusionResult) {
        if let Some(subscriber) = self.subscribers.iter_mut().find(|s| s.id == id) {
            deliver(subscriber, result);
        }
    }

    /// Deliver `result` to every active subscriber.
    ///
    /// A panicking callback is logged and skipped; later callbacks still run.
    pub fn notify(&mut self, result: &FusionResult) {
        self.subscribers.retain(|s| s.active.get());
        for subscriber in self.subscribers.iter_mut() {
            deliver(subscriber, result);
        }
    }
}

fn deliver(subscriber: &mut Subscriber, result: &FusionResult) {
    if !subscriber.active.get() {
        return;
    }
    let callback = &mut subscriber.callback;
    if panic::catch_unwind(AssertUnwindSafe(|| callback(result))).is_err() {
        error!(subscriber = subscriber.id, "subscriber panicked during notification");
    }
}
