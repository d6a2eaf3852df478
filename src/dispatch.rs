// CoalescingDispatcher - latest-value bridge between worker and consumer
//
// The worker publishes snapshots at whatever cadence the provider emits
// events; the consumer drains at its own pace. Only the most recent
// snapshot survives between drains. This is a deliberate backpressure
// discipline: a slot of size one with overwrite-on-full, so the producer
// never blocks and the consumer never lags behind a growing queue. The
// terminal snapshot of an attempt can never be lost because the slot
// always retains the last write until it is drained.

use std::sync::Mutex;

use crate::progress::ProgressSnapshot;

pub type ProgressConsumer = Box<dyn Fn(ProgressSnapshot) + Send + Sync>;

pub struct CoalescingDispatcher {
    slot: Mutex<Option<ProgressSnapshot>>,
    consumer: ProgressConsumer,
}

impl CoalescingDispatcher {
    pub fn new(consumer: ProgressConsumer) -> Self {
        Self {
            slot: Mutex::new(None),
            consumer,
        }
    }

    /// Producer side. Overwrites whatever the consumer has not drained yet.
    pub fn publish(&self, snapshot: ProgressSnapshot) {
        *self.slot.lock().unwrap() = Some(snapshot);
    }

    /// Consumer side. Invokes the consumer callback with the most recent
    /// undelivered snapshot, if any. The callback runs outside the slot
    /// lock so a slow consumer never stalls the producer.
    ///
    /// Returns whether a snapshot was delivered.
    pub fn deliver_pending(&self) -> bool {
        let pending = self.slot.lock().unwrap().take();
        match pending {
            Some(snapshot) => {
                (self.consumer)(snapshot);
                true
            }
            None => false,
        }
    }
}
