//! Readiness bridge: turns the poller's level-triggered native callbacks
//! into observer notifications delivered on the host's own execution
//! context.
//!
//! The native callback fires on the runtime's scheduler thread. Observer
//! state follows the host's single-writer rule, so the bridge never calls
//! the observer inline; it schedules the delivery through a [`HostInvoker`]
//! and lets the host run it from its own context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::stack::{events, PollSink};

/// A unit of work scheduled onto the host's execution context.
pub type HostTask = Box<dyn FnOnce() + Send>;

/// The host's callback-invocation mechanism. `invoke` may be called from
/// any thread; the host runs the task from its single execution context.
pub trait HostInvoker: Send + Sync {
    fn invoke(&self, task: HostTask);
}

/// Ready-made [`HostInvoker`]: an unbounded queue the host drains from its
/// own context.
pub struct HostQueue {
    tx: Sender<HostTask>,
    rx: Receiver<HostTask>,
}

impl HostQueue {
    pub fn new() -> Arc<HostQueue> {
        let (tx, rx) = unbounded();
        Arc::new(HostQueue { tx, rx })
    }

    /// Runs every task queued so far. Returns the number of tasks run.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }
}

impl HostInvoker for HostQueue {
    fn invoke(&self, task: HostTask) {
        let _ = self.tx.send(task);
    }
}

/// Per-worklet bridge state. Shared with the poll sink closure, which may
/// outlive the worklet's handles on the native side; the terminated flag is
/// checked both when a firing is scheduled and when the host delivers it,
/// so the observer never runs after terminate has returned.
pub(crate) struct ReadinessBridge {
    observer: Box<dyn Fn(bool, bool) + Send + Sync>,
    invoker: Arc<dyn HostInvoker>,
    terminated: AtomicBool,
}

impl ReadinessBridge {
    pub(crate) fn new(
        observer: Box<dyn Fn(bool, bool) + Send + Sync>,
        invoker: Arc<dyn HostInvoker>,
    ) -> Arc<ReadinessBridge> {
        Arc::new(ReadinessBridge {
            observer,
            invoker,
            terminated: AtomicBool::new(false),
        })
    }

    /// The callback bound to the worklet's poller. Each native firing
    /// schedules exactly one observer invocation; no coalescing.
    pub(crate) fn sink(self: &Arc<Self>) -> PollSink {
        let bridge = Arc::clone(self);
        Box::new(move |bits| bridge.forward(bits))
    }

    pub(crate) fn shutdown(&self) {
        self.terminated.store(true, Ordering::SeqCst);
    }

    fn forward(self: &Arc<Self>, bits: i32) {
        if self.terminated.load(Ordering::SeqCst) {
            return;
        }

        let readable = bits & events::READABLE != 0;
        let writable = bits & events::WRITABLE != 0;

        let bridge = Arc::clone(self);
        self.invoker.invoke(Box::new(move || {
            if bridge.terminated.load(Ordering::SeqCst) {
                return;
            }
            (bridge.observer)(readable, writable);
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn collecting_bridge(queue: &Arc<HostQueue>) -> (Arc<ReadinessBridge>, Arc<Mutex<Vec<(bool, bool)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let bridge = ReadinessBridge::new(
            Box::new(move |r, w| sink.lock().unwrap().push((r, w))),
            Arc::clone(queue) as Arc<dyn HostInvoker>,
        );
        (bridge, seen)
    }

    #[test]
    fn decodes_bits_and_delivers_on_drain() {
        let queue = HostQueue::new();
        let (bridge, seen) = collecting_bridge(&queue);
        let sink = bridge.sink();

        sink(events::READABLE);
        assert!(seen.lock().unwrap().is_empty(), "must not deliver inline");

        assert_eq!(queue.drain(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![(true, false)]);

        sink(events::READABLE | events::WRITABLE);
        queue.drain();
        assert_eq!(*seen.lock().unwrap(), vec![(true, false), (true, true)]);
    }

    #[test]
    fn one_delivery_per_firing() {
        let queue = HostQueue::new();
        let (bridge, seen) = collecting_bridge(&queue);
        let sink = bridge.sink();

        sink(events::WRITABLE);
        sink(events::WRITABLE);
        sink(events::WRITABLE);
        assert_eq!(queue.drain(), 3);
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn shutdown_suppresses_scheduling() {
        let queue = HostQueue::new();
        let (bridge, seen) = collecting_bridge(&queue);
        let sink = bridge.sink();

        bridge.shutdown();
        sink(events::READABLE);
        queue.drain();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn shutdown_suppresses_in_flight_delivery() {
        let queue = HostQueue::new();
        let (bridge, seen) = collecting_bridge(&queue);
        let sink = bridge.sink();

        sink(events::READABLE);
        bridge.shutdown();
        queue.drain();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn queue_drain_is_empty_when_idle() {
        let queue = HostQueue::new();
        assert_eq!(queue.drain(), 0);
    }
}
