//! Worklet lifecycle state machine.
//!
//! A worklet owns four native resources: the execution unit itself, its IPC
//! channel, its readiness poller, and (for text sources) a handed-off source
//! buffer released by the runtime's finalize notification. The tagged
//! [`Lifecycle`] state decides which of them are live; handles are never
//! individually destroyed while their siblings remain live, and teardown
//! runs exactly once in the fixed order poller, channel, worklet (the poller
//! holds a reference into the channel).
//!
//! Lock order across the crate: a worklet's own mutex, then the registry
//! mutex. The registry lock never acquires worklet locks, and an evicted
//! predecessor is terminated only after every lock is released.

use std::sync::{Arc, Mutex};

use crate::bridge::{HostInvoker, ReadinessBridge};
use crate::registry::Registry;
use crate::stack::{events, status, NativeStack, RawChannel, RawPoll, RawWorklet};
use crate::transfer::{self, Source};

#[derive(Debug, Clone, Default)]
pub struct WorkletOptions {
    /// Logical name. Named worklets register themselves on start; starting
    /// a second worklet under the same name terminates the first.
    pub id: Option<String>,
    /// Memory ceiling for the execution unit, in bytes.
    pub memory_limit: usize,
    /// Optional asset root path handed to the execution unit.
    pub assets: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Handles allocated and initialized; channel not yet wired.
    Created,
    /// Execution unit running; channel and poller wired.
    Started,
    /// All native resources released. Terminal.
    Terminated,
}

struct Inner {
    state: Lifecycle,
    worklet: RawWorklet,
    channel: RawChannel,
    poll: RawPoll,
}

pub struct Worklet {
    id: Option<String>,
    stack: Arc<dyn NativeStack>,
    registry: Arc<Registry>,
    bridge: Arc<ReadinessBridge>,
    inner: Mutex<Inner>,
}

impl Worklet {
    /// Allocates and initializes the native handle set and returns the
    /// worklet in [`Lifecycle::Created`]. The observer is invoked only
    /// through `invoker`, zero or more times, never after termination.
    ///
    /// Allocation or initialization failure is a runtime contract
    /// violation and panics.
    pub fn create(
        options: WorkletOptions,
        observer: impl Fn(bool, bool) + Send + Sync + 'static,
        invoker: Arc<dyn HostInvoker>,
        registry: Arc<Registry>,
        stack: Arc<dyn NativeStack>,
    ) -> Arc<Worklet> {
        let bridge = ReadinessBridge::new(Box::new(observer), invoker);

        let (rc, worklet) = stack.worklet_alloc();
        assert_eq!(rc, status::OK, "worklet alloc failed: {rc}");

        let (rc, channel) = stack.channel_alloc();
        assert_eq!(rc, status::OK, "ipc channel alloc failed: {rc}");

        let (rc, poll) = stack.poll_alloc();
        assert_eq!(rc, status::OK, "ipc poll alloc failed: {rc}");

        stack.poll_bind(poll, bridge.sink());

        {
            let assets = options
                .assets
                .as_deref()
                .map(|a| transfer::owned_cstring(a, "assets path"));
            let rc = stack.worklet_init(worklet, options.memory_limit, assets.as_deref());
            assert_eq!(rc, status::OK, "worklet init failed: {rc}");
        }

        Arc::new(Worklet {
            id: options.id,
            stack,
            registry,
            bridge,
            inner: Mutex::new(Inner {
                state: Lifecycle::Created,
                worklet,
                channel,
                poll,
            }),
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn state(&self) -> Lifecycle {
        self.inner.lock().unwrap().state
    }

    /// Starts the worklet from a file on disk. No-op unless in
    /// [`Lifecycle::Created`].
    pub fn start_from_file(self: &Arc<Self>, filename: &str, args: &[String]) {
        self.start(filename, None, args);
    }

    /// Starts the worklet from an in-memory byte range. The source is
    /// borrowed only for the duration of the call.
    pub fn start_from_bytes(
        self: &Arc<Self>,
        filename: &str,
        source: &[u8],
        offset: usize,
        length: usize,
        args: &[String],
    ) {
        self.start(filename, Some(Source::view(source, offset, length)), args);
    }

    /// Starts the worklet from UTF-8 text. The source is duplicated and
    /// released by the runtime's finalize notification once the execution
    /// unit no longer needs it.
    pub fn start_from_text(self: &Arc<Self>, filename: &str, source: &str, args: &[String]) {
        self.start(filename, Some(Source::handoff(source)), args);
    }

    fn start(self: &Arc<Self>, filename: &str, source: Option<Source<'_>>, args: &[String]) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != Lifecycle::Created {
            return;
        }

        let evicted = {
            // Owned copies live until the start call has returned, on every
            // path out of this block.
            let filename = transfer::owned_cstring(filename, "filename");
            let argv = transfer::owned_argv(args);

            let rc = self.stack.worklet_start(inner.worklet, &filename, source, &argv);
            assert_eq!(rc, status::OK, "worklet start failed: {rc}");

            let rc = self.stack.channel_open(inner.channel, inner.worklet);
            assert_eq!(rc, status::OK, "ipc channel open failed: {rc}");

            let rc = self.stack.poll_open(inner.poll, inner.channel);
            assert_eq!(rc, status::OK, "ipc poll open failed: {rc}");

            inner.state = Lifecycle::Started;

            match &self.id {
                Some(id) => self.registry.install(id, self),
                None => None,
            }
        };
        drop(inner);

        // The predecessor tears itself down outside both our state lock and
        // the registry lock.
        if let Some(previous) = evicted {
            previous.terminate();
        }
    }

    /// Arms the poller for the requested readiness events, or disarms it
    /// when both flags are clear. No-op once terminated.
    pub fn set_interest(&self, readable: bool, writable: bool) {
        let inner = self.inner.lock().unwrap();
        if inner.state == Lifecycle::Terminated {
            return;
        }

        let mut bits = 0;
        if readable {
            bits |= events::READABLE;
        }
        if writable {
            bits |= events::WRITABLE;
        }

        if bits != 0 {
            let rc = self.stack.poll_start(inner.poll, bits);
            assert_eq!(rc, status::OK, "ipc poll start failed: {rc}");
        } else {
            let rc = self.stack.poll_stop(inner.poll);
            assert_eq!(rc, status::OK, "ipc poll stop failed: {rc}");
        }
    }

    /// Bytes currently queued on the channel, or `None` when nothing is
    /// available or the worklet is not running.
    pub fn read(&self) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        if inner.state != Lifecycle::Started {
            return None;
        }

        let mut data = Vec::new();
        let rc = self.stack.channel_read(inner.channel, &mut data);
        if rc == status::WOULD_BLOCK {
            return None;
        }
        assert_eq!(rc, status::OK, "ipc read failed: {rc}");
        Some(data)
    }

    /// Writes the given range to the channel and returns the byte count the
    /// runtime accepted: 0 when it would block or when the worklet is not
    /// running.
    pub fn write(&self, data: &[u8], offset: usize, length: usize) -> usize {
        let inner = self.inner.lock().unwrap();
        if inner.state != Lifecycle::Started {
            return 0;
        }

        let rc = self
            .stack
            .channel_write(inner.channel, transfer::view(data, offset, length));
        if rc == status::WOULD_BLOCK {
            return 0;
        }
        assert!(rc >= 0, "ipc write failed: {rc}");
        rc as usize
    }

    /// Suspends the execution unit, lingering up to `linger_ms`. No-op
    /// unless started.
    pub fn suspend(&self, linger_ms: i32) {
        let inner = self.inner.lock().unwrap();
        if inner.state != Lifecycle::Started {
            return;
        }
        let rc = self.stack.worklet_suspend(inner.worklet, linger_ms);
        assert_eq!(rc, status::OK, "worklet suspend failed: {rc}");
    }

    /// No-op unless started.
    pub fn resume(&self) {
        let inner = self.inner.lock().unwrap();
        if inner.state != Lifecycle::Started {
            return;
        }
        let rc = self.stack.worklet_resume(inner.worklet);
        assert_eq!(rc, status::OK, "worklet resume failed: {rc}");
    }

    /// No-op unless started.
    pub fn wakeup(&self, deadline_ms: i32) {
        let inner = self.inner.lock().unwrap();
        if inner.state != Lifecycle::Started {
            return;
        }
        let rc = self.stack.worklet_wakeup(inner.worklet, deadline_ms);
        assert_eq!(rc, status::OK, "worklet wakeup failed: {rc}");
    }

    /// Tears the worklet down. Idempotent; a second call is a no-op.
    ///
    /// A never-started worklet releases only the execution-unit handle: its
    /// channel and poller were never wired.
    pub fn terminate(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == Lifecycle::Terminated {
            return;
        }

        if let Some(id) = &self.id {
            self.registry.remove(id, self);
        }

        let was_started = inner.state == Lifecycle::Started;
        inner.state = Lifecycle::Terminated;

        // From here on the bridge schedules nothing and drops anything
        // already in flight.
        self.bridge.shutdown();

        if was_started {
            let rc = self.stack.worklet_terminate(inner.worklet);
            assert_eq!(rc, status::OK, "worklet terminate failed: {rc}");

            self.stack.poll_destroy(inner.poll);
            self.stack.channel_destroy(inner.channel);
        }

        self.stack.worklet_destroy(inner.worklet);
    }
}

impl Drop for Worklet {
    fn drop(&mut self) {
        self.terminate();
    }
}
