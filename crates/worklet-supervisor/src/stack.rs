use std::ffi::{CStr, CString};

use crate::transfer::Source;

/// Status codes shared with the native runtime. Anything else negative is a
/// contract violation.
pub mod status {
    pub const OK: i32 = 0;
    pub const WOULD_BLOCK: i32 = -1;
    pub const ERROR: i32 = -2;
}

/// Readiness event bits.
pub mod events {
    pub const READABLE: i32 = 0x1;
    pub const WRITABLE: i32 = 0x2;
}

/// Opaque execution-unit handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawWorklet(pub usize);

/// Opaque IPC channel handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawChannel(pub usize);

/// Opaque readiness poller handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawPoll(pub usize);

/// Callback bound to a poller. Fired with the ready event bits, on the
/// native runtime's own scheduler thread.
pub type PollSink = Box<dyn Fn(i32) + Send + Sync>;

/// The native runtime, as the supervisor sees it.
///
/// Each primitive returns a [`status`] code; `channel_write` returns the
/// accepted byte count when non-negative. The runtime guarantees success
/// for every call made with valid handles in the legal lifecycle order, so
/// the supervisor treats unexpected statuses as fatal rather than
/// propagating them.
///
/// Handles are only meaningful to the implementation that produced them.
pub trait NativeStack: Send + Sync {
    fn worklet_alloc(&self) -> (i32, RawWorklet);

    fn worklet_init(&self, worklet: RawWorklet, memory_limit: usize, assets: Option<&CStr>)
        -> i32;

    /// Begins running the execution unit. A [`Source::Handoff`] source is
    /// duplicated by the implementation and released through the runtime's
    /// finalize notification once the unit no longer needs it; a
    /// [`Source::View`] is borrowed only for the duration of the call.
    fn worklet_start(
        &self,
        worklet: RawWorklet,
        filename: &CStr,
        source: Option<Source<'_>>,
        argv: &[CString],
    ) -> i32;

    fn worklet_suspend(&self, worklet: RawWorklet, linger_ms: i32) -> i32;

    fn worklet_resume(&self, worklet: RawWorklet) -> i32;

    fn worklet_wakeup(&self, worklet: RawWorklet, deadline_ms: i32) -> i32;

    fn worklet_terminate(&self, worklet: RawWorklet) -> i32;

    fn worklet_destroy(&self, worklet: RawWorklet);

    fn channel_alloc(&self) -> (i32, RawChannel);

    /// Wires the channel to a running worklet.
    fn channel_open(&self, channel: RawChannel, worklet: RawWorklet) -> i32;

    /// On [`status::OK`], replaces `sink`'s contents with the bytes
    /// currently queued on the channel.
    fn channel_read(&self, channel: RawChannel, sink: &mut Vec<u8>) -> i32;

    /// Returns the accepted byte count, [`status::WOULD_BLOCK`], or
    /// [`status::ERROR`].
    fn channel_write(&self, channel: RawChannel, data: &[u8]) -> i32;

    fn channel_destroy(&self, channel: RawChannel);

    fn poll_alloc(&self) -> (i32, RawPoll);

    /// Associates the callback that `poll_start` will arm. Bound once,
    /// before the poller is opened; the implementation keeps it alive until
    /// `poll_destroy`.
    fn poll_bind(&self, poll: RawPoll, sink: PollSink);

    /// Wires the poller to a channel.
    fn poll_open(&self, poll: RawPoll, channel: RawChannel) -> i32;

    fn poll_start(&self, poll: RawPoll, events: i32) -> i32;

    fn poll_stop(&self, poll: RawPoll) -> i32;

    fn poll_destroy(&self, poll: RawPoll);
}
