//! Supervisor for native worklets: an isolated, independently scheduled
//! execution unit embedded in the host process, reached through a duplex
//! byte-stream IPC channel.
//!
//! The supervisor owns a worklet's lifecycle (create, start, suspend,
//! resume, wakeup, terminate), translates the channel's level-triggered
//! readiness into observer notifications delivered on the host's own
//! execution context, and enforces at most one running worklet per logical
//! identifier through an injectable [`Registry`].
//!
//! The native runtime is reached through the [`NativeStack`] seam. Enable
//! the `native` feature to get [`SysStack`], the production implementation
//! over `worklet-sys`; tests and embedders without the runtime library use
//! their own stack implementation.

mod bridge;
#[cfg(feature = "native")]
mod native;
mod registry;
mod stack;
mod transfer;
mod worklet;

pub use bridge::{HostInvoker, HostQueue, HostTask};
#[cfg(feature = "native")]
pub use native::SysStack;
pub use registry::Registry;
pub use stack::{events, status, NativeStack, PollSink, RawChannel, RawPoll, RawWorklet};
pub use transfer::Source;
pub use worklet::{Lifecycle, Worklet, WorkletOptions};
