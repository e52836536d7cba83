//! Raw declarations for the native worklet runtime.
//!
//! The runtime embeds an isolated, independently scheduled execution unit
//! ("worklet") in the host process and exposes a duplex byte-stream IPC
//! endpoint plus a readiness poller for it. Every handle here is an opaque
//! shell allocated by the runtime's `*_alloc` call and released with
//! `libc::free` after the matching `*_destroy`.
//!
//! This crate carries no `#[link]` attribute: the embedding application
//! decides which build of the runtime to link.

#![allow(non_camel_case_types)]

use libc::{c_char, c_int, c_void, size_t};

pub enum worklet_t {}
pub enum worklet_ipc_t {}
pub enum worklet_ipc_poll_t {}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct worklet_buf_t {
    pub base: *mut c_char,
    pub len: size_t,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct worklet_options_t {
    pub memory_limit: size_t,
    pub assets: *const c_char,
}

/// Invoked by the runtime exactly once when a handed-off source buffer is
/// no longer needed.
pub type worklet_finalize_cb =
    Option<unsafe extern "C" fn(worklet: *mut worklet_t, source: *const worklet_buf_t, hint: *mut c_void)>;

/// Fired on the runtime's own scheduler thread with the ready event bits.
pub type worklet_ipc_poll_cb =
    Option<unsafe extern "C" fn(poll: *mut worklet_ipc_poll_t, events: c_int)>;

pub const WORKLET_IPC_READABLE: c_int = 0x1;
pub const WORKLET_IPC_WRITABLE: c_int = 0x2;

pub const WORKLET_IPC_WOULD_BLOCK: c_int = -1;
pub const WORKLET_IPC_ERROR: c_int = -2;

extern "C" {
    pub fn worklet_alloc(result: *mut *mut worklet_t) -> c_int;

    pub fn worklet_init(worklet: *mut worklet_t, options: *const worklet_options_t) -> c_int;

    pub fn worklet_destroy(worklet: *mut worklet_t);

    pub fn worklet_get_data(worklet: *mut worklet_t) -> *mut c_void;

    pub fn worklet_set_data(worklet: *mut worklet_t, data: *mut c_void);

    pub fn worklet_start(
        worklet: *mut worklet_t,
        filename: *const c_char,
        source: *const worklet_buf_t,
        finalize: worklet_finalize_cb,
        finalize_hint: *mut c_void,
        argc: c_int,
        argv: *const *const c_char,
    ) -> c_int;

    pub fn worklet_suspend(worklet: *mut worklet_t, linger: c_int) -> c_int;

    pub fn worklet_resume(worklet: *mut worklet_t) -> c_int;

    pub fn worklet_wakeup(worklet: *mut worklet_t, deadline: c_int) -> c_int;

    pub fn worklet_terminate(worklet: *mut worklet_t) -> c_int;

    pub fn worklet_ipc_alloc(result: *mut *mut worklet_ipc_t) -> c_int;

    pub fn worklet_ipc_init(ipc: *mut worklet_ipc_t, worklet: *mut worklet_t) -> c_int;

    pub fn worklet_ipc_destroy(ipc: *mut worklet_ipc_t);

    pub fn worklet_ipc_read(ipc: *mut worklet_ipc_t, data: *mut *mut c_void, len: *mut size_t) -> c_int;

    pub fn worklet_ipc_write(ipc: *mut worklet_ipc_t, data: *const c_void, len: size_t) -> c_int;

    pub fn worklet_ipc_poll_alloc(result: *mut *mut worklet_ipc_poll_t) -> c_int;

    pub fn worklet_ipc_poll_init(poll: *mut worklet_ipc_poll_t, ipc: *mut worklet_ipc_t) -> c_int;

    pub fn worklet_ipc_poll_destroy(poll: *mut worklet_ipc_poll_t);

    pub fn worklet_ipc_poll_get_data(poll: *mut worklet_ipc_poll_t) -> *mut c_void;

    pub fn worklet_ipc_poll_set_data(poll: *mut worklet_ipc_poll_t, data: *mut c_void);

    pub fn worklet_ipc_poll_start(
        poll: *mut worklet_ipc_poll_t,
        events: c_int,
        cb: worklet_ipc_poll_cb,
    ) -> c_int;

    pub fn worklet_ipc_poll_stop(poll: *mut worklet_ipc_poll_t) -> c_int;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buf_layout_matches_c() {
        assert_eq!(
            std::mem::size_of::<worklet_buf_t>(),
            std::mem::size_of::<*mut c_char>() + std::mem::size_of::<size_t>()
        );
        assert_eq!(
            std::mem::align_of::<worklet_buf_t>(),
            std::mem::align_of::<*mut c_char>()
        );
    }
}
