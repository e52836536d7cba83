//! Production [`NativeStack`] over the `worklet-sys` runtime.
//!
//! Handle newtypes carry the runtime's malloc'd shell pointers; every
//! `*_destroy` here pairs the runtime's destroy call with `libc::free` of
//! the shell. The poll sink is boxed into the poll handle's user data so
//! the native callback can recover it without any global state, and is
//! reclaimed at destroy. Handed-off text sources are duplicated onto the
//! heap and released by the finalize trampoline, exactly once.

use std::ffi::{CStr, CString};
use std::ptr;
use std::sync::Arc;

use libc::{c_char, c_int, c_void};
use worklet_sys as sys;

use crate::stack::{status, NativeStack, PollSink, RawChannel, RawPoll, RawWorklet};
use crate::transfer::Source;

pub struct SysStack;

impl SysStack {
    pub fn new() -> Arc<SysStack> {
        Arc::new(SysStack)
    }
}

impl Default for SysStack {
    fn default() -> Self {
        SysStack
    }
}

unsafe extern "C" fn poll_trampoline(poll: *mut sys::worklet_ipc_poll_t, bits: c_int) {
    let data = sys::worklet_ipc_poll_get_data(poll);
    if data.is_null() {
        return;
    }
    let sink = &*(data as *const PollSink);
    sink(bits);
}

unsafe extern "C" fn finalize_trampoline(
    _worklet: *mut sys::worklet_t,
    _source: *const sys::worklet_buf_t,
    hint: *mut c_void,
) {
    drop(Box::from_raw(hint as *mut Vec<u8>));
}

impl NativeStack for SysStack {
    fn worklet_alloc(&self) -> (i32, RawWorklet) {
        let mut handle: *mut sys::worklet_t = ptr::null_mut();
        let rc = unsafe { sys::worklet_alloc(&mut handle) };
        (rc, RawWorklet(handle as usize))
    }

    fn worklet_init(&self, worklet: RawWorklet, memory_limit: usize, assets: Option<&CStr>) -> i32 {
        let options = sys::worklet_options_t {
            memory_limit,
            assets: assets.map_or(ptr::null(), CStr::as_ptr),
        };
        unsafe { sys::worklet_init(worklet.0 as *mut sys::worklet_t, &options) }
    }

    fn worklet_start(
        &self,
        worklet: RawWorklet,
        filename: &CStr,
        source: Option<Source<'_>>,
        argv: &[CString],
    ) -> i32 {
        let handle = worklet.0 as *mut sys::worklet_t;
        let argv_ptrs: Vec<*const c_char> = argv.iter().map(|a| a.as_ptr()).collect();
        let argc = argv_ptrs.len() as c_int;

        match source {
            None => unsafe {
                sys::worklet_start(
                    handle,
                    filename.as_ptr(),
                    ptr::null(),
                    None,
                    ptr::null_mut(),
                    argc,
                    argv_ptrs.as_ptr(),
                )
            },
            Some(Source::View(bytes)) => {
                // Borrowed for the duration of the call only.
                let buf = sys::worklet_buf_t {
                    base: bytes.as_ptr() as *mut c_char,
                    len: bytes.len(),
                };
                unsafe {
                    sys::worklet_start(
                        handle,
                        filename.as_ptr(),
                        &buf,
                        None,
                        ptr::null_mut(),
                        argc,
                        argv_ptrs.as_ptr(),
                    )
                }
            }
            Some(Source::Handoff(bytes)) => {
                // The runtime keeps the buffer past this call; it is
                // released by the finalize trampoline.
                let mut copy = Box::new(bytes.to_vec());
                let buf = sys::worklet_buf_t {
                    base: copy.as_mut_ptr() as *mut c_char,
                    len: copy.len(),
                };
                let hint = Box::into_raw(copy);
                let rc = unsafe {
                    sys::worklet_start(
                        handle,
                        filename.as_ptr(),
                        &buf,
                        Some(finalize_trampoline),
                        hint as *mut c_void,
                        argc,
                        argv_ptrs.as_ptr(),
                    )
                };
                if rc != status::OK {
                    // Finalize is only delivered for a successful start.
                    unsafe { drop(Box::from_raw(hint)) };
                }
                rc
            }
        }
    }

    fn worklet_suspend(&self, worklet: RawWorklet, linger_ms: i32) -> i32 {
        unsafe { sys::worklet_suspend(worklet.0 as *mut sys::worklet_t, linger_ms) }
    }

    fn worklet_resume(&self, worklet: RawWorklet) -> i32 {
        unsafe { sys::worklet_resume(worklet.0 as *mut sys::worklet_t) }
    }

    fn worklet_wakeup(&self, worklet: RawWorklet, deadline_ms: i32) -> i32 {
        unsafe { sys::worklet_wakeup(worklet.0 as *mut sys::worklet_t, deadline_ms) }
    }

    fn worklet_terminate(&self, worklet: RawWorklet) -> i32 {
        unsafe { sys::worklet_terminate(worklet.0 as *mut sys::worklet_t) }
    }

    fn worklet_destroy(&self, worklet: RawWorklet) {
        let handle = worklet.0 as *mut sys::worklet_t;
        unsafe {
            sys::worklet_destroy(handle);
            libc::free(handle as *mut c_void);
        }
    }

    fn channel_alloc(&self) -> (i32, RawChannel) {
        let mut handle: *mut sys::worklet_ipc_t = ptr::null_mut();
        let rc = unsafe { sys::worklet_ipc_alloc(&mut handle) };
        (rc, RawChannel(handle as usize))
    }

    fn channel_open(&self, channel: RawChannel, worklet: RawWorklet) -> i32 {
        unsafe {
            sys::worklet_ipc_init(
                channel.0 as *mut sys::worklet_ipc_t,
                worklet.0 as *mut sys::worklet_t,
            )
        }
    }

    fn channel_read(&self, channel: RawChannel, sink: &mut Vec<u8>) -> i32 {
        let mut data: *mut c_void = ptr::null_mut();
        let mut len: usize = 0;
        let rc = unsafe {
            sys::worklet_ipc_read(channel.0 as *mut sys::worklet_ipc_t, &mut data, &mut len)
        };
        if rc == status::OK {
            sink.clear();
            if len != 0 {
                // The runtime's view is only valid until the next channel
                // call; hand the host an owned copy.
                sink.extend_from_slice(unsafe {
                    std::slice::from_raw_parts(data as *const u8, len)
                });
            }
        }
        rc
    }

    fn channel_write(&self, channel: RawChannel, data: &[u8]) -> i32 {
        unsafe {
            sys::worklet_ipc_write(
                channel.0 as *mut sys::worklet_ipc_t,
                data.as_ptr() as *const c_void,
                data.len(),
            )
        }
    }

    fn channel_destroy(&self, channel: RawChannel) {
        let handle = channel.0 as *mut sys::worklet_ipc_t;
        unsafe {
            sys::worklet_ipc_destroy(handle);
            libc::free(handle as *mut c_void);
        }
    }

    fn poll_alloc(&self) -> (i32, RawPoll) {
        let mut handle: *mut sys::worklet_ipc_poll_t = ptr::null_mut();
        let rc = unsafe { sys::worklet_ipc_poll_alloc(&mut handle) };
        (rc, RawPoll(handle as usize))
    }

    fn poll_bind(&self, poll: RawPoll, sink: PollSink) {
        let data = Box::into_raw(Box::new(sink));
        unsafe {
            sys::worklet_ipc_poll_set_data(poll.0 as *mut sys::worklet_ipc_poll_t, data as *mut c_void);
        }
    }

    fn poll_open(&self, poll: RawPoll, channel: RawChannel) -> i32 {
        unsafe {
            sys::worklet_ipc_poll_init(
                poll.0 as *mut sys::worklet_ipc_poll_t,
                channel.0 as *mut sys::worklet_ipc_t,
            )
        }
    }

    fn poll_start(&self, poll: RawPoll, bits: i32) -> i32 {
        unsafe {
            sys::worklet_ipc_poll_start(
                poll.0 as *mut sys::worklet_ipc_poll_t,
                bits,
                Some(poll_trampoline),
            )
        }
    }

    fn poll_stop(&self, poll: RawPoll) -> i32 {
        unsafe { sys::worklet_ipc_poll_stop(poll.0 as *mut sys::worklet_ipc_poll_t) }
    }

    fn poll_destroy(&self, poll: RawPoll) {
        let handle = poll.0 as *mut sys::worklet_ipc_poll_t;
        unsafe {
            let data = sys::worklet_ipc_poll_get_data(handle);
            if !data.is_null() {
                sys::worklet_ipc_poll_set_data(handle, ptr::null_mut());
                drop(Box::from_raw(data as *mut PollSink));
            }
            sys::worklet_ipc_poll_destroy(handle);
            libc::free(handle as *mut c_void);
        }
    }
}
