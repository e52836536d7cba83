//! Marshaling of host-owned strings and buffers for native calls.
//!
//! Owned copies (`CString`s for filenames, asset roots, and argument
//! vectors) are scoped to the one native call they are built for and are
//! released when they go out of scope, on every return path. Views into
//! caller storage are plain borrows and need no release.

use std::ffi::CString;

/// A script source crossing into the native start call.
#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    /// Borrowed view into caller storage; valid only until the start call
    /// returns.
    View(&'a [u8]),
    /// Duplicated into a native-owned heap buffer at the call site and
    /// released by the runtime's finalize notification, exactly once,
    /// after the execution unit no longer needs it.
    Handoff(&'a [u8]),
}

impl<'a> Source<'a> {
    /// Bounds-checked view from a caller-given offset and length.
    pub fn view(data: &'a [u8], offset: usize, length: usize) -> Source<'a> {
        Source::View(view(data, offset, length))
    }

    /// UTF-8 text to be duplicated and handed off to the runtime.
    pub fn handoff(text: &'a str) -> Source<'a> {
        Source::Handoff(text.as_bytes())
    }
}

/// Owned NUL-terminated copy of a host string. An interior NUL means the
/// host broke the contract for `what`.
pub fn owned_cstring(value: &str, what: &str) -> CString {
    match CString::new(value) {
        Ok(c) => c,
        Err(_) => panic!("{what} contains an interior NUL byte"),
    }
}

/// Owned copies of an argument list, each NUL-terminated.
pub fn owned_argv(args: &[String]) -> Vec<CString> {
    args.iter().map(|a| owned_cstring(a, "argument")).collect()
}

/// Pointer+length view computed from a caller-given offset and length.
pub fn view(data: &[u8], offset: usize, length: usize) -> &[u8] {
    let end = offset
        .checked_add(length)
        .unwrap_or_else(|| panic!("buffer range overflows: offset={offset} length={length}"));
    assert!(
        end <= data.len(),
        "buffer range out of bounds: offset={offset} length={length} len={}",
        data.len()
    );
    &data[offset..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_applies_offset_and_length() {
        let data = b"abcdef";
        assert_eq!(view(data, 0, 6), b"abcdef");
        assert_eq!(view(data, 2, 3), b"cde");
        assert_eq!(view(data, 6, 0), b"");
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn view_rejects_overrun() {
        let data = b"abc";
        let _ = view(data, 1, 3);
    }

    #[test]
    #[should_panic(expected = "overflows")]
    fn view_rejects_overflowing_range() {
        let data = b"abc";
        let _ = view(data, usize::MAX, 2);
    }

    #[test]
    fn owned_cstring_copies_and_terminates() {
        let c = owned_cstring("hello", "filename");
        assert_eq!(c.as_bytes(), b"hello");
        assert_eq!(c.as_bytes_with_nul(), b"hello\0");
    }

    #[test]
    #[should_panic(expected = "interior NUL")]
    fn owned_cstring_rejects_interior_nul() {
        let _ = owned_cstring("he\0llo", "filename");
    }

    #[test]
    fn owned_argv_copies_every_entry() {
        let argv = owned_argv(&["--flag".to_string(), "value".to_string()]);
        assert_eq!(argv.len(), 2);
        assert_eq!(argv[0].as_bytes(), b"--flag");
        assert_eq!(argv[1].as_bytes(), b"value");
    }
}
