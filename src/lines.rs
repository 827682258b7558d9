// SPDX-License-Identifier: MIT

//! Line scanning inside multipart part headers.

use memchr::memmem;
use std::ops::Range;
use std::sync::LazyLock;

static CRLF: LazyLock<memmem::Finder<'static>> = LazyLock::new(|| memmem::Finder::new(b"\r\n"));

/// Find the next header line after `from`.
///
/// The scan first moves past the terminator of the line `from` sits on
/// (`\r\n`, or `\0\n` as produced by writers that NUL-terminate in place), then
/// returns the range up to but excluding the following `\r\n`. A zero-length
/// range is the blank line that closes a header block. `None` means one of the
/// two terminators is missing before the end of `buf`.
pub fn next_line(buf: &[u8], from: usize) -> Option<Range<usize>> {
    let start = line_start_after(buf, from)?;
    let len = CRLF.find(&buf[start..])?;
    Some(start..start + len)
}

fn line_start_after(buf: &[u8], from: usize) -> Option<usize> {
    let rest = buf.get(from..)?;
    let offset = rest
        .windows(2)
        .position(|w| w == b"\r\n" || w == b"\0\n")?;
    let start = from + offset + 2;
    (start < buf.len()).then_some(start)
}
