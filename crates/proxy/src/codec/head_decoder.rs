//! Decoder for HTTP request head boundaries.
//!
//! The proxy forwards request heads verbatim, so this decoder does not parse
//! header fields at all. It only finds the blank-line terminator and splits
//! the head (terminator included) off the accumulation buffer.
//!
//! Both `\r\n\r\n` and a bare `\n\n` are accepted as terminators; when both
//! appear, the earliest occurrence wins.

use crate::protocol::ParseError;
use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

const CRLF_TERMINATOR: &[u8] = b"\r\n\r\n";
const LF_TERMINATOR: &[u8] = b"\n\n";

/// Splits complete request heads off the front of an accumulation buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadDecoder;

impl HeadDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for HeadDecoder {
    type Item = Bytes;
    type Error = ParseError;

    /// Attempts to split one complete head off `src`.
    ///
    /// # Returns
    /// - `Ok(Some(head))` with the terminator included; the remainder stays
    ///   buffered
    /// - `Ok(None)` when no terminator has arrived yet
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match find_terminator(src) {
            Some(end) => {
                let head = src.split_to(end).freeze();
                trace!(len = head.len(), "split request head off buffer");
                Ok(Some(head))
            }
            None => Ok(None),
        }
    }
}

/// Returns the end offset (exclusive, terminator included) of the earliest
/// head terminator in `buf`, if any.
fn find_terminator(buf: &[u8]) -> Option<usize> {
    let crlf = find_subslice(buf, CRLF_TERMINATOR);
    let lf = find_subslice(buf, LF_TERMINATOR);

    match (crlf, lf) {
        (Some(c), Some(l)) if c <= l => Some(c + CRLF_TERMINATOR.len()),
        (_, Some(l)) => Some(l + LF_TERMINATOR.len()),
        (Some(c), None) => Some(c + CRLF_TERMINATOR.len()),
        (None, None) => None,
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}
