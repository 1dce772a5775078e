//! Scanner for chunked transfer coding size lines.
//!
//! An intercepting proxy forwards chunked bodies verbatim, so nothing here is
//! de-chunked. The scanner walks the size lines visible in the accumulation
//! buffer and reports how many wire bytes (size lines, chunk data, and both
//! CRLF terminators per chunk) the pending body spans, so the read engine can
//! hand them through as opaque content.
//!
//! The scan never consumes buffer bytes; delivery of the counted region is
//! the read engine's job.

use crate::ensure;
use crate::protocol::ParseError;

const EOL: &[u8] = b"\r\n";

/// Upper bound on a pending (unterminated) size-line fragment. A u64 chunk
/// size is at most 16 hex digits; 64 leaves generous slack and still catches
/// a peer streaming garbage without terminators.
pub const MAX_CHUNK_LINE: usize = 64;

/// Progress of one scan over the buffered size lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    /// Wire bytes spanned by the complete size lines seen, data and
    /// terminators included. Zero means no complete line was available.
    pub expected: u64,
    /// The terminal zero-size chunk was seen; the chunked body ends inside
    /// the counted region.
    pub last: bool,
}

/// Scans chunk size lines without consuming the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkScanner {
    max_line: usize,
}

impl Default for ChunkScanner {
    fn default() -> Self {
        Self { max_line: MAX_CHUNK_LINE }
    }
}

impl ChunkScanner {
    pub fn new() -> Self {
        Default::default()
    }

    /// Walks the complete `<hex-size>\r\n` lines visible in `buf`.
    ///
    /// For each complete line the announced chunk's data is skipped, so a
    /// chunk payload containing CRLF is never misread as a size line.
    ///
    /// # Returns
    /// - `Ok(progress)` with the framed byte count and whether the terminal
    ///   chunk was seen; an incomplete trailing line just stops the walk
    /// - `Err(ParseError)` on a non-hex or empty size line, a hex overflow,
    ///   or an unterminated fragment longer than the bound
    pub fn scan(&self, buf: &[u8]) -> Result<ChunkProgress, ParseError> {
        let mut expected: u64 = 0;
        let mut cursor: u64 = 0;

        while cursor < buf.len() as u64 {
            let window = &buf[cursor as usize..];
            let bounded = &window[..window.len().min(self.max_line + EOL.len())];

            let Some(line_len) = find_eol(bounded) else {
                ensure!(window.len() <= self.max_line, ParseError::chunk_line_too_long(self.max_line));
                validate_fragment(window)?;
                break;
            };

            ensure!(line_len > 0, ParseError::invalid_chunk_line("empty size line"));
            let size = parse_hex_size(&bounded[..line_len])?;

            // size line + data + one CRLF after each
            let framed = (line_len as u64)
                .checked_add(size)
                .and_then(|n| n.checked_add(2 * EOL.len() as u64))
                .ok_or(ParseError::ChunkSizeOverflow)?;
            expected = expected.checked_add(framed).ok_or(ParseError::ChunkSizeOverflow)?;

            if size == 0 {
                return Ok(ChunkProgress { expected, last: true });
            }

            cursor = cursor.checked_add(framed).ok_or(ParseError::ChunkSizeOverflow)?;
        }

        Ok(ChunkProgress { expected, last: false })
    }
}

/// Length of the line ending at the first CRLF in `buf`, if complete.
fn find_eol(buf: &[u8]) -> Option<usize> {
    if buf.len() < EOL.len() {
        return None;
    }
    buf.windows(EOL.len()).position(|window| window == EOL)
}

/// An unterminated fragment must still look like the start of a size line:
/// hex digits, possibly a trailing CR awaiting its LF.
fn validate_fragment(fragment: &[u8]) -> Result<(), ParseError> {
    let trimmed = trim_trailing_eol(fragment);
    ensure!(
        trimmed.iter().all(u8::is_ascii_hexdigit),
        ParseError::invalid_chunk_line("invalid size")
    );
    Ok(())
}

fn trim_trailing_eol(mut fragment: &[u8]) -> &[u8] {
    while let [rest @ .., b'\r' | b'\n'] = fragment {
        fragment = rest;
    }
    fragment
}

fn parse_hex_size(line: &[u8]) -> Result<u64, ParseError> {
    let mut size: u64 = 0;
    for &b in line {
        let digit = match b {
            b @ b'0'..=b'9' => b - b'0',
            b @ b'a'..=b'f' => b + 10 - b'a',
            b @ b'A'..=b'F' => b + 10 - b'A',
            _ => return Err(ParseError::invalid_chunk_line("invalid size")),
        };

        size = size
            .checked_mul(16)
            .and_then(|s| s.checked_add(digit as u64))
            .ok_or(ParseError::ChunkSizeOverflow)?;
    }
    Ok(size)
}
