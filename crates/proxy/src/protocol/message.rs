//! Message-level types exchanged between the engines and their coordinator.

use bytes::Bytes;
use std::path::PathBuf;

/// How much request body follows a head, decided by the coordinator from the
/// head it was just handed.
///
/// After a bounded body fragment, `Length(extra)` adds `extra` to the bytes
/// still owed (the peer announced more data than first expected).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySize {
    /// No body follows the head.
    Empty,
    /// Exactly this many more body bytes follow.
    Length(u64),
    /// The body uses chunked transfer coding.
    Chunked,
    /// Read body bytes until the peer closes the connection.
    UntilClose,
}

/// Outcome of one resume of the read engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    /// The socket had no data; retry after the next readiness signal.
    /// Buffered state is untouched.
    Blocked,
    /// Bytes were examined (and possibly buffered) but no complete head or
    /// body fragment is available yet.
    Incomplete,
    /// A complete request head, blank-line terminator included.
    Head(Bytes),
    /// A fragment of the pending request body.
    Content(Bytes),
    /// Terminal: peer close, fatal read error, or malformed framing.
    /// All subsequent resumes return this as well.
    Closed,
}

impl ReadEvent {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Input to one push of the write engine.
///
/// An empty `Data` payload is the forced-flush marker: it attempts a send
/// even though a flush is already pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteItem {
    /// Bytes to append to the output buffer.
    Data(Bytes),
    /// No further input will arrive; close once drained.
    Finish,
}

impl WriteItem {
    /// The forced-flush marker.
    pub fn flush() -> Self {
        Self::Data(Bytes::new())
    }
}

/// How a write engine is initiated, selected once per response cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartMode {
    /// Deliver one payload now; keep the connection open for more.
    Stream(Bytes),
    /// Deliver one payload, then close once fully flushed.
    Close(Bytes),
    /// Source the response from a local file, with `header` preceding the
    /// file content on the wire, then close once flushed.
    File { header: Bytes, path: PathBuf },
}

/// Backpressure report from one push of the write engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flush {
    /// Data remains buffered, or the engine is finishing; the reactor should
    /// keep (or register) write-readiness for this socket.
    pub buffered: bool,
    /// The buffer was non-empty before this push.
    pub had_buffer: bool,
    /// Bytes actually transmitted by this push.
    pub sent: usize,
}
