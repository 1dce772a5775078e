//! Per-connection engines and the handle the reactor drives.
//!
//! [`ClientConnection`] owns the client-facing socket and both of its
//! engines, and is the single contract the readiness loop interacts with:
//!
//! - on a readable event, call [`read_data`](ClientConnection::read_data) (or
//!   [`read_related`](ClientConnection::read_related) while a body is owed)
//!   and route the returned head/content;
//! - once a response is decided, call
//!   [`start_data`](ClientConnection::start_data) and keep calling
//!   [`write_data`](ClientConnection::write_data) on writable events until
//!   the engine reports a terminal outcome.
//!
//! Everything runs on the thread owning the readiness loop; nothing here
//! locks, spawns, or blocks.

mod read_engine;
mod write_engine;

pub use read_engine::DEFAULT_READ_SIZE;
pub use read_engine::ReadEngine;
pub use write_engine::WriteEngine;
pub use write_engine::WriteState;

use crate::net::Transport;
use crate::protocol::{BodySize, Flush, ReadEvent, StartMode, WriteItem};
use bytes::Bytes;
use tracing::info;

/// One resume's worth of inbound data, tagged with the connection identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadData<'a> {
    /// Opaque connection identity.
    pub name: &'a str,
    /// Claimed peer label; display only, never the transport endpoint.
    pub peer: &'a str,
    /// A complete request head, if one was produced.
    pub request: Option<Bytes>,
    /// A body fragment, if one was produced.
    pub content: Option<Bytes>,
    /// The connection is terminally closed; stop using it.
    pub closed: bool,
}

/// Owns one client socket and its read/write engines.
#[derive(Debug)]
pub struct ClientConnection<S> {
    name: String,
    sock: S,
    peer: String,
    reader: ReadEngine,
    writer: Option<WriteEngine>,
}

impl<S: Transport> ClientConnection<S> {
    /// Takes exclusive ownership of an accepted, already non-blocking socket.
    pub fn new(name: impl Into<String>, sock: S, peer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sock,
            peer: peer.into(),
            reader: ReadEngine::new(),
            writer: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Overrides the claimed peer label for this client. Does not affect the
    /// address data is actually sent to.
    pub fn set_peer(&mut self, peer: impl Into<String>) {
        self.peer = peer.into();
    }

    /// Resumes the read engine with the neutral directive.
    pub fn read_data(&mut self) -> ReadData<'_> {
        let event = self.reader.advance(&mut self.sock, 0, None);
        Self::tag(&self.name, &self.peer, event)
    }

    /// Resumes the read engine supplying the body extent decided from the
    /// head it just produced (or extra bytes announced mid-body).
    pub fn read_related(&mut self, remaining: BodySize) -> ReadData<'_> {
        let event = self.reader.advance(&mut self.sock, 0, Some(remaining));
        Self::tag(&self.name, &self.peer, event)
    }

    /// Forwards one payload (or the finish marker) to the write engine.
    /// `None` means no response cycle is active or the engine is terminal.
    pub fn write_data(&mut self, item: WriteItem) -> Option<Flush> {
        match self.writer.as_mut() {
            Some(writer) => writer.push(&mut self.sock, item),
            None => None,
        }
    }

    /// Creates and primes a write engine for a new response cycle, returning
    /// its first meaningful flush outcome.
    pub fn start_data(&mut self, mode: StartMode) -> Option<Flush> {
        let (writer, flush) = WriteEngine::start(&mut self.sock, mode);
        self.writer = Some(writer);
        flush
    }

    /// Discards the current write engine and starts a new response cycle on
    /// this already-used socket (keep-alive / pipelining reuse).
    pub fn restart_data(&mut self, mode: StartMode) -> Option<Flush> {
        self.writer = None;
        self.start_data(mode)
    }

    /// State of the active write engine, if any.
    pub fn write_state(&self) -> Option<WriteState> {
        self.writer.as_ref().map(WriteEngine::state)
    }

    /// Best-effort full-duplex shutdown; errors are ignored. Both engines are
    /// released: the reader turns terminally closed and the writer is
    /// dropped. Safe to call at any suspend point.
    pub fn shutdown(&mut self) {
        let _ = self.sock.shutdown();
        self.reader.close();
        self.writer = None;
        info!(name = %self.name, "client connection shut down");
    }

    fn tag<'a>(name: &'a str, peer: &'a str, event: ReadEvent) -> ReadData<'a> {
        let (request, content, closed) = match event {
            ReadEvent::Head(head) => (Some(head), None, false),
            ReadEvent::Content(bytes) => (None, Some(bytes), false),
            ReadEvent::Closed => (None, None, true),
            ReadEvent::Blocked | ReadEvent::Incomplete => (None, None, false),
        };

        ReadData { name, peer, request, content, closed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::testing::ScriptedSocket;

    const HEAD: &[u8] = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";

    fn connection(sock: ScriptedSocket) -> ClientConnection<ScriptedSocket> {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        ClientConnection::new("client-1", sock, "203.0.113.7")
    }

    #[test]
    fn test_read_data_tags_identity() {
        let mut sock = ScriptedSocket::new();
        sock.read_ok(HEAD);
        let mut conn = connection(sock);

        let data = conn.read_data();
        assert_eq!(data.name, "client-1");
        assert_eq!(data.peer, "203.0.113.7");
        assert_eq!(data.request.as_deref(), Some(HEAD));
        assert_eq!(data.content, None);
        assert!(!data.closed);
    }

    #[test]
    fn test_two_resume_head_delivery() {
        let mut sock = ScriptedSocket::new();
        sock.read_ok(b"GET / HTTP/1.1\r\nHost: x\r\n").read_ok(b"\r\n");
        let mut conn = connection(sock);

        let first = conn.read_data();
        assert_eq!(first.request, None);
        assert_eq!(first.content, None);
        assert!(!first.closed);

        let second = conn.read_data();
        assert_eq!(second.request.as_deref(), Some(HEAD));
    }

    #[test]
    fn test_read_related_streams_body() {
        let mut sock = ScriptedSocket::new();
        sock.read_ok(HEAD).read_ok(b"payload");
        let mut conn = connection(sock);

        assert!(conn.read_data().request.is_some());
        assert_eq!(conn.read_related(BodySize::Length(7)).content, None);
        assert_eq!(conn.read_data().content.as_deref(), Some(&b"payload"[..]));
    }

    #[test]
    fn test_set_peer_changes_label_only() {
        let mut sock = ScriptedSocket::new();
        sock.read_ok(HEAD);
        let mut conn = connection(sock);

        conn.set_peer("198.51.100.9");
        let data = conn.read_data();
        assert_eq!(data.peer, "198.51.100.9");
        assert!(data.request.is_some());
    }

    #[test]
    fn test_closed_connection_reports_terminal() {
        let mut sock = ScriptedSocket::new();
        sock.read_close();
        let mut conn = connection(sock);

        assert!(conn.read_data().closed);
        assert!(conn.read_data().closed);
    }

    #[test]
    fn test_write_data_without_cycle_is_rejected() {
        let mut conn = connection(ScriptedSocket::new());
        assert!(conn.write_data(WriteItem::flush()).is_none());
    }

    #[test]
    fn test_restart_begins_new_response_cycle() {
        let mut conn = connection(ScriptedSocket::new());

        // first cycle runs to terminal success
        assert!(conn.start_data(StartMode::Close(Bytes::from_static(b"one"))).is_none());
        assert_eq!(conn.write_state(), Some(WriteState::Finished));
        assert!(conn.write_data(WriteItem::Data(Bytes::from_static(b"no"))).is_none());

        // restart discards the finished engine and accepts data again
        let flush = conn.restart_data(StartMode::Stream(Bytes::from_static(b"two"))).unwrap();
        assert_eq!(flush.sent, 3);
        assert_eq!(conn.write_state(), Some(WriteState::Buffering));
        assert_eq!(&conn.sock.written[..], b"onetwo");
    }

    #[test]
    fn test_shutdown_releases_engines() {
        let mut sock = ScriptedSocket::new();
        sock.read_ok(HEAD);
        let mut conn = connection(sock);

        conn.start_data(StartMode::Stream(Bytes::from_static(b"x")));
        conn.shutdown();

        assert_eq!(conn.sock.shutdown_calls, 1);
        assert!(conn.read_data().closed);
        assert!(conn.write_data(WriteItem::flush()).is_none());
        assert_eq!(conn.write_state(), None);
    }
}
