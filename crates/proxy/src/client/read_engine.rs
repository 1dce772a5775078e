//! Resumable byte-to-request decoder bound to one client socket.
//!
//! The engine is the explicit state-machine rendering of a suspendable read
//! loop: each [`ReadEngine::advance`] performs at most one non-blocking
//! receive, makes whatever progress the buffered bytes allow, and returns a
//! [`ReadEvent`] describing where it suspended. The reactor resumes it on the
//! next readiness signal.
//!
//! Bytes are never discarded: everything received is either still in the
//! accumulation buffer, handed out as a head or body fragment, or counted as
//! chunk framing that will itself be handed out verbatim.

use crate::codec::{ChunkScanner, HeadDecoder};
use crate::net::{ErrorClass, Transport, classify, describe};
use crate::protocol::{BodySize, ReadEvent};
use bytes::BytesMut;
use std::cmp;
use tokio_util::codec::Decoder;
use tracing::{error, info, trace};

/// Receive size used when the caller never supplied a hint.
pub const DEFAULT_READ_SIZE: usize = 64 * 1024;

/// Progress through the body of the request currently being relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyProgress {
    /// Between requests; the next boundary to find is a head terminator.
    Idle,
    /// Exactly this many more body bytes are owed to the caller.
    Remaining(u64),
    /// Body bytes flow until the peer closes.
    UntilClose,
}

/// Where the next resume picks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resume {
    /// Attempt one socket receive, then examine the buffer.
    Read,
    /// A head or body boundary was just crossed; pipelined data may already
    /// be buffered, so examine it before touching the socket again.
    Drain,
    /// Terminal; every further resume reports closed.
    Closed,
}

/// What the previous resume yielded, deciding how the next directive is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastYield {
    Head,
    Content,
    Neutral,
}

/// Resumable request decoder for one connection.
#[derive(Debug)]
pub struct ReadEngine {
    buffer: BytesMut,
    body: BodyProgress,
    chunked: bool,
    read_size: usize,
    resume: Resume,
    last: LastYield,
    scratch: Vec<u8>,
    head_decoder: HeadDecoder,
    chunk_scanner: ChunkScanner,
}

impl Default for ReadEngine {
    fn default() -> Self {
        Self {
            buffer: BytesMut::new(),
            body: BodyProgress::Idle,
            chunked: false,
            read_size: DEFAULT_READ_SIZE,
            resume: Resume::Read,
            last: LastYield::Neutral,
            scratch: Vec::new(),
            head_decoder: HeadDecoder::new(),
            chunk_scanner: ChunkScanner::new(),
        }
    }
}

impl ReadEngine {
    pub fn new() -> Self {
        Default::default()
    }

    /// Resumes the engine for one step.
    ///
    /// `size_hint` of 0 keeps the previously requested receive size (initially
    /// [`DEFAULT_READ_SIZE`]); a positive hint is stored and used from now on.
    ///
    /// `directive` is meaningful right after a head was produced, where it
    /// selects the body mode, and right after a bounded fragment, where
    /// `Length(extra)` adds newly announced bytes to the count still owed.
    /// `None` is neutral.
    ///
    /// At most one socket receive happens per call; it is skipped exactly when
    /// the previous call crossed a message boundary, so pipelined data already
    /// buffered is delivered first.
    pub fn advance<S: Transport>(
        &mut self,
        sock: &mut S,
        size_hint: usize,
        directive: Option<BodySize>,
    ) -> ReadEvent {
        if self.resume == Resume::Closed {
            return ReadEvent::Closed;
        }

        if size_hint > 0 {
            self.read_size = size_hint;
        }
        self.apply_directive(directive);
        self.last = LastYield::Neutral;

        let skip_read = self.resume == Resume::Drain;
        self.resume = Resume::Read;

        if !skip_read {
            let want = self.read_size;
            if self.scratch.len() < want {
                self.scratch.resize(want, 0);
            }

            match sock.recv(&mut self.scratch[..want]) {
                Ok(0) => {
                    info!("peer closed the connection");
                    self.resume = Resume::Closed;
                    return ReadEvent::Closed;
                }
                Ok(n) => {
                    trace!(len = n, "received from client socket");
                    self.buffer.extend_from_slice(&self.scratch[..n]);
                }
                Err(e) if classify(&e) == ErrorClass::Retry => {
                    return ReadEvent::Blocked;
                }
                Err(e) => {
                    error!(cause = %describe(&e), "unexpected error reading from socket");
                    self.resume = Resume::Closed;
                    return ReadEvent::Closed;
                }
            }
        }

        self.examine()
    }

    /// Terminally closes the engine; used on connection shutdown.
    pub(crate) fn close(&mut self) {
        self.resume = Resume::Closed;
    }

    /// Bytes currently buffered and not yet delivered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn apply_directive(&mut self, directive: Option<BodySize>) {
        match self.last {
            LastYield::Head => match directive {
                None | Some(BodySize::Empty) => self.body = BodyProgress::Idle,
                Some(BodySize::Length(n)) => {
                    self.body = if n > 0 { BodyProgress::Remaining(n) } else { BodyProgress::Idle };
                }
                Some(BodySize::Chunked) => {
                    self.chunked = true;
                    self.body = BodyProgress::Idle;
                }
                Some(BodySize::UntilClose) => self.body = BodyProgress::UntilClose,
            },

            LastYield::Content => {
                if let Some(BodySize::Length(extra)) = directive {
                    self.body = match self.body {
                        BodyProgress::Remaining(owed) => {
                            BodyProgress::Remaining(owed.saturating_add(extra))
                        }
                        BodyProgress::Idle if extra > 0 => BodyProgress::Remaining(extra),
                        other => other,
                    };
                }
            }

            LastYield::Neutral => {}
        }
    }

    /// Makes whatever progress the buffered bytes allow: pending body first,
    /// then chunk framing, then the next head boundary.
    fn examine(&mut self) -> ReadEvent {
        loop {
            match self.body {
                BodyProgress::Remaining(owed) => {
                    if self.buffer.is_empty() {
                        return ReadEvent::Incomplete;
                    }

                    let take = cmp::min(owed, self.buffer.len() as u64) as usize;
                    let content = self.buffer.split_to(take).freeze();

                    if owed == take as u64 {
                        // body complete; look for a pipelined head next time
                        // before reading the socket again
                        self.body = BodyProgress::Idle;
                        self.resume = Resume::Drain;
                    } else {
                        self.body = BodyProgress::Remaining(owed - take as u64);
                    }

                    self.last = LastYield::Content;
                    return ReadEvent::Content(content);
                }

                BodyProgress::UntilClose => {
                    if self.buffer.is_empty() {
                        return ReadEvent::Incomplete;
                    }

                    let content = self.buffer.split().freeze();
                    self.last = LastYield::Content;
                    return ReadEvent::Content(content);
                }

                BodyProgress::Idle => {}
            }

            if self.chunked {
                match self.chunk_scanner.scan(&self.buffer) {
                    Ok(progress) => {
                        if progress.last {
                            trace!("terminal chunk seen, body ends inside counted region");
                            self.chunked = false;
                        }
                        if progress.expected > 0 {
                            self.body = BodyProgress::Remaining(progress.expected);
                            continue;
                        }
                        return ReadEvent::Incomplete;
                    }
                    Err(e) => {
                        error!(cause = %e, "malformed chunk framing, aborting connection");
                        self.resume = Resume::Closed;
                        return ReadEvent::Closed;
                    }
                }
            }

            return match self.head_decoder.decode(&mut self.buffer) {
                Ok(Some(head)) => {
                    self.resume = Resume::Drain;
                    self.last = LastYield::Head;
                    ReadEvent::Head(head)
                }
                _ => ReadEvent::Incomplete,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::testing::ScriptedSocket;
    use bytes::Bytes;

    const HEAD: &[u8] = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";

    fn resume(engine: &mut ReadEngine, sock: &mut ScriptedSocket) -> ReadEvent {
        engine.advance(sock, 0, None)
    }

    #[test]
    fn test_head_in_one_read() {
        let mut sock = ScriptedSocket::new();
        sock.read_ok(HEAD);
        let mut engine = ReadEngine::new();

        assert_eq!(resume(&mut engine, &mut sock), ReadEvent::Head(Bytes::from_static(HEAD)));
    }

    #[test]
    fn test_head_straddling_two_reads() {
        let mut sock = ScriptedSocket::new();
        sock.read_ok(b"GET / HTTP/1.1\r\nHost: x\r\n").read_ok(b"\r\n");
        let mut engine = ReadEngine::new();

        assert_eq!(resume(&mut engine, &mut sock), ReadEvent::Incomplete);
        assert_eq!(resume(&mut engine, &mut sock), ReadEvent::Head(Bytes::from_static(HEAD)));
    }

    #[test]
    fn test_blocked_resumes_are_idempotent() {
        let mut sock = ScriptedSocket::new();
        sock.read_ok(b"GET / HTTP/1.1\r\n");
        let mut engine = ReadEngine::new();

        assert_eq!(resume(&mut engine, &mut sock), ReadEvent::Incomplete);
        let buffered = engine.buffered();

        for _ in 0..3 {
            assert_eq!(resume(&mut engine, &mut sock), ReadEvent::Blocked);
            assert_eq!(engine.buffered(), buffered);
        }
    }

    #[test]
    fn test_bounded_body() {
        let mut sock = ScriptedSocket::new();
        sock.read_ok(HEAD).read_ok(b"hello").read_ok(b" world");
        let mut engine = ReadEngine::new();

        assert!(matches!(resume(&mut engine, &mut sock), ReadEvent::Head(_)));

        // pipelined check happens first and finds nothing buffered
        assert_eq!(engine.advance(&mut sock, 0, Some(BodySize::Length(11))), ReadEvent::Incomplete);
        assert_eq!(resume(&mut engine, &mut sock), ReadEvent::Content(Bytes::from_static(b"hello")));
        assert_eq!(resume(&mut engine, &mut sock), ReadEvent::Content(Bytes::from_static(b" world")));
    }

    #[test]
    fn test_body_pipelined_with_head() {
        let mut stream = Vec::new();
        stream.extend_from_slice(HEAD);
        stream.extend_from_slice(b"12345");

        let mut sock = ScriptedSocket::new();
        sock.read_ok(&stream);
        let mut engine = ReadEngine::new();

        assert!(matches!(resume(&mut engine, &mut sock), ReadEvent::Head(_)));
        // body bytes arrived with the head; no further socket read is needed
        // (the script is empty, so a read attempt would yield Blocked)
        assert_eq!(
            engine.advance(&mut sock, 0, Some(BodySize::Length(5))),
            ReadEvent::Content(Bytes::from_static(b"12345"))
        );
    }

    #[test]
    fn test_extra_bytes_announced_mid_body() {
        let mut sock = ScriptedSocket::new();
        sock.read_ok(HEAD).read_ok(b"abcXYZ");
        let mut engine = ReadEngine::new();

        assert!(matches!(resume(&mut engine, &mut sock), ReadEvent::Head(_)));
        assert_eq!(engine.advance(&mut sock, 0, Some(BodySize::Length(3))), ReadEvent::Incomplete);
        assert_eq!(resume(&mut engine, &mut sock), ReadEvent::Content(Bytes::from_static(b"abc")));

        // the caller learned 3 more bytes are owed; they are already buffered
        assert_eq!(
            engine.advance(&mut sock, 0, Some(BodySize::Length(3))),
            ReadEvent::Content(Bytes::from_static(b"XYZ"))
        );
    }

    #[test]
    fn test_pipelined_requests_without_extra_read() {
        let mut stream = Vec::new();
        stream.extend_from_slice(b"GET /a HTTP/1.1\r\n\r\n");
        stream.extend_from_slice(b"GET /b HTTP/1.1\r\n\r\n");

        let mut sock = ScriptedSocket::new();
        sock.read_ok(&stream);
        let mut engine = ReadEngine::new();

        assert_eq!(
            resume(&mut engine, &mut sock),
            ReadEvent::Head(Bytes::from_static(b"GET /a HTTP/1.1\r\n\r\n"))
        );
        assert_eq!(
            resume(&mut engine, &mut sock),
            ReadEvent::Head(Bytes::from_static(b"GET /b HTTP/1.1\r\n\r\n"))
        );
    }

    #[test]
    fn test_chunked_body_passes_through_verbatim() {
        let chunked = b"5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";

        let mut sock = ScriptedSocket::new();
        sock.read_ok(HEAD).read_ok(chunked);
        let mut engine = ReadEngine::new();

        assert!(matches!(resume(&mut engine, &mut sock), ReadEvent::Head(_)));
        assert_eq!(engine.advance(&mut sock, 0, Some(BodySize::Chunked)), ReadEvent::Incomplete);
        assert_eq!(resume(&mut engine, &mut sock), ReadEvent::Content(Bytes::from_static(chunked)));
    }

    #[test]
    fn test_chunked_body_split_invariance() {
        let chunked: &[u8] = b"4\r\nwiki\r\n5\r\npedia\r\n0\r\n\r\n";

        // deliver the same stream under several fragmentations
        for split in [1, 3, 7, chunked.len()] {
            let mut sock = ScriptedSocket::new();
            sock.read_ok(HEAD);
            for piece in chunked.chunks(split) {
                sock.read_ok(piece);
            }

            let mut engine = ReadEngine::new();
            assert!(matches!(resume(&mut engine, &mut sock), ReadEvent::Head(_)));

            let mut directive = Some(BodySize::Chunked);
            let mut collected = Vec::new();
            loop {
                match engine.advance(&mut sock, 0, directive.take()) {
                    ReadEvent::Content(bytes) => collected.extend_from_slice(&bytes),
                    ReadEvent::Incomplete => {}
                    ReadEvent::Blocked => break,
                    other => panic!("unexpected event: {other:?}"),
                }
                if collected.len() == chunked.len() {
                    break;
                }
            }

            assert_eq!(&collected[..], chunked, "split size {split}");
        }
    }

    #[test]
    fn test_malformed_chunk_size_is_terminal() {
        let mut sock = ScriptedSocket::new();
        sock.read_ok(HEAD).read_ok(b"zz\r\n");
        let mut engine = ReadEngine::new();

        assert!(matches!(resume(&mut engine, &mut sock), ReadEvent::Head(_)));
        assert_eq!(engine.advance(&mut sock, 0, Some(BodySize::Chunked)), ReadEvent::Incomplete);
        assert_eq!(resume(&mut engine, &mut sock), ReadEvent::Closed);
        assert_eq!(resume(&mut engine, &mut sock), ReadEvent::Closed);
    }

    #[test]
    fn test_until_close_body() {
        let mut sock = ScriptedSocket::new();
        sock.read_ok(HEAD).read_ok(b"raw").read_ok(b"tail").read_close();
        let mut engine = ReadEngine::new();

        assert!(matches!(resume(&mut engine, &mut sock), ReadEvent::Head(_)));
        assert_eq!(engine.advance(&mut sock, 0, Some(BodySize::UntilClose)), ReadEvent::Incomplete);
        assert_eq!(resume(&mut engine, &mut sock), ReadEvent::Content(Bytes::from_static(b"raw")));
        assert_eq!(resume(&mut engine, &mut sock), ReadEvent::Content(Bytes::from_static(b"tail")));
        assert_eq!(resume(&mut engine, &mut sock), ReadEvent::Closed);
    }

    #[test]
    fn test_peer_close_is_terminal() {
        let mut sock = ScriptedSocket::new();
        sock.read_close();
        let mut engine = ReadEngine::new();

        assert_eq!(resume(&mut engine, &mut sock), ReadEvent::Closed);
        assert_eq!(resume(&mut engine, &mut sock), ReadEvent::Closed);
    }

    #[test]
    fn test_fatal_read_error_is_terminal() {
        let mut sock = ScriptedSocket::new();
        sock.read_err(std::io::ErrorKind::ConnectionReset);
        let mut engine = ReadEngine::new();

        assert_eq!(resume(&mut engine, &mut sock), ReadEvent::Closed);
        assert_eq!(resume(&mut engine, &mut sock), ReadEvent::Closed);
    }

    #[test]
    fn test_split_invariance_of_request_stream() {
        let mut stream = Vec::new();
        stream.extend_from_slice(b"POST /u HTTP/1.1\r\nContent-Length: 4\r\n\r\n");
        stream.extend_from_slice(b"data");
        stream.extend_from_slice(b"GET /next HTTP/1.1\r\n\r\n");

        let collect = |splits: &[&[u8]]| {
            let mut sock = ScriptedSocket::new();
            for piece in splits {
                sock.read_ok(piece);
            }
            let mut engine = ReadEngine::new();

            let mut heads = Vec::new();
            let mut body = Vec::new();
            let mut directive: Option<BodySize> = None;
            loop {
                match engine.advance(&mut sock, 0, directive.take()) {
                    ReadEvent::Head(head) => {
                        // first head announces a 4 byte body, second has none
                        directive =
                            if heads.is_empty() { Some(BodySize::Length(4)) } else { None };
                        heads.push(head);
                    }
                    ReadEvent::Content(bytes) => body.extend_from_slice(&bytes),
                    ReadEvent::Incomplete => {}
                    ReadEvent::Blocked => break,
                    ReadEvent::Closed => break,
                }
            }
            (heads, body)
        };

        let whole = collect(&[&stream]);

        for split in [1, 2, 5, 13] {
            let pieces: Vec<&[u8]> = stream.chunks(split).collect();
            assert_eq!(collect(&pieces), whole, "split size {split}");
        }
    }
}
