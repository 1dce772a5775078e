//! Resumable buffered writer bound to one client socket.
//!
//! One engine serves one response cycle. It is started in a [`StartMode`]
//! (stream, close-after, or file-sourced) and then driven by
//! [`WriteEngine::push`] on each writable readiness signal until it reports a
//! terminal outcome. The coordinator discards and recreates the engine to
//! begin the next response on a kept-alive socket.

use crate::net::{ErrorClass, Transport, classify, describe};
use crate::protocol::{Flush, StartMode, WriteItem};
use bytes::{Buf, BytesMut};
use std::fs;
use tracing::{error, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Open,
    Done,
    Failed,
}

/// Observable state of a write engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    /// Accepting payloads; nothing pending.
    Buffering,
    /// Unsent bytes pending, or a finish was requested and the buffer is
    /// still draining.
    Draining,
    /// Terminal success: finish requested and fully flushed. The coordinator
    /// should close the socket.
    Finished,
    /// Terminal failure: a fatal send error or an unreadable file source.
    Failed,
}

/// Resumable response writer for one connection.
#[derive(Debug, Default)]
pub struct WriteEngine {
    buffer: BytesMut,
    finished: bool,
    phase: Phase,
}

impl WriteEngine {
    /// Creates and primes an engine for one response cycle, returning the
    /// first meaningful flush outcome.
    ///
    /// In file mode the whole file is read up front and the header payload is
    /// placed before it in the buffer, so header bytes always precede file
    /// content on the wire. No send is attempted during file initiation; if
    /// the file cannot be read the engine fails before anything has been
    /// transmitted for this response.
    pub fn start<S: Transport>(sock: &mut S, mode: StartMode) -> (Self, Option<Flush>) {
        let mut engine = Self::default();

        match mode {
            StartMode::Stream(payload) => {
                let flush = engine.push(sock, WriteItem::Data(payload));
                (engine, flush)
            }

            StartMode::Close(payload) => {
                engine.push(sock, WriteItem::Data(payload));
                let flush = engine.push(sock, WriteItem::Finish);
                (engine, flush)
            }

            StartMode::File { header, path } => match fs::read(&path) {
                Ok(contents) => {
                    engine.buffer.reserve(header.len() + contents.len());
                    engine.buffer.extend_from_slice(&header);
                    engine.buffer.extend_from_slice(&contents);
                    engine.finished = true;

                    let flush = Flush { buffered: true, had_buffer: false, sent: 0 };
                    (engine, Some(flush))
                }
                Err(e) => {
                    error!(path = %path.display(), cause = %e, "cannot source response from file");
                    engine.phase = Phase::Failed;
                    (engine, None)
                }
            },
        }
    }

    /// Pushes one payload (or the finish marker) and attempts at most one
    /// non-blocking send.
    ///
    /// A send is attempted only when the buffer was empty before this call or
    /// the payload is the explicit empty forced-flush marker; while a flush is
    /// already pending, further payloads just queue up.
    ///
    /// # Returns
    /// - `Some(flush)` with the backpressure report for this call
    /// - `None` when the engine is terminal; query [`state`](Self::state) to
    ///   distinguish a drained finish from a failure
    pub fn push<S: Transport>(&mut self, sock: &mut S, item: WriteItem) -> Option<Flush> {
        if self.phase != Phase::Open {
            return None;
        }

        let had_buffer = !self.buffer.is_empty();
        let force_flush = matches!(&item, WriteItem::Data(data) if data.is_empty());

        match item {
            WriteItem::Data(data) => {
                if self.finished {
                    if !data.is_empty() {
                        error!(dropped = data.len(), "payload pushed after finish was requested, dropping it");
                    }
                } else {
                    self.buffer.extend_from_slice(&data);
                }
            }
            WriteItem::Finish => self.finished = true,
        }

        if self.finished && self.buffer.is_empty() {
            self.phase = Phase::Done;
            return None;
        }

        let mut sent = 0;
        if !self.buffer.is_empty() && (!had_buffer || force_flush) {
            match sock.send(&self.buffer) {
                Ok(n) => {
                    trace!(sent = n, pending = self.buffer.len() - n, "flushed to client socket");
                    self.buffer.advance(n);
                    sent = n;
                }
                Err(e) if classify(&e) == ErrorClass::Retry => {
                    warn!(pending = self.buffer.len(), "interrupted while sending, will retry");
                    warn!(reason = %describe(&e), "send not possible right now");
                }
                Err(e) => {
                    error!("unexpected error writing on socket");
                    error!(reason = %describe(&e), "aborting response");
                    self.phase = Phase::Failed;
                    return None;
                }
            }
        }

        if self.finished && self.buffer.is_empty() {
            self.phase = Phase::Done;
            return None;
        }

        Some(Flush { buffered: !self.buffer.is_empty() || self.finished, had_buffer, sent })
    }

    pub fn state(&self) -> WriteState {
        match self.phase {
            Phase::Failed => WriteState::Failed,
            Phase::Done => WriteState::Finished,
            Phase::Open => {
                if self.buffer.is_empty() && !self.finished {
                    WriteState::Buffering
                } else {
                    WriteState::Draining
                }
            }
        }
    }

    /// Bytes buffered and not yet accepted by the socket.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
