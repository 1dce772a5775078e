//! Client-side data-plane engine for a non-blocking intercepting HTTP proxy.
//!
//! This crate turns raw bytes arriving on one non-blocking client socket into
//! discrete HTTP request units (heads and bodies, chunked bodies included),
//! and turns outbound response data — streamed, buffered-until-close, or
//! sourced from a local file — into correctly ordered, backpressure-aware
//! socket writes. It is the per-connection piece of a proxy: the readiness
//! loop, socket acceptance, TLS, upstream connections, and supervision all
//! live elsewhere and merely drive it.
//!
//! # Model
//!
//! There are no coroutines and no async runtime here. Each engine is an
//! explicit state machine with a single resume entry point; every resume
//! performs at most one non-blocking syscall and returns a value describing
//! where it suspended. The owning thread is never blocked, and nothing is
//! shared across threads.
//!
//! - [`client::ReadEngine`] resumes on readable events and yields request
//!   heads and body fragments.
//! - [`client::WriteEngine`] resumes on writable events and drains one
//!   response cycle, reporting backpressure after every push.
//! - [`client::ClientConnection`] owns the socket plus both engines and is
//!   the only surface the reactor touches.
//!
//! # Example
//!
//! ```no_run
//! use std::net::TcpListener;
//! use micro_proxy::client::ClientConnection;
//! use micro_proxy::protocol::{BodySize, StartMode, WriteItem};
//! use bytes::Bytes;
//!
//! let listener = TcpListener::bind("127.0.0.1:3128").unwrap();
//! let (sock, addr) = listener.accept().unwrap();
//! sock.set_nonblocking(true).unwrap();
//!
//! let mut conn = ClientConnection::new("client-1", sock, addr.to_string());
//!
//! // reactor says readable:
//! let data = conn.read_data();
//! if let Some(head) = data.request {
//!     // ...route the head, decide the body extent from its fields...
//!     let related = conn.read_related(BodySize::Length(128));
//!     let _body_fragment = related.content;
//!
//!     // ...response decided:
//!     conn.start_data(StartMode::Stream(Bytes::from_static(b"HTTP/1.1 200 OK\r\n\r\n")));
//! }
//!
//! // reactor says writable:
//! match conn.write_data(WriteItem::flush()) {
//!     Some(flush) if flush.buffered => { /* keep write-readiness registered */ }
//!     Some(_) => { /* drained; deregister write-readiness */ }
//!     None => conn.shutdown(),
//! }
//! ```
//!
//! # Architecture
//!
//! - [`client`]: the engines and the connection handle
//! - [`codec`]: head-boundary decoding and chunk-size scanning
//! - [`net`]: the [`net::Transport`] socket contract and platform error
//!   classification
//! - [`protocol`]: the types exchanged with the coordinator
//!
//! # Framing only
//!
//! The proxy relays messages; it does not interpret them. Heads are opaque
//! byte runs up to the blank-line terminator (`\r\n\r\n`, or a lenient bare
//! `\n\n`), bodies are opaque byte runs whose extent the coordinator
//! announces, and chunked bodies are forwarded verbatim, framing included.
//!
//! # Failure model
//!
//! Engine failures never panic and never cross the reactor boundary as
//! errors: a failed engine turns terminal and reports that terminally on
//! every subsequent resume. Transient would-block conditions are ordinary
//! results, retried on the next readiness signal.

pub mod client;
pub mod codec;
pub mod net;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
