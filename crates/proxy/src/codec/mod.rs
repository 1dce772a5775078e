//! Framing codecs for the proxy data plane.
//!
//! Two helpers cover everything the engines need from HTTP/1.x:
//!
//! - [`HeadDecoder`]: finds the request-head blank-line terminator
//!   (`\r\n\r\n`, or the lenient bare `\n\n`) and splits the head off the
//!   accumulation buffer. Implements [`tokio_util::codec::Decoder`].
//! - [`ChunkScanner`]: walks chunked transfer coding size lines and reports
//!   the wire extent of the pending body without consuming anything.
//!
//! Neither helper interprets header fields; the proxy treats heads and bodies
//! as opaque byte runs to be relayed.

mod chunk_scanner;
mod head_decoder;

pub use chunk_scanner::ChunkProgress;
pub use chunk_scanner::ChunkScanner;
pub use chunk_scanner::MAX_CHUNK_LINE;
pub use head_decoder::HeadDecoder;
