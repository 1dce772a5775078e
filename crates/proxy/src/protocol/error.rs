use std::io;
use thiserror::Error;

/// Errors raised by the framing scanners.
///
/// Engines never let these cross the reactor boundary: a scan failure is
/// translated into a terminal read signal plus a log event.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid chunk size line: {reason}")]
    InvalidChunkLine { reason: String },

    #[error("chunk size line exceeds the limit {max}")]
    ChunkLineTooLong { max: usize },

    #[error("chunk size overflow")]
    ChunkSizeOverflow,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn invalid_chunk_line<S: ToString>(str: S) -> Self {
        Self::InvalidChunkLine { reason: str.to_string() }
    }

    pub fn chunk_line_too_long(max: usize) -> Self {
        Self::ChunkLineTooLong { max }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
