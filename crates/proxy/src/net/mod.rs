//! Socket abstraction for the non-blocking data plane.
//!
//! The engines never touch a concrete socket type. They speak to a
//! [`Transport`], which models exactly the three calls the data plane needs:
//! a non-blocking receive (returning `Ok(0)` on orderly peer close), a
//! non-blocking send (returning the bytes accepted), and a full-duplex
//! shutdown. `std::net::TcpStream` in non-blocking mode satisfies the
//! contract out of the box.
//!
//! Platform error tables are isolated here: [`classify`] collapses an
//! `io::Error` into the closed [`ErrorClass`] enum once, so the engines never
//! branch on raw codes, and [`describe`] renders the raw OS code for log
//! events only.

use std::io;
use std::net::{Shutdown, TcpStream};

/// A non-blocking byte stream owned by one connection.
pub trait Transport {
    /// One non-blocking receive. `Ok(0)` means the peer closed in an orderly
    /// fashion; would-block surfaces as an error distinguishable via
    /// [`classify`].
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// One non-blocking send, returning the bytes the socket accepted.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Full-duplex shutdown.
    fn shutdown(&mut self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(self, buf)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(self, buf)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Disposition of a failed socket call, derived once per platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// No data or capacity right now; retry after the next readiness signal.
    Retry,
    /// Anything else; the connection must be torn down.
    Fatal,
}

/// Collapses an I/O error into its retry disposition.
pub fn classify(err: &io::Error) -> ErrorClass {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => ErrorClass::Retry,
        _ => ErrorClass::Fatal,
    }
}

/// Renders an I/O error with its raw OS code, for diagnostics only.
pub fn describe(err: &io::Error) -> String {
    match err.raw_os_error() {
        Some(code) => format!("errno {code}: {err}"),
        None => err.to_string(),
    }
}
