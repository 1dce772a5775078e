//! Protocol-level types shared by the engines and their coordinator.
//!
//! The proxy data plane deals in framing only: request heads are opaque byte
//! runs ending at the blank-line terminator, bodies are opaque byte runs whose
//! extent the coordinator announces via [`BodySize`]. No header validation or
//! method/URI interpretation happens at this layer.
//!
//! # Components
//!
//! - [`BodySize`]: body extent directive handed back after a head
//! - [`ReadEvent`]: outcome of one read-engine resume
//! - [`WriteItem`] / [`StartMode`] / [`Flush`]: write-engine input and
//!   backpressure report
//! - [`ParseError`]: framing scan errors

mod message;
pub use message::BodySize;
pub use message::Flush;
pub use message::ReadEvent;
pub use message::StartMode;
pub use message::WriteItem;

mod error;
pub use error::ParseError;
