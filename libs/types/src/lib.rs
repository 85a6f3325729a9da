//! Shared type system for Campus real-time delivery.
//!
//! Everything that crosses the wire between a dashboard session and the
//! distribution hub lives here: the closed [`Role`] vocabulary, the
//! [`Audience`] routing value (a single role or the broadcast sentinel
//! `all`), and the [`Envelope`] frame with its type-tagged [`Payload`] union.
//!
//! The wire format is one JSON object per WebSocket text frame:
//!
//! ```json
//! { "role": "Teacher", "type": "notification", "payload": { "msg": "x" } }
//! ```

pub mod envelope;
pub mod role;

pub use envelope::{Envelope, Handshake, Notification, Payload, Update};
pub use role::{Audience, Role, UnknownRole, BROADCAST};
