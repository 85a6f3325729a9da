//! # Campus Realtime - Role-Scoped Live Messaging
//!
//! ## Purpose
//!
//! Maintains one persistent WebSocket connection per signed-in dashboard
//! session, scoped to that session's [`Role`]. Inbound envelopes are filtered
//! by audience and fanned out to local subscribers in registration order;
//! outbound publishes are fire-and-forget. Transport drops are recovered by
//! an automatic fixed-delay reconnect that preserves every subscription.
//!
//! ## Integration Points
//!
//! - **Endpoint**: the distribution hub URL from [`config`]'s
//!   `realtime.endpoint` setting (`ws://` or `wss://`).
//! - **Wire format**: one JSON [`Envelope`] per text frame, see [`types`].
//! - **Consumers**: dashboard code holds a [`RoleConnection`] and calls
//!   [`publish`](RoleConnection::publish) /
//!   [`subscribe`](RoleConnection::subscribe); nothing else touches the
//!   socket.
//!
//! ## Delivery Semantics
//!
//! At-most-once, no queueing: a publish issued while the connection is not
//! open is dropped with a diagnostic, and envelopes the hub fans out during a
//! disconnected window are lost. Per-connection inbound ordering is
//! preserved. Failures never propagate to the host application; they surface
//! only as missing updates until the reconnect completes.
//!
//! ## Example
//!
//! ```no_run
//! use realtime::{ConnectionConfig, RoleConnection};
//! use types::{Envelope, Role};
//!
//! # fn main() -> realtime::Result<()> {
//! let conn = RoleConnection::open(
//!     Role::Teacher,
//!     ConnectionConfig::new("wss://hub.campus.example/feed"),
//! )?;
//!
//! let disposer = conn.subscribe(|envelope: &Envelope| {
//!     println!("{}: {:?}", envelope.kind(), envelope);
//! });
//!
//! conn.publish(Envelope::notification(Role::Parent.into(), "Grades posted"));
//!
//! disposer.dispose();
//! conn.close();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod error;

mod dispatch;

pub use connection::{ConnectionConfig, ConnectionState, Disposer, RoleConnection};
pub use error::{RealtimeError, Result};

// Re-export the wire types for convenience
pub use types::{Audience, Envelope, Payload, Role};
