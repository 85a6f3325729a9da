//! Envelope frames and the type-tagged payload union.
//!
//! The `type`/`payload` pair of the wire object is modelled as an adjacently
//! tagged union so a frame is validated against its per-type shape while it
//! is decoded: a frame with an unknown tag or a mis-shaped payload fails
//! deserialization and never reaches subscribers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::role::{Audience, Role};

/// A routed message unit exchanged with the distribution hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Target audience, used by the hub for fan-out and by receiving
    /// connections for filtering.
    pub role: Audience,
    /// Type tag and type-specific payload.
    #[serde(flatten)]
    pub body: Payload,
}

impl Envelope {
    /// The handshake frame sent immediately after a connection is
    /// established, registering `role` with the hub before any other traffic.
    pub fn handshake(role: Role) -> Self {
        Envelope {
            role: Audience::Role(role),
            body: Payload::Handshake(Handshake {}),
        }
    }

    /// A notification carrying display text, addressed to `audience`.
    pub fn notification(audience: Audience, msg: impl Into<String>) -> Self {
        Envelope {
            role: audience,
            body: Payload::Notification(Notification {
                msg: Some(msg.into()),
            }),
        }
    }

    /// An update carrying the changed `fields`, addressed to `audience`.
    pub fn update(audience: Audience, fields: Map<String, Value>) -> Self {
        Envelope {
            role: audience,
            body: Payload::Update(Update(fields)),
        }
    }

    /// Whether this envelope should be delivered on a connection scoped to
    /// `role`.
    pub fn is_for(&self, role: Role) -> bool {
        self.role.includes(role)
    }

    /// Wire value of this envelope's `type` tag.
    pub fn kind(&self) -> &'static str {
        match self.body {
            Payload::Handshake(_) => "handshake",
            Payload::Notification(_) => "notification",
            Payload::Update(_) => "update",
        }
    }
}

/// Type-specific envelope body, tagged by the wire's `type` and `payload`
/// keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum Payload {
    /// Role registration, sent once per established connection.
    Handshake(Handshake),
    /// Human-readable notice for a dashboard feed.
    Notification(Notification),
    /// Changed-record broadcast prompting a dashboard refresh.
    Update(Update),
}

/// Handshake body; carries no fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Handshake {}

/// Notification body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Display text. Hubs may emit notifications with no text attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

/// Update body: the changed fields of whatever record triggered the update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update(pub Map<String, Value>);
