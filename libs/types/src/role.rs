//! Role vocabulary and audience routing values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire spelling of the broadcast sentinel.
pub const BROADCAST: &str = "all";

/// A named category of Campus user.
///
/// The set is closed: the hub only routes for these four dashboards. The
/// broadcast sentinel deliberately cannot be expressed as a `Role`; it exists
/// only as [`Audience::All`], so a role named `all` cannot collide with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// School administrators.
    Admin,
    /// Teaching staff.
    Teacher,
    /// Enrolled students.
    Student,
    /// Parents and guardians.
    Parent,
}

impl Role {
    /// Wire spelling of this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Teacher => "Teacher",
            Role::Student => "Student",
            Role::Parent => "Parent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Teacher" => Ok(Role::Teacher),
            "Student" => Ok(Role::Student),
            "Parent" => Ok(Role::Parent),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Routing target of an envelope: one role, or every role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Audience {
    /// Deliver to subscribers of a single role.
    Role(Role),
    /// Deliver to subscribers of every role (wire value `all`).
    All,
}

impl Audience {
    /// Whether an envelope addressed to this audience reaches `role`.
    pub fn includes(self, role: Role) -> bool {
        match self {
            Audience::All => true,
            Audience::Role(r) => r == role,
        }
    }
}

impl From<Role> for Audience {
    fn from(role: Role) -> Self {
        Audience::Role(role)
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Audience::Role(role) => f.write_str(role.as_str()),
            Audience::All => f.write_str(BROADCAST),
        }
    }
}

impl FromStr for Audience {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == BROADCAST {
            Ok(Audience::All)
        } else {
            s.parse().map(Audience::Role)
        }
    }
}

impl From<Audience> for String {
    fn from(audience: Audience) -> Self {
        audience.to_string()
    }
}

impl TryFrom<String> for Audience {
    type Error = UnknownRole;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A role string the hub does not route for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);
