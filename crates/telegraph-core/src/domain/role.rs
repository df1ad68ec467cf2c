//! Role negotiation: which peer listens and which peer dials.
//!
//! # Why do we need roles? (for beginners)
//!
//! A TCP connection always has one side that waits (`listen` + `accept`) and
//! one side that reaches out (`connect`).  A telegraph line is symmetric, so
//! the two stations must agree on who does what *without* talking to each
//! other first.
//!
//! The rule is deterministic: when neither user picks a role, both stations
//! compare the two address strings and the lexicographically smaller one
//! becomes the listener.  Both stations see the same two strings, so they
//! always reach complementary answers regardless of who starts first.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Concrete role of a station for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Binds the well-known port and accepts exactly one inbound connection.
    Listener,
    /// Repeatedly connects to the peer until it accepts.
    Dialer,
}

impl Role {
    /// Returns the role the other station must hold.
    pub fn complement(self) -> Self {
        match self {
            Role::Listener => Role::Dialer,
            Role::Dialer => Role::Listener,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Listener => f.write_str("listener"),
            Role::Dialer => f.write_str("dialer"),
        }
    }
}

/// Role requested by the caller before negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RolePreference {
    Listener,
    Dialer,
    /// Derive the role from the two addresses.
    #[default]
    #[serde(alias = "auto")]
    Unspecified,
}

impl std::str::FromStr for RolePreference {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "listener" | "server" => Ok(RolePreference::Listener),
            "dialer" | "client" => Ok(RolePreference::Dialer),
            "auto" | "unspecified" | "" => Ok(RolePreference::Unspecified),
            other => Err(RoleError::UnknownPreference(other.to_string())),
        }
    }
}

/// Errors produced by role negotiation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoleError {
    /// Both address strings are identical, so no ordering can separate them.
    #[error("local and peer address are both {0:?}; cannot derive complementary roles")]
    IdenticalAddresses(String),
    /// A role preference string could not be parsed.
    #[error("unknown role {0:?} (expected listener, dialer or auto)")]
    UnknownPreference(String),
}

/// Resolves a [`RolePreference`] into a concrete [`Role`].
///
/// Explicit preferences are returned unchanged.  For
/// [`RolePreference::Unspecified`], the smaller of `local` and `peer` (plain
/// byte-wise string comparison) becomes [`Role::Listener`].
///
/// # Errors
///
/// Returns [`RoleError::IdenticalAddresses`] when the preference is
/// unspecified and both addresses are the same string.
///
/// # Examples
///
/// ```rust
/// use telegraph_core::{negotiate_role, Role, RolePreference};
///
/// let a = negotiate_role(RolePreference::Unspecified, "10.0.0.1", "10.0.0.2").unwrap();
/// let b = negotiate_role(RolePreference::Unspecified, "10.0.0.2", "10.0.0.1").unwrap();
/// assert_eq!(a, Role::Listener);
/// assert_eq!(b, Role::Dialer);
/// ```
pub fn negotiate_role(
    preference: RolePreference,
    local: &str,
    peer: &str,
) -> Result<Role, RoleError> {
    match preference {
        RolePreference::Listener => Ok(Role::Listener),
        RolePreference::Dialer => Ok(Role::Dialer),
        RolePreference::Unspecified => match local.cmp(peer) {
            std::cmp::Ordering::Less => Ok(Role::Listener),
            std::cmp::Ordering::Greater => Ok(Role::Dialer),
            std::cmp::Ordering::Equal => Err(RoleError::IdenticalAddresses(local.to_string())),
        },
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
