//! Identifier types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest id accepted from the outside world, in bytes.
pub const MAX_ID_LEN: usize = 128;

/// Errors from parsing an identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("identifier must not be empty")]
    Empty,
    #[error("identifier is longer than {MAX_ID_LEN} bytes")]
    TooLong,
    #[error("identifier must not contain whitespace")]
    Whitespace,
}

fn validate(raw: &str) -> Result<(), IdError> {
    if raw.is_empty() {
        return Err(IdError::Empty);
    }
    if raw.len() > MAX_ID_LEN {
        return Err(IdError::TooLong);
    }
    if raw.chars().any(char::is_whitespace) {
        return Err(IdError::Whitespace);
    }
    Ok(())
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse an identifier, rejecting empty, oversized or whitespace-bearing input.
            pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
                let raw = raw.into();
                validate(&raw)?;
                Ok(Self(raw))
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                Self::new(raw)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id! {
    /// Unique identifier for a match. Opaque to the core.
    MatchId
}

string_id! {
    /// Identifier of a user taking part in matches, as a player or spectator.
    ParticipantId
}

impl MatchId {
    /// Generate a fresh id of the form `pvp_<uuid>`.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("pvp_{}", Uuid::new_v4().simple()))
    }
}

/// Identifies one transport connection (socket) of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_match_ids_are_distinct_and_valid() {
        let a = MatchId::generate();
        let b = MatchId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("pvp_"));
        assert!(MatchId::new(a.to_string()).is_ok());
    }

    #[test]
    fn rejects_malformed_ids() {
        assert_eq!(ParticipantId::new(""), Err(IdError::Empty));
        assert_eq!(ParticipantId::new("a b"), Err(IdError::Whitespace));
        assert_eq!(
            MatchId::new("x".repeat(MAX_ID_LEN + 1)),
            Err(IdError::TooLong)
        );
    }

    #[test]
    fn serde_validates_on_the_way_in() {
        let id: ParticipantId = serde_json::from_str("\"wallet-7f3a\"").unwrap();
        assert_eq!(id.as_str(), "wallet-7f3a");
        assert!(serde_json::from_str::<ParticipantId>("\"\"").is_err());
    }
}
