//! Typed identifiers for the runtime's four entity kinds plus the reconnect token wrapper.
//!
//! Each id is a constrained non-empty printable-ASCII string, length-bounded, compared bytewise.
//! Minted identifiers use a UUIDv4 so they are unique within a process lifetime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const MAX_ID_LEN: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdParseError {
    #[error("identifier is empty")]
    Empty,
    #[error("identifier exceeds {MAX_ID_LEN} bytes")]
    TooLong,
    #[error("identifier contains non-printable-ASCII byte")]
    NotPrintableAscii,
}

fn validate(raw: &str) -> Result<(), IdParseError> {
    if raw.is_empty() {
        return Err(IdParseError::Empty);
    }
    if raw.len() > MAX_ID_LEN {
        return Err(IdParseError::TooLong);
    }
    if !raw.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        return Err(IdParseError::NotPrintableAscii);
    }
    Ok(())
}

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Result<Self, IdParseError> {
                let raw = raw.into();
                validate(&raw)?;
                Ok(Self(raw))
            }

            pub fn generate() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::new_v4()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s.to_string())
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdParseError;
            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.0
            }
        }
    };
}

define_id!(LobbyId, "lobby");
define_id!(GameId, "game");
define_id!(PlayerId, "player");
define_id!(SessionId, "session");
define_id!(ReconnectToken, "rt1");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty() {
        assert_eq!(LobbyId::new(""), Err(IdParseError::Empty));
    }

    #[test]
    fn rejects_non_ascii() {
        assert_eq!(
            PlayerId::new("café"),
            Err(IdParseError::NotPrintableAscii)
        );
    }

    #[test]
    fn generate_round_trips_through_display_and_parse() {
        let id = GameId::generate();
        let parsed: GameId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
