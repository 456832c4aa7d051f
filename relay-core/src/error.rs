//! Error types surfaced by the relay core.

use core::fmt;

use crate::relays::RelayId;

/// Failure returned by the public relay entry points.
///
/// Returning an error guarantees that no relay state was mutated.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RelayError {
    /// The relay id does not address a configured relay.
    InvalidIndex { id: RelayId, count: usize },
    /// An external payload did not decode to a known status.
    InvalidPayload,
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::InvalidIndex { id, count } => {
                write!(f, "relay {id} out of range (count {count})")
            }
            RelayError::InvalidPayload => f.write_str("unrecognized relay payload"),
        }
    }
}

/// Failure reported while building the relay collection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigureError {
    /// Settings describe more relays than the arena can hold; the first
    /// `configured` relays were kept.
    TooManyRelays { configured: usize },
}

impl fmt::Display for ConfigureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigureError::TooManyRelays { configured } => {
                write!(f, "relay capacity exceeded, kept {configured}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::string::ToString;

    use super::*;

    #[test]
    fn errors_render_context() {
        let invalid = RelayError::InvalidIndex { id: 9, count: 2 };
        assert_eq!(invalid.to_string(), "relay 9 out of range (count 2)");
        assert_eq!(
            RelayError::InvalidPayload.to_string(),
            "unrecognized relay payload"
        );
        assert_eq!(
            ConfigureError::TooManyRelays { configured: 8 }.to_string(),
            "relay capacity exceeded, kept 8"
        );
    }
}
