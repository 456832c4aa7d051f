//! Decoding of relay status payloads received from external transports.
//!
//! Message-bus topics, HTTP-style endpoints and the emulator all hand the
//! core a short textual payload. Decoding happens here, before anything
//! reaches the scheduler, so an unrecognized payload can never be applied.

use core::fmt;

use winnow::ascii::Caseless;
use winnow::combinator::alt;
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::literal;

use crate::error::RelayError;

/// Requested relay action decoded from an external payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RelayPayload {
    Off,
    On,
    Toggle,
}

impl RelayPayload {
    /// Decodes a payload, ignoring surrounding whitespace and ASCII case.
    pub fn parse(input: &str) -> Result<Self, RelayError> {
        payload()
            .parse(input.trim())
            .map_err(|_| RelayError::InvalidPayload)
    }

    /// Maps a boolean status onto the matching payload.
    #[must_use]
    pub const fn from_status(status: bool) -> Self {
        if status {
            RelayPayload::On
        } else {
            RelayPayload::Off
        }
    }

    /// Returns the fixed status requested by this payload, if any.
    #[must_use]
    pub const fn status(self) -> Option<bool> {
        match self {
            RelayPayload::Off => Some(false),
            RelayPayload::On => Some(true),
            RelayPayload::Toggle => None,
        }
    }

    /// Swaps `On` and `Off`; `Toggle` is left alone.
    #[must_use]
    pub const fn inverted(self) -> Self {
        match self {
            RelayPayload::Off => RelayPayload::On,
            RelayPayload::On => RelayPayload::Off,
            RelayPayload::Toggle => RelayPayload::Toggle,
        }
    }

    /// Canonical numeric encoding used when echoing state back to transports.
    #[must_use]
    pub const fn as_code(self) -> u8 {
        match self {
            RelayPayload::Off => 0,
            RelayPayload::On => 1,
            RelayPayload::Toggle => 2,
        }
    }
}

impl fmt::Display for RelayPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayPayload::Off => f.write_str("off"),
            RelayPayload::On => f.write_str("on"),
            RelayPayload::Toggle => f.write_str("toggle"),
        }
    }
}

fn payload<'a>() -> impl Parser<&'a str, RelayPayload, ContextError> {
    move |input: &mut &'a str| {
        alt((
            alt(("0", literal(Caseless("off")), literal(Caseless("false"))))
                .value(RelayPayload::Off),
            alt(("1", literal(Caseless("on")), literal(Caseless("true")))).value(RelayPayload::On),
            alt(("2", literal(Caseless("toggle")))).value(RelayPayload::Toggle),
        ))
        .parse_next(input)
    }
}
