//! Request codes correlating outgoing UI requests with their results

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer correlating an asynchronous UI request with its result callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestCode(u32);

impl RequestCode {
    /// First code handed out by an empty holder
    pub const START: RequestCode = RequestCode(0xF00);

    /// Creates a request code from its raw value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns the code following this one
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Returns the code preceding this one
    ///
    /// Used as the "nothing registered yet" sentinel below a start value.
    pub const fn prev(self) -> Self {
        Self(self.0.wrapping_sub(1))
    }
}

impl From<u32> for RequestCode {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for RequestCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_value() {
        assert_eq!(RequestCode::START.get(), 0xF00);
    }

    #[test]
    fn test_next_and_prev() {
        let code = RequestCode::START;
        assert_eq!(code.next().get(), 0xF01);
        assert_eq!(code.prev().next(), code);
    }

    #[test]
    fn test_display_is_hex() {
        assert_eq!(RequestCode::new(0xABC).to_string(), "0xabc");
    }

    #[test]
    fn test_serializes_as_plain_integer() {
        let json = serde_json::to_string(&RequestCode::START).unwrap();
        assert_eq!(json, "3840");
    }
}
