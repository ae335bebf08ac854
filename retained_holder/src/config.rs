//! Holder configuration

use core_types::RequestCode;
use serde::{Deserialize, Serialize};

/// Tags, slot names and numbering used by retaining holders
///
/// Every field has a default, so a partial JSON document is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HolderConfig {
    /// First request code handed out by an empty holder
    pub request_code_start: u32,

    /// Fragment tag of the activity-result holder
    pub activity_holder_tag: String,

    /// Fragment tag of the permission holder
    pub permission_holder_tag: String,

    /// Saved-state slot holding the persisted continuations
    pub state_slot: String,
}

impl HolderConfig {
    /// Parses a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Overrides the first request code
    pub fn with_request_code_start(mut self, start: u32) -> Self {
        self.request_code_start = start;
        self
    }

    pub fn request_code_start(&self) -> RequestCode {
        RequestCode::new(self.request_code_start)
    }
}

impl Default for HolderConfig {
    fn default() -> Self {
        Self {
            request_code_start: RequestCode::START.get(),
            activity_holder_tag: "__RETAINED_CONTINUATION_FRAGMENT__".to_string(),
            permission_holder_tag: "__REQUEST_PERMISSION_CONTINUATION_FRAGMENT__".to_string(),
            state_slot: "parcelable_continuations".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HolderConfig::default();
        assert_eq!(config.request_code_start(), RequestCode::START);
        assert_eq!(config.activity_holder_tag, "__RETAINED_CONTINUATION_FRAGMENT__");
        assert_eq!(
            config.permission_holder_tag,
            "__REQUEST_PERMISSION_CONTINUATION_FRAGMENT__"
        );
    }

    #[test]
    fn test_partial_json() {
        let config = HolderConfig::from_json(r#"{"request_code_start": 4096}"#).unwrap();
        assert_eq!(config.request_code_start, 4096);
        assert_eq!(config.state_slot, HolderConfig::default().state_slot);
    }

    #[test]
    fn test_invalid_json() {
        assert!(HolderConfig::from_json(r#"{"request_code_start": "x"}"#).is_err());
    }
}
