//! Control-plane messages posted to the worker by its pages.

use serde::{Deserialize, Serialize};

use super::lifecycle::ActivateReport;

/// Messages the worker understands, keyed by their `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate a newly installed worker without waiting for pages to close.
    SkipWaiting,
    /// Ask which static cache generation is active.
    GetVersion,
}

impl ControlMessage {
    /// Parse message data; anything unrecognized yields `None`.
    pub fn parse(data: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(data.clone()).ok()
    }
}

/// Reply sent over the port attached to a `GET_VERSION` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReply {
    pub version: String,
}

/// Result of handling a control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MessageOutcome {
    /// Skip-waiting recorded; the worker was not waiting to activate.
    SkipWaiting,
    /// Skip-waiting caused an installed worker to activate.
    Activated(ActivateReport),
    Version(VersionReply),
    Ignored,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_known_messages() {
        assert_eq!(ControlMessage::parse(&json!({"type": "SKIP_WAITING"})), Some(ControlMessage::SkipWaiting));
        assert_eq!(ControlMessage::parse(&json!({"type": "GET_VERSION"})), Some(ControlMessage::GetVersion));
    }

    #[test]
    fn test_parse_unknown_messages() {
        assert_eq!(ControlMessage::parse(&json!({"type": "CLEAR_CACHE"})), None);
        assert_eq!(ControlMessage::parse(&json!("SKIP_WAITING")), None);
        assert_eq!(ControlMessage::parse(&json!(null)), None);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = MessageOutcome::Version(VersionReply { version: "site-static-v3".into() });
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value, json!({"outcome": "version", "version": "site-static-v3"}));
    }
}
