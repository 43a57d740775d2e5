//! Conventional bridge message vocabulary.
//!
//! The relay speaks JSON arrays whose first element is a verb. The framing
//! layer never looks at payloads; these helpers are for applications that do.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

/// Register an identity with the bridge.
pub const VERB_JOIN: &str = "JOIN";
/// Withdraw an identity from the bridge.
pub const VERB_LEAVE: &str = "LEAVE";
/// Send a payload from one identity to another identity or channel.
pub const VERB_SHOUT: &str = "SHOUT";

/// A parsed bridge message.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeMessage {
    /// `["JOIN", identity]`
    Join { identity: String },
    /// `["LEAVE", identity]`
    Leave { identity: String },
    /// `["SHOUT", from, to, payload]`
    Shout {
        from: String,
        to: String,
        payload: Value,
    },
    /// Any value that does not match a known shape.
    Other(Value),
}

impl BridgeMessage {
    pub fn join(identity: impl Into<String>) -> Self {
        Self::Join {
            identity: identity.into(),
        }
    }

    pub fn leave(identity: impl Into<String>) -> Self {
        Self::Leave {
            identity: identity.into(),
        }
    }

    pub fn shout(from: impl Into<String>, to: impl Into<String>, payload: Value) -> Self {
        Self::Shout {
            from: from.into(),
            to: to.into(),
            payload,
        }
    }

    /// The verb of a recognised message.
    pub fn verb(&self) -> Option<&'static str> {
        match self {
            Self::Join { .. } => Some(VERB_JOIN),
            Self::Leave { .. } => Some(VERB_LEAVE),
            Self::Shout { .. } => Some(VERB_SHOUT),
            Self::Other(_) => None,
        }
    }

    /// True for a `SHOUT` whose recipient is `identity`.
    pub fn is_addressed_to(&self, identity: &str) -> bool {
        matches!(self, Self::Shout { to, .. } if to == identity)
    }

    /// Build the wire value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Join { identity } => json!([VERB_JOIN, identity]),
            Self::Leave { identity } => json!([VERB_LEAVE, identity]),
            Self::Shout { from, to, payload } => json!([VERB_SHOUT, from, to, payload]),
            Self::Other(value) => value.clone(),
        }
    }

    /// Interpret a received value. Never fails; unknown shapes become `Other`.
    pub fn from_value(value: Value) -> Self {
        Self::recognise(&value).unwrap_or(Self::Other(value))
    }

    fn recognise(value: &Value) -> Option<Self> {
        let items = value.as_array()?;
        match items.as_slice() {
            [Value::String(verb), Value::String(identity)] if verb == VERB_JOIN => {
                Some(Self::join(identity.as_str()))
            }
            [Value::String(verb), Value::String(identity)] if verb == VERB_LEAVE => {
                Some(Self::leave(identity.as_str()))
            }
            [Value::String(verb), Value::String(from), Value::String(to), payload]
                if verb == VERB_SHOUT =>
            {
                Some(Self::shout(from.as_str(), to.as_str(), payload.clone()))
            }
            _ => None,
        }
    }
}

/// The handshake value announcing `identity`.
pub fn join_message(identity: &str) -> Value {
    BridgeMessage::join(identity).to_value()
}

impl Serialize for BridgeMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BridgeMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_wire_shape() {
        assert_eq!(
            serde_json::to_string(&join_message("Agent7")).unwrap(),
            r#"["JOIN","Agent7"]"#
        );
    }

    #[test]
    fn parses_known_verbs() {
        assert_eq!(
            BridgeMessage::from_value(json!(["JOIN", "A"])),
            BridgeMessage::join("A")
        );
        assert_eq!(
            BridgeMessage::from_value(json!(["LEAVE", "A"])),
            BridgeMessage::leave("A")
        );
        assert_eq!(
            BridgeMessage::from_value(json!(["SHOUT", "A", "B", {"x": 1}])),
            BridgeMessage::shout("A", "B", json!({"x": 1}))
        );
    }

    #[test]
    fn unknown_shapes_are_kept_verbatim() {
        for value in [
            json!({"verb": "JOIN"}),
            json!(["JOIN"]),
            json!(["JOIN", 7]),
            json!(["SHOUT", "A", "B"]),
            json!(["PING", "A"]),
            json!("QUIT"),
        ] {
            let parsed = BridgeMessage::from_value(value.clone());
            assert_eq!(parsed, BridgeMessage::Other(value.clone()));
            assert_eq!(parsed.to_value(), value);
            assert!(parsed.verb().is_none());
        }
    }

    #[test]
    fn addressed_to_matches_shout_recipient_only() {
        let shout = BridgeMessage::shout("ProblemSolver", "StarCraft", json!("Ack ack"));
        assert!(shout.is_addressed_to("StarCraft"));
        assert!(!shout.is_addressed_to("ProblemSolver"));
        assert!(!BridgeMessage::join("StarCraft").is_addressed_to("StarCraft"));
    }

    #[test]
    fn serde_goes_through_wire_value() {
        let shout = BridgeMessage::shout("A", "B", json!({"x": 1}));
        let text = serde_json::to_string(&shout).unwrap();
        assert_eq!(text, r#"["SHOUT","A","B",{"x":1}]"#);

        let back: BridgeMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(back, shout);
    }
}
