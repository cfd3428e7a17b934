use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Caller metadata propagated from the originating request (authorization
/// token, request id, client fingerprint, ...).
pub type Header = BTreeMap<String, JsonValue>;

/// Header key carrying the caller's bearer token.
pub const AUTHORIZATION: &str = "Authorization";

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(String),

    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    #[error("invalid {topic} body: {reason}")]
    Body { topic: String, reason: String },

    #[error("failed to encode envelope: {0}")]
    Encode(String),
}

/// Envelope for an event message.
///
/// The envelope carries no type tag; the topic it was published on determines
/// the body shape. The header is forwarded unchanged from request capture to
/// the consumer's logs (and into any cascaded events).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<B = JsonValue> {
    #[serde(default, deserialize_with = "header_or_empty")]
    header: Header,
    body: B,
}

impl<B> Envelope<B> {
    pub fn new(header: Header, body: B) -> Self {
        Self { header, body }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    pub fn into_parts(self) -> (Header, B) {
        (self.header, self.body)
    }

    /// String-valued header entry, if present.
    pub fn header_str(&self, key: &str) -> Option<&str> {
        self.header.get(key).and_then(JsonValue::as_str)
    }

    /// Raw `Authorization` header value (`"Bearer <token>"`).
    pub fn authorization(&self) -> Option<&str> {
        self.header_str(AUTHORIZATION)
    }
}

impl<B: Serialize> Envelope<B> {
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(|e| EnvelopeError::Encode(e.to_string()))
    }
}

impl Envelope<JsonValue> {
    /// Decode the outer `{header, body}` shape. The body stays raw until the
    /// topic tells us what it is.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(|e| EnvelopeError::Malformed(e.to_string()))
    }
}

fn header_or_empty<'de, D>(deserializer: D) -> Result<Header, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Header>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_keeps_header_and_raw_body() {
        let raw = br#"{"header":{"Authorization":"Bearer t","request_id":"r1"},"body":{"id":"c1"}}"#;
        let env = Envelope::decode(raw).unwrap();

        assert_eq!(env.authorization(), Some("Bearer t"));
        assert_eq!(env.header_str("request_id"), Some("r1"));
        assert_eq!(env.body(), &json!({"id": "c1"}));
    }

    #[test]
    fn null_or_missing_header_is_empty() {
        let env = Envelope::decode(br#"{"header":null,"body":{}}"#).unwrap();
        assert!(env.header().is_empty());

        let env = Envelope::decode(br#"{"body":{}}"#).unwrap();
        assert!(env.header().is_empty());
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(Envelope::decode(b"not json"), Err(EnvelopeError::Malformed(_))));
        assert!(matches!(Envelope::decode(br#"{"header":{}}"#), Err(EnvelopeError::Malformed(_))));
    }

    #[test]
    fn encode_then_decode_preserves_header() {
        let mut header = Header::new();
        header.insert("user_agent".into(), json!("curl/8"));
        let bytes = Envelope::new(header.clone(), json!({"id": "x"})).encode().unwrap();

        let env = Envelope::decode(&bytes).unwrap();
        assert_eq!(env.header(), &header);
    }

    proptest::proptest! {
        #[test]
        fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(proptest::num::u8::ANY, 0..256)) {
            let _ = Envelope::decode(&bytes);
        }
    }
}
