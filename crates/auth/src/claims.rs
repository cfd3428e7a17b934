use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Claims of a verified token.
///
/// Only the registered claims the catalog checks are typed; everything else is
/// kept in `extra` for logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Either a single audience string or a list of them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<JsonValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

impl Claims {
    /// Audiences as a flat list.
    pub fn audiences(&self) -> Vec<&str> {
        match &self.aud {
            Some(JsonValue::String(s)) => vec![s.as_str()],
            Some(JsonValue::Array(items)) => items.iter().filter_map(JsonValue::as_str).collect(),
            _ => Vec::new(),
        }
    }
}
