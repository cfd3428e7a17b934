use std::time::Instant;

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::Value as JsonValue;
use tracing::info;
use uuid::Uuid;

use catalog_events::Header;
use catalog_events::envelope::AUTHORIZATION;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Caller metadata captured from the incoming request.
///
/// Becomes the header of every event the request publishes, unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestMeta {
    header: Header,
}

impl RequestMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| header_text(headers, name);

        let mut captured = Header::new();
        if let Some(auth) = text(header::AUTHORIZATION.as_str()) {
            captured.insert(AUTHORIZATION.to_string(), JsonValue::from(auth));
        }

        let request_id = text(REQUEST_ID_HEADER)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        captured.insert("request_id".to_string(), JsonValue::from(request_id));

        if let Some(agent) = text(header::USER_AGENT.as_str()) {
            captured.insert("user_agent".to_string(), JsonValue::from(agent));
        }

        let client_ip = text("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .or_else(|| text("x-real-ip"));
        if let Some(ip) = client_ip {
            captured.insert("client_ip".to_string(), JsonValue::from(ip));
        }

        Self { header: captured }
    }

    pub fn request_id(&self) -> &str {
        self.header
            .get("request_id")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
    }

    /// Envelope header for an event published on behalf of this request.
    pub fn header(&self) -> Header {
        self.header.clone()
    }
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Captures [`RequestMeta`] into the request extensions and logs one
/// `HTTP::REQUEST` line per request.
pub async fn request_context(mut req: Request, next: Next) -> Response {
    let started = Instant::now();
    let meta = RequestMeta::from_headers(req.headers());
    let request_id = meta.request_id().to_string();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(meta);

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        request_id = %request_id,
        "HTTP::REQUEST"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn captures_caller_metadata() {
        let meta = RequestMeta::from_headers(&headers(&[
            ("authorization", "Bearer abc"),
            ("x-request-id", "req-9"),
            ("user-agent", "curl/8"),
            ("x-forwarded-for", "10.0.0.1, 10.0.0.2"),
        ]));

        let header = meta.header();
        assert_eq!(header["Authorization"], "Bearer abc");
        assert_eq!(header["request_id"], "req-9");
        assert_eq!(header["user_agent"], "curl/8");
        assert_eq!(header["client_ip"], "10.0.0.1");
        assert_eq!(meta.request_id(), "req-9");
    }

    #[test]
    fn missing_request_id_is_generated() {
        let meta = RequestMeta::from_headers(&HeaderMap::new());
        assert!(Uuid::parse_str(meta.request_id()).is_ok());
        assert!(!meta.header().contains_key("Authorization"));
        assert!(!meta.header().contains_key("client_ip"));
    }
}
