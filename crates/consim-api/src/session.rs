//! Session identity middleware.
//!
//! Every request carries a `sid` cookie; requests without one get a fresh
//! uuid v4 minted and set on the response. Handlers read the id from the
//! request extensions. Lifecycle beyond identity (expiry, persistence) is
//! out of scope here.

use axum::extract::Request;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "sid";

/// Session identifier, injected into request extensions by [`session_layer`].
#[derive(Debug, Clone)]
pub struct SessionId(pub String);

pub async fn session_layer(mut request: Request, next: Next) -> Response {
    let existing = request
        .headers()
        .get(COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_sid);

    let (session_id, minted) = match existing {
        Some(sid) => (sid, false),
        None => (Uuid::new_v4().to_string(), true),
    };

    request.extensions_mut().insert(SessionId(session_id.clone()));
    let mut response = next.run(request).await;

    if minted {
        let cookie = format!("{}={}; Path=/; HttpOnly", SESSION_COOKIE, session_id);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }

    response
}

fn extract_sid(cookie_header: &str) -> Option<String> {
    cookie_header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name == SESSION_COOKIE && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_sid_among_other_cookies() {
        let header = "theme=dark; sid=abc-123; lang=en";
        assert_eq!(extract_sid(header), Some("abc-123".to_string()));
    }

    #[test]
    fn missing_or_empty_sid_is_none() {
        assert_eq!(extract_sid("theme=dark"), None);
        assert_eq!(extract_sid("sid="), None);
    }
}
