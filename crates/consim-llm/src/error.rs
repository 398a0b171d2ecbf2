use thiserror::Error;

/// Unified error taxonomy for generation providers.
///
/// Every provider-specific failure shape is normalized into one of these
/// variants before it leaves this crate, so callers never have to inspect
/// raw provider error text themselves.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("client initialization failed: {0}")]
    ClientInit(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("invalid or expired API credential: {0}")]
    Auth(String),

    #[error("quota or rate limit exhausted: {0}")]
    Quota(String),

    #[error("endpoint error: {0}")]
    Endpoint(String),

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("provider call failed: {0}")]
    Upstream(String),
}

impl GenError {
    /// Whether the caller's best remediation is supplying a new API key.
    pub fn need_api_key(&self) -> bool {
        matches!(
            self,
            GenError::ClientInit(_) | GenError::Auth(_) | GenError::Quota(_)
        )
    }
}

/// Normalize a provider error into the [`GenError`] taxonomy.
///
/// The classification table, checked in order:
///
/// | signal (case-insensitive)                         | variant    |
/// |---------------------------------------------------|------------|
/// | HTML body where JSON was expected                 | `Endpoint` |
/// | 401 / 403 / "unauthorized" / "api_key_invalid"    | `Auth`     |
/// | 429 / "quota" / "limit" / "resource_exhausted"    | `Quota`    |
/// | 404 / "not found"                                 | `Endpoint` |
/// | anything else                                     | `Upstream` |
///
/// HTML detection runs first: a reverse proxy serving an error page returns
/// status 200..404 with a `<html>` body, and the page text often contains
/// misleading keywords.
pub fn classify_provider_error(status: Option<u16>, body: &str) -> GenError {
    let lower = body.to_lowercase();

    if lower.contains("<!doctype html") || lower.contains("<html") {
        return GenError::Endpoint(
            "server returned an HTML page instead of an API response; check the base URL"
                .to_string(),
        );
    }

    let is_auth = matches!(status, Some(401) | Some(403))
        || lower.contains("unauthorized")
        || lower.contains("api_key_invalid")
        || lower.contains("401")
        || lower.contains("403");
    if is_auth {
        return GenError::Auth(truncate(body));
    }

    let is_quota = status == Some(429)
        || lower.contains("quota")
        || lower.contains("limit")
        || lower.contains("resource_exhausted")
        || lower.contains("429");
    if is_quota {
        return GenError::Quota(truncate(body));
    }

    let is_endpoint = status == Some(404) || lower.contains("not found") || lower.contains("404");
    if is_endpoint {
        return GenError::Endpoint(truncate(body));
    }

    GenError::Upstream(truncate(body))
}

/// Map a transport-level reqwest failure into the taxonomy.
pub fn classify_transport_error(err: reqwest::Error, timeout_ms: u64) -> GenError {
    if err.is_timeout() {
        GenError::Timeout(timeout_ms)
    } else if err.is_connect() || err.is_builder() {
        GenError::Endpoint(err.to_string())
    } else {
        GenError::Upstream(err.to_string())
    }
}

// Provider error bodies can be multi-kilobyte JSON blobs; keep messages short.
fn truncate(body: &str) -> String {
    const MAX: usize = 300;
    let trimmed = body.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let mut end = MAX;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_body_is_endpoint_error() {
        let err = classify_provider_error(Some(200), "<!DOCTYPE html><html><body>404</body></html>");
        assert!(matches!(err, GenError::Endpoint(_)));
    }

    #[test]
    fn unauthorized_keyword_is_auth() {
        let err = classify_provider_error(None, "Unauthorized: invalid token");
        assert!(matches!(err, GenError::Auth(_)));
        assert!(err.need_api_key());
    }

    #[test]
    fn status_401_is_auth() {
        let err = classify_provider_error(Some(401), "{\"error\":\"bad key\"}");
        assert!(matches!(err, GenError::Auth(_)));
    }

    #[test]
    fn quota_keyword_is_quota() {
        let err = classify_provider_error(Some(400), "RESOURCE_EXHAUSTED: quota exceeded");
        assert!(matches!(err, GenError::Quota(_)));
        assert!(err.need_api_key());
    }

    #[test]
    fn rate_limit_status_is_quota() {
        let err = classify_provider_error(Some(429), "slow down");
        assert!(matches!(err, GenError::Quota(_)));
    }

    #[test]
    fn not_found_is_endpoint() {
        let err = classify_provider_error(Some(404), "model not found");
        assert!(matches!(err, GenError::Endpoint(_)));
        assert!(!err.need_api_key());
    }

    #[test]
    fn unknown_body_is_upstream() {
        let err = classify_provider_error(Some(500), "internal server error");
        assert!(matches!(err, GenError::Upstream(_)));
        assert!(!err.need_api_key());
    }

    #[tokio::test]
    async fn elapsed_request_maps_to_timeout() {
        // Bind but never respond: the connection lands in the accept
        // backlog and the request sits until the client timeout fires.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(50))
            .build()
            .unwrap();
        let err = client
            .get(format!("http://{}/", addr))
            .send()
            .await
            .unwrap_err();

        let mapped = classify_transport_error(err, 50);
        assert!(matches!(mapped, GenError::Timeout(50)));
        assert!(!mapped.need_api_key());
        drop(listener);
    }

    #[test]
    fn malformed_url_maps_to_endpoint() {
        let err = reqwest::Client::new()
            .get("not a base url")
            .build()
            .unwrap_err();
        let mapped = classify_transport_error(err, 1000);
        assert!(matches!(mapped, GenError::Endpoint(_)));
    }

    #[test]
    fn long_body_is_truncated() {
        let body = "x".repeat(2000);
        let err = classify_provider_error(Some(500), &body);
        let msg = err.to_string();
        assert!(msg.len() < 400);
    }
}
