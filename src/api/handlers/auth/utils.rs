//! Small request helpers shared by the auth handlers.

use axum::http::HeaderMap;

/// Emails compare case-insensitively; normalize once at the edge.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[must_use]
pub fn valid_email(email: &str) -> bool {
    let Ok(re) = regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$") else {
        return false;
    };
    re.is_match(email)
}

/// Pull the token out of `Authorization: Bearer <token>`.
#[must_use]
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| {
            header
                .strip_prefix("Bearer ")
                .or_else(|| header.strip_prefix("bearer "))
        })
        .filter(|token| !token.is_empty())
}

/// Best-effort client ip for the session record: first x-forwarded-for hop,
/// then x-real-ip, else unknown.
#[must_use]
pub fn extract_client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|header| header.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|header| header.to_str().ok())
        })
        .unwrap_or("unknown")
        .to_string()
}

#[must_use]
pub fn extract_device_info(headers: &HeaderMap) -> String {
    headers
        .get("user-agent")
        .and_then(|header| header.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}
