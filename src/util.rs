//! Request helpers shared by handlers and middleware.

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

/// Extract client IP address from proxy headers, for log lines.
pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
}

/// Extract a Bearer token from the Authorization header.
///
/// Returns the token string without the "Bearer " prefix, or None if
/// the header is missing, malformed, or empty after the prefix.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Compare a presented token against every configured one without
/// short-circuiting on the first mismatching byte.
pub fn token_matches(presented: &str, allowed: &[String]) -> bool {
    allowed.iter().fold(false, |found, token| {
        found | bool::from(presented.as_bytes().ct_eq(token.as_bytes()))
    })
}
