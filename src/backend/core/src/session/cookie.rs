//! Session identifier transport over HTTP.

use crate::rbac::models::SessionId;
use axum::http::{header, HeaderMap};

pub const SESSION_COOKIE_NAME: &str = "rolegate_session";

/// Fallback header for clients that can carry neither cookies nor bearer tokens.
pub const SESSION_HEADER_NAME: &str = "x-session-id";

/// Resolve the caller's session id from request headers.
///
/// Checked in order: `Authorization: Bearer`, the session cookie, then
/// `X-Session-Id`. Blank values are skipped.
pub fn extract_session_id(headers: &HeaderMap) -> Option<SessionId> {
    bearer_token(headers)
        .or_else(|| SessionCookie::from_headers(headers).map(|cookie| cookie.session_id))
        .or_else(|| {
            headers
                .get(SESSION_HEADER_NAME)
                .and_then(|value| value.to_str().ok())
                .and_then(SessionId::parse)
        })
}

fn bearer_token(headers: &HeaderMap) -> Option<SessionId> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?;
    SessionId::parse(token)
}

/// The session cookie set on login and cleared on logout.
#[derive(Clone, Debug)]
pub struct SessionCookie {
    pub session_id: SessionId,
}

impl SessionCookie {
    pub fn new(session_id: SessionId) -> Self {
        Self { session_id }
    }

    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        for value in headers.get_all(header::COOKIE) {
            let Ok(cookie_header) = value.to_str() else {
                continue;
            };

            for cookie in cookie_header.split(';') {
                let found = cookie
                    .trim()
                    .strip_prefix(SESSION_COOKIE_NAME)
                    .and_then(|s| s.strip_prefix('='))
                    .and_then(SessionId::parse);

                if let Some(session_id) = found {
                    return Some(Self { session_id });
                }
            }
        }
        None
    }

    /// `Set-Cookie` value. `max_age` of `None` makes a browser-session cookie.
    pub fn to_cookie_header(&self, max_age: Option<u64>, secure: bool) -> String {
        let mut cookie = format!(
            "{}={}; HttpOnly; {}SameSite=Lax; Path=/",
            SESSION_COOKIE_NAME,
            self.session_id.as_str(),
            if secure { "Secure; " } else { "" },
        );
        if let Some(max_age) = max_age {
            cookie.push_str(&format!("; Max-Age={}", max_age));
        }
        cookie
    }

    pub fn delete_cookie_header() -> String {
        format!(
            "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
            SESSION_COOKIE_NAME
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn test_bearer_takes_precedence() {
        let map = headers(&[
            ("authorization", "Bearer from-bearer"),
            ("cookie", "rolegate_session=from-cookie"),
            ("x-session-id", "from-header"),
        ]);
        assert_eq!(extract_session_id(&map).unwrap().as_str(), "from-bearer");
    }

    #[test]
    fn test_cookie_before_custom_header() {
        let map = headers(&[
            ("cookie", "theme=dark; rolegate_session=from-cookie"),
            ("x-session-id", "from-header"),
        ]);
        assert_eq!(extract_session_id(&map).unwrap().as_str(), "from-cookie");
    }

    #[test]
    fn test_custom_header_fallback() {
        let map = headers(&[("x-session-id", "from-header")]);
        assert_eq!(extract_session_id(&map).unwrap().as_str(), "from-header");
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let map = headers(&[("authorization", "Bearer   "), ("cookie", "rolegate_session=")]);
        assert!(extract_session_id(&map).is_none());
    }

    #[test]
    fn test_similar_cookie_name_not_matched() {
        let map = headers(&[("cookie", "rolegate_session_old=stale")]);
        assert!(SessionCookie::from_headers(&map).is_none());
    }

    #[test]
    fn test_cookie_headers() {
        let cookie = SessionCookie::new(SessionId::parse("abc").unwrap());
        assert_eq!(
            cookie.to_cookie_header(Some(60), false),
            "rolegate_session=abc; HttpOnly; SameSite=Lax; Path=/; Max-Age=60"
        );
        assert!(cookie.to_cookie_header(None, true).contains("Secure; "));
        assert!(SessionCookie::delete_cookie_header().ends_with("Max-Age=0"));
    }
}
