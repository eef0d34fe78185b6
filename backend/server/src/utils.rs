use axum::http::{HeaderMap, HeaderValue, header::COOKIE};
use store::PersistedSession;

pub const ACCESS_COOKIE: &str = "garoon-access-token";
pub const REFRESH_COOKIE: &str = "garoon-refresh-token";

/// Refresh tokens outlive access tokens, so both cookies ride on the longer one.
const COOKIE_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 30;

pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

pub fn persisted_session(headers: &HeaderMap) -> Option<PersistedSession> {
    Some(PersistedSession {
        access_token: read_cookie(headers, ACCESS_COOKIE)?.to_string(),
        refresh_token: read_cookie(headers, REFRESH_COOKIE)?.to_string(),
    })
}

fn cookie(name: &str, value: &str, max_age: u64, secure: bool) -> Option<HeaderValue> {
    let secure = if secure { "; Secure" } else { "" };

    HeaderValue::from_str(&format!(
        "{name}={value}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax{secure}"
    ))
    .ok()
}

/// `Set-Cookie` values that store `session`, or expire both cookies when `None`.
pub fn session_cookies(session: Option<&PersistedSession>, secure: bool) -> Vec<HeaderValue> {
    let (access, refresh, max_age) = match session {
        Some(s) => (
            s.access_token.as_str(),
            s.refresh_token.as_str(),
            COOKIE_MAX_AGE_SECS,
        ),
        None => ("", "", 0),
    };

    [
        cookie(ACCESS_COOKIE, access, max_age, secure),
        cookie(REFRESH_COOKIE, refresh, max_age, secure),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Post-login destination. Only same-site absolute paths are honoured.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path
        }
        _ => "/dashboard",
    }
}

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }

    escaped
}

/// Percent-encodes a path for use inside a query string.
pub fn encode_query_value(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; garoon-access-token=abc; garoon-refresh-token="),
        );

        assert_eq!(read_cookie(&headers, ACCESS_COOKIE), Some("abc"));
        assert_eq!(read_cookie(&headers, REFRESH_COOKIE), None);
        assert_eq!(read_cookie(&headers, "missing"), None);
        assert!(persisted_session(&headers).is_none());
    }

    #[test]
    fn test_session_cookies() {
        let session = PersistedSession {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
        };

        let set = session_cookies(Some(&session), true);
        assert_eq!(set.len(), 2);
        let access = set[0].to_str().unwrap();
        assert!(access.starts_with("garoon-access-token=a;"));
        assert!(access.contains("HttpOnly"));
        assert!(access.ends_with("SameSite=Lax; Secure"));

        let cleared = session_cookies(None, false);
        assert!(cleared[1].to_str().unwrap().contains("Max-Age=0"));
        assert!(!cleared[1].to_str().unwrap().contains("Secure"));
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/dashboard?tab=messages")), "/dashboard?tab=messages");
        assert_eq!(safe_next(Some("//evil.example")), "/dashboard");
        assert_eq!(safe_next(Some("https://evil.example")), "/dashboard");
        assert_eq!(safe_next(Some("/\\evil.example")), "/dashboard");
        assert_eq!(safe_next(Some("/dash\nboard")), "/dashboard");
        assert_eq!(safe_next(Some("/dashboard\t")), "/dashboard");
        assert_eq!(safe_next(None), "/dashboard");
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            escape("<b>Tom & \"Jerry\"</b>"),
            "&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;"
        );
        assert_eq!(encode_query_value("/dashboard?a=b"), "/dashboard%3Fa%3Db");
    }
}
