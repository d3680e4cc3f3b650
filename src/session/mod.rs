//! Client-held session state.
//!
//! The whole session lives in a single cookie: a JSON document holding the
//! backend token plus a snapshot of the account record, percent-encoded so it
//! survives as a cookie value. There is no server-side session store; the
//! cookie is the session, and clearing it is the logout.

pub mod token;

use axum::http::{
    header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Cookie carrying the session document.
pub const SESSION_COOKIE_NAME: &str = "session_auth";

/// Backend collection holding account records.
pub const ACCOUNTS_COLLECTION: &str = "accounts";

// Bytes that cannot appear raw in a cookie value (RFC 6265), plus '%' so the
// encoding round-trips.
const COOKIE_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b',')
    .add(b';')
    .add(b'\\');

/// Account snapshot as issued by the backend. `email` is the only field the
/// pages rely on; everything else rides along untouched.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Account {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Account {
    /// Build an account from a record id and its remaining fields, lifting
    /// `email` out of the map when it is a string.
    #[must_use]
    pub fn from_parts(id: String, mut fields: Map<String, Value>) -> Self {
        let email = match fields.get("email").and_then(Value::as_str) {
            Some(email) => {
                let email = email.to_string();
                fields.remove("email");
                Some(email)
            }
            None => None,
        };

        Self { id, email, fields }
    }
}

/// The session document stored in the cookie.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Session {
    pub token: String,
    pub account: Account,
}

impl Session {
    #[must_use]
    pub const fn new(token: String, account: Account) -> Self {
        Self { token, account }
    }

    /// Parse a raw cookie value back into a session.
    ///
    /// Returns `None` for anything malformed: bad percent-encoding, invalid
    /// JSON, a missing token, or an account without an id. Callers treat all
    /// of those as "no session".
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let decoded = percent_decode_str(raw).decode_utf8().ok()?;
        let session: Self = serde_json::from_str(&decoded).ok()?;
        if session.token.is_empty() || session.account.id.is_empty() {
            return None;
        }
        Some(session)
    }

    fn encode(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(utf8_percent_encode(&json, COOKIE_ESCAPE).to_string())
    }
}

/// Pull the raw session cookie value out of the request headers.
#[must_use]
pub fn cookie_value(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(COOKIE)?.to_str().ok()?;

    for pair in cookies.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        if parts.next() == Some(SESSION_COOKIE_NAME) {
            return parts.next().map(ToString::to_string);
        }
    }

    None
}

/// Serialize the session into a `Set-Cookie` header value.
///
/// The cookie is `HttpOnly` and `SameSite=Lax`, with `Secure` added when the
/// site is served over https. No `Max-Age`: the token's own expiry bounds the
/// session.
///
/// # Errors
///
/// Returns an error if the session cannot be serialized or the encoded value
/// is not a valid header value.
pub fn session_cookie(session: &Session, secure: bool) -> anyhow::Result<HeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE_NAME,
        session.encode()?
    );

    if secure {
        cookie.push_str("; Secure");
    }

    Ok(HeaderValue::from_str(&cookie)?)
}

/// `Set-Cookie` value that expires the session cookie immediately.
///
/// # Errors
///
/// Returns an error if the cookie string is not a valid header value.
pub fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax");

    if secure {
        cookie.push_str("; Secure");
    }

    HeaderValue::from_str(&cookie)
}

/// Append a clearing `Set-Cookie` to the given headers, logging instead of
/// failing if the value cannot be built.
pub fn append_clear_cookie(headers: &mut HeaderMap, secure: bool) {
    match clear_session_cookie(secure) {
        Ok(value) => {
            headers.append(SET_COOKIE, value);
        }
        Err(error) => {
            tracing::error!("Failed to build clearing session cookie: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_session() -> Session {
        let account = Account::from_parts(
            "r1".to_string(),
            json!({"email": "user@example.com", "name": "User"})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        );
        Session::new("tok".to_string(), account)
    }

    #[test]
    fn from_parts_lifts_email_out_of_fields() {
        let session = sample_session();
        assert_eq!(session.account.email.as_deref(), Some("user@example.com"));
        assert!(!session.account.fields.contains_key("email"));
        assert_eq!(session.account.fields["name"], json!("User"));
    }

    #[test]
    fn from_parts_keeps_non_string_email_in_fields() {
        let account = Account::from_parts(
            "r1".to_string(),
            json!({"email": 42}).as_object().cloned().unwrap_or_default(),
        );
        assert_eq!(account.email, None);
        assert_eq!(account.fields["email"], json!(42));
    }

    #[test]
    fn cookie_value_round_trips() {
        let session = sample_session();
        let encoded = session.encode().expect("encode");
        assert!(!encoded.contains(' '));
        assert!(!encoded.contains('"'));
        assert_eq!(Session::parse(&encoded), Some(session));
    }

    #[test]
    fn parse_accepts_unencoded_json() {
        let raw = r#"{"token":"tok","account":{"id":"r1"}}"#;
        let session = Session::parse(raw).expect("session");
        assert_eq!(session.token, "tok");
        assert_eq!(session.account.id, "r1");
    }

    #[test]
    fn parse_rejects_malformed_values() {
        assert_eq!(Session::parse("not json"), None);
        assert_eq!(Session::parse("%zz"), None);
        assert_eq!(Session::parse(r#"{"token":"t"}"#), None);
        assert_eq!(Session::parse(r#"{"token":"","account":{"id":"r1"}}"#), None);
        assert_eq!(Session::parse(r#"{"token":"t","account":{"id":""}}"#), None);
    }

    #[test]
    fn session_cookie_carries_expected_flags() {
        let session = sample_session();

        let plain = session_cookie(&session, false).expect("cookie");
        let plain = plain.to_str().expect("ascii");
        assert!(plain.starts_with("session_auth="));
        assert!(plain.contains("Path=/"));
        assert!(plain.contains("HttpOnly"));
        assert!(plain.contains("SameSite=Lax"));
        assert!(!plain.contains("Secure"));
        assert!(!plain.contains("Max-Age"));

        let secure = session_cookie(&session, true).expect("cookie");
        assert!(secure.to_str().expect("ascii").ends_with("; Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let value = clear_session_cookie(false).expect("cookie");
        assert_eq!(
            value.to_str().expect("ascii"),
            "session_auth=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn cookie_value_finds_session_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; session_auth=abc%20def; lang=en"),
        );
        assert_eq!(cookie_value(&headers).as_deref(), Some("abc%20def"));

        headers.insert(COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(cookie_value(&headers), None);

        headers.remove(COOKIE);
        assert_eq!(cookie_value(&headers), None);
    }
}
