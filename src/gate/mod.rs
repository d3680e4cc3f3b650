//! Session gate: every request passes through here before routing.
//!
//! The gate classifies the path, validates the session cookie in three steps
//! (parse, local expiry, token-bearing backend lookup) and degrades any
//! failure to "unauthenticated". Authenticated requests to auth pages bounce to the
//! dashboard; unauthenticated requests to protected pages bounce home. A
//! cookie that was present but failed validation is cleared on whichever
//! response goes out, redirect or not.

use crate::api::AppConfig;
use crate::backend;
use crate::session::{self, token, Session, ACCOUNTS_COLLECTION};
use axum::{
    extract::{Extension, Request},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;

pub const HOME_PATH: &str = "/";
pub const REGISTER_PATH: &str = "/register";
pub const DASHBOARD_PATH: &str = "/dashboard";

// Prefix match: everything under the dashboard needs a session.
const PROTECTED_PREFIXES: &[&str] = &[DASHBOARD_PATH];

// Exact match: pages that only make sense without a session.
const AUTH_PATHS: &[&str] = &[HOME_PATH, REGISTER_PATH];

/// How a path relates to authentication.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PathClass {
    /// Requires a live session.
    Protected,
    /// Only for visitors without a session.
    AuthOnly,
    /// Reachable either way.
    Open,
}

#[must_use]
pub fn classify(path: &str) -> PathClass {
    if PROTECTED_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
    {
        return PathClass::Protected;
    }

    if AUTH_PATHS.iter().any(|auth| path == *auth) {
        return PathClass::AuthOnly;
    }

    PathClass::Open
}

enum CookieCheck {
    Valid(Session),
    Missing,
    /// A cookie was presented and failed; it must be cleared.
    Invalid,
}

async fn check_cookie(headers: &HeaderMap, client: &backend::Client) -> CookieCheck {
    let Some(raw) = session::cookie_value(headers) else {
        return CookieCheck::Missing;
    };

    let Some(session) = Session::parse(&raw) else {
        debug!("Clearing malformed session cookie");
        return CookieCheck::Invalid;
    };

    if token::is_expired(&session.token, token::unix_now()) {
        debug!("Clearing expired session");
        return CookieCheck::Invalid;
    }

    // Cookies outlive accounts and tokens. The lookup presents the token so
    // the backend passes judgment on both; only success keeps the session.
    match client
        .get_record(ACCOUNTS_COLLECTION, &session.account.id, Some(&session.token))
        .await
    {
        Ok(_) => CookieCheck::Valid(session),
        Err(error) => {
            debug!("Clearing session, account lookup failed: {error}");
            CookieCheck::Invalid
        }
    }
}

/// Middleware enforcing the session rules.
///
/// Live sessions are inserted into request extensions for handlers that
/// render account state.
pub async fn gate(
    Extension(client): Extension<backend::Client>,
    Extension(config): Extension<Arc<AppConfig>>,
    mut request: Request,
    next: Next,
) -> Response {
    let class = classify(request.uri().path());
    let check = check_cookie(request.headers(), &client).await;

    let clear = matches!(check, CookieCheck::Invalid);
    let authenticated = matches!(check, CookieCheck::Valid(_));

    if let CookieCheck::Valid(session) = check {
        request.extensions_mut().insert(session);
    }

    let mut response = match (class, authenticated) {
        (PathClass::AuthOnly, true) => Redirect::temporary(DASHBOARD_PATH).into_response(),
        (PathClass::Protected, false) => Redirect::temporary(HOME_PATH).into_response(),
        _ => next.run(request).await,
    };

    if clear {
        session::append_clear_cookie(response.headers_mut(), config.cookie_secure());
    }

    response
}
