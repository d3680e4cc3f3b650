//! # Pordisto (Cookie Session Gateway)
//!
//! `pordisto` fronts a record-store backend with sign-in, registration and a
//! dashboard, holding the whole session in a single `HttpOnly` cookie.
//!
//! ## Session Model
//!
//! The cookie carries a JSON document: the backend-issued token plus a
//! snapshot of the account record. There is no server-side session store;
//! clearing the cookie is the logout. Tokens are never verified locally,
//! only their `exp` claim is read to drop obviously stale sessions early.
//!
//! ## Gate
//!
//! Every request passes the gate middleware. Protected paths (`/dashboard`
//! and below) require a live session; auth pages (`/` and `/register`) bounce
//! signed-in visitors to the dashboard. Any cookie that fails parsing, local
//! expiry or the backend existence check is treated as absent and cleared on
//! the outgoing response, redirects included.
//!
//! ## Backend
//!
//! Accounts and the demo page-view counter are plain collections on the
//! backend. The client wraps record CRUD, password authentication and the
//! realtime subscription channel, and is injected into the router so tests
//! can point everything at a stub server.

pub mod api;
pub mod backend;
pub mod cli;
pub mod gate;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
