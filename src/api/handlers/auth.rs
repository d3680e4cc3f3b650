//! Auth actions backing the login and registration forms.
//!
//! Every action answers with an [`ActionResult`] so the pages can branch on
//! `success` without inspecting statuses. Backend verdicts are translated to
//! fixed user-facing messages here; raw error chains stay in the logs.

use crate::api::AppConfig;
use crate::backend::{self, Error};
use crate::gate::HOME_PATH;
use crate::session::{self, Account, Session, ACCOUNTS_COLLECTION};
use axum::{
    extract::{Extension, Form},
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Json, Redirect, Response},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

const MISMATCH_MESSAGE: &str = "Passwords do not match";
const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";
const BACKEND_DOWN_LOGIN_MESSAGE: &str =
    "Unable to connect to the backend. Please ensure the server is running.";
const BACKEND_DOWN_SIGNUP_MESSAGE: &str =
    "Unable to connect to the server. Please try again later.";
const GENERIC_MESSAGE: &str = "Something went wrong. Please try again later.";

/// Outcome of an auth action.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, ToSchema)]
pub struct ActionResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct LoginForm {
    email: String,

    #[schema(value_type = String)]
    password: SecretString,
}

#[derive(Deserialize, ToSchema)]
pub struct RegisterForm {
    email: String,

    #[schema(value_type = String)]
    password: SecretString,

    #[serde(rename = "passwordConfirm")]
    #[schema(value_type = String)]
    password_confirm: SecretString,
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    responses(
        (status = 200, description = "Verdict; the session cookie rides on success", body = ActionResult)
    ),
    tag = "auth"
)]
pub async fn login(
    Extension(client): Extension<backend::Client>,
    Extension(config): Extension<Arc<AppConfig>>,
    Form(form): Form<LoginForm>,
) -> impl IntoResponse {
    match client
        .auth_with_password(ACCOUNTS_COLLECTION, &form.email, form.password.expose_secret())
        .await
    {
        Ok(auth) => {
            debug!("Login verified for account {}", auth.record.id);
            grant_session(auth, &config)
        }
        Err(err) => {
            debug!("Login rejected: {err}");
            (HeaderMap::new(), Json(ActionResult::fail(login_error(&err))))
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    responses(
        (status = 200, description = "Verdict; the account is signed in on success", body = ActionResult)
    ),
    tag = "auth"
)]
pub async fn register(
    Extension(client): Extension<backend::Client>,
    Extension(config): Extension<Arc<AppConfig>>,
    Form(form): Form<RegisterForm>,
) -> impl IntoResponse {
    if form.password.expose_secret() != form.password_confirm.expose_secret() {
        return (HeaderMap::new(), Json(ActionResult::fail(MISMATCH_MESSAGE)));
    }

    let fields = json!({
        "email": form.email,
        "password": form.password.expose_secret(),
        "passwordConfirm": form.password_confirm.expose_secret(),
    });

    if let Err(err) = client.create_record(ACCOUNTS_COLLECTION, &fields).await {
        debug!("Signup rejected: {err}");
        return (HeaderMap::new(), Json(ActionResult::fail(signup_error(&err))));
    }

    // Sign the fresh account in so the browser lands on the dashboard.
    match client
        .auth_with_password(ACCOUNTS_COLLECTION, &form.email, form.password.expose_secret())
        .await
    {
        Ok(auth) => {
            debug!("Account {} registered and signed in", auth.record.id);
            grant_session(auth, &config)
        }
        Err(err) => {
            error!("Signup succeeded but sign-in failed: {err}");
            (HeaderMap::new(), Json(ActionResult::fail(signup_error(&err))))
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 303, description = "Session cleared, back to the home page")),
    tag = "auth"
)]
pub async fn logout(Extension(config): Extension<Arc<AppConfig>>) -> Response {
    let mut response = Redirect::to(HOME_PATH).into_response();
    session::append_clear_cookie(response.headers_mut(), config.cookie_secure());
    response
}

fn grant_session(auth: backend::AuthResponse, config: &AppConfig) -> (HeaderMap, Json<ActionResult>) {
    let account = Account::from_parts(auth.record.id, auth.record.fields);
    let session = Session::new(auth.token, account);

    let mut headers = HeaderMap::new();
    match session::session_cookie(&session, config.cookie_secure()) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
            (headers, Json(ActionResult::ok()))
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            (headers, Json(ActionResult::fail(GENERIC_MESSAGE)))
        }
    }
}

fn login_error(err: &Error) -> String {
    match err {
        Error::Validation { .. } => INVALID_CREDENTIALS_MESSAGE.to_string(),
        err if err.is_connectivity() => BACKEND_DOWN_LOGIN_MESSAGE.to_string(),
        Error::Decode(_) | Error::Protocol(_) => GENERIC_MESSAGE.to_string(),
        err => format!("Login failed: {err}"),
    }
}

fn signup_error(err: &Error) -> String {
    match err {
        Error::Validation { data, .. } if !data.is_empty() => {
            let fields = data
                .iter()
                .map(|(field, detail)| format!("{field}: {}", detail.message))
                .collect::<Vec<_>>()
                .join(", ");

            format!("Please fix the following: {fields}")
        }
        Error::Validation { message, .. } => message.clone(),
        err if err.is_connectivity() => BACKEND_DOWN_SIGNUP_MESSAGE.to_string(),
        _ => GENERIC_MESSAGE.to_string(),
    }
}
