//! OpenAPI document for the JSON endpoints.
//!
//! HTML pages and the server-sent-events relay are intentionally not
//! documented; the document covers the machine-facing surface only.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::health::health,
        crate::api::handlers::auth::login,
        crate::api::handlers::auth::register,
        crate::api::handlers::auth::logout,
        crate::api::handlers::counter::counter,
        crate::api::handlers::counter::increment,
    ),
    components(schemas(
        crate::api::handlers::health::Health,
        crate::api::handlers::auth::ActionResult,
        crate::api::handlers::counter::PageView,
    )),
    tags(
        (name = "health", description = "Service and backend liveness"),
        (name = "auth", description = "Session actions"),
        (name = "counter", description = "Demo page-view counter"),
    )
)]
pub struct ApiDoc;

/// The generated document, for the `openapi` binary and the served UI.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
