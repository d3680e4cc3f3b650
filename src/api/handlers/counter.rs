//! Demo page-view counter.
//!
//! The counter lives in a single backend record. Reads go through a bounded
//! retry with linearly growing backoff so a backend that is still starting up
//! gets a short grace period instead of an immediate failure. Live updates
//! are relayed to the browser over server-sent events.

use crate::api::AppConfig;
use crate::backend::{self, Error, Record};
use axum::{
    extract::Extension,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};
use utoipa::ToSchema;

/// Backend collection holding the single counter record.
pub const COUNTER_COLLECTION: &str = "page_views";

/// Counter snapshot returned by the counter endpoints.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, ToSchema)]
pub struct PageView {
    pub id: String,
    pub count: i64,
}

impl PageView {
    fn from_record(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            count: record.fields.get("count").and_then(Value::as_i64).unwrap_or(0),
        }
    }
}

// One full read attempt: fetch the counter record, seeding it on first use.
async fn fetch_or_create(client: &backend::Client) -> Result<Record, Error> {
    match client.first_record(COUNTER_COLLECTION).await {
        Err(Error::NotFound) => {
            debug!("Counter record missing, seeding it");
            client
                .create_record(COUNTER_COLLECTION, &json!({ "count": 1 }))
                .await
        }
        other => other,
    }
}

// Retry with linear backoff: 1x the base delay after the first failure, 2x
// after the second, up to `attempts` tries in total.
async fn with_retry<T, F, Fut>(attempts: u32, backoff: Duration, mut operation: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts => return Err(err),
            Err(err) => {
                warn!("Counter attempt {attempt} of {attempts} failed, retrying: {err}");
                sleep(backoff * attempt).await;
                attempt += 1;
            }
        }
    }
}

fn counter_failure(err: &Error, message: &str) -> Response {
    error!("{message}: {err}");
    (err.http_status(), Json(json!({ "error": message }))).into_response()
}

#[utoipa::path(
    get,
    path = "/api/counter",
    responses(
        (status = 200, description = "Current counter value, seeded on first use", body = PageView),
        (status = 502, description = "Backend unavailable after retries")
    ),
    tag = "counter"
)]
pub async fn counter(
    Extension(client): Extension<backend::Client>,
    Extension(config): Extension<Arc<AppConfig>>,
) -> Response {
    let result = with_retry(config.counter_attempts(), config.counter_backoff(), || {
        fetch_or_create(&client)
    })
    .await;

    match result {
        Ok(record) => Json(PageView::from_record(&record)).into_response(),
        Err(err) => counter_failure(&err, "Failed to initialize counter. Please try again."),
    }
}

#[utoipa::path(
    post,
    path = "/api/counter/increment",
    responses(
        (status = 200, description = "Counter after the increment", body = PageView),
        (status = 502, description = "Backend unavailable")
    ),
    tag = "counter"
)]
pub async fn increment(Extension(client): Extension<backend::Client>) -> Response {
    // Read-modify-write without a guard: concurrent increments may collapse
    // into one, which is acceptable for a demo counter.
    let record = match client.first_record(COUNTER_COLLECTION).await {
        Ok(record) => record,
        Err(err) => return counter_failure(&err, "Failed to update counter. Please try again."),
    };

    let next = PageView::from_record(&record).count + 1;
    match client
        .update_record(COUNTER_COLLECTION, &record.id, &json!({ "count": next }))
        .await
    {
        Ok(updated) => Json(PageView::from_record(&updated)).into_response(),
        Err(err) => counter_failure(&err, "Failed to update counter. Please try again."),
    }
}

/// Relay counter changes to the browser as server-sent events.
///
/// Emits `count` events carrying a [`PageView`] JSON body, or a single
/// `feed-error` event when the upstream subscription cannot be established.
pub async fn events(
    Extension(client): Extension<backend::Client>,
    Extension(config): Extension<Arc<AppConfig>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let attempts = config.counter_attempts();
    let backoff = config.counter_backoff();

    let stream = async_stream::stream! {
        let subscription =
            with_retry(attempts, backoff, || client.subscribe(COUNTER_COLLECTION)).await;

        let mut subscription = match subscription {
            Ok(subscription) => subscription,
            Err(err) => {
                error!("Counter subscription failed: {err}");
                yield Ok(Event::default().event("feed-error").data("counter feed unavailable"));
                return;
            }
        };

        while let Some(event) = subscription.next_event().await {
            match event {
                Ok(event) if event.action == "create" || event.action == "update" => {
                    let view = PageView::from_record(&event.record);
                    match serde_json::to_string(&view) {
                        Ok(data) => yield Ok(Event::default().event("count").data(data)),
                        Err(err) => error!("Failed to serialize counter event: {err}"),
                    }
                }
                Ok(event) => debug!("Ignoring counter event: {}", event.action),
                Err(err) => {
                    error!("Counter subscription interrupted: {err}");
                    yield Ok(Event::default().event("feed-error").data("counter feed interrupted"));
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
