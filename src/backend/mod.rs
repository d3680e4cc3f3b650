//! HTTP client for the record-store backend.
//!
//! All connectivity lives here so handlers share one request path: the same
//! timeouts, the same tracing spans, and the same mapping from wire errors to
//! [`error::Error`]. The client is cheap to clone and injected into the
//! router, which keeps tests free to point it at a stub server.

pub mod error;
pub mod realtime;

pub use error::Error;

use crate::APP_USER_AGENT;
use anyhow::{bail, Context, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{info_span, instrument, Instrument};
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// Escapes for a single URL path segment. Collection names and record ids come
// from callers and cookies, so separators must never pass through raw.
const PATH_SEGMENT_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A backend record: its id plus whatever fields the collection holds.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Record {
    pub id: String,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Successful password authentication: a token plus the account record.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub record: Record,
}

#[derive(Debug, Deserialize)]
struct RecordPage {
    items: Vec<Record>,
}

/// Backend API client.
#[derive(Clone, Debug)]
pub struct Client {
    http: reqwest::Client,
    origin: String,
}

impl Client {
    /// Create a client for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not http(s) with a host, or if the
    /// underlying HTTP client cannot be built.
    pub fn new(base_url: &Url) -> Result<Self> {
        let port = match base_url.scheme() {
            "https" => base_url.port().unwrap_or(443),
            "http" => base_url.port().unwrap_or(80),
            scheme => bail!("Unsupported backend URL scheme: {scheme}"),
        };

        let host = base_url
            .host_str()
            .context("Backend URL is missing a host")?;

        let http = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            origin: format!("{}://{host}:{port}", base_url.scheme()),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.origin)
    }

    fn collection_path(collection: &str) -> String {
        format!(
            "/api/collections/{}/records",
            utf8_percent_encode(collection, PATH_SEGMENT_ESCAPE)
        )
    }

    /// Probe the backend health endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend is unreachable or unhealthy.
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<(), Error> {
        let url = self.endpoint("/api/health");
        let response = self.send(self.http.get(&url)).await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::from_response(response).await)
        }
    }

    /// Create a record in `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the backend rejects the fields.
    #[instrument(skip(self, fields))]
    pub async fn create_record(&self, collection: &str, fields: &Value) -> Result<Record, Error> {
        let url = self.endpoint(&Self::collection_path(collection));
        let response = self.send(self.http.post(&url).json(fields)).await?;
        Self::decode(response).await
    }

    /// Authenticate against `collection` with an identity and password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for wrong credentials.
    #[instrument(skip(self, password))]
    pub async fn auth_with_password(
        &self,
        collection: &str,
        identity: &str,
        password: &str,
    ) -> Result<AuthResponse, Error> {
        let url = self.endpoint(&format!(
            "/api/collections/{}/auth-with-password",
            utf8_percent_encode(collection, PATH_SEGMENT_ESCAPE)
        ));

        let body = serde_json::json!({
            "identity": identity,
            "password": password,
        });

        let response = self.send(self.http.post(&url).json(&body)).await?;
        Self::decode(response).await
    }

    /// Fetch a record by id, presenting `token` when given so the backend
    /// applies its per-record access rules to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the record does not exist or is
    /// hidden from the caller.
    #[instrument(skip(self, token))]
    pub async fn get_record(
        &self,
        collection: &str,
        id: &str,
        token: Option<&str>,
    ) -> Result<Record, Error> {
        let url = self.endpoint(&format!(
            "{}/{}",
            Self::collection_path(collection),
            utf8_percent_encode(id, PATH_SEGMENT_ESCAPE)
        ));

        let mut request = self.http.get(&url);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, token);
        }

        let response = self.send(request).await?;
        Self::decode(response).await
    }

    /// Fetch the first record of `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the collection is empty.
    #[instrument(skip(self))]
    pub async fn first_record(&self, collection: &str) -> Result<Record, Error> {
        let url = self.endpoint(&Self::collection_path(collection));
        let request = self
            .http
            .get(&url)
            .query(&[("page", "1"), ("perPage", "1"), ("skipTotal", "1")]);

        let response = self.send(request).await?;
        let page: RecordPage = Self::decode(response).await?;

        page.items.into_iter().next().ok_or(Error::NotFound)
    }

    /// Update the given fields of a record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the record does not exist.
    #[instrument(skip(self, fields))]
    pub async fn update_record(
        &self,
        collection: &str,
        id: &str,
        fields: &Value,
    ) -> Result<Record, Error> {
        let url = self.endpoint(&format!(
            "{}/{}",
            Self::collection_path(collection),
            utf8_percent_encode(id, PATH_SEGMENT_ESCAPE)
        ));

        let response = self.send(self.http.patch(&url).json(fields)).await?;
        Self::decode(response).await
    }

    // Send with the request deadline applied. Connection failures and
    // deadline overruns both come back as connectivity errors.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, Error> {
        let span = info_span!("backend_request");

        match tokio::time::timeout(REQUEST_TIMEOUT, request.send().instrument(span)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(error)) => Err(Error::Unreachable(error)),
            Err(_) => Err(Error::Timeout(REQUEST_TIMEOUT)),
        }
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, Error> {
        if response.status().is_success() {
            response.json().await.map_err(Error::Decode)
        } else {
            Err(Error::from_response(response).await)
        }
    }
}
