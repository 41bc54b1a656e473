//! Outbound HTTP access to image origins.
//!
//! The fetch pipeline talks to origins only through the [`Origin`] trait,
//! which issues exactly one GET per call and never follows redirects on its
//! own. [`ReqwestOrigin`] is the production implementation; tests swap in
//! scripted origins to observe (or forbid) network egress.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use http::header::ACCEPT;
use http::{HeaderMap, StatusCode};
use pixgate_model::ProxyError;
use url::Url;

use crate::config::ProxyConfig;

/// `Accept` header sent with every origin request.
///
/// Some origins refuse requests that do not look like they come from a
/// browser asking for an image.
pub const ACCEPT_IMAGES: &str =
    "image/gif, image/jpeg, image/png, image/jpg, image/*;q=0.8, */*;q=0.5";

/// A lazily read response body.
///
/// Dropping the stream releases the underlying connection.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, OriginError>> + Send>>;

/// Transport-level failure talking to an origin.
#[derive(Debug, thiserror::Error)]
pub enum OriginError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// Connecting, sending, or receiving the response head failed.
    #[error("request failed: {0}")]
    Request(String),

    /// The connection failed while the body was being read.
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl From<OriginError> for ProxyError {
    fn from(err: OriginError) -> Self {
        Self::Origin(err.to_string())
    }
}

/// Response head plus an unread body.
pub struct OriginResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// The body, not read until the pipeline asks for it.
    pub body: BodyStream,
}

impl fmt::Debug for OriginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OriginResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &"...")
            .finish()
    }
}

/// Boxed future returned by [`Origin::get`].
pub type OriginFuture<'a> =
    Pin<Box<dyn Future<Output = Result<OriginResponse, OriginError>> + Send + 'a>>;

/// An HTTP origin the pipeline can send single GET requests to.
pub trait Origin: Send + Sync + 'static {
    /// Send one GET request to `url` without following redirects.
    ///
    /// The future resolves once the response head has arrived.
    fn get<'a>(&'a self, url: &'a Url) -> OriginFuture<'a>;
}

/// [`Origin`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestOrigin {
    client: reqwest::Client,
}

impl ReqwestOrigin {
    /// Build the client from the service configuration.
    ///
    /// Redirects are disabled so the pipeline can police every hop.
    pub fn new(config: &ProxyConfig) -> Result<Self, OriginError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.fetch_timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| OriginError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Origin for ReqwestOrigin {
    fn get<'a>(&'a self, url: &'a Url) -> OriginFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .get(url.clone())
                .header(ACCEPT, ACCEPT_IMAGES)
                .send()
                .await
                .map_err(|e| OriginError::Request(e.without_url().to_string()))?;

            let status = response.status();
            let headers = response.headers().clone();
            let body = futures::stream::try_unfold(response, |mut response| async move {
                match response.chunk().await {
                    Ok(Some(chunk)) => Ok(Some((chunk, response))),
                    Ok(None) => Ok(None),
                    Err(e) => Err(OriginError::Body(e.without_url().to_string())),
                }
            });

            Ok(OriginResponse {
                status,
                headers,
                body: Box::pin(body),
            })
        })
    }
}
