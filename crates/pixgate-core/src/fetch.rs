//! The origin fetch pipeline.
//!
//! [`FetchPipeline::fetch`] turns a validated URL into a [`FetchResult`]:
//!
//! 1. GET the current URL through the [`Origin`].
//! 2. Classify the response as a [`Hop::Redirect`] (301/302 with a usable
//!    `Location`) or a [`Hop::Final`] response.
//! 3. Redirect targets are resolved against the URL that produced them,
//!    checked against the policy, and appended to the [`RedirectChain`],
//!    which enforces the hop limit.
//! 4. A final response must be `200` with an allowed image content type;
//!    only then is the body buffered, up to a size cap.
//!
//! The whole chain runs under a single deadline. The fetch future owns the
//! connection, so when the deadline fires the future is dropped, the socket
//! is closed, and nothing more is read.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, StatusCode};
use pixgate_model::{FetchResult, ImageFormat, ProxyError, ProxyResult};
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::config::ProxyConfig;
use crate::origin::{BodyStream, Origin, OriginResponse};
use crate::policy::PolicyValidator;

/// URLs visited during one fetch, starting with the requested one.
#[derive(Debug, Clone)]
pub struct RedirectChain {
    current: Url,
    previous: Vec<Url>,
    limit: usize,
}

impl RedirectChain {
    /// Start a chain at `start`, allowing at most `limit` redirects.
    #[must_use]
    pub fn new(start: Url, limit: usize) -> Self {
        Self {
            current: start,
            previous: Vec::new(),
            limit,
        }
    }

    /// The URL to request next.
    #[must_use]
    pub fn current(&self) -> &Url {
        &self.current
    }

    /// Number of redirects followed so far.
    #[must_use]
    pub fn hops(&self) -> usize {
        self.previous.len()
    }

    /// Record a redirect to `next`.
    ///
    /// Fails once the hop limit would be exceeded, or immediately when
    /// `next` was already visited, since a loop can only end at the limit.
    pub fn follow(&mut self, next: Url) -> ProxyResult<()> {
        if self.hops() >= self.limit || self.current == next || self.previous.contains(&next) {
            return Err(ProxyError::TooManyRedirects(self.limit));
        }
        let prev = std::mem::replace(&mut self.current, next);
        self.previous.push(prev);
        Ok(())
    }
}

/// What a single origin response means for the chain.
#[derive(Debug)]
pub enum Hop {
    /// A 301/302 pointing at `location`, already resolved to an absolute URL.
    Redirect {
        /// The redirect status.
        status: StatusCode,
        /// The resolved target.
        location: Url,
    },
    /// Any other response; it ends the chain.
    Final(OriginResponse),
}

impl Hop {
    /// Classify `response`, which was returned for `current`.
    ///
    /// A 301/302 whose `Location` is missing, empty, or unresolvable is an
    /// error reporting the redirect's own status code.
    pub fn classify(current: &Url, response: OriginResponse) -> ProxyResult<Self> {
        let status = response.status;
        if status != StatusCode::MOVED_PERMANENTLY && status != StatusCode::FOUND {
            return Ok(Self::Final(response));
        }

        let location = response
            .headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ProxyError::UnexpectedStatus(status.as_u16()))?;

        let location = current
            .join(location)
            .map_err(|_| ProxyError::UnexpectedStatus(status.as_u16()))?;

        Ok(Self::Redirect { status, location })
    }
}

/// Fetches and validates source images.
#[derive(Debug)]
pub struct FetchPipeline<O> {
    origin: O,
    policy: Arc<PolicyValidator>,
    timeout: Duration,
    max_redirects: usize,
    max_body_bytes: usize,
}

impl<O: Origin> FetchPipeline<O> {
    /// Create a pipeline using `origin` for network access.
    #[must_use]
    pub fn new(origin: O, policy: Arc<PolicyValidator>, config: &ProxyConfig) -> Self {
        Self {
            origin,
            policy,
            timeout: config.fetch_timeout(),
            max_redirects: config.max_redirects,
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// The origin this pipeline talks to.
    #[must_use]
    pub fn origin(&self) -> &O {
        &self.origin
    }

    /// Fetch `url`, following redirects, within the configured deadline.
    pub async fn fetch(&self, url: Url) -> ProxyResult<FetchResult> {
        let deadline = Instant::now() + self.timeout;
        match tokio::time::timeout_at(deadline, self.fetch_chain(url)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.timeout, "origin fetch timed out");
                Err(ProxyError::Timeout(self.timeout))
            }
        }
    }

    async fn fetch_chain(&self, url: Url) -> ProxyResult<FetchResult> {
        let mut chain = RedirectChain::new(url, self.max_redirects);
        loop {
            let response = self.origin.get(chain.current()).await?;
            match Hop::classify(chain.current(), response)? {
                Hop::Redirect { status, location } => {
                    debug!(
                        from = %chain.current(),
                        to = %location,
                        status = status.as_u16(),
                        hops = chain.hops() + 1,
                        "following redirect"
                    );
                    self.policy.check_url(&location)?;
                    chain.follow(location)?;
                }
                Hop::Final(response) => {
                    let result = self.accept(response).await?;
                    debug!(
                        url = %chain.current(),
                        hops = chain.hops(),
                        bytes = result.bytes.len(),
                        content_type = %result.content_type,
                        "fetched source image"
                    );
                    return Ok(result);
                }
            }
        }
    }

    /// Validate a final response and buffer its body.
    async fn accept(&self, response: OriginResponse) -> ProxyResult<FetchResult> {
        if response.status != StatusCode::OK {
            return Err(ProxyError::UnexpectedStatus(response.status.as_u16()));
        }

        let content_type = content_type_essence(&response.headers);
        let format = ImageFormat::from_content_type(&content_type)
            .ok_or(ProxyError::UnsupportedContentType(content_type))?;

        if declared_length(&response.headers).is_some_and(|len| len > self.max_body_bytes) {
            return Err(ProxyError::BodyTooLarge(self.max_body_bytes));
        }

        let bytes = read_body(response.body, self.max_body_bytes).await?;
        Ok(FetchResult {
            bytes,
            content_type: format,
        })
    }
}

/// The `Content-Type` up to its first `;`, trimmed; empty when absent or
/// not visible ASCII.
fn content_type_essence(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .unwrap_or_default()
        .to_owned()
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Buffer the whole body, failing as soon as it grows past `limit`.
async fn read_body(mut body: BodyStream, limit: usize) -> ProxyResult<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.try_next().await? {
        if buf.len() + chunk.len() > limit {
            return Err(ProxyError::BodyTooLarge(limit));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}
