//! Resize gateway and the end-to-end request pipeline.

use std::sync::Arc;

use pixgate_model::{FetchResult, ImageFormat, ProxyResult, Rendition};
use tracing::{debug, instrument};

use crate::config::ProxyConfig;
use crate::decode::decode;
use crate::fetch::FetchPipeline;
use crate::origin::Origin;
use crate::policy::PolicyValidator;
use crate::transform::{Transform, TransformError};

/// Runs a [`Transform`] off the async runtime and labels the result.
#[derive(Debug)]
pub struct TransformGateway<T> {
    transform: Arc<T>,
    cache_control: String,
}

impl<T: Transform> TransformGateway<T> {
    /// Create a gateway whose renditions carry `cache_control`.
    #[must_use]
    pub fn new(transform: T, cache_control: String) -> Self {
        Self {
            transform: Arc::new(transform),
            cache_control,
        }
    }

    /// The wrapped transform.
    #[must_use]
    pub fn inner(&self) -> &T {
        &self.transform
    }

    /// Resize a fetched image.
    ///
    /// The output format is `output` when given, otherwise the source's own
    /// format; `jpg` is always emitted as `image/jpeg`.
    pub async fn transform(
        &self,
        source: FetchResult,
        width: u32,
        height: u32,
        output: Option<ImageFormat>,
    ) -> ProxyResult<Rendition> {
        let format = output.unwrap_or(source.content_type).canonical();
        let transform = Arc::clone(&self.transform);

        let bytes = tokio::task::spawn_blocking(move || {
            transform.resize(&source.bytes, width, height, format)
        })
        .await
        .map_err(|e| TransformError::Worker(e.to_string()))??;

        Ok(Rendition {
            bytes,
            format,
            cache_control: self.cache_control.clone(),
        })
    }
}

/// The whole request pipeline: decode, validate, fetch, resize.
#[derive(Debug)]
pub struct ImageProxy<O, T> {
    policy: Arc<PolicyValidator>,
    fetcher: FetchPipeline<O>,
    gateway: TransformGateway<T>,
}

impl<O: Origin, T: Transform> ImageProxy<O, T> {
    /// Wire the pipeline stages from `config`.
    #[must_use]
    pub fn new(config: &ProxyConfig, origin: O, transform: T) -> Self {
        let policy = Arc::new(PolicyValidator::from_config(config));
        Self {
            fetcher: FetchPipeline::new(origin, Arc::clone(&policy), config),
            gateway: TransformGateway::new(transform, config.cache_control()),
            policy,
        }
    }

    /// The fetch stage.
    #[must_use]
    pub fn fetcher(&self) -> &FetchPipeline<O> {
        &self.fetcher
    }

    /// The transform stage.
    #[must_use]
    pub fn gateway(&self) -> &TransformGateway<T> {
        &self.gateway
    }

    /// Serve one request from its raw path segments.
    ///
    /// Nothing is fetched unless decoding and validation both succeed, and
    /// nothing is resized unless the fetch succeeds.
    #[instrument(skip_all, fields(width = %width, height = %height))]
    pub async fn process(&self, url: &str, width: &str, height: &str) -> ProxyResult<Rendition> {
        let request = self.policy.validate(decode(url, width, height)?)?;
        debug!(source = %request.url(), "request validated");

        let source = self.fetcher.fetch(request.url().clone()).await?;
        self.gateway
            .transform(source, request.width(), request.height(), request.output())
            .await
    }
}
