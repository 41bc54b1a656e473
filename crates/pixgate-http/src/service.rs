//! The Pixgate hyper service.
//!
//! [`ImageProxyService`] handles, in order:
//!
//! 1. Routing and health check interception
//! 2. Dispatch to the [`ImageHandler`]
//! 3. Mapping the outcome onto a response
//! 4. Common response headers (`x-request-id`, `Server`)

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use http::header::{CONTENT_TYPE, HeaderValue, SERVER};
use http::{Method, Response, StatusCode};
use hyper::body::Incoming;
use hyper::service::Service;
use pixgate_model::ErrorKind;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::body::ProxyResponseBody;
use crate::handler::ImageHandler;
use crate::response::{error_to_response, rendition_to_response};
use crate::router::{Route, resolve};

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The Pixgate HTTP service.
///
/// Request bodies are never read; every route is a `GET`.
#[derive(Debug)]
pub struct ImageProxyService<H: ImageHandler> {
    handler: Arc<H>,
}

impl<H: ImageHandler> ImageProxyService<H> {
    /// Create a service around `handler`.
    #[must_use]
    pub fn new(handler: H) -> Self {
        Self::from_shared(Arc::new(handler))
    }

    /// Create a service from an already shared handler.
    #[must_use]
    pub fn from_shared(handler: Arc<H>) -> Self {
        Self { handler }
    }
}

impl<H: ImageHandler> Clone for ImageProxyService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<H: ImageHandler> Service<http::Request<Incoming>> for ImageProxyService<H> {
    type Response = Response<ProxyResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let handler = Arc::clone(&self.handler);
        let method = req.method().clone();
        let path = req.uri().path().to_owned();

        Box::pin(async move {
            let request_id = Uuid::new_v4().to_string();
            let response = process_request(&method, &path, handler.as_ref(), &request_id).await;
            Ok(add_common_headers(response, &request_id))
        })
    }
}

/// Route and serve one request.
pub async fn process_request<H: ImageHandler>(
    method: &Method,
    path: &str,
    handler: &H,
    request_id: &str,
) -> Response<ProxyResponseBody> {
    let started = Instant::now();
    debug!(%method, uri = path, request_id, "processing request");

    let route = match resolve(method, path) {
        Ok(Route::Health) => return health_check_response(),
        Ok(Route::Image(route)) => route,
        Err(err) => {
            debug!(%method, uri = path, request_id, "no route");
            return error_to_response(&err);
        }
    };

    match handler.handle(route).await {
        Ok(rendition) => {
            let response = rendition_to_response(rendition);
            info!(
                status = response.status().as_u16(),
                elapsed_ms = started.elapsed().as_millis(),
                request_id,
                "served rendition"
            );
            response
        }
        Err(err) => {
            let response = error_to_response(&err);
            let status = response.status().as_u16();
            let elapsed_ms = started.elapsed().as_millis();
            match err.kind() {
                ErrorKind::Internal => {
                    error!(error = %err, status, elapsed_ms, request_id, "request failed");
                }
                _ => warn!(error = %err, status, elapsed_ms, request_id, "request rejected"),
            }
            response
        }
    }
}

/// Produce a health check response.
fn health_check_response() -> Response<ProxyResponseBody> {
    let body = serde_json::json!({
        "status": "running",
        "service": "pixgate",
        "version": env!("CARGO_PKG_VERSION"),
    });
    let mut response = Response::new(ProxyResponseBody::from_string(body.to_string()));
    *response.status_mut() = StatusCode::OK;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Add common response headers to every response.
fn add_common_headers(
    mut response: Response<ProxyResponseBody>,
    request_id: &str,
) -> Response<ProxyResponseBody> {
    let headers = response.headers_mut();
    if let Ok(hv) = HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID_HEADER, hv);
    }
    headers.insert(SERVER, HeaderValue::from_static("pixgate"));
    response
}
