//! The seam between the HTTP layer and the request pipeline.

use std::future::Future;
use std::pin::Pin;

use pixgate_model::{ProxyError, Rendition};

use crate::router::ImageRoute;

/// Boxed future returned by [`ImageHandler::handle`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Rendition, ProxyError>> + Send>>;

/// Produces a rendition for a routed image request.
///
/// The service layer holds the handler behind an `Arc` and maps whatever it
/// returns onto an HTTP response.
pub trait ImageHandler: Send + Sync + 'static {
    /// Serve one image request.
    fn handle(&self, route: ImageRoute) -> HandlerFuture;
}
