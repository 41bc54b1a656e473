//! Bridges the HTTP layer (`pixgate-http`) to the request pipeline
//! (`pixgate-core`) by implementing [`ImageHandler`] over [`ImageProxy`].

use std::sync::Arc;

use pixgate_core::{ImageProxy, Origin, Transform};
use pixgate_http::{HandlerFuture, ImageHandler, ImageRoute};

/// [`ImageHandler`] delegating to a shared [`ImageProxy`].
#[derive(Debug)]
pub struct PixgateHandler<O, T>(pub Arc<ImageProxy<O, T>>);

impl<O, T> Clone for PixgateHandler<O, T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<O: Origin, T: Transform> ImageHandler for PixgateHandler<O, T> {
    fn handle(&self, route: ImageRoute) -> HandlerFuture {
        let proxy = Arc::clone(&self.0);
        Box::pin(async move {
            proxy
                .process(&route.url, &route.width, &route.height)
                .await
        })
    }
}
