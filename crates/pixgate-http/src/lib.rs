//! HTTP layer for Pixgate.
//!
//! - **Routing** ([`router`]): recognizes `GET /:url/:width/:height(.:ext)?`
//!   and the health probes.
//! - **Handler** ([`handler`]): the [`ImageHandler`] trait the server binary
//!   implements over the request pipeline.
//! - **Response** ([`response`]): maps renditions and errors onto status
//!   codes, headers, and bodies.
//! - **Service** ([`service`]): [`ImageProxyService`], the hyper `Service`
//!   tying the above together.
//! - **Body** ([`body`]): [`ProxyResponseBody`].
//!
//! # Architecture
//!
//! ```text
//! HTTP Request
//!   -> ImageProxyService (hyper Service)
//!     -> router::resolve (health probe / image route / 404)
//!     -> ImageHandler::handle
//!     -> rendition_to_response / error_to_response
//!     -> Common response headers (x-request-id, Server)
//!   <- HTTP Response
//! ```

pub mod body;
pub mod handler;
pub mod response;
pub mod router;
pub mod service;

pub use body::ProxyResponseBody;
pub use handler::{HandlerFuture, ImageHandler};
pub use response::{error_to_response, rendition_to_response};
pub use router::{ImageRoute, Route};
pub use service::{ImageProxyService, REQUEST_ID_HEADER};
