//! Pixgate request pipeline.
//!
//! A request moves through four stages, each in its own module:
//!
//! - [`decode`]: raw path segments into a [`DecodedRequest`](pixgate_model::DecodedRequest)
//! - [`policy`]: scheme, whitelist, and dimension checks
//! - [`fetch`]: origin GET with policed redirects, a deadline, and body checks
//! - [`gateway`]: resize on the blocking pool and label the rendition
//!
//! [`ImageProxy`] chains them. HTTP framing lives in `pixgate-http`.

pub mod config;
pub mod decode;
pub mod fetch;
pub mod gateway;
pub mod origin;
pub mod policy;
pub mod transform;


pub use config::ProxyConfig;
pub use fetch::{FetchPipeline, Hop, RedirectChain};
pub use gateway::{ImageProxy, TransformGateway};
pub use origin::{Origin, OriginError, OriginResponse, ReqwestOrigin};
pub use policy::{PolicyValidator, Whitelist};
pub use transform::{ImageResizer, Transform, TransformError};
