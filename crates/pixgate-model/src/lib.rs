//! Shared types for Pixgate.
//!
//! This crate holds the vocabulary the other crates speak: the decoded and
//! validated request types, the image formats the proxy understands, the
//! results handed between pipeline stages, and [`ProxyError`], whose
//! client-facing messages are part of the HTTP contract.

pub mod error;
pub mod format;
pub mod request;

pub use error::{Dimension, ErrorKind, ProxyError, ProxyResult};
pub use format::{ALLOWED_CONTENT_TYPES, ImageFormat};
pub use request::{DecodedRequest, FetchResult, ProxyRequest, Rendition, SourceUri};
