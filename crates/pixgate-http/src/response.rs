//! Mapping pipeline outcomes onto HTTP responses.
//!
//! | Outcome | Status | Body |
//! |---------|--------|------|
//! | Rendition | 200 | image bytes |
//! | Decode, policy, or fetch error | 404 | the error message |
//! | Fetch deadline expired | 504 | empty |
//! | Anything else | 500 | empty |

use http::header::{CACHE_CONTROL, CONTENT_TYPE, HeaderValue};
use http::{Response, StatusCode};
use pixgate_model::{ProxyError, Rendition};
use tracing::warn;

use crate::body::ProxyResponseBody;

/// Content type of client-facing error messages.
const TEXT_HTML: &str = "text/html; charset=utf-8";

/// Build the response for a failed request.
///
/// Only client-facing errors carry a body; internal details stay in the logs.
#[must_use]
pub fn error_to_response(err: &ProxyError) -> Response<ProxyResponseBody> {
    let mut response = match err.public_message() {
        Some(message) => {
            let mut response = Response::new(ProxyResponseBody::from_string(message));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_HTML));
            response
        }
        None => Response::new(ProxyResponseBody::empty()),
    };
    *response.status_mut() = err.status_code();
    response
}

/// Build the `200` response for a rendition.
#[must_use]
pub fn rendition_to_response(rendition: Rendition) -> Response<ProxyResponseBody> {
    let content_type = HeaderValue::from_str(rendition.format.mime().as_ref());
    let cache_control = HeaderValue::from_str(&rendition.cache_control);
    let (Ok(content_type), Ok(cache_control)) = (content_type, cache_control) else {
        warn!(
            cache_control = %rendition.cache_control,
            "rendition headers are not valid header values"
        );
        return error_to_response(&ProxyError::Internal("invalid rendition headers".to_owned()));
    };

    let mut response = Response::new(ProxyResponseBody::from_bytes(rendition.bytes));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, content_type);
    headers.insert(CACHE_CONTROL, cache_control);
    response
}
