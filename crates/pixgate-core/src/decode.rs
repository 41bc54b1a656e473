//! Path segment decoding.
//!
//! Turns the three raw segments of `/:url/:width/:height(.:ext)?` into a
//! [`DecodedRequest`]. Decoding is pure and performs no policy checks: a
//! URL pointing at `ftp://` or a width of `5000` decodes fine and is
//! rejected later by the policy validator.

use std::borrow::Cow;
use std::num::IntErrorKind;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use percent_encoding::percent_decode_str;
use pixgate_model::{DecodedRequest, Dimension, ImageFormat, ProxyError, ProxyResult, SourceUri};
use url::Url;

/// Decode the raw (still percent-encoded) path segments.
///
/// Checks run in path order: URL, width, height, extension.
///
/// # Examples
///
/// ```
/// use pixgate_core::decode::decode;
/// use pixgate_model::ImageFormat;
///
/// // "http://localhost/a.png"
/// let req = decode("aHR0cDovL2xvY2FsaG9zdC9hLnBuZw==", "100", "50.jpg").unwrap();
/// assert_eq!(req.width, 100);
/// assert_eq!(req.height, 50);
/// assert_eq!(req.output, Some(ImageFormat::Jpg));
/// ```
pub fn decode(url: &str, width: &str, height: &str) -> ProxyResult<DecodedRequest> {
    let source = decode_source(url)?;
    let width = parse_dimension(width, Dimension::Width)?;

    let (height, extension) = match height.split_once('.') {
        Some((h, ext)) => (h, Some(ext)),
        None => (height, None),
    };
    let height = parse_dimension(height, Dimension::Height)?;

    let output = extension
        .map(|ext| {
            let ext = percent_decode(ext).unwrap_or(Cow::Borrowed(ext));
            ImageFormat::from_extension(&ext).ok_or_else(|| ProxyError::UnsupportedExtension {
                extension: ext.into_owned(),
            })
        })
        .transpose()?;

    Ok(DecodedRequest {
        source,
        width,
        height,
        output,
    })
}

/// Decode the base64 URL segment into a [`SourceUri`].
fn decode_source(segment: &str) -> ProxyResult<SourceUri> {
    let segment = percent_decode(segment).ok_or(ProxyError::InvalidUrl)?;
    let bytes = decode_base64(&segment).ok_or(ProxyError::InvalidUrl)?;
    let text = String::from_utf8(bytes).map_err(|_| ProxyError::InvalidUrl)?;
    parse_source(&text)
}

/// Decode base64 in either alphabet, padded or not.
///
/// Standard base64 contains `/`, which clients must percent-encode inside a
/// path segment; the URL-safe alphabet avoids that and is accepted too.
fn decode_base64(input: &str) -> Option<Vec<u8>> {
    [STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(input).ok())
}

fn parse_source(text: &str) -> ProxyResult<SourceUri> {
    match Url::parse(text) {
        Ok(url) => Ok(SourceUri::Absolute(url)),
        // `http://` has a scheme but no authority; let policy report it.
        Err(url::ParseError::EmptyHost) => {
            let (scheme, _) = text.split_once(':').ok_or(ProxyError::InvalidUrl)?;
            Ok(SourceUri::MissingHost {
                scheme: scheme.to_ascii_lowercase(),
            })
        }
        Err(_) => Err(ProxyError::InvalidUrl),
    }
}

/// Parse a base-10 integer dimension.
///
/// Out-of-range integers saturate so the policy stage reports them as too
/// large (or too small) rather than as non-integers.
fn parse_dimension(raw: &str, dimension: Dimension) -> ProxyResult<i64> {
    let raw = percent_decode(raw).ok_or(ProxyError::NotAnInteger(dimension))?;
    match raw.parse::<i64>() {
        Ok(n) => Ok(n),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Ok(i64::MAX),
            IntErrorKind::NegOverflow => Ok(i64::MIN),
            _ => Err(ProxyError::NotAnInteger(dimension)),
        },
    }
}

fn percent_decode(input: &str) -> Option<Cow<'_, str>> {
    percent_decode_str(input).decode_utf8().ok()
}
