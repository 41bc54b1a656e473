//! End-to-end tests for Pixgate.
//!
//! Each test starts a scripted origin (plain HTTP, or HTTPS with a
//! self-signed certificate) and a Pixgate instance on ephemeral loopback
//! ports, then talks to the proxy with `reqwest`. No external
//! server is needed:
//!
//! ```text
//! cargo test -p pixgate-integration
//! ```
//!
//! Origin routes:
//!
//! | Path | Response |
//! |------|----------|
//! | `/test.png` | 200 `image/png` |
//! | `/complex.png` | 200 `image/png; charset=utf-8` |
//! | `/301`, `/302` | redirect to `/test.png` (absolute) |
//! | `/location-relative` | 302 to `/test.png` (relative) |
//! | `/location-empty` | 302 with an empty `Location` |
//! | `/location-missing` | 302 without `Location` |
//! | `/loop` | 302 to itself |
//! | `/404` | 404 |
//! | `/content-type-invalid` | 200 `text/plain` |
//! | `/content-type-empty` | 200 with an empty `Content-Type` |
//! | `/content-type-missing` | 200 without `Content-Type` |
//! | `/timeout` | 200 `image/png`, body after one second |
//! | `/error-without-accept-header` | 403 unless `Accept` is sent |

use std::convert::Infallible;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::{Request, Response, StatusCode, header};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use pixgate_core::{ImageProxy, ImageResizer, ProxyConfig, ReqwestOrigin};
use pixgate_http::{HandlerFuture, ImageHandler, ImageProxyService, ImageRoute};
use rcgen::CertifiedKey;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls;
use tokio_rustls::rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tracing::warn;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Encode a solid PNG of the given size.
#[must_use]
pub fn png_fixture(width: u32, height: u32) -> Bytes {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([20, 120, 220, 255]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .expect("fixture encodes");
    Bytes::from(buf.into_inner())
}

type OriginBody = UnsyncBoxBody<Bytes, Infallible>;

/// A scripted origin server, over plain HTTP or self-signed TLS.
#[derive(Debug, Clone)]
pub struct TestOrigin {
    base: String,
    hits: Arc<AtomicUsize>,
}

impl TestOrigin {
    /// Start a plain HTTP origin on an ephemeral port.
    pub async fn spawn() -> Result<Self> {
        Self::start(None).await
    }

    /// Start an HTTPS origin with a freshly generated self-signed certificate.
    pub async fn spawn_tls() -> Result<Self> {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_owned()])
                .context("generate certificate")?;
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
        let config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert.der().clone()], key)
            .context("build TLS server config")?;

        Self::start(Some(TlsAcceptor::from(Arc::new(config)))).await
    }

    async fn start(tls: Option<TlsAcceptor>) -> Result<Self> {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind origin")?;
        let addr = listener.local_addr()?;
        let scheme = if tls.is_some() { "https" } else { "http" };
        let base = format!("{scheme}://{addr}");
        let hits = Arc::new(AtomicUsize::new(0));
        let png = png_fixture(200, 100);

        let counter = Arc::clone(&hits);
        let root = base.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    continue;
                };
                let counter = Arc::clone(&counter);
                let png = png.clone();
                let root = root.clone();
                let tls = tls.clone();
                let svc = service_fn(move |req: Request<Incoming>| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let response = route(&root, &req, png.clone());
                    async move { Ok::<_, Infallible>(response) }
                });
                tokio::spawn(async move {
                    let http = HttpConnBuilder::new(TokioExecutor::new());
                    let result = match tls {
                        Some(acceptor) => match acceptor.accept(stream).await {
                            Ok(stream) => http.serve_connection(TokioIo::new(stream), svc).await,
                            Err(e) => {
                                warn!(error = %e, "origin TLS handshake failed");
                                return;
                            }
                        },
                        None => http.serve_connection(TokioIo::new(stream), svc).await,
                    };
                    if let Err(e) = result {
                        warn!(error = %e, "origin connection error");
                    }
                });
            }
        });

        Ok(Self { base, hits })
    }

    /// Absolute URL of `path` on this origin.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// The `:url` path segment for `path` on this origin.
    #[must_use]
    pub fn encoded(&self, path: &str) -> String {
        encode(&self.url(path))
    }

    /// Requests served so far.
    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn route(base: &str, req: &Request<Incoming>, png: Bytes) -> Response<OriginBody> {
    let image = |content_type: &str| {
        respond(
            StatusCode::OK,
            &[(header::CONTENT_TYPE, content_type)],
            full(png.clone()),
        )
    };
    let redirect =
        |location: &str| respond(StatusCode::FOUND, &[(header::LOCATION, location)], empty());
    let test_png = format!("{base}/test.png");

    match req.uri().path() {
        "/test.png" => image("image/png"),
        "/complex.png" => image("image/png; charset=utf-8"),
        "/301" => respond(
            StatusCode::MOVED_PERMANENTLY,
            &[(header::LOCATION, test_png.as_str())],
            empty(),
        ),
        "/302" => redirect(&test_png),
        "/location-relative" => redirect("/test.png"),
        "/location-empty" => redirect(""),
        "/location-missing" => respond(StatusCode::FOUND, &[], empty()),
        "/loop" => redirect("/loop"),
        "/404" => respond(StatusCode::NOT_FOUND, &[], empty()),
        "/content-type-invalid" => {
            respond(StatusCode::OK, &[(header::CONTENT_TYPE, "text/plain")], empty())
        }
        "/content-type-empty" => respond(StatusCode::OK, &[(header::CONTENT_TYPE, "")], empty()),
        "/content-type-missing" => respond(StatusCode::OK, &[], empty()),
        "/timeout" => {
            let chunk = png.clone();
            let body = StreamBody::new(futures::stream::once(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, Infallible>(Frame::data(chunk))
            }));
            respond(
                StatusCode::OK,
                &[(header::CONTENT_TYPE, "image/png")],
                body.boxed_unsync(),
            )
        }
        "/error-without-accept-header" if req.headers().contains_key(header::ACCEPT) => {
            image("image/png")
        }
        "/error-without-accept-header" => respond(StatusCode::FORBIDDEN, &[], empty()),
        other => respond(
            StatusCode::INTERNAL_SERVER_ERROR,
            &[],
            full(Bytes::from(other.to_owned())),
        ),
    }
}

fn respond(
    status: StatusCode,
    headers: &[(header::HeaderName, &str)],
    body: OriginBody,
) -> Response<OriginBody> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    for (name, value) in headers {
        if let Ok(value) = header::HeaderValue::from_str(value) {
            response.headers_mut().insert(name.clone(), value);
        }
    }
    response
}

fn full(bytes: Bytes) -> OriginBody {
    Full::new(bytes).boxed_unsync()
}

fn empty() -> OriginBody {
    Empty::new().boxed_unsync()
}

/// Base64-encode a source URL for the `:url` segment.
#[must_use]
pub fn encode(url: &str) -> String {
    STANDARD.encode(url)
}

/// Routes requests into the pipeline.
#[derive(Debug, Clone)]
struct Bridge(Arc<ImageProxy<ReqwestOrigin, ImageResizer>>);

impl ImageHandler for Bridge {
    fn handle(&self, route: ImageRoute) -> HandlerFuture {
        let proxy = Arc::clone(&self.0);
        Box::pin(async move { proxy.process(&route.url, &route.width, &route.height).await })
    }
}

/// A running Pixgate instance.
#[derive(Debug, Clone)]
pub struct TestProxy {
    addr: SocketAddr,
}

impl TestProxy {
    /// Start Pixgate with `config` on an ephemeral port.
    pub async fn spawn(config: &ProxyConfig) -> Result<Self> {
        init_tracing();
        let origin = ReqwestOrigin::new(config)?;
        let proxy = ImageProxy::new(config, origin, ImageResizer::from_config(config));
        let service = ImageProxyService::new(Bridge(Arc::new(proxy)));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind proxy")?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    continue;
                };
                let svc = service.clone();
                tokio::spawn(async move {
                    let http = HttpConnBuilder::new(TokioExecutor::new());
                    if let Err(e) = http.serve_connection(TokioIo::new(stream), svc).await {
                        warn!(error = %e, "proxy connection error");
                    }
                });
            }
        });

        Ok(Self { addr })
    }

    /// Start Pixgate whitelisting only the loopback address.
    pub async fn spawn_default() -> Result<Self> {
        Self::spawn(&loopback_config()).await
    }

    /// Issue `GET path` against the proxy.
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        reqwest::Client::new()
            .get(format!("http://{}{path}", self.addr))
            .send()
            .await
            .context("proxy request")
    }
}

/// Configuration whitelisting `127.0.0.1` with a short fetch deadline.
#[must_use]
pub fn loopback_config() -> ProxyConfig {
    ProxyConfig::builder()
        .whitelist(vec!["127.0.0.1".into()])
        .fetch_timeout_ms(500)
        .max_redirects(5)
        .build()
}

/// [`loopback_config`] that trusts self-signed origin certificates when
/// `accept_invalid_certs` is set.
#[must_use]
pub fn tls_config(accept_invalid_certs: bool) -> ProxyConfig {
    ProxyConfig::builder()
        .whitelist(vec!["127.0.0.1".into()])
        .fetch_timeout_ms(2_000)
        .max_redirects(5)
        .accept_invalid_certs(accept_invalid_certs)
        .build()
}

/// The `Content-Type` of a response, if any.
#[must_use]
pub fn content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned)
}

mod test_fetch;
mod test_redirect;
