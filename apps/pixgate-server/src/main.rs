//! Pixgate Server - an image resizing proxy.
//!
//! Fetches images from whitelisted origins and serves them resized at
//! `GET /:base64Url/:width/:height(.:extension)?`.
//!
//! # Usage
//!
//! ```text
//! PIXGATE_WHITELIST=images.example.com GATEWAY_LISTEN=0.0.0.0:8080 pixgate-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:8080` | Bind address |
//! | `PIXGATE_WHITELIST` | *(empty)* | Comma-separated allowed origin hosts |
//! | `PIXGATE_FETCH_TIMEOUT_MS` | `5000` | Deadline for the whole origin fetch |
//! | `PIXGATE_MAX_REDIRECTS` | `10` | Redirect hop limit |
//! | `PIXGATE_MAX_DIMENSION` | `1000` | Largest allowed width or height |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `LOG_FORMAT` | `text` | `json` for one JSON object per line |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |
//!
//! See `ProxyConfig::from_env` for the full list.

mod handler;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use pixgate_core::{ImageProxy, ImageResizer, ProxyConfig, ReqwestOrigin};
use pixgate_http::{ImageHandler, ImageProxyService};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::handler::PixgateHandler;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

/// Wire the pipeline from configuration.
fn build_service(
    config: &ProxyConfig,
) -> Result<ImageProxyService<PixgateHandler<ReqwestOrigin, ImageResizer>>> {
    let origin = ReqwestOrigin::new(config).context("failed to build origin client")?;
    let proxy = ImageProxy::new(config, origin, ImageResizer::from_config(config));
    Ok(ImageProxyService::new(PixgateHandler(Arc::new(proxy))))
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve<H: ImageHandler>(listener: TcpListener, service: ImageProxyService<H>) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Request the health endpoint over a raw connection.
///
/// Exits with code 0 if healthy, 1 otherwise.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET /_health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"status\":\"running\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ProxyConfig::from_env();

    // Handle --health-check flag for Docker HEALTHCHECK.
    if std::env::args().any(|a| a == "--health-check") {
        let addr = config.gateway_listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    init_tracing(&config.log_level, json_logs)?;

    info!(
        gateway_listen = %config.gateway_listen,
        whitelist = ?config.whitelist,
        fetch_timeout_ms = config.fetch_timeout_ms,
        max_redirects = config.max_redirects,
        max_dimension = config.max_dimension,
        version = VERSION,
        "starting Pixgate Server",
    );
    if config.whitelist.is_empty() {
        warn!("PIXGATE_WHITELIST is empty, every request will be rejected");
    }

    let service = build_service(&config)?;

    let addr: SocketAddr = config
        .gateway_listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.gateway_listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    serve(listener, service).await
}
