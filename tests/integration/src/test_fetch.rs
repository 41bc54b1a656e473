//! Origin response validation and the fetch deadline.

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use crate::{TestOrigin, TestProxy, content_type, tls_config};

    const CONTENT_TYPE_PREFIX: &str =
        "Expected content type image/gif, image/jpeg, image/png, image/jpg, got ";

    #[tokio::test]
    async fn test_should_reject_non_200_origin_status() {
        let origin = TestOrigin::spawn().await.expect("origin");
        let proxy = TestProxy::spawn_default().await.expect("proxy");

        let response = proxy
            .get(&format!("/{}/100/100", origin.encoded("/404")))
            .await
            .expect("proxy reachable");
        assert_eq!(response.status(), 404);
        assert_eq!(
            content_type(&response).as_deref(),
            Some("text/html; charset=utf-8")
        );
        assert_eq!(
            response.text().await.expect("body"),
            "Expected response code 200, got 404"
        );
    }

    #[tokio::test]
    async fn test_should_reject_bad_content_types() {
        let origin = TestOrigin::spawn().await.expect("origin");
        let proxy = TestProxy::spawn_default().await.expect("proxy");

        for (path, got) in [
            ("/content-type-invalid", "text/plain"),
            ("/content-type-empty", ""),
            ("/content-type-missing", ""),
        ] {
            let response = proxy
                .get(&format!("/{}/100/100", origin.encoded(path)))
                .await
                .expect("proxy reachable");
            assert_eq!(response.status(), 404, "{path}");
            assert_eq!(
                response.text().await.expect("body"),
                format!("{CONTENT_TYPE_PREFIX}{got}")
            );
        }
    }

    #[tokio::test]
    async fn test_should_time_out_slow_origins() {
        let origin = TestOrigin::spawn().await.expect("origin");
        let proxy = TestProxy::spawn_default().await.expect("proxy");

        let started = Instant::now();
        let response = proxy
            .get(&format!("/{}/100/100", origin.encoded("/timeout")))
            .await
            .expect("proxy reachable");
        assert_eq!(response.status(), 504);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(response.bytes().await.expect("body").is_empty());
    }

    #[tokio::test]
    async fn test_should_send_accept_header() {
        let origin = TestOrigin::spawn().await.expect("origin");
        let proxy = TestProxy::spawn_default().await.expect("proxy");

        let response = proxy
            .get(&format!(
                "/{}/100/100",
                origin.encoded("/error-without-accept-header")
            ))
            .await
            .expect("proxy reachable");
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_should_fail_closed_when_origin_is_down() {
        let origin = TestOrigin::spawn().await.expect("origin");
        let proxy = TestProxy::spawn_default().await.expect("proxy");

        // Bind and release a port so nothing listens on it.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let dead = listener.local_addr().expect("addr");
        drop(listener);

        let response = proxy
            .get(&format!(
                "/{}/100/100",
                crate::encode(&format!("http://{dead}/test.png"))
            ))
            .await
            .expect("proxy reachable");
        assert_eq!(response.status(), 500);
        assert!(response.bytes().await.expect("body").is_empty());
        assert_eq!(origin.hits(), 0);
    }

    #[tokio::test]
    async fn test_should_fetch_from_self_signed_https_origin() {
        let origin = TestOrigin::spawn_tls().await.expect("origin");
        let proxy = TestProxy::spawn(&tls_config(true)).await.expect("proxy");

        let response = proxy
            .get(&format!("/{}/100/100", origin.encoded("/test.png")))
            .await
            .expect("proxy reachable");
        assert_eq!(response.status(), 200);
        assert_eq!(content_type(&response).as_deref(), Some("image/png"));
        assert_eq!(
            response
                .headers()
                .get("cache-control")
                .and_then(|v| v.to_str().ok()),
            Some("max-age=31536000, public")
        );
        let body = response.bytes().await.expect("body");
        let img = image::load_from_memory(&body).expect("decodable rendition");
        assert_eq!((img.width(), img.height()), (100, 50));
    }

    #[tokio::test]
    async fn test_should_send_accept_header_over_https() {
        let origin = TestOrigin::spawn_tls().await.expect("origin");
        let proxy = TestProxy::spawn(&tls_config(true)).await.expect("proxy");

        let response = proxy
            .get(&format!(
                "/{}/100/100",
                origin.encoded("/error-without-accept-header")
            ))
            .await
            .expect("proxy reachable");
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_should_reject_self_signed_origin_by_default() {
        let origin = TestOrigin::spawn_tls().await.expect("origin");
        let proxy = TestProxy::spawn(&tls_config(false)).await.expect("proxy");

        let response = proxy
            .get(&format!("/{}/100/100", origin.encoded("/test.png")))
            .await
            .expect("proxy reachable");
        assert_eq!(response.status(), 500);
        assert!(response.bytes().await.expect("body").is_empty());
        assert_eq!(origin.hits(), 0);
    }
}
