//! Redirect handling against a live origin.

#[cfg(test)]
mod tests {
    use crate::{TestOrigin, TestProxy, content_type};

    #[tokio::test]
    async fn test_should_follow_redirects() {
        let origin = TestOrigin::spawn().await.expect("origin");
        let proxy = TestProxy::spawn_default().await.expect("proxy");

        for path in ["/301", "/302", "/location-relative"] {
            let response = proxy
                .get(&format!("/{}/100/100", origin.encoded(path)))
                .await
                .expect("proxy reachable");
            assert_eq!(response.status(), 200, "{path}");
            assert_eq!(content_type(&response).as_deref(), Some("image/png"));
            assert_eq!(
                response
                    .headers()
                    .get("cache-control")
                    .and_then(|v| v.to_str().ok()),
                Some("max-age=31536000, public")
            );
        }
    }

    #[tokio::test]
    async fn test_should_fail_on_unusable_location() {
        let origin = TestOrigin::spawn().await.expect("origin");
        let proxy = TestProxy::spawn_default().await.expect("proxy");

        for path in ["/location-empty", "/location-missing"] {
            let response = proxy
                .get(&format!("/{}/100/100", origin.encoded(path)))
                .await
                .expect("proxy reachable");
            assert_eq!(response.status(), 404, "{path}");
            assert_eq!(
                response.text().await.expect("body"),
                "Expected response code 200, got 302"
            );
        }
    }

    #[tokio::test]
    async fn test_should_stop_redirect_loops() {
        let origin = TestOrigin::spawn().await.expect("origin");
        let proxy = TestProxy::spawn_default().await.expect("proxy");

        let response = proxy
            .get(&format!("/{}/100/100", origin.encoded("/loop")))
            .await
            .expect("proxy reachable");
        assert_eq!(response.status(), 404);
        assert_eq!(
            response.text().await.expect("body"),
            "Expected at most 5 redirects"
        );
        assert_eq!(origin.hits(), 1);
    }
}
