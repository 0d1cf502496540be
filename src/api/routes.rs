//! API route definitions

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use super::middleware::{enforce_rate_limit, RateLimitScope, RouteGroup};
use super::server::AppState;

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    let limited = |group: RouteGroup, router: Router<AppState>| {
        router.route_layer(from_fn_with_state(
            RateLimitScope {
                limiter: state.rate_limiter.clone(),
                group,
            },
            enforce_rate_limit,
        ))
    };

    // Service info (no auth required)
    let info = Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health_check))
        .route("/token-stats", get(handlers::health::token_stats));

    let trending = Router::new().route("/videos", get(handlers::trending::trending_videos));

    let user = Router::new()
        .route("/:username/info", get(handlers::user::user_info))
        .route("/:username/videos", get(handlers::user::user_videos))
        .route("/:username/followers", get(handlers::user::user_followers))
        .route("/:username/following", get(handlers::user::user_following));

    let video = Router::new()
        .route("/parse-url", post(handlers::video::parse_url))
        .route("/by-url", get(handlers::video::video_by_url))
        .route("/download-info", get(handlers::video::download_info))
        .route("/download-stream", get(handlers::video::download_stream))
        .route("/:video_id", get(handlers::video::video_info))
        .route("/:video_id/comments", get(handlers::video::video_comments));

    let hashtag = Router::new()
        .route("/:hashtag/info", get(handlers::hashtag::hashtag_info))
        .route("/:hashtag/videos", get(handlers::hashtag::hashtag_videos));

    let search = Router::new()
        .route("/users", get(handlers::search::search_users))
        .route("/videos", get(handlers::search::search_videos));

    let sound = Router::new()
        .route("/:sound_id/info", get(handlers::sound::sound_info))
        .route("/:sound_id/videos", get(handlers::sound::sound_videos));

    let proxy = Router::new().route("/status", get(handlers::proxy::proxy_status));

    let api_v1 = Router::new()
        .nest("/trending", limited(RouteGroup::Trending, trending))
        .nest("/user", limited(RouteGroup::User, user))
        .nest("/video", limited(RouteGroup::Video, video))
        .nest("/hashtag", limited(RouteGroup::Hashtag, hashtag))
        .nest("/search", limited(RouteGroup::Search, search))
        .nest("/sound", limited(RouteGroup::Sound, sound))
        .nest("/proxy", limited(RouteGroup::Proxy, proxy));

    Router::new()
        .merge(limited(RouteGroup::Health, info))
        .nest("/api/v1", api_v1)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::middleware::RateLimiter;
    use crate::config::{
        AuthConfig, Config, Environment, LogConfig, ProxyConfig, ScraperConfig, ServerConfig,
        TokenConfig,
    };
    use crate::credential::{CredentialPool, CredentialStrategy};
    use crate::rotation::SelectionStrategy;
    use crate::services::{ScrapeService, WebSessionBackend};
    use crate::session::LeaseCoordinator;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "test-api-key";

    fn test_config(base_url: &str) -> Config {
        Config {
            environment: Environment::Testing,
            server: ServerConfig {
                port: 8000,
                host: "127.0.0.1".to_string(),
                cors_origins: vec![],
                rate_limit_enabled: true,
            },
            auth: AuthConfig {
                api_keys: vec![KEY.to_string()],
            },
            tokens: TokenConfig {
                ms_tokens: vec![],
                strategy: CredentialStrategy::RoundRobin,
                evict_interval_secs: 3600,
                max_unhealthy_hours: 24,
            },
            proxy: ProxyConfig {
                enabled: false,
                provider: "webshare".to_string(),
                webshare_api_key: None,
                webshare_base_url: "https://proxy.webshare.io".to_string(),
                webshare_cookie: None,
                algorithm: SelectionStrategy::RoundRobin,
                refresh_secs: 0,
                fetch_timeout_secs: 30,
            },
            scraper: ScraperConfig {
                base_url: base_url.to_string(),
                request_timeout_secs: 5,
                user_agent: "test".to_string(),
            },
            log: LogConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    fn app(server: &MockServer, tokens: &[&str]) -> (Arc<CredentialPool>, Router) {
        let pool = Arc::new(CredentialPool::new(
            tokens.iter().copied(),
            CredentialStrategy::RoundRobin,
        ));
        let backend = Arc::new(WebSessionBackend::new(server.uri()));
        let scraper = Arc::new(ScrapeService::new(LeaseCoordinator::new(
            pool.clone(),
            None,
            backend,
        )));
        let state = AppState::new(test_config(&server.uri()), scraper, RateLimiter::new(true));
        (pool, create_router(state))
    }

    fn get_request(uri: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(key) = key {
            builder = builder.header("X-API-Key", key);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("X-API-Key", KEY)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_requires_no_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/recommend/item_list/"))
            .and(query_param("count", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "statusCode": 0,
                "itemList": [{ "id": "1" }],
                "hasMore": true
            })))
            .expect(1)
            .mount(&server)
            .await;
        let (_, app) = app(&server, &["token-a"]);

        let response = app.oneshot(get_request("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_health_unhealthy_when_upstream_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let (pool, app) = app(&server, &["token-a"]);

        let response = app.oneshot(get_request("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "unhealthy");
        assert!(body["message"].as_str().unwrap().contains("Upstream: unhealthy"));
        assert_eq!(pool.health("token-a").unwrap().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_health_unhealthy_without_tokens() {
        let server = MockServer::start().await;
        let (_, app) = app(&server, &[]);

        let response = app.oneshot(get_request("/health", None)).await.unwrap();
        let body = json_body(response).await;
        assert_eq!(body["status"], "unhealthy");
    }

    #[tokio::test]
    async fn test_token_stats_masks_tokens() {
        let server = MockServer::start().await;
        let (_, app) = app(&server, &["abcdefghijklmnopqrstuvwxyz"]);

        let response = app.oneshot(get_request("/token-stats", None)).await.unwrap();
        let body = json_body(response).await;

        assert_eq!(body["token_stats"]["total_credentials"], 1);
        assert_eq!(
            body["token_stats"]["details"][0]["credential"],
            "abcdefghij..."
        );
    }

    #[tokio::test]
    async fn test_api_key_required() {
        let server = MockServer::start().await;
        let (_, app) = app(&server, &["token-a"]);

        let response = app
            .clone()
            .oneshot(get_request("/api/v1/trending/videos", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(get_request("/api/v1/trending/videos", Some("wrong")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = json_body(response).await;
        assert_eq!(body["status_code"], 403);
    }

    #[tokio::test]
    async fn test_trending_clamps_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/recommend/item_list/"))
            .and(query_param("count", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "statusCode": 0,
                "itemList": [{ "id": "1" }],
                "hasMore": true
            })))
            .expect(1)
            .mount(&server)
            .await;
        let (_, app) = app(&server, &["token-a"]);

        let response = app
            .oneshot(get_request("/api/v1/trending/videos?count=0", Some(KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["items"][0]["id"], "1");
    }

    #[tokio::test]
    async fn test_exhausted_pool_returns_503() {
        let server = MockServer::start().await;
        let (_, app) = app(&server, &[]);

        let response = app
            .oneshot(get_request("/api/v1/user/someone/info", Some(KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = json_body(response).await;
        assert_eq!(body["error"], "Service Unavailable");
    }

    #[tokio::test]
    async fn test_ms_token_header_overrides_pool() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/challenge/detail/"))
            .and(query_param("msToken", "my-own-token"))
            .and(query_param("challengeName", "rust"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "statusCode": 0,
                "challengeInfo": { "challenge": { "id": "99", "title": "rust" } }
            })))
            .expect(1)
            .mount(&server)
            .await;
        let (pool, app) = app(&server, &[]);

        let request = Request::builder()
            .uri("/api/v1/hashtag/%23rust/info")
            .header("X-API-Key", KEY)
            .header("X-MS-Token", "my-own-token")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(pool.is_empty());

        let body = json_body(response).await;
        assert_eq!(body["item"]["challenge"]["id"], "99");
    }

    #[tokio::test]
    async fn test_upstream_failure_returns_502() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let (pool, app) = app(&server, &["token-a"]);

        let response = app
            .oneshot(get_request("/api/v1/sound/42/info", Some(KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(pool.health("token-a").unwrap().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_video_parse_url() {
        let server = MockServer::start().await;
        let (_, app) = app(&server, &["token-a"]);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/video/parse-url",
                json!({ "url": "https://www.tiktok.com/@a/video/7001" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["video_id"], "7001");
        assert_eq!(body["original_url"], "https://www.tiktok.com/@a/video/7001");

        let response = app
            .clone()
            .oneshot(post_json("/api/v1/video/parse-url", json!({ "url": "  " })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(get_request(
                "/api/v1/video/parse-url?url=https%3A%2F%2Fwww.tiktok.com%2F%40a%2Fvideo%2F7001",
                Some(KEY),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = app
            .oneshot(get_request("/api/v1/video/not-a-video", Some(KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let server = MockServer::start().await;
        let (_, app) = app(&server, &["token-a"]);

        let response = app
            .oneshot(get_request("/api/v1/search/users?q=%20", Some(KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_proxy_status_disabled() {
        let server = MockServer::start().await;
        let (_, app) = app(&server, &["token-a"]);

        let response = app
            .oneshot(get_request("/api/v1/proxy/status", Some(KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["enabled"], false);
        assert_eq!(body["provider"], "none");
        assert_eq!(body["proxy_count"], 0);
    }

    #[tokio::test]
    async fn test_proxy_status_rate_limited() {
        let server = MockServer::start().await;
        let (_, app) = app(&server, &["token-a"]);

        for _ in 0..RouteGroup::Proxy.per_minute() {
            let response = app
                .clone()
                .oneshot(get_request("/api/v1/proxy/status", Some(KEY)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(get_request("/api/v1/proxy/status", Some(KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    async fn mount_user(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/user/detail/"))
            .and(query_param("uniqueId", "creator"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "statusCode": 0,
                "userInfo": { "user": { "uniqueId": "creator", "secUid": "SEC1" } }
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_user_followers_and_following_routes() {
        let server = MockServer::start().await;
        mount_user(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/user/list/"))
            .and(query_param("scene", "67"))
            .and(query_param("count", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "userList": [{ "user": { "uniqueId": "fan1" } }, { "user": { "uniqueId": "fan2" } }],
                "hasMore": true,
                "cursor": "2"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/user/list/"))
            .and(query_param("scene", "21"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "userList": [{ "user": { "uniqueId": "idol" } }],
                "hasMore": false
            })))
            .expect(1)
            .mount(&server)
            .await;
        let (_, app) = app(&server, &["token-a"]);

        let response = app
            .clone()
            .oneshot(get_request("/api/v1/user/@creator/followers?count=2", Some(KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["subject"], "creator");

        let response = app
            .oneshot(get_request("/api/v1/user/creator/following", Some(KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["items"][0]["user"]["uniqueId"], "idol");
    }

    #[tokio::test]
    async fn test_video_comments_route() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/comment/list/"))
            .and(query_param("aweme_id", "7001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "comments": [{ "cid": "1", "text": "nice" }],
                "has_more": 0
            })))
            .expect(1)
            .mount(&server)
            .await;
        let (_, app) = app(&server, &["token-a"]);

        let response = app
            .oneshot(get_request("/api/v1/video/7001/comments", Some(KEY)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["subject"], "7001");
        assert_eq!(body["items"][0]["text"], "nice");
    }

    async fn mount_video_detail(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/item/detail/"))
            .and(query_param("itemId", "7001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "statusCode": 0,
                "itemInfo": { "itemStruct": {
                    "id": "7001",
                    "video": {
                        "playAddr": format!("{}/media/play.mp4", server.uri()),
                        "downloadAddr": format!("{}/media/download.mp4", server.uri()),
                        "duration": 9
                    }
                }}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_download_info_route() {
        let server = MockServer::start().await;
        mount_video_detail(&server).await;
        let (_, app) = app(&server, &["token-a"]);

        let response = app
            .clone()
            .oneshot(get_request(
                "/api/v1/video/download-info?url=https%3A%2F%2Fwww.tiktok.com%2F%40a%2Fvideo%2F7001&quality=sd",
                Some(KEY),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["video_id"], "7001");
        assert_eq!(body["quality"], "sd");
        assert_eq!(body["watermark"], false);
        assert_eq!(body["duration"], 9);
        assert_eq!(
            body["original_url"],
            "https://www.tiktok.com/@a/video/7001"
        );
        assert_eq!(
            body["download_urls"]["without_watermark"],
            format!("{}/media/download.mp4", server.uri())
        );

        let response = app
            .oneshot(get_request(
                "/api/v1/video/download-info?url=7001&quality=ultra",
                Some(KEY),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_stream_route() {
        let server = MockServer::start().await;
        mount_video_detail(&server).await;
        Mock::given(method("GET"))
            .and(path("/media/play.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp4-bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        let (_, app) = app(&server, &["token-a"]);

        let response = app
            .oneshot(get_request(
                "/api/v1/video/download-stream?url=7001&watermark=true",
                Some(KEY),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "video/mp4");
        assert_eq!(
            response.headers()["content-disposition"],
            "attachment; filename=tiktok_video_7001_watermarked.mp4"
        );

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.as_ref(), b"mp4-bytes");
    }
}
