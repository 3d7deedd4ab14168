use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::artifacts;
use super::generate;
use super::health;
use super::middleware::logging_middleware;
use super::state::AppState;
use crate::config::CorsConfig;

/// Create the full router with application state
pub fn create_router_with_state(state: AppState) -> Router {
    let cors = cors_layer(&state.cors);
    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);

    Router::new()
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        // Generation endpoints
        .route(
            "/api/generate-coin",
            post(generate::generate_coin).fallback(generate::method_not_allowed),
        )
        .route(
            "/api/generate-coin-faces",
            post(generate::generate_coin_faces).fallback(generate::method_not_allowed),
        )
        .route(
            "/api/artifacts/{id}",
            get(artifacts::download_artifact).fallback(generate::method_not_allowed),
        )
        .layer(body_limit)
        .with_state(state)
        .layer(middleware::from_fn(logging_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Wildcard origin in development, one exact origin in production.
///
/// The layer answers every OPTIONS request itself.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = if config.is_wildcard() {
        AllowOrigin::any()
    } else {
        match HeaderValue::from_str(config.allowed_origin.trim()) {
            Ok(origin) => AllowOrigin::exact(origin),
            Err(_) => {
                warn!(origin = %config.allowed_origin, "Invalid CORS origin, cross-origin requests disabled");
                AllowOrigin::list(Vec::<HeaderValue>::new())
            }
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::config::{AppConfig, ArtifactConfig, FeatureConfig};
    use crate::domain::ModelPipeline;
    use crate::domain::pipeline::raster::tests::white_png;
    use crate::infrastructure::artifacts::ArtifactStore;
    use crate::infrastructure::generation::mock::MockHttpClient;
    use crate::infrastructure::generation::{OpenAiImageGenerator, OpenAiReferenceDescriber};
    use crate::infrastructure::services::{GenerationService, REFERENCE_FALLBACK_MESSAGE};

    const IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";
    const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

    struct TestApp {
        router: Router,
        client: Arc<MockHttpClient>,
        _dir: tempfile::TempDir,
    }

    fn app(client: MockHttpClient, features: FeatureConfig, cors_origin: &str) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(client);

        let mut config = AppConfig::default();
        config.cors.allowed_origin = cors_origin.to_string();
        config.artifacts = ArtifactConfig {
            directory: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let artifacts = Arc::new(ArtifactStore::new(&config.artifacts).unwrap());
        let service = GenerationService::new(
            Arc::new(OpenAiImageGenerator::new(client.clone(), "k", "gpt-image-1")),
            Arc::new(OpenAiReferenceDescriber::new(client.clone(), "k", "gpt-4o-mini")),
            ModelPipeline::default(),
            artifacts,
            features,
        );

        TestApp {
            router: create_router_with_state(AppState::new(service, &config)),
            client,
            _dir: dir,
        }
    }

    fn default_app(client: MockHttpClient) -> TestApp {
        app(client, FeatureConfig::default(), "*")
    }

    fn inline(bytes: &[u8]) -> Value {
        json!({"data": [{"b64_json": BASE64.encode(bytes)}]})
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let app = default_app(MockHttpClient::new());

        for uri in ["/health", "/live", "/ready"] {
            let response = app
                .router
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_missing_description_is_400() {
        let app = default_app(MockHttpClient::new());

        let bodies = [
            json!({}),
            json!({"shape": "round", "finish": "gold"}),
            json!({"description": "   ", "engraving": "1776"}),
        ];
        for body in bodies {
            let response = app
                .router
                .clone()
                .oneshot(post_json("/api/generate-coin", body))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let json = body_json(response).await;
            assert_eq!(json["success"], false);
            assert_eq!(json["error"], "Description is required");
        }

        assert!(app.client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_empty_body_is_400() {
        let app = default_app(MockHttpClient::new());
        let response = app
            .router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/generate-coin")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_other_methods_are_405() {
        let app = default_app(MockHttpClient::new());

        for method in ["GET", "PUT", "DELETE", "PATCH"] {
            let response = app
                .router
                .clone()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri("/api/generate-coin")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{}", method);
            assert_eq!(body_json(response).await["error"], "Method not allowed");
        }
    }

    #[tokio::test]
    async fn test_options_returns_200_with_cors_headers() {
        let app = default_app(MockHttpClient::new());

        let preflight = Request::builder()
            .method("OPTIONS")
            .uri("/api/generate-coin")
            .header("origin", "https://shop.example.com")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(preflight).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert!(response.headers().contains_key("access-control-allow-methods"));

        let plain = Request::builder()
            .method("OPTIONS")
            .uri("/api/generate-coin")
            .body(Body::empty())
            .unwrap();
        let response = app.router.oneshot(plain).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let methods = response.headers()["access-control-allow-methods"]
            .to_str()
            .unwrap()
            .to_string();
        assert!(methods.contains("POST"));
        assert!(methods.contains("OPTIONS"));
        let allowed_headers = response.headers()["access-control-allow-headers"]
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(allowed_headers.contains("content-type"));
        assert!(allowed_headers.contains("authorization"));
        assert!(app.client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_artifacts_other_methods_are_405_json() {
        let app = default_app(MockHttpClient::new());
        let response = app
            .router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/artifacts/00000000-0000-0000-0000-000000000000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Method not allowed");
    }

    #[tokio::test]
    async fn test_ready_degraded_when_store_unwritable_in_base64_mode() {
        let app = default_app(MockHttpClient::new());
        std::fs::remove_dir_all(app._dir.path()).unwrap();

        let response = app
            .router
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "degraded");
    }

    #[tokio::test]
    async fn test_ready_unhealthy_when_store_unwritable_in_url_mode() {
        let features = FeatureConfig {
            output_format: crate::config::OutputFormat::Url,
            ..Default::default()
        };
        let app = app(MockHttpClient::new(), features, "*");
        std::fs::remove_dir_all(app._dir.path()).unwrap();

        let response = app
            .router
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["status"], "unhealthy");
    }

    #[tokio::test]
    async fn test_exact_origin() {
        let app = app(
            MockHttpClient::new().with_response(IMAGES_URL, inline(b"img")),
            FeatureConfig::default(),
            "https://allegiancecoin.com",
        );

        let mut request = post_json("/api/generate-coin", json!({"description": "eagle"}));
        request
            .headers_mut()
            .insert("origin", HeaderValue::from_static("https://allegiancecoin.com"));
        let response = app.router.oneshot(request).await.unwrap();

        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://allegiancecoin.com"
        );
    }

    #[tokio::test]
    async fn test_description_only_success() {
        let app = default_app(MockHttpClient::new().with_response(IMAGES_URL, inline(b"img")));

        let response = app
            .router
            .oneshot(post_json(
                "/api/generate-coin",
                json!({"description": "eagle with shield", "shape": "round"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["imageBase64"], BASE64.encode(b"img"));
        assert_eq!(json["shape"], "round");
        assert!(json.get("imagesUsed").is_none());
    }

    #[tokio::test]
    async fn test_vision_rejection_falls_back() {
        let app = default_app(
            MockHttpClient::new()
                .with_content_policy_error(CHAT_URL, "Your request was rejected by the safety system")
                .with_response(IMAGES_URL, inline(b"img")),
        );

        let response = app
            .router
            .oneshot(post_json(
                "/api/generate-coin",
                json!({
                    "description": "eagle with shield",
                    "images": [{"data": BASE64.encode(white_png(512, 512)), "mediaType": "image/png"}]
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["imagesUsed"], false);
        assert_eq!(json["message"], REFERENCE_FALLBACK_MESSAGE);
        assert!(json["imageBase64"].is_string());
    }

    #[tokio::test]
    async fn test_white_image_yields_empty_model() {
        let features = FeatureConfig {
            generate_model: true,
            ..Default::default()
        };
        let app = app(
            MockHttpClient::new().with_response(IMAGES_URL, inline(&white_png(512, 512))),
            features,
            "*",
        );

        let response = app
            .router
            .oneshot(post_json("/api/generate-coin", json!({"description": "eagle with shield"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["emptyModel"], true);
        let glb = BASE64.decode(json["glbBase64"].as_str().unwrap()).unwrap();
        assert_eq!(&glb[0..4], b"glTF");
    }

    #[tokio::test]
    async fn test_faces_back_failure_is_single_500() {
        let app = default_app(
            MockHttpClient::new()
                .with_error_when(IMAGES_URL, "back side", "HTTP 500: upstream unavailable")
                .with_response(IMAGES_URL, inline(b"img")),
        );

        let response = app
            .router
            .oneshot(post_json(
                "/api/generate-coin-faces",
                json!({"description": "eagle with shield"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["details"], "HTTP 500: upstream unavailable");
        assert!(json.get("front").is_none());
    }

    #[tokio::test]
    async fn test_faces_success() {
        let app = default_app(MockHttpClient::new().with_response(IMAGES_URL, inline(b"img")));

        let response = app
            .router
            .oneshot(post_json(
                "/api/generate-coin-faces",
                json!({"description": "eagle with shield", "backDescription": "liberty bell"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["front"]["imageBase64"].is_string());
        assert!(json["back"]["imageBase64"].is_string());
    }

    #[tokio::test]
    async fn test_upstream_failure_is_500_with_details() {
        let app = default_app(MockHttpClient::new().with_error(IMAGES_URL, "HTTP 401: Incorrect API key"));

        let response = app
            .router
            .oneshot(post_json("/api/generate-coin", json!({"description": "eagle"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Image generation failed");
        assert_eq!(json["details"], "HTTP 401: Incorrect API key");
    }

    #[tokio::test]
    async fn test_url_output_is_downloadable() {
        let features = FeatureConfig {
            output_format: crate::config::OutputFormat::Url,
            ..Default::default()
        };
        let app = app(
            MockHttpClient::new().with_response(IMAGES_URL, inline(&white_png(512, 512))),
            features,
            "*",
        );

        let response = app
            .router
            .clone()
            .oneshot(post_json("/api/generate-coin", json!({"description": "eagle"})))
            .await
            .unwrap();
        let json = body_json(response).await;
        let url = json["imageUrl"].as_str().unwrap().to_string();

        let response = app
            .router
            .oneshot(Request::builder().uri(&url).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "image/png");
    }

    #[tokio::test]
    async fn test_unknown_artifact_is_404() {
        let app = default_app(MockHttpClient::new());
        let response = app
            .router
            .oneshot(
                Request::builder()
                    .uri("/api/artifacts/00000000-0000-0000-0000-000000000000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["success"], false);
    }
}
