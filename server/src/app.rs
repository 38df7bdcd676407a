use std::path::Path;

use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, Method, header},
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    let static_assets = Router::new()
        .fallback_service(
            ServeDir::new(&state.client_dist_dir)
                .precompressed_br()
                .precompressed_gzip(),
        )
        .layer(middleware::from_fn(set_static_cache_control));

    // Project descriptors are fetched cross-origin by embedding pages.
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_origin(Any);

    let app = Router::new()
        .route("/api/health", get(routes::api::health))
        .route("/api/projects", get(routes::api::list_projects))
        .route("/api/token", get(routes::api::get_token))
        .route("/config/baseconfig.json", get(routes::api::get_base_config))
        .nest_service("/projects", ServeDir::new(&state.projects_dir))
        .layer(middleware::from_fn(set_static_cache_control));

    app.layer(CompressionLayer::new())
        .layer(cors)
        .fallback_service(static_assets)
        .with_state(state)
}

async fn set_static_cache_control(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let mut response = next.run(request).await;

    if response.status().is_success()
        && !response.headers().contains_key(header::CACHE_CONTROL)
        && let Some(cache_control) = cache_control_for_path(&path)
    {
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(cache_control),
        );
    }

    response
}

fn cache_control_for_path(path: &str) -> Option<&'static str> {
    if is_hashed_bundle_asset(path) {
        return Some("public, max-age=31536000, immutable");
    }

    // Descriptors and the base config are edited in place.
    if path.starts_with("/projects/") || path.starts_with("/config/") {
        return Some("no-cache");
    }

    None
}

fn is_hashed_bundle_asset(path: &str) -> bool {
    let Some(ext) = Path::new(path).extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    if !matches!(ext, "wasm" | "js" | "css") {
        return false;
    }

    let Some(filename) = Path::new(path).file_name().and_then(|name| name.to_str()) else {
        return false;
    };

    filename
        .split(['-', '_', '.'])
        .any(|segment| segment.len() >= 8 && segment.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use kartvisning_shared::BaseConfig;
    use tower::ServiceExt;

    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("kartvisning-app-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    #[test]
    fn immutable_cache_for_hashed_bundle_assets() {
        assert_eq!(
            cache_control_for_path("/kartvisning-client-71578f6b278221f3_bg.wasm"),
            Some("public, max-age=31536000, immutable")
        );
        assert_eq!(
            cache_control_for_path("/input-a93762ff3bf6d63a.css"),
            Some("public, max-age=31536000, immutable")
        );
    }

    #[test]
    fn descriptors_are_revalidated() {
        assert_eq!(
            cache_control_for_path("/projects/norgeskart.json"),
            Some("no-cache")
        );
        assert_eq!(
            cache_control_for_path("/config/baseconfig.json"),
            Some("no-cache")
        );
    }

    #[test]
    fn no_cache_header_override_for_html() {
        assert_eq!(cache_control_for_path("/"), None);
        assert_eq!(cache_control_for_path("/index.html"), None);
    }

    #[tokio::test]
    async fn project_descriptors_are_served_from_projects_dir() {
        let projects = scratch_dir("projects");
        std::fs::write(projects.join("turkart.json"), r#"{"config":{}}"#).expect("write descriptor");
        let state = AppState::new(
            BaseConfig::default(),
            projects.clone(),
            scratch_dir("dist-a"),
            None,
        );

        let response = build_app(state)
            .oneshot(
                Request::builder()
                    .uri("/projects/turkart.json")
                    .header("origin", "https://embed.example")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CACHE_CONTROL)
                .and_then(|value| value.to_str().ok()),
            Some("no-cache")
        );
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|value| value.to_str().ok()),
            Some("*")
        );
        let _ = std::fs::remove_dir_all(&projects);
    }

    #[tokio::test]
    async fn missing_descriptor_is_not_found() {
        let state = AppState::new(
            BaseConfig::default(),
            scratch_dir("projects-empty"),
            scratch_dir("dist-b"),
            None,
        );

        let response = build_app(state)
            .oneshot(
                Request::builder()
                    .uri("/projects/ukjent.json")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn client_bundle_is_served_as_fallback() {
        let dist = scratch_dir("dist-c");
        std::fs::write(dist.join("index.html"), "<!doctype html>").expect("write index");
        let state = AppState::new(
            BaseConfig::default(),
            scratch_dir("projects-c"),
            dist.clone(),
            None,
        );

        let response = build_app(state)
            .oneshot(
                Request::builder()
                    .uri("/index.html")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
        let _ = std::fs::remove_dir_all(&dist);
    }
}
