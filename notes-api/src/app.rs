use aide::scalar::Scalar;
use axum::{
    http::HeaderValue,
    middleware::{self},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config;

use rand::Rng;
use serde_json::json;

use crate::{
    auth::Authenticator,
    db::DB,
    errors::{self, on_error, ErrorResponseDocs},
    openapi::{self, aide::axum::ApiRouter, OpenApi},
};

const API_PREFIX: &str = "/api/v1";

pub struct AppParams {
    pub db: DB,
    pub authenticator: Authenticator,
    pub router: ApiRouter,
}

pub async fn create(
    AppParams {
        db,
        authenticator,
        router,
    }: AppParams,
) -> errors::Result<(Router, OpenApi)> {
    let mut api = OpenApi::default();
    let config = config();

    let docs_router = axum::Router::new()
        .route(
            "/__docs__",
            get(Scalar::new("/__docs__/spec.json")
                .with_title(&config.project_name)
                .axum_handler()),
        )
        .route("/__docs__/spec.json", get(serve_docs));

    let app = ApiRouter::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/__version__", get(version))
        .route("/__heartbeat__", get(heartbeat))
        .route("/__lbheartbeat__", get(lbheartbeat))
        .merge(docs_router)
        .merge(router)
        .finish_api_with(&mut api, |t| {
            t.title(&config.project_name)
                .version(app_version())
                .default_response::<openapi::Json<ErrorResponseDocs>>()
        })
        .layer(
            ServiceBuilder::new()
                .layer(cors_layer())
                .layer(Extension(db))
                .layer(Extension(authenticator))
                .layer(Extension(Arc::new(api.clone())))
                .layer(middleware::from_fn(on_error)),
        );

    Ok((app, api))
}

fn cors_layer() -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    match config().allowed_origins() {
        Some(origins) => {
            let origins = origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(origin, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect::<Vec<_>>();
            cors.allow_origin(AllowOrigin::list(origins))
        }
        None => cors.allow_origin(Any),
    }
}

fn app_version() -> &'static str {
    config()
        .app_version
        .as_deref()
        .unwrap_or(env!("CARGO_PKG_VERSION"))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": config().project_name,
        "version": app_version(),
        "docs": "/__docs__",
        "api": API_PREFIX,
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn version() -> impl IntoResponse {
    let config = &config();
    Json(json!({
        "source" : config.source,
        "version": config.version,
        "commit" : config.git_commit,
        "build"  : config.pipeline_id
    }))
}

async fn heartbeat() -> impl IntoResponse {
    let mut rng = rand::thread_rng();
    let random: u32 = rng.gen_range(0..=10000);

    Json(json!({
        "status" : "ok",
        "random": random,
    }))
}

async fn lbheartbeat() -> impl IntoResponse {
    ""
}

async fn serve_docs(Extension(api): Extension<Arc<OpenApi>>) -> impl IntoResponse {
    Json(api.as_ref().clone()).into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::Value;

    use crate::{db::init_test_db, errors::Result, tests::test_server};

    #[tokio::test]
    async fn serves_service_info() -> Result<()> {
        let server = test_server(init_test_db().await?).await?;

        let root = server.get("/").await.json::<Value>();
        assert_eq!(root["api"], "/api/v1");
        assert_eq!(root["docs"], "/__docs__");

        let health = server.get("/health").await;
        assert_eq!(health.status_code(), StatusCode::OK);
        assert_eq!(health.json::<Value>()["status"], "ok");

        assert_eq!(server.get("/__lbheartbeat__").await.status_code(), StatusCode::OK);
        assert_eq!(server.get("/__heartbeat__").await.json::<Value>()["status"], "ok");
        Ok(())
    }

    #[tokio::test]
    async fn documents_note_routes() -> Result<()> {
        let server = test_server(init_test_db().await?).await?;

        let spec = server.get("/__docs__/spec.json").await.json::<Value>();

        assert!(spec["paths"]["/api/v1/notes"]["get"].is_object());
        assert!(spec["paths"]["/api/v1/notes/{note_id}"]["patch"].is_object());
        assert!(spec["paths"]["/api/v1/notes/{note_id}"]["delete"].is_object());
        Ok(())
    }
}
