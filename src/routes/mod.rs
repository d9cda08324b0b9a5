use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::state::AppState;

pub mod categories;
pub mod dashboard;
pub mod document_types;
pub mod documents;
pub mod entities;
pub mod folders;
pub mod health;
pub mod sync;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        let allow_origin = AllowOrigin::list(headers);

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let entities_routes = Router::new()
        .route(
            "/",
            get(entities::list_entities).post(entities::create_entity),
        )
        .route("/:id", patch(entities::update_entity));

    let categories_routes = Router::new()
        .route(
            "/",
            get(categories::list_categories).post(categories::create_category),
        )
        .route("/:id", patch(categories::update_category));

    let document_types_routes = Router::new()
        .route(
            "/",
            get(document_types::list_document_types).post(document_types::create_document_type),
        )
        .route(
            "/:id",
            patch(document_types::update_document_type)
                .delete(document_types::delete_document_type),
        );

    let documents_routes = Router::new()
        .route(
            "/",
            get(documents::list_documents).post(documents::upload_document),
        )
        .route(
            "/:id",
            get(documents::get_document).patch(documents::update_document),
        )
        .route("/:id/status", post(documents::change_document_status))
        .route("/:id/file", get(documents::serve_document));

    let sync_routes = Router::new().route("/", post(sync::run_sync).get(sync::sync_status));

    Router::new()
        .nest("/api/entities", entities_routes)
        .nest("/api/categories", categories_routes)
        .nest("/api/document-types", document_types_routes)
        .nest("/api/documents", documents_routes)
        .nest("/api/sync", sync_routes)
        .route("/api/folders/rebuild", post(folders::rebuild_folders))
        .route("/api/dashboard", get(dashboard::dashboard))
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 512))
}
