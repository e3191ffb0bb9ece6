use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, MethodRouter},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{
    auth::{authenticate, require_permission, Permission},
    state::AppState,
};

pub mod approvals;
pub mod auth;
pub mod documents;
pub mod health;
pub mod sections;

/// Restricts a method route to roles holding `permission`. Must sit inside `authenticate`.
fn gated(permission: Permission, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(permission, require_permission))
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let allow_origin = match state.config.cors_allowed_origin.as_ref() {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        warn!(origin = %value, "ignoring invalid CORS allowed origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(tower_http::cors::AllowMethods::mirror_request())
        .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(&state);
    let max_upload_bytes = state.config.max_upload_bytes;

    let documents_routes = Router::new()
        .route(
            "/",
            get(documents::list_documents).post(documents::upload_document),
        )
        .route(
            "/:id",
            get(documents::get_document).merge(gated(
                Permission::DeleteDocument,
                delete(documents::delete_document),
            )),
        )
        .route("/:id/file", get(documents::download_document))
        .route(
            "/:id/approvals",
            get(approvals::list_approvals).merge(gated(
                Permission::ReviewDocument,
                post(approvals::create_approval),
            )),
        );

    let protected_routes = Router::new()
        .nest("/api/documents", documents_routes)
        .route("/api/sections", get(sections::list_sections))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .merge(protected_routes)
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
