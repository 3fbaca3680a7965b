use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, request::Parts, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::handlers;
use crate::state::AppState;

const JSON_BODY_LIMIT: usize = 5 * 1024 * 1024;
// room for the form fields around the file
const UPLOAD_BODY_LIMIT: usize = handlers::MAX_UPLOAD_BYTES + 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let images_dir = ServeDir::new(&state.paths.images_root);
    let derivatives_dir = ServeDir::new(&state.paths.output_dir);

    Router::new()
        .route("/admin/health", get(handlers::health))
        .route(
            "/admin/images",
            get(handlers::list_images)
                .post(handlers::upload_image)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
                .delete(handlers::delete_images),
        )
        .route("/admin/images/:src", put(handlers::update_image))
        .route("/admin/images/:src/regenerate", post(handlers::regenerate_image))
        .nest_service("/images", images_dir)
        .nest_service("/img", derivatives_dir)
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(middleware::from_fn(reject_foreign_origin))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Only pages served from this machine may call the admin API.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _: &Parts| {
            origin.to_str().map(is_local_origin).unwrap_or(false)
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
}

/// Requests carrying a non-local `Origin` never reach a handler. CORS headers
/// alone would still let a foreign page fire a simple POST.
async fn reject_foreign_origin(request: Request, next: Next) -> Response {
    if let Some(origin) = request.headers().get(header::ORIGIN) {
        if !origin.to_str().map(is_local_origin).unwrap_or(false) {
            tracing::warn!("Rejected {} {} from origin {:?}", request.method(), request.uri(), origin);
            return (StatusCode::FORBIDDEN, "Not allowed by CORS").into_response();
        }
    }
    next.run(request).await
}

fn is_local_origin(origin: &str) -> bool {
    let Some((_, rest)) = origin.split_once("://") else {
        return false;
    };
    let authority = rest.split('/').next().unwrap_or_default();
    let host = match authority.rsplit_once(':') {
        Some((host, port)) if port.bytes().all(|b| b.is_ascii_digit()) => host,
        _ => authority,
    };
    host == "localhost" || host == "127.0.0.1"
}
