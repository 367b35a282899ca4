use axum::{
    http::{header, HeaderValue, Method},
    middleware, Json, Router,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::auth::middleware::JwtSecret;
use crate::presence;
use crate::state::AppState;
use crate::tasks::crud as task_crud;
use crate::users;
use crate::ws::handler as ws_handler;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// CORS for the browser frontend. Unparseable origins are skipped with a warning.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Task CRUD (JWT required, CurrentUser extractor validates token and user)
    let task_routes = Router::new()
        .route(
            "/api/v1/tasks",
            axum::routing::get(task_crud::list_tasks).post(task_crud::create_task),
        )
        .route(
            "/api/v1/tasks/{id}",
            axum::routing::get(task_crud::get_task)
                .put(task_crud::update_task)
                .delete(task_crud::delete_task),
        );

    // Guest login is public; the rest needs a bearer token for a known user
    let auth_routes = Router::new()
        .route("/api/v1/auth/guest", axum::routing::post(users::login_as_guest))
        .route("/api/v1/auth/me", axum::routing::get(users::get_me))
        .route("/api/v1/auth/users", axum::routing::get(users::list_users));

    let presence_routes = Router::new()
        .route("/api/v1/presence", axum::routing::get(presence::get_presence))
        .route(
            "/api/v1/presence/{user_id}",
            axum::routing::get(presence::get_user_presence),
        );

    // WebSocket endpoint (auth via query param, not JWT header)
    let ws_routes = Router::new().route("/ws", axum::routing::get(ws_handler::ws_upgrade));

    let public_routes = Router::new()
        .route("/", axum::routing::get(root))
        .route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(auth_routes)
        .merge(task_routes)
        .merge(presence_routes)
        .merge(ws_routes)
        .merge(public_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Taskboard API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Basic health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}
