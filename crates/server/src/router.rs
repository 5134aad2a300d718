//! Route table for the proxy and its admin interface.

use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{admin, proxy};

/// Admin routes when configured, the proxy handler for everything else.
pub fn build(state: AppState) -> Router {
    let mut router: Router<AppState> = Router::new();

    if let Some(path) = state.admin_path.as_deref() {
        router = router
            .route(path, get(admin::page))
            .route(&format!("{path}/submit"), post(admin::submit))
            .route_layer(middleware::from_fn_with_state(state.clone(), absolute_form_to_proxy));
    }

    router
        .fallback(proxy::handle)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Absolute-form requests name a remote URL, so they go to the proxy even
/// when their path matches an admin route.
async fn absolute_form_to_proxy(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if request.uri().scheme().is_none() {
        return next.run(request).await;
    }

    let (parts, _body) = request.into_parts();
    proxy::handle(State(state), parts.uri, parts.headers).await.into_response()
}
