pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

pub use middleware::require_api_token;
pub use state::AppState;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

/// Builds the REST routes. Subscription routes sit behind the API token guard;
/// health, prayer times and qibla are public.
pub fn router(app_state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(rest::health_handler))
        .route("/prayer-times", get(rest::prayer_times_handler))
        .route("/qibla", get(rest::qibla_handler));

    let protected_routes = Router::new()
        .route("/subscriptions", post(rest::subscribe_handler))
        .route(
            "/subscriptions/{user_id}",
            get(rest::get_subscription_handler).delete(rest::unsubscribe_handler),
        )
        .route(
            "/subscriptions/{user_id}/preferences",
            put(rest::update_preferences_handler),
        )
        .route(
            "/subscriptions/{user_id}/settings",
            put(rest::update_settings_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_api_token,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
