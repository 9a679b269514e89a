pub mod admin;
pub mod health;
pub mod tournament;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::middleware::rate_limit::{per_user_rate_limit, RateLimitStore, RateLimiter};
use crate::AppState;

/// Assembles the full application router. The player API sits behind
/// bearer auth plus the per-user quota; the admin API requires the admin
/// role; health stays open.
pub fn router(state: AppState, rate_limit_store: Arc<dyn RateLimitStore>) -> Router {
    let config = crate::config::get_config();
    let limiter = RateLimiter::new(
        rate_limit_store,
        Duration::from_secs(config.rate_limit_window_secs),
        config.rate_limit_max_requests,
    );

    let player_api = Router::new()
        .route("/api/tournaments", get(tournament::list_tournaments))
        .route("/api/tournaments/:id/state", get(tournament::get_state))
        .route("/api/tournaments/:id/register", post(tournament::register))
        .route("/api/tournaments/:id/questions", get(tournament::get_questions))
        .route("/api/tournaments/:id/start", post(tournament::start_attempt))
        .route("/api/tournaments/:id/answers", patch(tournament::save_answers))
        .route("/api/tournaments/:id/submit", post(tournament::submit))
        .route("/api/tournaments/:id/results", get(tournament::get_results))
        // Layer order: the limiter is added first so the auth middleware
        // runs before it and the quota can key on the verified subject.
        .layer(axum::middleware::from_fn_with_state(
            limiter,
            per_user_rate_limit,
        ))
        .layer(axum::middleware::from_fn(
            crate::middleware::auth::require_bearer_auth,
        ));

    let admin_api = Router::new()
        .route("/api/admin/tournaments", post(admin::create_tournament))
        .route(
            "/api/admin/tournaments/:id/questions",
            post(admin::add_question),
        )
        .route(
            "/api/admin/tournaments/:id/release-results",
            post(admin::release_results),
        )
        .layer(axum::middleware::from_fn(
            crate::middleware::auth::require_admin,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(player_api)
        .merge(admin_api)
        .with_state(state)
}
