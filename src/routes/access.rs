use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Access Router Module
///
/// Defines the read-only decision endpoints. None of them mutate state, none of
/// them hold locks, and all of them fail closed: an erroring decision is shaped
/// exactly like a denial, so a navigation guard can never misread a failure as
/// permission.
///
/// Identity note: these endpoints take a verified, opaque `user_id` supplied by
/// the caller. Session/identity verification is the gateway's concern, not this
/// service's.
pub fn access_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load balancer checks.
        // Returns "ok" immediately to verify the service is running and responsive.
        .route("/health", get(|| async { "ok" }))
        // GET /access/routes/{user_id}?language=es
        // Bulk read: every route identifier (canonical and translated) the user may
        // currently reach. Equals the resolution engine's accessible-route set.
        .route("/access/routes/{user_id}", get(handlers::get_allowed_routes))
        // GET /access/languages/{user_id}
        // The UI languages the user's effective roles allow; `["es"]` for role-less users.
        .route(
            "/access/languages/{user_id}",
            get(handlers::get_allowed_languages),
        )
        // GET /access/check?user_id=..&pathname=..&language=..
        // Point decision backed by the `can_access_route` stored procedure: one
        // atomic database read per check.
        .route("/access/check", get(handlers::check_access))
}
