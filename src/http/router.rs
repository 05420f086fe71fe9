//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing),
//! and creates the axum router ready for serving.

use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration - permissive for development, should be restricted in production
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the API router with versioned endpoints
    let api_v1 = Router::new()
        // Availability rules
        .route(
            "/vendors/{vendor_id}/availability",
            post(handlers::set_schedule),
        )
        .route(
            "/vendors/{vendor_id}/availability/rules/{rule_id}",
            patch(handlers::update_rule),
        )
        .route(
            "/vendors/{vendor_id}/availability/status",
            post(handlers::set_rule_status),
        )
        .route(
            "/vendors/{vendor_id}/availability/{date}",
            get(handlers::get_day_availability),
        )
        // Slot management
        .route("/vendors/{vendor_id}/slots", get(handlers::list_slots))
        .route(
            "/vendors/{vendor_id}/slots/status",
            post(handlers::set_slot_status),
        )
        // Bookings
        .route("/bookings", post(handlers::create_booking))
        .route(
            "/bookings/{booking_id}/cancel",
            post(handlers::cancel_booking),
        )
        .route(
            "/bookings/{booking_id}/reschedule",
            post(handlers::reschedule_booking),
        )
        .route(
            "/bookings/{booking_id}/transition",
            post(handlers::transition_booking),
        );

    // Combine all routes
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::LocalRepository;
    use std::sync::Arc;

    #[test]
    fn test_router_creation() {
        let repo =
            Arc::new(LocalRepository::new()) as Arc<dyn crate::db::repository::FullRepository>;
        let state = AppState::new(repo);
        let _router = create_router(state);
        // If we got here, router was created successfully
    }
}
