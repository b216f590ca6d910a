// src/lib.rs

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use services::proposal_cache::ProposalCache;
use settings::{ContractConfig, Settings};
use wax::TableRowsSource;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub chain: Arc<dyn TableRowsSource>,
    pub contract: ContractConfig,
    pub proposals: ProposalCache,
    pub settings: Arc<Settings>,
}

pub mod entities {
    pub mod prelude;
    pub mod proposal_statuses;
    pub mod subscriptions;
    pub mod users;
}

pub mod services {
    pub mod notifier;
    pub mod proposal_cache;
    pub mod status_tracker;
    pub mod subscriptions;
}

pub mod jobs {
    pub mod proposal_status_sync;
}

pub mod models {
    pub mod error;
    pub mod proposal;
    pub mod subscription;
    pub mod user;
}

pub mod handlers;
pub mod settings;
pub mod wax;

/// All routes with CORS and request tracing
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.cors_allowed_origins);

    Router::new()
        .route("/", get(handlers::health::service_info))
        .route("/health", get(handlers::health::health))
        .route("/proposals/{id}", get(handlers::proposals::get_proposal))
        .route(
            "/proposals/{id}/profile",
            get(handlers::proposals::get_proposal_profile),
        )
        .route(
            "/proposals/{id}/deliverables",
            get(handlers::proposals::get_proposal_deliverables),
        )
        .route("/users", post(handlers::users::register_user))
        .route("/users/{wax_account}", get(handlers::users::get_user))
        .route(
            "/users/{wax_account}/subscriptions",
            get(handlers::subscriptions::list_subscriptions),
        )
        .route(
            "/subscriptions",
            post(handlers::subscriptions::subscribe)
                .delete(handlers::subscriptions::unsubscribe),
        )
        .fallback(handlers::fallback)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
