pub mod health;
pub mod portfolio;
pub mod referral;

use crate::config::Config;
use crate::db::Repository;
use crate::orchestration::Collector;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub collector: Arc<Collector>,
    pub config: Config,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, collector: Arc<Collector>, config: Config) -> Self {
        Self {
            repo,
            collector,
            config,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/portfolio", get(portfolio::get_portfolio))
        .route("/v1/portfolio/history", get(portfolio::get_history))
        .route("/v1/portfolio/export", get(portfolio::export_history))
        .route("/v1/refresh", post(portfolio::post_refresh))
        .route("/v1/referral/code", get(referral::get_code))
        .route("/v1/referral/resolve", get(referral::get_resolve))
        .layer(cors)
        .with_state(state)
}
