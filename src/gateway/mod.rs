//! Axum router and shared application state (spec.md §4.8, §6).

pub mod auth;
mod handlers;
pub mod response;
pub mod schemas;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::browser::SessionPool;
use crate::config::GatewayConfig;
use crate::credit::CreditLedger;
use crate::operations::OperationRunner;
use crate::search::SearchAggregator;
use crate::user_actor::Registry;
use auth::AuthResolver;

#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<SessionPool>,
    pub credit: CreditLedger,
    pub user_actors: Registry,
    pub search: Arc<SearchAggregator>,
    pub auth: Arc<dyn AuthResolver>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    fn operation_runner(&self) -> OperationRunner<'_> {
        OperationRunner::new(self.pool.as_ref(), self.config.ai_endpoint.clone(), self.config.ai_api_key.clone())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/web/markdown", post(handlers::markdown))
        .route("/web/content", post(handlers::content))
        .route("/web/links", post(handlers::links))
        .route("/web/scrape", post(handlers::scrape))
        .route("/web/screenshot", post(handlers::screenshot))
        .route("/web/pdf", post(handlers::pdf))
        .route("/web/search", post(handlers::search))
        .route("/web/json-extraction", post(handlers::json_extraction))
        .route("/files", get(handlers::list_files))
        .route("/files/:file_id", get(handlers::get_file))
        .route("/files/:file_id", delete(handlers::delete_file))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
