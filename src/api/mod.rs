pub mod handlers;

pub use handlers::*;

use crate::service::{RateService, ReconciliationService};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// 组装路由：对账与费率服务各自持有状态
pub fn routes(reconciliation: Arc<ReconciliationService>, rates: Arc<RateService>) -> Router {
    let reconciliation_routes = Router::new()
        .route("/api/reconciliation", get(reconciliation_report))
        .route("/api/reconciliation/export", get(export_reconciliation))
        .route("/api/reconciliation/review", post(review_row))
        .with_state(reconciliation);

    let rate_routes = Router::new()
        .route("/api/benefits", get(benefit_summaries))
        .route("/api/benefits/:id/rate", get(benefit_quote))
        .with_state(rates);

    Router::new()
        .route("/health", get(health_check))
        .merge(reconciliation_routes)
        .merge(rate_routes)
}
