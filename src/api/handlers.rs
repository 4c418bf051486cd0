use crate::db::queries;
use crate::error::{QuoteError, RateError, ReviewError};
use crate::models::{BillingMonth, PlanType, ReviewAction};
use crate::service::{QuoteRequest, RateService, ReconciliationService};
use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 统一响应体
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

fn ok<T: Serialize>(message: String, data: T) -> Response {
    let response = ApiResponse {
        success: true,
        message,
        data: Some(data),
    };
    (StatusCode::OK, Json(response)).into_response()
}

fn fail(status: StatusCode, message: String) -> Response {
    let response: ApiResponse<()> = ApiResponse {
        success: false,
        message,
        data: None,
    };
    (status, Json(response)).into_response()
}

/// 查询参数: 账单月份
#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub month: String,
    /// "name" 时按员工姓名排序
    pub sort: Option<String>,
}

/// 请求体: 审核动作
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub month: String,
    /// 给出时须与该行关联的发票一致
    pub invoice_id: Option<i64>,
    pub employee_id: i64,
    pub plan_type: PlanType,
    pub action: ReviewAction,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 月度对账报告
pub async fn reconciliation_report(
    State(service): State<Arc<ReconciliationService>>,
    Query(query): Query<MonthQuery>,
) -> Response {
    let month: BillingMonth = match query.month.parse() {
        Ok(m) => m,
        Err(e) => return fail(StatusCode::BAD_REQUEST, format!("Error: {}", e)),
    };

    let report = service
        .reconcile_month_sorted(month, query.sort.as_deref() == Some("name"))
        .await;

    let message = format!(
        "Reconciled {} rows for {}, match rate {}%",
        report.summary.total_rows, month, report.summary.match_rate
    );
    ok(message, report)
}

/// 导出对账报告 CSV
pub async fn export_reconciliation(
    State(service): State<Arc<ReconciliationService>>,
    Query(query): Query<MonthQuery>,
) -> Response {
    let month: BillingMonth = match query.month.parse() {
        Ok(m) => m,
        Err(e) => return fail(StatusCode::BAD_REQUEST, format!("Error: {}", e)),
    };

    let report = service
        .reconcile_month_sorted(month, query.sort.as_deref() == Some("name"))
        .await;

    let mut body = Vec::new();
    if let Err(e) = queries::export_to_csv(&report.rows, &mut body) {
        tracing::error!("CSV export for {} failed: {}", month, e);
        return fail(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e));
    }

    let disposition = format!("attachment; filename=\"reconciliation-{}.csv\"", month);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

/// 审核对账行 (accept / flag)
pub async fn review_row(
    State(service): State<Arc<ReconciliationService>>,
    Json(req): Json<ReviewRequest>,
) -> Response {
    let month: BillingMonth = match req.month.parse() {
        Ok(m) => m,
        Err(e) => return fail(StatusCode::BAD_REQUEST, format!("Error: {}", e)),
    };

    match service
        .review_row(month, req.employee_id, &req.plan_type, req.invoice_id, req.action)
        .await
    {
        Ok(row) => {
            let message = format!(
                "Employee {} / {} is now {}",
                row.employee_id, row.plan_type, row.status
            );
            ok(message, row)
        }
        Err(e) => {
            let status = match &e {
                ReviewError::RowNotFound { .. } => StatusCode::NOT_FOUND,
                ReviewError::NoLinkedInvoice
                | ReviewError::InvalidTransition { .. }
                | ReviewError::InvoiceMismatch { .. }
                | ReviewError::WriteRejected { .. } => StatusCode::CONFLICT,
                ReviewError::Store(_) => StatusCode::BAD_GATEWAY,
            };
            fail(status, format!("Error: {}", e))
        }
    }
}

/// 全部计划费用摘要
pub async fn benefit_summaries(State(service): State<Arc<RateService>>) -> Response {
    match service.summaries().await {
        Ok(summaries) => ok(format!("{} benefit plans", summaries.len()), summaries),
        Err(e) => fail(StatusCode::BAD_GATEWAY, format!("Error: {}", e)),
    }
}

/// 计划报价
pub async fn benefit_quote(
    State(service): State<Arc<RateService>>,
    Path(benefit_id): Path<i64>,
    Query(req): Query<QuoteRequest>,
) -> Response {
    match service.quote(benefit_id, &req).await {
        Ok(quote) => ok(format!("Premium {}", quote.display), quote),
        Err(e) => {
            let status = match &e {
                QuoteError::PlanNotFound(_) => StatusCode::NOT_FOUND,
                QuoteError::Rate(RateError::MissingInput(_)) => StatusCode::BAD_REQUEST,
                QuoteError::Rate(_) => StatusCode::UNPROCESSABLE_ENTITY,
                QuoteError::Store(_) => StatusCode::BAD_GATEWAY,
            };
            fail(status, format!("Error: {}", e))
        }
    }
}
