use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use benefits_recon::models::{
    BenefitPlan, BenefitWithRates, BillingMonth, EmployeeRef, Enrollment, InvoiceLine,
    InvoiceStatus, PlanType, RateModel, RateRecord, Selection, Selections,
};
use benefits_recon::{api, MemoryStore, RateService, ReconciliationService};
use bigdecimal::BigDecimal;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn app(store: Arc<MemoryStore>) -> axum::Router {
    let reconciliation = Arc::new(ReconciliationService::new(store.clone()));
    let rates = Arc::new(RateService::new(store));
    api::routes(reconciliation, rates)
}

fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let mut selections = Selections::new();
    selections.insert(PlanType::Medical, Selection::with_cost(BigDecimal::from(120)));
    selections.insert(PlanType::Vision, Selection::with_cost(BigDecimal::from(9)));
    store.insert_enrollment(Enrollment {
        id: 1,
        employee: Some(EmployeeRef {
            id: 3,
            name: "Katherine Johnson".to_string(),
        }),
        selections,
    });
    store.insert_invoice(InvoiceLine {
        id: 7,
        carrier_id: 1,
        employee_id: 3,
        plan_type: PlanType::Medical,
        billed_amount: BigDecimal::from(120),
        status: InvoiceStatus::Pending,
        billing_month: BillingMonth::new(2026, 10).unwrap(),
    });
    store.insert_benefit(BenefitWithRates {
        plan: BenefitPlan {
            id: 1,
            name: "Silver HMO".to_string(),
            plan_type: PlanType::Medical,
            carrier_id: 1,
            client_margin: BigDecimal::from(10),
            rate_model: RateModel::Flat,
        },
        rates: vec![RateRecord {
            benefit_id: 1,
            coverage_level: Some("Employee Only".to_string()),
            carrier_rate: Some(BigDecimal::from(100)),
            ..Default::default()
        }],
    });
    store
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check_responds() {
    let response = app(seeded_store())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn report_endpoint_returns_rows_and_summary() {
    let response = app(seeded_store())
        .oneshot(
            Request::get("/api/reconciliation?month=2026-10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    let rows = body["data"]["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["status"], "Matched");
    assert_eq!(rows[1]["status"], "Missing from Invoice");
    assert_eq!(body["data"]["summary"]["total_rows"], 2);
}

#[tokio::test]
async fn bad_month_is_a_client_error() {
    let response = app(seeded_store())
        .oneshot(
            Request::get("/api/reconciliation?month=soon")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["success"], false);
}

#[tokio::test]
async fn review_endpoint_accepts_and_conflicts() {
    let store = seeded_store();

    let accept = r#"{"month":"2026-10","employee_id":3,"plan_type":"Medical","action":"accept"}"#;
    let response = app(store.clone())
        .oneshot(
            Request::post("/api/reconciliation/review")
                .header("content-type", "application/json")
                .body(Body::from(accept))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"]["status"], "Approved");
    assert_eq!(store.invoice(7).unwrap().status, InvoiceStatus::Approved);

    let flag_missing = r#"{"month":"2026-10","employee_id":3,"plan_type":"Vision","action":"flag"}"#;
    let response = app(store.clone())
        .oneshot(
            Request::post("/api/reconciliation/review")
                .header("content-type", "application/json")
                .body(Body::from(flag_missing))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(store.write_count(), 1);
}

#[tokio::test]
async fn export_endpoint_serves_csv() {
    let response = app(seeded_store())
        .oneshot(
            Request::get("/api/reconciliation/export?month=2026-10-01")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/csv");

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert!(text.contains("Katherine Johnson,Medical,120,120,0,Matched,7"));
}

#[tokio::test]
async fn quote_endpoint_prices_flat_plans() {
    let response = app(seeded_store())
        .oneshot(
            Request::get("/api/benefits/1/rate?coverage_level=Employee%20Only")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"]["display"], "110.00");

    let response = app(seeded_store())
        .oneshot(Request::get("/api/benefits/1/rate").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn review_endpoint_maps_invoice_mismatch_and_store_failures() {
    let store = seeded_store();

    let wrong_invoice =
        r#"{"month":"2026-10","invoice_id":99,"employee_id":3,"plan_type":"Medical","action":"accept"}"#;
    let response = app(store.clone())
        .oneshot(
            Request::post("/api/reconciliation/review")
                .header("content-type", "application/json")
                .body(Body::from(wrong_invoice))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(store.write_count(), 0);

    store.fail_reads.store(true, std::sync::atomic::Ordering::Relaxed);
    let accept = r#"{"month":"2026-10","invoice_id":7,"employee_id":3,"plan_type":"Medical","action":"accept"}"#;
    let response = app(store.clone())
        .oneshot(
            Request::post("/api/reconciliation/review")
                .header("content-type", "application/json")
                .body(Body::from(accept))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(store.write_count(), 0);
}
