use crate::models::{BenefitRecord, EnrollmentRecord, InvoiceRecord, RateRecord, ReconciliationRow};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use sqlx::PgPool;
use std::io::Write;
use std::time::{Duration, Instant};

const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// 查询报名记录 (LEFT JOIN 员工，员工已删除时 employee_id / employee_name 为空)
pub async fn list_enrollments(pool: &PgPool) -> Result<Vec<EnrollmentRecord>, sqlx::Error> {
    sqlx::query_as::<_, EnrollmentRecord>(
        r#"
        SELECT en.id,
               e.id AS employee_id,
               e.name AS employee_name,
               en.selections
        FROM enrollments en
        LEFT JOIN employees e ON e.id = en.employee_id
        ORDER BY en.id
        "#
    )
    .fetch_all(pool)
    .await
}

/// 查询某账单月份的承保方发票行 (按月份精确匹配)
pub async fn list_invoices_for_month(
    pool: &PgPool,
    billing_month: NaiveDate,
) -> Result<Vec<InvoiceRecord>, sqlx::Error> {
    sqlx::query_as::<_, InvoiceRecord>(
        r#"
        SELECT id, carrier_id, employee_id, plan_type, billed_amount, status, billing_month
        FROM carrier_invoices
        WHERE billing_month = $1
        ORDER BY id
        "#
    )
    .bind(billing_month)
    .fetch_all(pool)
    .await
}

/// 更新发票行状态，返回更新后的行 (不存在时为 None)
pub async fn update_invoice_status(
    pool: &PgPool,
    invoice_id: i64,
    status: &str,
) -> Result<Option<InvoiceRecord>, sqlx::Error> {
    let start = Instant::now();
    let result = tokio::time::timeout(
        WRITE_TIMEOUT,
        sqlx::query_as::<_, InvoiceRecord>(
            r#"
            UPDATE carrier_invoices
            SET status = $2
            WHERE id = $1
            RETURNING id, carrier_id, employee_id, plan_type, billed_amount, status, billing_month
            "#
        )
        .bind(invoice_id)
        .bind(status)
        .fetch_optional(pool),
    )
    .await;

    match result {
        Ok(Ok(row)) => {
            tracing::info!(
                "✓ invoice {} status -> {}, updated: {}, 耗时: {:?}",
                invoice_id, status, row.is_some(), start.elapsed()
            );
            Ok(row)
        }
        Ok(Err(e)) => {
            tracing::error!("✗ UPDATE执行失败, invoice {}, 错误: {:?}", invoice_id, e);
            Err(e)
        }
        Err(_) => {
            tracing::error!("✗ UPDATE操作超时 (>{:?}), invoice {}", WRITE_TIMEOUT, invoice_id);
            Err(sqlx::Error::PoolTimedOut)
        }
    }
}

/// 查询单个福利计划
pub async fn get_benefit(pool: &PgPool, benefit_id: i64) -> Result<Option<BenefitRecord>, sqlx::Error> {
    sqlx::query_as::<_, BenefitRecord>(
        r#"
        SELECT id, name, plan_type, carrier_id, client_margin, rate_model
        FROM benefits
        WHERE id = $1
        "#
    )
    .bind(benefit_id)
    .fetch_optional(pool)
    .await
}

/// 查询全部福利计划
pub async fn list_benefits(pool: &PgPool) -> Result<Vec<BenefitRecord>, sqlx::Error> {
    sqlx::query_as::<_, BenefitRecord>(
        r#"
        SELECT id, name, plan_type, carrier_id, client_margin, rate_model
        FROM benefits
        ORDER BY name, id
        "#
    )
    .fetch_all(pool)
    .await
}

/// 批量查询计划费率行 (保持录入顺序)
pub async fn list_rates_for_benefits(
    pool: &PgPool,
    benefit_ids: &[i64],
) -> Result<Vec<RateRecord>, sqlx::Error> {
    sqlx::query_as::<_, RateRecord>(
        r#"
        SELECT benefit_id, coverage_level, min_age, max_age, carrier_rate, rate_per_thousand
        FROM benefit_rates
        WHERE benefit_id = ANY($1)
        ORDER BY benefit_id, id
        "#
    )
    .bind(benefit_ids)
    .fetch_all(pool)
    .await
}

/// 将 Option<BigDecimal> 转换为 CSV 字符串
fn option_to_csv(val: &Option<BigDecimal>) -> String {
    val.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

/// 导出对账行到 CSV
pub fn export_to_csv<W: Write>(rows: &[ReconciliationRow], output: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record([
        "employee_id",
        "employee_name",
        "plan_type",
        "enrolled_amount",
        "billed_amount",
        "variance",
        "status",
        "invoice_id",
    ])?;

    for row in rows {
        writer.write_record(&[
            row.employee_id.to_string(),
            row.employee_name.clone(),
            row.plan_type.to_string(),
            option_to_csv(&row.enrolled_amount),
            option_to_csv(&row.billed_amount),
            option_to_csv(&row.variance()),
            row.status.to_string(),
            row.invoice_id.map(|id| id.to_string()).unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlanType, RowStatus};
    use std::str::FromStr;

    #[test]
    fn csv_export_writes_header_and_blank_optionals() {
        let rows = vec![ReconciliationRow {
            employee_id: 4,
            employee_name: "Grace Hopper".into(),
            plan_type: PlanType::Vision,
            enrolled_amount: Some(BigDecimal::from_str("12.50").unwrap()),
            billed_amount: None,
            status: RowStatus::MissingFromInvoice,
            invoice_id: None,
        }];

        let mut out = Vec::new();
        export_to_csv(&rows, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("employee_id,employee_name,plan_type,enrolled_amount,billed_amount,variance,status,invoice_id")
        );
        assert_eq!(lines.next(), Some("4,Grace Hopper,Vision,12.50,,,Missing from Invoice,"));
    }
}
