use crate::db::BenefitsStore;
use crate::error::{ReviewError, StoreError};
use crate::models::{
    BillingMonth, Enrollment, InvoiceLine, InvoiceStatus, PlanType, ReconciliationReport,
    ReconciliationRow, ReviewAction, RowStatus,
};
use bigdecimal::BigDecimal;
use indexmap::IndexMap;
use std::sync::Arc;

pub const UNKNOWN_EMPLOYEE: &str = "Unknown Employee";

/// 金额容差 0.01
pub fn money_tolerance() -> BigDecimal {
    BigDecimal::from(1) / BigDecimal::from(100)
}

/// |a - b| < 0.01 视为相等
pub fn amounts_match(a: &BigDecimal, b: &BigDecimal) -> bool {
    (a - b).abs() < money_tolerance()
}

/// 状态优先级：已审核 (Approved / Flagged) 保留；否则按金额推导
fn resolve_status(enrolled: Option<&BigDecimal>, billed: &BigDecimal, stored: InvoiceStatus) -> RowStatus {
    if let Some(reviewed) = RowStatus::from_reviewed(stored) {
        return reviewed;
    }
    match enrolled {
        None => RowStatus::UnexpectedCharge,
        Some(enrolled) if amounts_match(enrolled, billed) => RowStatus::Matched,
        Some(_) => RowStatus::Discrepancy,
    }
}

/// 对账匹配：按 (employee_id, plan_type) 连接报名选择与发票行
///
/// 输出顺序为插入顺序：先报名行，后仅出现在发票中的行。
/// 员工已删除的报名整体跳过。
pub fn reconcile(enrollments: &[Enrollment], invoices: &[InvoiceLine]) -> Vec<ReconciliationRow> {
    let mut rows: IndexMap<(i64, PlanType), ReconciliationRow> = IndexMap::new();

    for enrollment in enrollments {
        let Some(employee) = &enrollment.employee else {
            tracing::warn!(
                "Enrollment {} references a missing employee, skipping {} selections",
                enrollment.id,
                enrollment.selections.len()
            );
            continue;
        };

        for (plan_type, selection) in &enrollment.selections {
            let row = ReconciliationRow {
                employee_id: employee.id,
                employee_name: employee.name.clone(),
                plan_type: plan_type.clone(),
                enrolled_amount: Some(selection.cost.clone()),
                billed_amount: None,
                status: RowStatus::MissingFromInvoice,
                invoice_id: None,
            };
            if rows.insert((employee.id, plan_type.clone()), row).is_some() {
                tracing::warn!(
                    "Employee {} has more than one {} selection, enrollment {} wins",
                    employee.id, plan_type, enrollment.id
                );
            }
        }
    }

    for invoice in invoices {
        let key = (invoice.employee_id, invoice.plan_type.clone());
        match rows.get_mut(&key) {
            Some(row) => match (row.invoice_id, row.billed_amount.take()) {
                (Some(first), Some(billed)) => {
                    // 重复计费：金额累加，按合计重新判定；行仍指向第一张发票
                    tracing::warn!(
                        "Invoice {} duplicates invoice {} for employee {} / {}, billed amounts combined",
                        invoice.id, first, invoice.employee_id, invoice.plan_type
                    );
                    let total = billed + &invoice.billed_amount;
                    let stored = if RowStatus::from_reviewed(invoice.status) == Some(row.status) {
                        invoice.status
                    } else {
                        InvoiceStatus::Pending
                    };
                    row.status = resolve_status(row.enrolled_amount.as_ref(), &total, stored);
                    row.billed_amount = Some(total);
                }
                _ => {
                    row.status = resolve_status(row.enrolled_amount.as_ref(), &invoice.billed_amount, invoice.status);
                    row.billed_amount = Some(invoice.billed_amount.clone());
                    row.invoice_id = Some(invoice.id);
                }
            },
            None => {
                let row = ReconciliationRow {
                    employee_id: invoice.employee_id,
                    employee_name: UNKNOWN_EMPLOYEE.to_string(),
                    plan_type: invoice.plan_type.clone(),
                    enrolled_amount: None,
                    billed_amount: Some(invoice.billed_amount.clone()),
                    status: resolve_status(None, &invoice.billed_amount, invoice.status),
                    invoice_id: Some(invoice.id),
                };
                rows.insert(key, row);
            }
        }
    }

    rows.into_values().collect()
}

/// 按员工姓名稳定排序 (同名保持原顺序)
pub fn sort_by_employee_name(rows: &mut [ReconciliationRow]) {
    rows.sort_by(|a, b| a.employee_name.cmp(&b.employee_name));
}

/// 对账服务：并发读取报名与发票，执行匹配，处理审核动作
pub struct ReconciliationService {
    store: Arc<dyn BenefitsStore>,
    sort_by_name: bool,
}

impl ReconciliationService {
    pub fn new(store: Arc<dyn BenefitsStore>) -> Self {
        Self {
            store,
            sort_by_name: false,
        }
    }

    pub fn with_sort_by_name(mut self, sort_by_name: bool) -> Self {
        self.sort_by_name = sort_by_name;
        self
    }

    /// 读取失败视为空集合，对账照常进行
    pub async fn reconcile_month(&self, month: BillingMonth) -> ReconciliationReport {
        self.reconcile_month_sorted(month, false).await
    }

    /// sort_by_name 为 true 时按姓名排序 (配置已开启时总是排序)
    pub async fn reconcile_month_sorted(&self, month: BillingMonth, sort_by_name: bool) -> ReconciliationReport {
        let (enrollments, invoices) = self.read_month(month).await;

        let enrollments = enrollments.unwrap_or_else(|e| {
            tracing::warn!("Failed to load enrollments for {}: {}", month, e);
            Vec::new()
        });
        let invoices = invoices.unwrap_or_else(|e| {
            tracing::warn!("Failed to load invoices for {}: {}", month, e);
            Vec::new()
        });

        self.build_report(month, &enrollments, &invoices, sort_by_name || self.sort_by_name)
    }

    /// 并发读取报名与当月发票
    async fn read_month(
        &self,
        month: BillingMonth,
    ) -> (Result<Vec<Enrollment>, StoreError>, Result<Vec<InvoiceLine>, StoreError>) {
        let (enrollments, invoices) = futures::join!(
            self.store.list_enrollments(),
            self.store.list_invoices(month)
        );
        let invoices = invoices.map(|mut lines| {
            lines.retain(|i| i.billing_month == month);
            lines
        });
        (enrollments, invoices)
    }

    fn build_report(
        &self,
        month: BillingMonth,
        enrollments: &[Enrollment],
        invoices: &[InvoiceLine],
        sort_by_name: bool,
    ) -> ReconciliationReport {
        tracing::info!(
            "对账 {}: {} 条报名, {} 条发票行",
            month, enrollments.len(), invoices.len()
        );

        let mut rows = reconcile(enrollments, invoices);
        if sort_by_name {
            sort_by_employee_name(&mut rows);
        }

        let report = ReconciliationReport::new(month, rows);
        tracing::info!(
            "对账完成 {}: 行数 {}, 匹配 {}, 差异 {}, 缺失 {}, 意外 {}",
            month,
            report.summary.total_rows,
            report.summary.matched,
            report.summary.discrepancies,
            report.summary.missing_from_invoice,
            report.summary.unexpected_charges
        );
        report
    }

    /// 审核一行：写入成功后才更新本地状态
    pub async fn review(&self, row: &mut ReconciliationRow, action: ReviewAction) -> Result<(), ReviewError> {
        let Some(invoice_id) = row.invoice_id else {
            tracing::warn!(
                "Cannot {} employee {} / {}: no linked invoice",
                action, row.employee_id, row.plan_type
            );
            return Err(ReviewError::NoLinkedInvoice);
        };

        let Some(target) = action.target(row.status) else {
            return Err(ReviewError::InvalidTransition {
                action,
                status: row.status,
            });
        };

        match self.store.update_invoice_status(invoice_id, target).await {
            Ok(Some(updated)) if updated.status == target => {
                row.status = RowStatus::from_reviewed(target).unwrap_or(row.status);
                tracing::info!("Invoice {} marked {}", invoice_id, target);
                Ok(())
            }
            Ok(_) => {
                tracing::error!("Invoice {} was not updated to {}", invoice_id, target);
                Err(ReviewError::WriteRejected {
                    invoice_id,
                    requested: target,
                })
            }
            Err(e) => {
                tracing::error!("Invoice {} status update failed: {}", invoice_id, e);
                Err(e.into())
            }
        }
    }

    /// 重新对账后定位行并审核，返回更新后的行
    ///
    /// 读取失败直接返回 Store 错误，不按空集合处理。
    /// expected_invoice 给出时必须与该行关联的发票一致。
    pub async fn review_row(
        &self,
        month: BillingMonth,
        employee_id: i64,
        plan_type: &PlanType,
        expected_invoice: Option<i64>,
        action: ReviewAction,
    ) -> Result<ReconciliationRow, ReviewError> {
        let (enrollments, invoices) = self.read_month(month).await;
        let report = self.build_report(month, &enrollments?, &invoices?, false);

        let mut row = report
            .find(employee_id, plan_type)
            .cloned()
            .ok_or_else(|| ReviewError::RowNotFound {
                employee_id,
                plan_type: plan_type.to_string(),
            })?;

        if let Some(requested) = expected_invoice {
            if row.invoice_id != Some(requested) {
                tracing::warn!(
                    "Review of employee {} / {} names invoice {}, row is linked to {:?}",
                    employee_id, plan_type, requested, row.invoice_id
                );
                return Err(ReviewError::InvoiceMismatch {
                    requested,
                    linked: row.invoice_id,
                });
            }
        }

        self.review(&mut row, action).await?;
        Ok(row)
    }
}
