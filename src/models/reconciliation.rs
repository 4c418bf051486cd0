use super::{BillingMonth, InvoiceStatus, PlanType};
use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 对账行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowStatus {
    Matched,
    Discrepancy,
    #[serde(rename = "Missing from Invoice")]
    MissingFromInvoice,
    #[serde(rename = "Unexpected Charge")]
    UnexpectedCharge,
    Approved,
    Flagged,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Matched => "Matched",
            RowStatus::Discrepancy => "Discrepancy",
            RowStatus::MissingFromInvoice => "Missing from Invoice",
            RowStatus::UnexpectedCharge => "Unexpected Charge",
            RowStatus::Approved => "Approved",
            RowStatus::Flagged => "Flagged",
        }
    }

    /// 推导状态只存在于对账视图中
    pub fn is_derived(&self) -> bool {
        self.stored().is_none()
    }

    /// 对应的持久化状态 (仅 Approved / Flagged)
    pub fn stored(&self) -> Option<InvoiceStatus> {
        match self {
            RowStatus::Approved => Some(InvoiceStatus::Approved),
            RowStatus::Flagged => Some(InvoiceStatus::Flagged),
            _ => None,
        }
    }

    /// 已审核的发票状态映射为对账行状态，Pending 需重新推导
    pub fn from_reviewed(status: InvoiceStatus) -> Option<RowStatus> {
        match status {
            InvoiceStatus::Approved => Some(RowStatus::Approved),
            InvoiceStatus::Flagged => Some(RowStatus::Flagged),
            InvoiceStatus::Pending => None,
        }
    }

    pub fn all() -> [RowStatus; 6] {
        [
            RowStatus::Matched,
            RowStatus::Discrepancy,
            RowStatus::MissingFromInvoice,
            RowStatus::UnexpectedCharge,
            RowStatus::Approved,
            RowStatus::Flagged,
        ]
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 审核动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Accept,
    Flag,
}

impl ReviewAction {
    /// 校验状态迁移并返回需要写入的发票状态
    ///
    /// Accept: Matched -> Approved
    /// Flag: Discrepancy | Unexpected Charge -> Flagged
    pub fn target(&self, current: RowStatus) -> Option<InvoiceStatus> {
        match (self, current) {
            (ReviewAction::Accept, RowStatus::Matched) => Some(InvoiceStatus::Approved),
            (ReviewAction::Flag, RowStatus::Discrepancy | RowStatus::UnexpectedCharge) => {
                Some(InvoiceStatus::Flagged)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewAction::Accept => f.write_str("accept"),
            ReviewAction::Flag => f.write_str("flag"),
        }
    }
}

/// 对账行 (派生，不持久化)，键为 (employee_id, plan_type)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRow {
    pub employee_id: i64,
    pub employee_name: String,
    pub plan_type: PlanType,
    pub enrolled_amount: Option<BigDecimal>,
    pub billed_amount: Option<BigDecimal>,
    pub status: RowStatus,
    pub invoice_id: Option<i64>,
}

impl ReconciliationRow {
    pub fn key(&self) -> (i64, &PlanType) {
        (self.employee_id, &self.plan_type)
    }

    /// 账单金额 - 报名金额 (任一缺失时为 None)
    pub fn variance(&self) -> Option<BigDecimal> {
        match (&self.enrolled_amount, &self.billed_amount) {
            (Some(enrolled), Some(billed)) => Some(billed - enrolled),
            _ => None,
        }
    }
}

/// 对账汇总 (按状态计数、金额合计、匹配率)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub total_rows: usize,
    pub matched: usize,
    pub discrepancies: usize,
    pub missing_from_invoice: usize,
    pub unexpected_charges: usize,
    pub approved: usize,
    pub flagged: usize,
    pub total_enrolled: BigDecimal,
    pub total_billed: BigDecimal,
    /// total_billed - total_enrolled
    pub net_variance: BigDecimal,
    /// (matched + approved) / total_rows * 100，保留两位小数
    pub match_rate: BigDecimal,
}

impl ReconciliationSummary {
    pub fn from_rows(rows: &[ReconciliationRow]) -> Self {
        let mut summary = Self {
            total_rows: rows.len(),
            matched: 0,
            discrepancies: 0,
            missing_from_invoice: 0,
            unexpected_charges: 0,
            approved: 0,
            flagged: 0,
            total_enrolled: BigDecimal::zero(),
            total_billed: BigDecimal::zero(),
            net_variance: BigDecimal::zero(),
            match_rate: BigDecimal::zero(),
        };

        for row in rows {
            match row.status {
                RowStatus::Matched => summary.matched += 1,
                RowStatus::Discrepancy => summary.discrepancies += 1,
                RowStatus::MissingFromInvoice => summary.missing_from_invoice += 1,
                RowStatus::UnexpectedCharge => summary.unexpected_charges += 1,
                RowStatus::Approved => summary.approved += 1,
                RowStatus::Flagged => summary.flagged += 1,
            }
            if let Some(enrolled) = &row.enrolled_amount {
                summary.total_enrolled += enrolled;
            }
            if let Some(billed) = &row.billed_amount {
                summary.total_billed += billed;
            }
        }

        summary.net_variance = &summary.total_billed - &summary.total_enrolled;
        if summary.total_rows > 0 {
            let clean = BigDecimal::from((summary.matched + summary.approved) as u64);
            let rate = clean * BigDecimal::from(100) / BigDecimal::from(summary.total_rows as u64);
            summary.match_rate = rate.round(2);
        }
        summary
    }
}

/// 某账单月份的对账报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub billing_month: BillingMonth,
    pub rows: Vec<ReconciliationRow>,
    pub summary: ReconciliationSummary,
}

impl ReconciliationReport {
    pub fn new(billing_month: BillingMonth, rows: Vec<ReconciliationRow>) -> Self {
        let summary = ReconciliationSummary::from_rows(&rows);
        Self {
            billing_month,
            rows,
            summary,
        }
    }

    pub fn find(&self, employee_id: i64, plan_type: &PlanType) -> Option<&ReconciliationRow> {
        self.rows.iter().find(|r| r.key() == (employee_id, plan_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn row(status: RowStatus, enrolled: Option<&str>, billed: Option<&str>) -> ReconciliationRow {
        ReconciliationRow {
            employee_id: 1,
            employee_name: "Ada".into(),
            plan_type: PlanType::Medical,
            enrolled_amount: enrolled.map(|v| BigDecimal::from_str(v).unwrap()),
            billed_amount: billed.map(|v| BigDecimal::from_str(v).unwrap()),
            status,
            invoice_id: billed.map(|_| 1),
        }
    }

    #[test]
    fn transitions_follow_review_rules() {
        assert_eq!(
            ReviewAction::Accept.target(RowStatus::Matched),
            Some(InvoiceStatus::Approved)
        );
        assert_eq!(
            ReviewAction::Flag.target(RowStatus::UnexpectedCharge),
            Some(InvoiceStatus::Flagged)
        );
        assert_eq!(ReviewAction::Accept.target(RowStatus::Discrepancy), None);
        assert_eq!(ReviewAction::Flag.target(RowStatus::Matched), None);
        assert_eq!(ReviewAction::Accept.target(RowStatus::Approved), None);
    }

    #[test]
    fn derived_and_stored_statuses_are_disjoint() {
        for status in RowStatus::all() {
            assert_eq!(status.is_derived(), status.stored().is_none());
        }
        assert!(RowStatus::MissingFromInvoice.is_derived());
        assert!(!RowStatus::Flagged.is_derived());
    }

    #[test]
    fn status_serializes_with_display_names() {
        let json = serde_json::to_string(&RowStatus::MissingFromInvoice).unwrap();
        assert_eq!(json, "\"Missing from Invoice\"");
    }

    #[test]
    fn summary_counts_and_totals() {
        let rows = vec![
            row(RowStatus::Matched, Some("100"), Some("100")),
            row(RowStatus::Discrepancy, Some("50"), Some("55.50")),
            row(RowStatus::MissingFromInvoice, Some("20"), None),
            row(RowStatus::Approved, Some("10"), Some("10")),
        ];
        let summary = ReconciliationSummary::from_rows(&rows);
        assert_eq!(summary.total_rows, 4);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.discrepancies, 1);
        assert_eq!(summary.missing_from_invoice, 1);
        assert_eq!(summary.approved, 1);
        assert_eq!(summary.total_enrolled, BigDecimal::from(180));
        assert_eq!(summary.total_billed, BigDecimal::from_str("165.50").unwrap());
        assert_eq!(summary.net_variance, BigDecimal::from_str("-14.50").unwrap());
        assert_eq!(summary.match_rate, BigDecimal::from(50));
    }

    #[test]
    fn empty_summary_has_zero_rate() {
        let summary = ReconciliationSummary::from_rows(&[]);
        assert_eq!(summary.total_rows, 0);
        assert_eq!(summary.match_rate, BigDecimal::zero());
    }
}
