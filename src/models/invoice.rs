use super::{BillingMonth, PlanType};
use crate::error::StoreError;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// 发票行持久化状态 (carrier_invoices.status)
///
/// 对账行上的 Matched / Discrepancy 等状态是推导出来的，不会写回存储。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Pending,
    Approved,
    Flagged,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "Pending",
            InvoiceStatus::Approved => "Approved",
            InvoiceStatus::Flagged => "Flagged",
        }
    }
}

impl FromStr for InvoiceStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(InvoiceStatus::Pending),
            "Approved" => Ok(InvoiceStatus::Approved),
            "Flagged" => Ok(InvoiceStatus::Flagged),
            other => Err(StoreError::Malformed(format!("unknown invoice status {other:?}"))),
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 承保方发票行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub id: i64,
    pub carrier_id: i64,
    pub employee_id: i64,
    pub plan_type: PlanType,
    pub billed_amount: BigDecimal,
    pub status: InvoiceStatus,
    pub billing_month: BillingMonth,
}

/// 发票查询行 (carrier_invoices)
#[derive(Debug, Clone, FromRow)]
pub struct InvoiceRecord {
    pub id: i64,
    pub carrier_id: i64,
    pub employee_id: i64,
    pub plan_type: String,
    pub billed_amount: BigDecimal,
    pub status: String,
    pub billing_month: NaiveDate,
}

/// 无法识别的存储状态按 Pending 处理，由对账重新推导，发票行不丢失
impl From<InvoiceRecord> for InvoiceLine {
    fn from(record: InvoiceRecord) -> Self {
        let status = record.status.parse().unwrap_or_else(|e| {
            tracing::warn!("Invoice {}: {}, treating as Pending", record.id, e);
            InvoiceStatus::Pending
        });
        Self {
            id: record.id,
            carrier_id: record.carrier_id,
            employee_id: record.employee_id,
            plan_type: PlanType::from(record.plan_type),
            billed_amount: record.billed_amount,
            status,
            billing_month: BillingMonth::containing(record.billing_month),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: &str) -> InvoiceRecord {
        InvoiceRecord {
            id: 7,
            carrier_id: 2,
            employee_id: 11,
            plan_type: "Dental".into(),
            billed_amount: BigDecimal::from(42),
            status: status.into(),
            billing_month: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
        }
    }

    #[test]
    fn converts_stored_record() {
        let line = InvoiceLine::from(record("Flagged"));
        assert_eq!(line.status, InvoiceStatus::Flagged);
        assert_eq!(line.plan_type, PlanType::Dental);
        assert_eq!(line.billing_month.to_string(), "2026-09-01");
    }

    #[test]
    fn derived_status_is_not_a_stored_status() {
        assert!("Matched".parse::<InvoiceStatus>().is_err());
    }

    #[test]
    fn unrecognised_stored_status_keeps_the_line_as_pending() {
        for status in ["pending", "Matched", ""] {
            let line = InvoiceLine::from(record(status));
            assert_eq!(line.status, InvoiceStatus::Pending);
            assert_eq!(line.id, 7);
            assert_eq!(line.billed_amount, BigDecimal::from(42));
        }
    }
}
