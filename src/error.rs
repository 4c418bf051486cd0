use crate::models::{InvoiceStatus, RateModel, ReviewAction, RowStatus};
use thiserror::Error;

/// 数据访问边界错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored record is malformed: {0}")]
    Malformed(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// 审核操作 (Accept / Flag) 错误
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("row has no linked invoice to update")]
    NoLinkedInvoice,

    #[error("cannot {action} a row in status {status}")]
    InvalidTransition { action: ReviewAction, status: RowStatus },

    #[error("invoice {invoice_id} was not updated to {requested}")]
    WriteRejected {
        invoice_id: i64,
        requested: InvoiceStatus,
    },

    #[error("invoice {requested} is not the invoice linked to this row ({linked:?})")]
    InvoiceMismatch { requested: i64, linked: Option<i64> },

    #[error("no reconciliation row for employee {employee_id} / {plan_type}")]
    RowNotFound { employee_id: i64, plan_type: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 费率计算错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateError {
    #[error("rate row {index} is malformed for model {model}: missing {field}")]
    MalformedRate {
        index: usize,
        model: RateModel,
        field: &'static str,
    },

    #[error("plan uses {actual} rates, {expected} lookup is not applicable")]
    ModelMismatch { expected: RateModel, actual: RateModel },

    #[error("no rate band covers age {age}")]
    Unratable { age: u32 },

    #[error("no rate for coverage level {0:?}")]
    UnknownCoverageLevel(String),

    #[error("plan has no rates")]
    NoRates,

    #[error("{0} is required for this plan")]
    MissingInput(&'static str),
}

/// 报价错误 (查询计划 + 费率解析)
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("benefit plan {0} not found")]
    PlanNotFound(i64),

    #[error(transparent)]
    Rate(#[from] RateError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 账单月份解析错误
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid billing month {0:?}, expected YYYY-MM or YYYY-MM-DD")]
pub struct MonthError(pub String);
