use super::BenefitsStore;
use crate::error::StoreError;
use crate::models::{BenefitWithRates, BillingMonth, Enrollment, InvoiceLine, InvoiceStatus};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// 内存存储 - 用于测试和本地演示
///
/// 读取按 id 排序，保证结果可复现。
#[derive(Default)]
pub struct MemoryStore {
    enrollments: DashMap<i64, Enrollment>,
    invoices: DashMap<i64, InvoiceLine>,
    benefits: DashMap<i64, BenefitWithRates>,
    /// 模拟读取失败
    pub fail_reads: AtomicBool,
    /// 模拟写入失败
    pub fail_writes: AtomicBool,
    pub write_calls: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_enrollment(&self, enrollment: Enrollment) {
        self.enrollments.insert(enrollment.id, enrollment);
    }

    pub fn insert_invoice(&self, invoice: InvoiceLine) {
        self.invoices.insert(invoice.id, invoice);
    }

    pub fn insert_benefit(&self, benefit: BenefitWithRates) {
        self.benefits.insert(benefit.plan.id, benefit);
    }

    pub fn remove_invoice(&self, invoice_id: i64) -> Option<InvoiceLine> {
        self.invoices.remove(&invoice_id).map(|(_, line)| line)
    }

    pub fn invoice(&self, invoice_id: i64) -> Option<InvoiceLine> {
        self.invoices.get(&invoice_id).map(|entry| entry.value().clone())
    }

    pub fn write_count(&self) -> u64 {
        self.write_calls.load(Ordering::Relaxed)
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("reads disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BenefitsStore for MemoryStore {
    async fn list_enrollments(&self) -> Result<Vec<Enrollment>, StoreError> {
        self.check_read()?;
        let mut out: Vec<Enrollment> = self.enrollments.iter().map(|e| e.value().clone()).collect();
        out.sort_by_key(|e| e.id);
        Ok(out)
    }

    async fn list_invoices(&self, month: BillingMonth) -> Result<Vec<InvoiceLine>, StoreError> {
        self.check_read()?;
        let mut out: Vec<InvoiceLine> = self
            .invoices
            .iter()
            .filter(|i| i.billing_month == month)
            .map(|i| i.value().clone())
            .collect();
        out.sort_by_key(|i| i.id);
        Ok(out)
    }

    async fn update_invoice_status(
        &self,
        invoice_id: i64,
        status: InvoiceStatus,
    ) -> Result<Option<InvoiceLine>, StoreError> {
        self.write_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(self.invoices.get_mut(&invoice_id).map(|mut entry| {
            entry.status = status;
            entry.value().clone()
        }))
    }

    async fn get_benefit(&self, benefit_id: i64) -> Result<Option<BenefitWithRates>, StoreError> {
        self.check_read()?;
        Ok(self.benefits.get(&benefit_id).map(|b| b.value().clone()))
    }

    async fn list_benefits(&self) -> Result<Vec<BenefitWithRates>, StoreError> {
        self.check_read()?;
        let mut out: Vec<BenefitWithRates> = self.benefits.iter().map(|b| b.value().clone()).collect();
        out.sort_by_key(|b| b.plan.id);
        Ok(out)
    }
}
