use super::queries;
use crate::error::StoreError;
use crate::models::{
    BenefitPlan, BenefitWithRates, BillingMonth, Enrollment, InvoiceLine, InvoiceStatus,
    RateRecord,
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;

/// 数据访问边界：对账与费率计算只通过这里读写外部存储
#[async_trait]
pub trait BenefitsStore: Send + Sync + 'static {
    async fn list_enrollments(&self) -> Result<Vec<Enrollment>, StoreError>;

    async fn list_invoices(&self, month: BillingMonth) -> Result<Vec<InvoiceLine>, StoreError>;

    /// 返回更新后的发票行；发票不存在时返回 None
    async fn update_invoice_status(
        &self,
        invoice_id: i64,
        status: InvoiceStatus,
    ) -> Result<Option<InvoiceLine>, StoreError>;

    async fn get_benefit(&self, benefit_id: i64) -> Result<Option<BenefitWithRates>, StoreError>;

    async fn list_benefits(&self) -> Result<Vec<BenefitWithRates>, StoreError>;
}

/// PostgreSQL 实现
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn attach_rates(&self, plans: Vec<BenefitPlan>) -> Result<Vec<BenefitWithRates>, StoreError> {
        let ids: Vec<i64> = plans.iter().map(|p| p.id).collect();
        let mut by_plan: HashMap<i64, Vec<RateRecord>> = HashMap::new();
        for rate in queries::list_rates_for_benefits(&self.pool, &ids).await? {
            by_plan.entry(rate.benefit_id).or_default().push(rate);
        }

        Ok(plans
            .into_iter()
            .map(|plan| {
                let rates = by_plan.remove(&plan.id).unwrap_or_default();
                BenefitWithRates { plan, rates }
            })
            .collect())
    }
}

#[async_trait]
impl BenefitsStore for PgStore {
    async fn list_enrollments(&self) -> Result<Vec<Enrollment>, StoreError> {
        let records = queries::list_enrollments(&self.pool).await?;
        Ok(records.into_iter().map(Enrollment::from).collect())
    }

    async fn list_invoices(&self, month: BillingMonth) -> Result<Vec<InvoiceLine>, StoreError> {
        let records = queries::list_invoices_for_month(&self.pool, month.first_day()).await?;
        Ok(records.into_iter().map(InvoiceLine::from).collect())
    }

    async fn update_invoice_status(
        &self,
        invoice_id: i64,
        status: InvoiceStatus,
    ) -> Result<Option<InvoiceLine>, StoreError> {
        Ok(queries::update_invoice_status(&self.pool, invoice_id, status.as_str())
            .await?
            .map(InvoiceLine::from))
    }

    async fn get_benefit(&self, benefit_id: i64) -> Result<Option<BenefitWithRates>, StoreError> {
        let Some(record) = queries::get_benefit(&self.pool, benefit_id).await? else {
            return Ok(None);
        };
        let plan = BenefitPlan::try_from(record)?;
        Ok(self.attach_rates(vec![plan]).await?.pop())
    }

    async fn list_benefits(&self) -> Result<Vec<BenefitWithRates>, StoreError> {
        let mut plans = Vec::new();
        for record in queries::list_benefits(&self.pool).await? {
            let id = record.id;
            match BenefitPlan::try_from(record) {
                Ok(plan) => plans.push(plan),
                Err(e) => tracing::warn!("Benefit {} skipped: {}", id, e),
            }
        }
        self.attach_rates(plans).await
    }
}
