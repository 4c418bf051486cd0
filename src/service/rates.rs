use super::rate_calculator::{
    self, age_on, audit_age_bands, resolve_by_age, resolve_by_coverage_level, AgeBandIssue, RateSummary,
    ResolvedRate,
};
use crate::db::BenefitsStore;
use crate::error::{QuoteError, RateError, StoreError};
use crate::models::{BenefitPlan, PlanRates, RateModel};
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 计划费用摘要 (列表页)
#[derive(Debug, Clone, Serialize)]
pub struct PlanRateSummary {
    pub plan: BenefitPlan,
    pub summary: RateSummary,
    pub display: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub age_band_issues: Vec<AgeBandIssue>,
}

/// 报价请求
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteRequest {
    pub age: Option<u32>,
    /// 未提供 age 时按出生日期计算当天周岁
    pub birth_date: Option<NaiveDate>,
    pub coverage_level: Option<String>,
    /// 选定保额 (COVERAGE_TIER 且按每千元计费时必填)
    pub coverage_amount: Option<BigDecimal>,
}

/// 报价结果
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub benefit_id: i64,
    pub rate: ResolvedRate,
    /// 每期保费
    pub premium: BigDecimal,
    pub display: String,
}

pub struct RateService {
    store: Arc<dyn BenefitsStore>,
}

impl RateService {
    pub fn new(store: Arc<dyn BenefitsStore>) -> Self {
        Self { store }
    }

    /// 全部计划的费用摘要
    pub async fn summaries(&self) -> Result<Vec<PlanRateSummary>, StoreError> {
        let benefits = self.store.list_benefits().await?;
        tracing::info!("费率摘要: {} 个计划", benefits.len());

        Ok(benefits
            .into_iter()
            .map(|b| {
                let summary = rate_calculator::summarize_records(&b.plan, &b.rates);
                let age_band_issues = PlanRates::from_records(b.plan.rate_model, &b.rates)
                    .map(|rates| audit_age_bands(&rates))
                    .unwrap_or_default();
                for issue in &age_band_issues {
                    tracing::warn!("Plan {} age bands: {:?}", b.plan.id, issue);
                }
                PlanRateSummary {
                    display: summary.display(),
                    plan: b.plan,
                    summary,
                    age_band_issues,
                }
            })
            .collect())
    }

    /// 解析计划费率并计算保费
    ///
    /// FLAT 按 coverage_level 查找；其余模型按 age 查找。
    /// 按每千元计费时保费 = effective_rate * coverage_amount / 1000。
    pub async fn quote(&self, benefit_id: i64, request: &QuoteRequest) -> Result<Quote, QuoteError> {
        let Some(benefit) = self.store.get_benefit(benefit_id).await? else {
            return Err(QuoteError::PlanNotFound(benefit_id));
        };
        let rates = PlanRates::from_records(benefit.plan.rate_model, &benefit.rates)?;

        let rate = match benefit.plan.rate_model {
            RateModel::Flat => {
                let level = request
                    .coverage_level
                    .as_deref()
                    .ok_or(RateError::MissingInput("coverage_level"))?;
                resolve_by_coverage_level(&benefit.plan, &rates, level)?
            }
            RateModel::AgeBanded | RateModel::CoverageTier => {
                let age = request
                    .age
                    .or_else(|| request.birth_date.map(|d| age_on(d, Utc::now().date_naive())))
                    .ok_or(RateError::MissingInput("age"))?;
                resolve_by_age(&benefit.plan, &rates, age)?
            }
        };

        let premium = if rate.rate_per_thousand {
            let amount = request
                .coverage_amount
                .as_ref()
                .ok_or(RateError::MissingInput("coverage_amount"))?;
            &rate.effective_rate * amount / BigDecimal::from(1000)
        } else {
            rate.effective_rate.clone()
        };

        Ok(Quote {
            benefit_id,
            display: rate_calculator::format_money(&premium),
            rate,
            premium,
        })
    }
}
