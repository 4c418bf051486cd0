use crate::error::RateError;
use crate::models::{AgeRange, BenefitPlan, PlanRates, RateModel, RateRecord};
use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const NOT_AVAILABLE: &str = "N/A";
pub const VARIES_BY_AGE: &str = "Varies by age";

/// 加价：carrier_rate * (1 + margin / 100)
pub fn apply_margin(carrier_rate: &BigDecimal, client_margin: &BigDecimal) -> BigDecimal {
    carrier_rate * (BigDecimal::from(1) + client_margin / BigDecimal::from(100))
}

/// 金额显示，两位小数
pub fn format_money(amount: &BigDecimal) -> String {
    amount.round(2).with_scale(2).to_string()
}

/// 计划费用摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateSummary {
    NotAvailable,
    /// 第一行费率加价后的金额，more_tiers 表示还有其他保障级别
    Flat { rate: BigDecimal, more_tiers: bool },
    VariesByAge,
}

impl RateSummary {
    pub fn display(&self) -> String {
        match self {
            RateSummary::NotAvailable => NOT_AVAILABLE.to_string(),
            RateSummary::Flat { rate, .. } => format_money(rate),
            RateSummary::VariesByAge => VARIES_BY_AGE.to_string(),
        }
    }
}

pub fn summarize(plan: &BenefitPlan, rates: &PlanRates) -> RateSummary {
    match rates {
        _ if rates.is_empty() => RateSummary::NotAvailable,
        PlanRates::Flat(rows) => RateSummary::Flat {
            rate: apply_margin(&rows[0].carrier_rate, &plan.client_margin),
            more_tiers: rows.len() > 1,
        },
        PlanRates::AgeBanded(_) | PlanRates::CoverageTier(_) => RateSummary::VariesByAge,
    }
}

/// 从原始费率行生成摘要；行不完整时为 N/A
pub fn summarize_records(plan: &BenefitPlan, records: &[RateRecord]) -> RateSummary {
    if records.is_empty() {
        return RateSummary::NotAvailable;
    }
    match PlanRates::from_records(plan.rate_model, records) {
        Ok(rates) => summarize(plan, &rates),
        Err(e) => {
            tracing::warn!("Plan {} ({}) rates unusable: {}", plan.id, plan.name, e);
            RateSummary::NotAvailable
        }
    }
}

/// 解析后的费率行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRate {
    pub rate_model: RateModel,
    pub carrier_rate: BigDecimal,
    /// 加价后的费率
    pub effective_rate: BigDecimal,
    /// 为 true 时 effective_rate 按每千元保额计
    pub rate_per_thousand: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_range: Option<(u32, u32)>,
}

fn first_covering<T: AgeRange>(rows: &[T], age: u32) -> Result<&T, RateError> {
    if rows.is_empty() {
        return Err(RateError::NoRates);
    }
    rows.iter().find(|r| r.covers(age)).ok_or(RateError::Unratable { age })
}

/// 按年龄查找费率行 (AGE_BANDED / COVERAGE_TIER)，取第一条覆盖该年龄的行
pub fn resolve_by_age(plan: &BenefitPlan, rates: &PlanRates, age: u32) -> Result<ResolvedRate, RateError> {
    match rates {
        PlanRates::AgeBanded(rows) => {
            let row = first_covering(rows, age)?;
            Ok(ResolvedRate {
                rate_model: RateModel::AgeBanded,
                carrier_rate: row.carrier_rate.clone(),
                effective_rate: apply_margin(&row.carrier_rate, &plan.client_margin),
                rate_per_thousand: false,
                coverage_level: None,
                age_range: Some((row.min_age, row.max_age)),
            })
        }
        PlanRates::CoverageTier(rows) => {
            let row = first_covering(rows, age)?;
            Ok(ResolvedRate {
                rate_model: RateModel::CoverageTier,
                carrier_rate: row.carrier_rate.clone(),
                effective_rate: apply_margin(&row.carrier_rate, &plan.client_margin),
                rate_per_thousand: row.rate_per_thousand,
                coverage_level: None,
                age_range: Some((row.min_age, row.max_age)),
            })
        }
        PlanRates::Flat(_) => Err(RateError::ModelMismatch {
            expected: RateModel::AgeBanded,
            actual: RateModel::Flat,
        }),
    }
}

/// 按保障级别查找费率行 (FLAT)，精确匹配 coverage_level
pub fn resolve_by_coverage_level(
    plan: &BenefitPlan,
    rates: &PlanRates,
    coverage_level: &str,
) -> Result<ResolvedRate, RateError> {
    let PlanRates::Flat(rows) = rates else {
        return Err(RateError::ModelMismatch {
            expected: RateModel::Flat,
            actual: rates.model(),
        });
    };
    if rows.is_empty() {
        return Err(RateError::NoRates);
    }
    let row = rows
        .iter()
        .find(|r| r.coverage_level == coverage_level)
        .ok_or_else(|| RateError::UnknownCoverageLevel(coverage_level.to_string()))?;

    Ok(ResolvedRate {
        rate_model: RateModel::Flat,
        carrier_rate: row.carrier_rate.clone(),
        effective_rate: apply_margin(&row.carrier_rate, &plan.client_margin),
        rate_per_thousand: false,
        coverage_level: Some(row.coverage_level.clone()),
        age_range: None,
    })
}

/// 年龄段诊断 (不拒绝数据，交由运营判断)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum AgeBandIssue {
    /// min_age > max_age
    Inverted { index: usize },
    Overlap { first: usize, second: usize },
    /// 两个相邻年龄段之间未覆盖的年龄
    Gap { from_age: u32, to_age: u32 },
}

pub fn audit_age_bands(rates: &PlanRates) -> Vec<AgeBandIssue> {
    let ranges: Vec<(usize, u32, u32)> = match rates {
        PlanRates::Flat(_) => return Vec::new(),
        PlanRates::AgeBanded(rows) => rows.iter().enumerate().map(|(i, r)| (i, r.min_age, r.max_age)).collect(),
        PlanRates::CoverageTier(rows) => rows.iter().enumerate().map(|(i, r)| (i, r.min_age, r.max_age)).collect(),
    };

    let mut issues: Vec<AgeBandIssue> = ranges
        .iter()
        .filter(|(_, min, max)| min > max)
        .map(|(index, _, _)| AgeBandIssue::Inverted { index: *index })
        .collect();

    let mut valid: Vec<_> = ranges.into_iter().filter(|(_, min, max)| min <= max).collect();
    valid.sort_by_key(|(index, min, _)| (*min, *index));

    let mut remaining = valid.into_iter();
    if let Some((first, _, first_max)) = remaining.next() {
        // 已覆盖到的最大年龄及其所在行
        let (mut reach_index, mut reach) = (first, first_max);
        for (index, min, max) in remaining {
            if min <= reach {
                issues.push(AgeBandIssue::Overlap {
                    first: reach_index,
                    second: index,
                });
            } else if min > reach.saturating_add(1) {
                issues.push(AgeBandIssue::Gap {
                    from_age: reach + 1,
                    to_age: min - 1,
                });
            }
            if max > reach {
                reach_index = index;
                reach = max;
            }
        }
    }
    issues
}

/// 截至 as_of 的周岁
pub fn age_on(birth_date: NaiveDate, as_of: NaiveDate) -> u32 {
    let mut years = as_of.year() - birth_date.year();
    if (as_of.month(), as_of.day()) < (birth_date.month(), birth_date.day()) {
        years -= 1;
    }
    u32::try_from(years).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgeBandRate, CoverageTierRate, FlatRate, PlanType};
    use std::str::FromStr;

    fn dec(v: &str) -> BigDecimal {
        BigDecimal::from_str(v).unwrap()
    }

    fn plan(model: RateModel, margin: &str) -> BenefitPlan {
        BenefitPlan {
            id: 1,
            name: "Gold PPO".into(),
            plan_type: PlanType::Medical,
            carrier_id: 3,
            client_margin: dec(margin),
            rate_model: model,
        }
    }

    fn band(min: u32, max: u32, rate: &str) -> AgeBandRate {
        AgeBandRate {
            min_age: min,
            max_age: max,
            carrier_rate: dec(rate),
        }
    }

    fn flat(level: &str, rate: &str) -> FlatRate {
        FlatRate {
            coverage_level: level.into(),
            carrier_rate: dec(rate),
        }
    }

    #[test]
    fn margin_is_a_percentage_markup() {
        assert_eq!(apply_margin(&dec("100"), &dec("10")), dec("110"));
        assert_eq!(apply_margin(&dec("80"), &dec("0")), dec("80"));
        assert_eq!(apply_margin(&dec("100"), &dec("-5")), dec("95"));
    }

    #[test]
    fn flat_summary_uses_first_row() {
        let rates = PlanRates::Flat(vec![flat("Employee Only", "100"), flat("Family", "250")]);
        let summary = summarize(&plan(RateModel::Flat, "10"), &rates);
        assert_eq!(
            summary,
            RateSummary::Flat {
                rate: dec("110"),
                more_tiers: true
            }
        );
        assert_eq!(summary.display(), "110.00");
    }

    #[test]
    fn empty_rates_are_not_available_for_every_model() {
        for model in [RateModel::Flat, RateModel::AgeBanded, RateModel::CoverageTier] {
            let p = plan(model, "5");
            assert_eq!(summarize_records(&p, &[]).display(), NOT_AVAILABLE);
        }
        assert_eq!(
            summarize(&plan(RateModel::Flat, "5"), &PlanRates::Flat(vec![])),
            RateSummary::NotAvailable
        );
    }

    #[test]
    fn malformed_rows_summarize_as_not_available() {
        let p = plan(RateModel::Flat, "5");
        let record = RateRecord {
            benefit_id: 1,
            carrier_rate: Some(dec("10")),
            ..Default::default()
        };
        assert_eq!(summarize_records(&p, &[record]), RateSummary::NotAvailable);
    }

    #[test]
    fn age_banded_plans_vary_by_age() {
        let rates = PlanRates::AgeBanded(vec![band(18, 30, "50")]);
        assert_eq!(summarize(&plan(RateModel::AgeBanded, "0"), &rates).display(), VARIES_BY_AGE);
    }

    #[test]
    fn resolves_the_covering_age_band() {
        let p = plan(RateModel::AgeBanded, "0");
        let rates = PlanRates::AgeBanded(vec![band(18, 30, "50"), band(31, 50, "70")]);

        let resolved = resolve_by_age(&p, &rates, 40).unwrap();
        assert_eq!(resolved.carrier_rate, dec("70"));
        assert_eq!(resolved.age_range, Some((31, 50)));

        assert_eq!(resolve_by_age(&p, &rates, 30).unwrap().carrier_rate, dec("50"));
        assert_eq!(resolve_by_age(&p, &rates, 60), Err(RateError::Unratable { age: 60 }));
    }

    #[test]
    fn coverage_tier_exposes_per_thousand_flag() {
        let p = plan(RateModel::CoverageTier, "10");
        let rates = PlanRates::CoverageTier(vec![CoverageTierRate {
            min_age: 0,
            max_age: 64,
            carrier_rate: dec("0.20"),
            rate_per_thousand: true,
        }]);
        let resolved = resolve_by_age(&p, &rates, 45).unwrap();
        assert!(resolved.rate_per_thousand);
        assert_eq!(resolved.effective_rate, dec("0.22"));
    }

    #[test]
    fn coverage_level_lookup_is_exact() {
        let p = plan(RateModel::Flat, "0");
        let rates = PlanRates::Flat(vec![flat("Employee Only", "100"), flat("Family", "250")]);
        assert_eq!(resolve_by_coverage_level(&p, &rates, "Family").unwrap().carrier_rate, dec("250"));
        assert_eq!(
            resolve_by_coverage_level(&p, &rates, "family"),
            Err(RateError::UnknownCoverageLevel("family".into()))
        );
        assert!(matches!(
            resolve_by_age(&p, &rates, 30),
            Err(RateError::ModelMismatch { .. })
        ));
    }

    #[test]
    fn audit_reports_overlaps_gaps_and_inversions() {
        let rates = PlanRates::AgeBanded(vec![
            band(31, 50, "70"),
            band(18, 30, "50"),
            band(45, 55, "80"),
            band(60, 64, "90"),
            band(70, 65, "1"),
        ]);
        let issues = audit_age_bands(&rates);
        assert_eq!(
            issues,
            vec![
                AgeBandIssue::Inverted { index: 4 },
                AgeBandIssue::Overlap { first: 0, second: 2 },
                AgeBandIssue::Gap { from_age: 56, to_age: 59 },
            ]
        );
        assert!(audit_age_bands(&PlanRates::AgeBanded(vec![band(0, 17, "1"), band(18, 99, "2")])).is_empty());
    }

    #[test]
    fn age_counts_completed_years() {
        let birth = NaiveDate::from_ymd_opt(1986, 10, 20).unwrap();
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()), 39);
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()), 40);
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(1980, 1, 1).unwrap()), 0);
    }
}
