use super::PlanType;
use crate::error::{RateError, StoreError};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// 费率模型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateModel {
    Flat,
    AgeBanded,
    CoverageTier,
}

impl RateModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateModel::Flat => "FLAT",
            RateModel::AgeBanded => "AGE_BANDED",
            RateModel::CoverageTier => "COVERAGE_TIER",
        }
    }
}

impl FromStr for RateModel {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FLAT" => Ok(RateModel::Flat),
            "AGE_BANDED" => Ok(RateModel::AgeBanded),
            "COVERAGE_TIER" => Ok(RateModel::CoverageTier),
            other => Err(StoreError::Malformed(format!("unknown rate model {other:?}"))),
        }
    }
}

impl fmt::Display for RateModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 福利计划
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenefitPlan {
    pub id: i64,
    pub name: String,
    pub plan_type: PlanType,
    pub carrier_id: i64,
    /// 客户加价百分比，5 表示 5%
    pub client_margin: BigDecimal,
    pub rate_model: RateModel,
}

/// 计划查询行 (benefits)
#[derive(Debug, Clone, FromRow)]
pub struct BenefitRecord {
    pub id: i64,
    pub name: String,
    pub plan_type: String,
    pub carrier_id: i64,
    pub client_margin: BigDecimal,
    pub rate_model: String,
}

impl TryFrom<BenefitRecord> for BenefitPlan {
    type Error = StoreError;

    fn try_from(record: BenefitRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            name: record.name,
            plan_type: PlanType::from(record.plan_type),
            carrier_id: record.carrier_id,
            client_margin: record.client_margin,
            rate_model: record.rate_model.parse()?,
        })
    }
}

/// 费率查询行 (benefit_rates)，各字段按模型可空
#[derive(Debug, Clone, Default, PartialEq, FromRow, Serialize, Deserialize)]
pub struct RateRecord {
    pub benefit_id: i64,
    pub coverage_level: Option<String>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub carrier_rate: Option<BigDecimal>,
    pub rate_per_thousand: Option<bool>,
}

/// 计划 + 费率行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenefitWithRates {
    pub plan: BenefitPlan,
    pub rates: Vec<RateRecord>,
}

/// FLAT: 按保障级别定价
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRate {
    pub coverage_level: String,
    pub carrier_rate: BigDecimal,
}

/// AGE_BANDED: 按年龄段定价
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeBandRate {
    pub min_age: u32,
    pub max_age: u32,
    pub carrier_rate: BigDecimal,
}

/// COVERAGE_TIER: 按年龄段定价，可按每千元保额计费
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageTierRate {
    pub min_age: u32,
    pub max_age: u32,
    pub carrier_rate: BigDecimal,
    pub rate_per_thousand: bool,
}

/// 年龄区间 (闭区间)
pub trait AgeRange {
    fn min_age(&self) -> u32;
    fn max_age(&self) -> u32;

    fn covers(&self, age: u32) -> bool {
        self.min_age() <= age && age <= self.max_age()
    }
}

impl AgeRange for AgeBandRate {
    fn min_age(&self) -> u32 {
        self.min_age
    }
    fn max_age(&self) -> u32 {
        self.max_age
    }
}

impl AgeRange for CoverageTierRate {
    fn min_age(&self) -> u32 {
        self.min_age
    }
    fn max_age(&self) -> u32 {
        self.max_age
    }
}

/// 某计划的全部费率行，形状由费率模型决定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rate_model", content = "rates", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanRates {
    Flat(Vec<FlatRate>),
    AgeBanded(Vec<AgeBandRate>),
    CoverageTier(Vec<CoverageTierRate>),
}

impl PlanRates {
    /// 按计划声明的模型构建费率行，任何一行缺少该模型需要的字段即失败
    pub fn from_records(model: RateModel, records: &[RateRecord]) -> Result<Self, RateError> {
        let rates = match model {
            RateModel::Flat => PlanRates::Flat(
                records
                    .iter()
                    .enumerate()
                    .map(|(index, r)| {
                        Ok(FlatRate {
                            coverage_level: required(r.coverage_level.clone(), index, model, "coverage_level")?,
                            carrier_rate: required(r.carrier_rate.clone(), index, model, "carrier_rate")?,
                        })
                    })
                    .collect::<Result<_, RateError>>()?,
            ),
            RateModel::AgeBanded => PlanRates::AgeBanded(
                records
                    .iter()
                    .enumerate()
                    .map(|(index, r)| {
                        Ok(AgeBandRate {
                            min_age: age(r.min_age, index, model, "min_age")?,
                            max_age: age(r.max_age, index, model, "max_age")?,
                            carrier_rate: required(r.carrier_rate.clone(), index, model, "carrier_rate")?,
                        })
                    })
                    .collect::<Result<_, RateError>>()?,
            ),
            RateModel::CoverageTier => PlanRates::CoverageTier(
                records
                    .iter()
                    .enumerate()
                    .map(|(index, r)| {
                        Ok(CoverageTierRate {
                            min_age: age(r.min_age, index, model, "min_age")?,
                            max_age: age(r.max_age, index, model, "max_age")?,
                            carrier_rate: required(r.carrier_rate.clone(), index, model, "carrier_rate")?,
                            rate_per_thousand: r.rate_per_thousand.unwrap_or(false),
                        })
                    })
                    .collect::<Result<_, RateError>>()?,
            ),
        };
        Ok(rates)
    }

    pub fn model(&self) -> RateModel {
        match self {
            PlanRates::Flat(_) => RateModel::Flat,
            PlanRates::AgeBanded(_) => RateModel::AgeBanded,
            PlanRates::CoverageTier(_) => RateModel::CoverageTier,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PlanRates::Flat(rows) => rows.len(),
            PlanRates::AgeBanded(rows) => rows.len(),
            PlanRates::CoverageTier(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn required<T>(value: Option<T>, index: usize, model: RateModel, field: &'static str) -> Result<T, RateError> {
    value.ok_or(RateError::MalformedRate { index, model, field })
}

fn age(value: Option<i32>, index: usize, model: RateModel, field: &'static str) -> Result<u32, RateError> {
    required(value, index, model, field)
        .and_then(|v| u32::try_from(v).map_err(|_| RateError::MalformedRate { index, model, field }))
}
