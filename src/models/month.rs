use crate::error::MonthError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 账单月份 - 始终为当月第一天 (UTC 日期)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BillingMonth(NaiveDate);

impl BillingMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    /// 任意日期归一化到当月第一天
    pub fn containing(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }
}

impl FromStr for BillingMonth {
    type Err = MonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::containing(date));
        }
        let (year, month) = s.split_once('-').ok_or_else(|| MonthError(s.to_string()))?;
        let year: i32 = year.parse().map_err(|_| MonthError(s.to_string()))?;
        let month: u32 = month.parse().map_err(|_| MonthError(s.to_string()))?;
        Self::new(year, month).ok_or_else(|| MonthError(s.to_string()))
    }
}

impl TryFrom<String> for BillingMonth {
    type Error = MonthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BillingMonth> for String {
    fn from(value: BillingMonth) -> Self {
        value.to_string()
    }
}

impl fmt::Display for BillingMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_year_month_and_full_dates() {
        let a: BillingMonth = "2026-10".parse().unwrap();
        let b: BillingMonth = "2026-10-17".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "2026-10-01");
    }

    #[test]
    fn rejects_garbage() {
        assert!("2026-13".parse::<BillingMonth>().is_err());
        assert!("october".parse::<BillingMonth>().is_err());
    }
}
