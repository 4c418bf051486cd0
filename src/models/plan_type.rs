use serde::{Deserialize, Serialize};
use std::fmt;

/// 福利类型 (选择项的键 / 发票行的 plan_type)
///
/// 已知类型按声明顺序排序，未知类型保留原始字符串。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlanType {
    Medical,
    Dental,
    Vision,
    Life,
    Disability,
    Other(String),
}

impl PlanType {
    pub fn as_str(&self) -> &str {
        match self {
            PlanType::Medical => "Medical",
            PlanType::Dental => "Dental",
            PlanType::Vision => "Vision",
            PlanType::Life => "Life",
            PlanType::Disability => "Disability",
            PlanType::Other(name) => name,
        }
    }
}

impl From<&str> for PlanType {
    fn from(value: &str) -> Self {
        match value {
            "Medical" => PlanType::Medical,
            "Dental" => PlanType::Dental,
            "Vision" => PlanType::Vision,
            "Life" => PlanType::Life,
            "Disability" => PlanType::Disability,
            other => PlanType::Other(other.to_string()),
        }
    }
}

impl From<String> for PlanType {
    fn from(value: String) -> Self {
        match PlanType::from(value.as_str()) {
            PlanType::Other(_) => PlanType::Other(value),
            known => known,
        }
    }
}

impl From<PlanType> for String {
    fn from(value: PlanType) -> Self {
        match value {
            PlanType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
