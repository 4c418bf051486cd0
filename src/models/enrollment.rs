use super::PlanType;
use bigdecimal::BigDecimal;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// 员工在某福利类型下的选择项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub cost: BigDecimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_level: Option<String>,
}

impl Selection {
    pub fn with_cost(cost: BigDecimal) -> Self {
        Self {
            cost,
            plan_id: None,
            coverage_level: None,
        }
    }
}

/// 福利类型 -> 选择项 (保序)
pub type Selections = IndexMap<PlanType, Selection>;

/// 已解析的员工引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRef {
    pub id: i64,
    pub name: String,
}

/// 报名记录 (enrollments LEFT JOIN employees)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    /// 员工已删除时为 None
    pub employee: Option<EmployeeRef>,
    pub selections: Selections,
}

/// 报名查询行
#[derive(Debug, Clone, FromRow)]
pub struct EnrollmentRecord {
    pub id: i64,
    pub employee_id: Option<i64>,
    pub employee_name: Option<String>,
    pub selections: Json<Selections>,
}

impl From<EnrollmentRecord> for Enrollment {
    fn from(record: EnrollmentRecord) -> Self {
        let employee = match (record.employee_id, record.employee_name) {
            (Some(id), Some(name)) => Some(EmployeeRef { id, name }),
            _ => None,
        };
        Self {
            id: record.id,
            employee,
            selections: record.selections.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selections_keep_document_order() {
        let raw = r#"{"Vision": {"cost": 5.5}, "Medical": {"cost": 120, "coverage_level": "Family"}}"#;
        let selections: Selections = serde_json::from_str(raw).unwrap();
        let keys: Vec<_> = selections.keys().cloned().collect();
        assert_eq!(keys, vec![PlanType::Vision, PlanType::Medical]);
        assert_eq!(
            selections[&PlanType::Medical].coverage_level.as_deref(),
            Some("Family")
        );
    }

    #[test]
    fn unresolved_employee_becomes_none() {
        let record = EnrollmentRecord {
            id: 1,
            employee_id: Some(9),
            employee_name: None,
            selections: Json(Selections::new()),
        };
        assert!(Enrollment::from(record).employee.is_none());
    }
}
