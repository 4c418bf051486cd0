pub mod benefit;
pub mod enrollment;
pub mod invoice;
pub mod month;
pub mod plan_type;
pub mod reconciliation;

pub use benefit::{
    AgeBandRate, AgeRange, BenefitPlan, BenefitRecord, BenefitWithRates, CoverageTierRate,
    FlatRate, PlanRates, RateModel, RateRecord,
};
pub use enrollment::{EmployeeRef, Enrollment, EnrollmentRecord, Selection, Selections};
pub use invoice::{InvoiceLine, InvoiceRecord, InvoiceStatus};
pub use month::BillingMonth;
pub use plan_type::PlanType;
pub use reconciliation::{
    ReconciliationReport, ReconciliationRow, ReconciliationSummary, ReviewAction, RowStatus,
};
