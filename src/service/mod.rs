pub mod rate_calculator;
pub mod rates;
pub mod reconciler;

pub use rates::{PlanRateSummary, Quote, QuoteRequest, RateService};
pub use reconciler::{reconcile, ReconciliationService};
