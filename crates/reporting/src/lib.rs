//! Cohort retention reporting: first-purchase cohorts, monthly retention and
//! churn, cumulative lifetime value, and CSV/JSON export of the results.

pub mod activity;
pub mod assignment;
pub mod cohort;
pub mod labels;
pub mod report_builder;
pub mod retention;

#[cfg(test)]
mod test_support;

pub use cohort::{CohortAnalyzer, CohortReport, CohortRow};
pub use labels::{Benchmark, RetentionPhase};
pub use report_builder::ReportBuilder;
pub use retention::CohortMetric;
