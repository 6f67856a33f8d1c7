pub mod conditions_service;
pub mod report_service;

pub use conditions_service::{ConditionsError, ConditionsService};
pub use report_service::{
    build_email_payload, ReportError, ReportOutcome, ReportService, ReportSettings, SkipReason,
};
