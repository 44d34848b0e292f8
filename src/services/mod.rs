pub mod grouping_service;
pub mod header_service;
pub mod subject_service;
pub mod warn_writer;

pub use grouping_service::{ClaimRegistry, GroupingService, ReconcileOutcome, Rejection};
pub use header_service::{HeaderClassification, HeaderService};
pub use subject_service::SubjectService;
pub use warn_writer::WarnWriter;
