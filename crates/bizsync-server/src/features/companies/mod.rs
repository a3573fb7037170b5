pub mod routes;
pub mod types;

pub use routes::companies_routes;
pub use types::{CandidateQuery, ReconcileRequest, ReconcileResponse, UploadParams};
