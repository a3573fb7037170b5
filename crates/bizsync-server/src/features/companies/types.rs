use bizsync_common::types::{Outcome, Record, Strategy};
use serde::{Deserialize, Serialize};

/// `POST /companies/upload` query string
#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    pub strategy: Option<String>,
}

/// `POST /companies` body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconcileRequest {
    pub name: String,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub strategy: Option<Strategy>,
}

impl ReconcileRequest {
    /// Trimmed record; blank optional fields count as absent
    pub fn to_record(&self) -> Record {
        let optional = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Record {
            name: self.name.trim().to_string(),
            zip: optional(&self.zip),
            website: optional(&self.website),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub outcome: Outcome,
    pub strategy: Strategy,
}

/// `GET /companies` query string
#[derive(Debug, Deserialize)]
pub struct CandidateQuery {
    pub name: String,
    #[serde(default)]
    pub zip: Option<String>,
}
