use serde::Serialize;

use super::service::{RunSummary, SweepSummary};
use crate::taxonomy::RoleLabel;

/// Response for the manual apply trigger
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyNowResponse {
    pub ok: bool,
    pub attempted: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels_used: Option<Vec<RoleLabel>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApplyNowResponse {
    pub fn failure(error: String) -> Self {
        Self {
            ok: false,
            attempted: 0,
            labels_used: None,
            error: Some(error),
        }
    }
}

impl From<RunSummary> for ApplyNowResponse {
    fn from(run: RunSummary) -> Self {
        Self {
            ok: true,
            attempted: run.attempted,
            labels_used: Some(run.labels_used),
            error: None,
        }
    }
}

/// Response for the sweep trigger
#[derive(Serialize)]
pub struct SweepResponse {
    pub ok: bool,
    pub users: u32,
    pub attempted: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<SweepSummary> for SweepResponse {
    fn from(s: SweepSummary) -> Self {
        Self {
            ok: true,
            users: s.users,
            attempted: s.attempted,
            error: None,
        }
    }
}

/// Response for the categorize trigger
#[derive(Serialize)]
pub struct CategorizeResponse {
    pub ok: bool,
    pub updated: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
