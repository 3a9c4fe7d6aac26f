//! Response bodies of the API service

use common::store::Record;
use serde::{Deserialize, Serialize};

/// Acknowledgement returned by mutations without a richer result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Success {
    pub success: bool,
}

impl Success {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// A project with its votes expanded, plus its comments
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    pub project: Record,
    pub comments: Vec<Record>,
}

/// Outcome of a vote toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteState {
    Voted,
    Unvoted,
}
