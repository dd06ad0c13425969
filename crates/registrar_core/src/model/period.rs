//! Academic period (term) record.

use serde::{Deserialize, Serialize};

pub type PeriodId = i64;

/// One academic term, e.g. code `20242` for the second half of 2024.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub id: PeriodId,
    pub code: String,
    pub name: String,
}
