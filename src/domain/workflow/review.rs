//! Human review decision delivered to a waiting workflow

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Business outcome derived from a review decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    /// Reviewer accepted the data; form data is applied to the document
    Confirmed,
    /// Reviewer rejected the data and asked for another analysis run
    Reanalyze,
    /// Reviewer rejected the data and will enter it by hand
    ManualEntry,
}

impl ReviewOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Reanalyze => "reanalyze",
            Self::ManualEntry => "manual_entry",
        }
    }
}

impl fmt::Display for ReviewOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review decision payload
///
/// The outcome is derived from two independent flags: `confirmed` wins,
/// then `reanalyze`, otherwise manual entry. The engine never looks inside
/// `form_data`; it is forwarded to the apply-decision activity untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDecision {
    #[serde(default)]
    pub confirmed: bool,

    #[serde(default)]
    pub reanalyze: bool,

    #[serde(default)]
    pub form_data: Map<String, Value>,
}

impl ReviewDecision {
    /// Decision confirming the extracted data
    pub fn confirm() -> Self {
        Self {
            confirmed: true,
            ..Default::default()
        }
    }

    /// Decision requesting another analysis run
    pub fn reanalyze() -> Self {
        Self {
            reanalyze: true,
            ..Default::default()
        }
    }

    /// Decision falling back to manual data entry
    pub fn manual_entry() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.form_data.insert(name.into(), value.into());
        self
    }

    pub fn outcome(&self) -> ReviewOutcome {
        if self.confirmed {
            ReviewOutcome::Confirmed
        } else if self.reanalyze {
            ReviewOutcome::Reanalyze
        } else {
            ReviewOutcome::ManualEntry
        }
    }
}
