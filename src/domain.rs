//! Closed vocabularies shared by the document store, the approval workflow and
//! the HTTP layer. Rows keep these as text; conversion happens at the edges.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid {kind}: '{value}'")]
pub struct ParseDomainError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseDomainError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Top-level document category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Prosper,
    Bankermart,
    Time,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Prosper, Section::Bankermart, Section::Time];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prosper => "prosper",
            Self::Bankermart => "bankermart",
            Self::Time => "time",
        }
    }

    /// Conventional sub-sections offered for the section. Uploads may use other values.
    pub fn sub_sections(&self) -> &'static [&'static str] {
        match self {
            Self::Prosper => &["Investments", "Reports", "Analytics"],
            Self::Bankermart => &["Transactions", "Markets", "Accounts"],
            Self::Time => &["Schedules", "Calendar", "Deadlines"],
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prosper" => Ok(Self::Prosper),
            "bankermart" => Ok(Self::Bankermart),
            "time" => Ok(Self::Time),
            _ => Err(ParseDomainError::new("section", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseDomainError::new("document status", s)),
        }
    }
}

/// Outcome recorded by an approval. `pending` is never a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        DocumentStatus::from(*self).as_str()
    }
}

impl From<Decision> for DocumentStatus {
    fn from(value: Decision) -> Self {
        match value {
            Decision::Approved => DocumentStatus::Approved,
            Decision::Rejected => DocumentStatus::Rejected,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseDomainError::new("decision", s)),
        }
    }
}
