use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::ParseDomainError;

/// Closed set of user roles. Stored role strings outside this set never become a `Role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    User,
}

/// Actions guarded by the permission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ReadDocuments,
    UploadDocument,
    DeleteDocument,
    ReviewDocument,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadDocuments => "read_documents",
            Self::UploadDocument => "upload_document",
            Self::DeleteDocument => "delete_document",
            Self::ReviewDocument => "review_document",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Manager, Role::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::User => "user",
        }
    }

    pub fn permits(&self, permission: Permission) -> bool {
        match permission {
            Permission::ReadDocuments | Permission::UploadDocument => true,
            Permission::DeleteDocument | Permission::ReviewDocument => {
                matches!(self, Self::Admin | Self::Manager)
            }
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "user" => Ok(Self::User),
            _ => Err(ParseDomainError {
                kind: "role",
                value: s.to_owned(),
            }),
        }
    }
}
