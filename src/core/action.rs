//! Action catalog
//!
//! The closed set of CRUD actions every entity can expose, and the HTTP verbs
//! routes may be mounted with.

use axum::routing::MethodFilter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A CRUD action kind
///
/// Used as the key of route tables and database interface maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    FindMany,
    FindById,
    CreateOne,
    UpdateOne,
    DeleteOne,
    Save,
}

impl Action {
    /// Every action, in catalog order
    pub const ALL: [Action; 6] = [
        Action::FindMany,
        Action::FindById,
        Action::CreateOne,
        Action::UpdateOne,
        Action::DeleteOne,
        Action::Save,
    ];

    /// Key used in route configurations and interface maps (e.g. "findMany")
    pub fn key(&self) -> &'static str {
        match self {
            Action::FindMany => "findMany",
            Action::FindById => "findById",
            Action::CreateOne => "createOne",
            Action::UpdateOne => "updateOne",
            Action::DeleteOne => "deleteOne",
            Action::Save => "save",
        }
    }

    /// Parse a catalog key, returning `None` for anything outside the catalog
    pub fn parse_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.key() == key)
    }

    /// HTTP verb the action is mounted with
    pub fn method(&self) -> HttpMethod {
        match self {
            Action::FindMany | Action::FindById => HttpMethod::Get,
            Action::CreateOne => HttpMethod::Post,
            Action::UpdateOne | Action::Save => HttpMethod::Put,
            Action::DeleteOne => HttpMethod::Delete,
        }
    }

    /// Whether the action addresses a single record through a path identifier
    pub fn targets_single(&self) -> bool {
        matches!(
            self,
            Action::FindById | Action::UpdateOne | Action::DeleteOne
        )
    }

    /// Whether the action changes stored data
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Action::FindMany | Action::FindById)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_key(s).ok_or_else(|| format!("unknown action [{}]", s))
    }
}

/// HTTP verbs accepted for generated and extended routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 4] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
        }
    }

    /// Case-insensitive parse
    pub fn parse_method(s: &str) -> Option<Self> {
        let lower = s.to_ascii_lowercase();
        Self::ALL.into_iter().find(|m| m.as_str() == lower)
    }

    pub(crate) fn filter(&self) -> MethodFilter {
        match self {
            HttpMethod::Get => MethodFilter::GET,
            HttpMethod::Post => MethodFilter::POST,
            HttpMethod::Put => MethodFilter::PUT,
            HttpMethod::Delete => MethodFilter::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}
