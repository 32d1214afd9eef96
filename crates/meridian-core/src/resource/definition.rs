//! Definitional resources keyed by canonical url and version

use super::Extension;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Publication status of a definitional resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum PublicationStatus {
    Draft,
    Active,
    Retired,
    Unknown,
}

impl PublicationStatus {
    /// Lowercase code
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::Draft => "draft",
            PublicationStatus::Active => "active",
            PublicationStatus::Retired => "retired",
            PublicationStatus::Unknown => "unknown",
        }
    }

    /// Draft, active or retired
    pub fn is_publishable(&self) -> bool {
        !matches!(self, PublicationStatus::Unknown)
    }
}

impl fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical url, business version and status
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Definition {
    /// Canonical url
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Business version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Publication status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PublicationStatus>,
}

/// Process definition
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActivityDefinition {
    /// Canonical url of the process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Process version (`major.minor`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Publication status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PublicationStatus>,
    /// Human readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Extensions, including process authorizations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
}

impl ActivityDefinition {
    /// Url/version/status view
    pub fn definition(&self) -> Definition {
        Definition {
            url: self.url.clone(),
            version: self.version.clone(),
            status: self.status,
        }
    }
}

/// A concept in a code system
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConceptDefinition {
    /// Code
    pub code: String,
    /// Display text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// Code system
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CodeSystem {
    /// Canonical url
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Business version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Publication status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PublicationStatus>,
    /// Concepts defined by the system
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub concept: Vec<ConceptDefinition>,
}

impl CodeSystem {
    /// Url/version/status view
    pub fn definition(&self) -> Definition {
        Definition {
            url: self.url.clone(),
            version: self.version.clone(),
            status: self.status,
        }
    }

    /// True when a concept with exactly this code is defined
    pub fn defines(&self, code: &str) -> bool {
        self.concept.iter().any(|c| c.code == code)
    }
}

/// Unique id entry of a naming system
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NamingSystemUniqueId {
    /// Id kind (`uri`, `oid`, `other`)
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Id value
    pub value: String,
}

/// Naming system
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NamingSystem {
    /// Unique name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Publication status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PublicationStatus>,
    /// Unique ids
    #[serde(default, rename = "uniqueId", skip_serializing_if = "Vec::is_empty")]
    pub unique_id: Vec<NamingSystemUniqueId>,
}

impl NamingSystem {
    /// Unique id values
    pub fn unique_id_values(&self) -> impl Iterator<Item = &str> {
        self.unique_id.iter().map(|u| u.value.as_str())
    }
}
