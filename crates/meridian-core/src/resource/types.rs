//! Shared data types: codings, identifiers, references and extensions

use super::ResourceType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A code from a code system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Coding {
    /// Code system url
    #[serde(default)]
    pub system: String,
    /// Code within the system
    #[serde(default)]
    pub code: String,
    /// Optional code system version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Nested extensions carried on the coding
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
}

impl Coding {
    /// Create a coding without version or extensions
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            code: code.into(),
            version: None,
            extension: Vec::new(),
        }
    }

    /// Attach an extension
    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extension.push(extension);
        self
    }

    /// True when system and code are the same, ignoring version and extensions
    pub fn same_code(&self, other: &Coding) -> bool {
        self.system == other.system && self.code == other.code
    }

    /// True when the coding belongs to `system` with code `code`
    pub fn is(&self, system: &str, code: &str) -> bool {
        self.system == system && self.code == code
    }

    /// Extensions with the given url
    pub fn extensions<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a Extension> + 'a {
        self.extension.iter().filter(move |e| e.url == url)
    }

    /// Search token form `system|code`
    pub fn token(&self) -> String {
        format!("{}|{}", self.system, self.code)
    }
}

impl fmt::Display for Coding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.system, self.code)
    }
}

/// A set of codings describing one concept
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CodeableConcept {
    /// Codings
    #[serde(default)]
    pub coding: Vec<Coding>,
}

impl CodeableConcept {
    /// Concept with a single coding
    pub fn of(coding: Coding) -> Self {
        Self {
            coding: vec![coding],
        }
    }

    /// True when any coding matches `system` and `code`
    pub fn has(&self, system: &str, code: &str) -> bool {
        self.coding.iter().any(|c| c.is(system, code))
    }
}

/// A business identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Identifier {
    /// Naming system url
    #[serde(default)]
    pub system: String,
    /// Identifier value
    #[serde(default)]
    pub value: String,
}

impl Identifier {
    /// Create an identifier
    pub fn new(system: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            value: value.into(),
        }
    }

    /// True when the value is empty or whitespace only
    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// Search token form `system|value`
    pub fn token(&self) -> String {
        format!("{}|{}", self.system, self.value)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.system, self.value)
    }
}

/// Reference to another resource, either literal (`Type/id`) or logical (by identifier)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Reference {
    /// Literal reference, relative (`Organization/1`) or absolute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Declared target type
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<ResourceType>,
    /// Logical identifier of the target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Identifier>,
}

/// Where a reference points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceTarget<'a> {
    /// A resource on this server
    Local {
        /// Target type
        resource_type: ResourceType,
        /// Target logical id
        id: &'a str,
    },
    /// A resource identified by business identifier
    Logical {
        /// Declared target type, if any
        resource_type: Option<ResourceType>,
        /// Identifier to look up
        identifier: &'a Identifier,
    },
    /// An absolute url on some other server
    External(&'a str),
    /// Neither a parsable literal nor an identifier
    Unresolvable,
}

impl Reference {
    /// Literal reference such as `Organization/1`
    pub fn literal(reference: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
            resource_type: None,
            identifier: None,
        }
    }

    /// Logical reference to a resource of `resource_type` with `identifier`
    pub fn logical(resource_type: ResourceType, identifier: Identifier) -> Self {
        Self {
            reference: None,
            resource_type: Some(resource_type),
            identifier: Some(identifier),
        }
    }

    /// Attach an identifier to a literal reference
    pub fn with_identifier(mut self, identifier: Identifier) -> Self {
        self.identifier = Some(identifier);
        self
    }

    /// Classify the reference relative to this server's base url
    pub fn target(&self, server_base_url: &str) -> ReferenceTarget<'_> {
        if let Some(literal) = self.reference.as_deref() {
            let base = server_base_url.trim_end_matches('/');
            let relative = literal
                .strip_prefix(base)
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(literal);

            if relative.contains("://") {
                return ReferenceTarget::External(literal);
            }

            let mut segments = relative.split('/');
            let parsed = match (segments.next(), segments.next()) {
                (Some(type_name), Some(id)) if !id.is_empty() => {
                    type_name.parse::<ResourceType>().ok().map(|rt| (rt, id))
                }
                _ => None,
            };

            return match parsed {
                Some((resource_type, id)) => ReferenceTarget::Local { resource_type, id },
                None => ReferenceTarget::Unresolvable,
            };
        }

        match self.identifier.as_ref() {
            Some(identifier) => ReferenceTarget::Logical {
                resource_type: self.resource_type,
                identifier,
            },
            None => ReferenceTarget::Unresolvable,
        }
    }

    /// Value used when matching references in queries
    pub fn search_value(&self) -> Option<String> {
        match (&self.reference, &self.identifier) {
            (Some(reference), _) => Some(reference.clone()),
            (None, Some(identifier)) => Some(identifier.token()),
            (None, None) => None,
        }
    }
}

/// Typed value of an extension
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtensionValue {
    /// `valueString`
    #[serde(rename = "valueString")]
    String(String),
    /// `valueCanonical`
    #[serde(rename = "valueCanonical")]
    Canonical(String),
    /// `valueCoding`
    #[serde(rename = "valueCoding")]
    Coding(Coding),
    /// `valueIdentifier`
    #[serde(rename = "valueIdentifier")]
    Identifier(Identifier),
    /// `valueReference`
    #[serde(rename = "valueReference")]
    Reference(Reference),
}

/// Loosely typed nested extension
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extension {
    /// Extension url
    pub url: String,
    /// Value, absent for complex extensions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ExtensionValue>,
    /// Sub-extensions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
}

impl Extension {
    /// Simple extension carrying a value
    pub fn new(url: impl Into<String>, value: ExtensionValue) -> Self {
        Self {
            url: url.into(),
            value: Some(value),
            extension: Vec::new(),
        }
    }

    /// Complex extension made of sub-extensions
    pub fn complex(url: impl Into<String>, extension: Vec<Extension>) -> Self {
        Self {
            url: url.into(),
            value: None,
            extension,
        }
    }

    /// Sub-extensions with the given url
    pub fn subs<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a Extension> + 'a {
        self.extension.iter().filter(move |e| e.url == url)
    }

    /// The only sub-extension with the given url, `None` when missing or repeated
    pub fn single_sub<'a>(&'a self, url: &str) -> Option<&'a Extension> {
        let mut subs = self.extension.iter().filter(|e| e.url == url);
        match (subs.next(), subs.next()) {
            (Some(sub), None) => Some(sub),
            _ => None,
        }
    }

    /// String or canonical value
    pub fn as_str(&self) -> Option<&str> {
        match self.value.as_ref()? {
            ExtensionValue::String(value) | ExtensionValue::Canonical(value) => Some(value),
            _ => None,
        }
    }

    /// Coding value
    pub fn as_coding(&self) -> Option<&Coding> {
        match self.value.as_ref()? {
            ExtensionValue::Coding(coding) => Some(coding),
            _ => None,
        }
    }

    /// Identifier value
    pub fn as_identifier(&self) -> Option<&Identifier> {
        match self.value.as_ref()? {
            ExtensionValue::Identifier(identifier) => Some(identifier),
            _ => None,
        }
    }
}
