//! Organizations, endpoints and the affiliation graph

use super::{CodeableConcept, Coding, Extension, Identifier, Reference};
use crate::constants::{EXTENSION_CERTIFICATE_THUMBPRINT, ORGANIZATION_IDENTIFIER_SYSTEM};
use serde::{Deserialize, Serialize};

fn default_active() -> bool {
    true
}

/// Organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Business identifiers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,
    /// Whether the organization is active
    #[serde(default = "default_active")]
    pub active: bool,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Extensions, including certificate thumbprints
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
}

impl Default for Organization {
    fn default() -> Self {
        Self {
            identifier: Vec::new(),
            active: true,
            name: None,
            extension: Vec::new(),
        }
    }
}

impl Organization {
    /// Identifiers in the organization-identifier naming system
    pub fn organization_identifiers(&self) -> impl Iterator<Item = &Identifier> {
        self.identifier
            .iter()
            .filter(|i| i.system == ORGANIZATION_IDENTIFIER_SYSTEM)
    }

    /// The organization identifier, when exactly one is present
    pub fn organization_identifier(&self) -> Option<&Identifier> {
        let mut ids = self.organization_identifiers();
        match (ids.next(), ids.next()) {
            (Some(id), None) => Some(id),
            _ => None,
        }
    }

    /// Certificate thumbprint extensions
    pub fn thumbprint_extensions(&self) -> impl Iterator<Item = &Extension> {
        self.extension
            .iter()
            .filter(|e| e.url == EXTENSION_CERTIFICATE_THUMBPRINT)
    }

    /// Thumbprint values carried as strings
    pub fn thumbprints(&self) -> impl Iterator<Item = &str> {
        self.thumbprint_extensions().filter_map(Extension::as_str)
    }
}

/// Network endpoint of an organization
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Endpoint {
    /// Business identifiers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,
    /// Base address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Managing organization
    #[serde(
        default,
        rename = "managingOrganization",
        skip_serializing_if = "Option::is_none"
    )]
    pub managing_organization: Option<Reference>,
}

/// Membership of an organization in a parent organization (consortium)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationAffiliation {
    /// Whether the membership is active
    #[serde(default = "default_active")]
    pub active: bool,
    /// Parent organization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<Reference>,
    /// Member organization
    #[serde(
        default,
        rename = "participatingOrganization",
        skip_serializing_if = "Option::is_none"
    )]
    pub participating_organization: Option<Reference>,
    /// Endpoints of the member within the parent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoint: Vec<Reference>,
    /// Roles of the member within the parent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code: Vec<CodeableConcept>,
}

impl Default for OrganizationAffiliation {
    fn default() -> Self {
        Self {
            active: true,
            organization: None,
            participating_organization: None,
            endpoint: Vec::new(),
            code: Vec::new(),
        }
    }
}

impl OrganizationAffiliation {
    /// Every role coding across all codes
    pub fn roles(&self) -> impl Iterator<Item = &Coding> {
        self.code.iter().flat_map(|c| c.coding.iter())
    }
}

/// Resolved edge of the affiliation graph; parent and member are identified by
/// organization identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffiliationEdge {
    /// Parent (consortium) organization identifier
    pub parent: Identifier,
    /// Member organization identifier
    pub member: Identifier,
    /// Roles of the member within the parent
    pub roles: Vec<Coding>,
    /// Whether the affiliation is active
    pub active: bool,
}

impl AffiliationEdge {
    /// True when this active edge grants `member` the role `role` within `parent`
    pub fn grants(&self, parent: &Identifier, member: &Identifier, role: &Coding) -> bool {
        self.active
            && &self.parent == parent
            && &self.member == member
            && self.roles.iter().any(|r| r.same_code(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org_id(value: &str) -> Identifier {
        Identifier::new(ORGANIZATION_IDENTIFIER_SYSTEM, value)
    }

    #[test]
    fn organization_identifier_requires_exactly_one() {
        let mut org = Organization {
            identifier: vec![org_id("a.org")],
            ..Organization::default()
        };
        assert_eq!(org.organization_identifier(), Some(&org_id("a.org")));

        org.identifier.push(org_id("b.org"));
        assert!(org.organization_identifier().is_none());
    }

    #[test]
    fn inactive_edge_grants_nothing() {
        let role = Coding::new("http://dsf.dev/fhir/CodeSystem/organization-role", "DIC");
        let mut edge = AffiliationEdge {
            parent: org_id("consortium.org"),
            member: org_id("a.org"),
            roles: vec![role.clone()],
            active: true,
        };
        assert!(edge.grants(&org_id("consortium.org"), &org_id("a.org"), &role));
        assert!(!edge.grants(&org_id("other.org"), &org_id("a.org"), &role));

        edge.active = false;
        assert!(!edge.grants(&org_id("consortium.org"), &org_id("a.org"), &role));
    }
}
