//! Identity and role model
//!
//! An [`Identity`] is the resolved acting party of one request: local or
//! remote, optionally a person acting for an organization, holding a set of
//! role grants. Identities are immutable for the duration of a request.

use crate::resource::{Coding, Identifier, ResourceType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Operation kinds a role can grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Search,
    History,
    PermanentDelete,
    Websocket,
}

impl Operation {
    /// Role name
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "CREATE",
            Operation::Read => "READ",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::Search => "SEARCH",
            Operation::History => "HISTORY",
            Operation::PermanentDelete => "PERMANENT_DELETE",
            Operation::Websocket => "WEBSOCKET",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability required to perform one operation on one resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerRole {
    /// Operation
    pub operation: Operation,
    /// Resource type operated on
    pub resource_type: ResourceType,
}

impl ServerRole {
    /// Role for `operation` on `resource_type`
    pub const fn new(operation: Operation, resource_type: ResourceType) -> Self {
        Self {
            operation,
            resource_type,
        }
    }
}

impl fmt::Display for ServerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.operation, self.resource_type)
    }
}

/// A granted operation, for all resource types or an explicit subset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    /// Granted operation
    pub operation: Operation,
    /// Types covered; `None` covers every type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_types: Option<BTreeSet<ResourceType>>,
}

impl RoleGrant {
    /// Grant `operation` on every resource type
    pub fn all_types(operation: Operation) -> Self {
        Self {
            operation,
            resource_types: None,
        }
    }

    /// Grant `operation` on the listed types only
    pub fn only(operation: Operation, types: impl IntoIterator<Item = ResourceType>) -> Self {
        Self {
            operation,
            resource_types: Some(types.into_iter().collect()),
        }
    }

    /// True when this grant covers `role`
    pub fn covers(&self, role: ServerRole) -> bool {
        self.operation == role.operation
            && self
                .resource_types
                .as_ref()
                .map_or(true, |types| types.contains(&role.resource_type))
    }

    /// True when this grant covers every resource type
    pub fn is_unscoped(&self) -> bool {
        self.resource_types.is_none()
    }
}

/// Local (same deployment) or remote (federated) party
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum IdentityKind {
    Local,
    Remote,
}

/// Organization an identity belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityOrganization {
    /// Logical id of the Organization resource
    pub id: String,
    /// Organization identifier
    pub identifier: Identifier,
    /// Whether the organization is active
    pub active: bool,
}

/// Person acting on behalf of the organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPerson {
    /// Practitioner identifier
    pub identifier: Identifier,
    /// Practitioner roles held
    #[serde(default)]
    pub practitioner_roles: Vec<Coding>,
}

/// Resolved acting party of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Display name used in logs
    pub name: String,
    /// Local or remote
    pub kind: IdentityKind,
    /// Organization, absent when unresolved
    #[serde(default)]
    pub organization: Option<IdentityOrganization>,
    /// Person, absent for organization identities
    #[serde(default)]
    pub person: Option<IdentityPerson>,
    /// Granted roles
    #[serde(default)]
    pub roles: Vec<RoleGrant>,
}

impl Identity {
    /// Organization identity (no person)
    pub fn organization(
        name: impl Into<String>,
        kind: IdentityKind,
        organization: IdentityOrganization,
        roles: Vec<RoleGrant>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            organization: Some(organization),
            person: None,
            roles,
        }
    }

    /// Practitioner acting for `organization`
    pub fn practitioner(
        name: impl Into<String>,
        kind: IdentityKind,
        organization: IdentityOrganization,
        person: IdentityPerson,
        roles: Vec<RoleGrant>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            organization: Some(organization),
            person: Some(person),
            roles,
        }
    }

    /// True when any grant covers `role`
    pub fn has_role(&self, role: ServerRole) -> bool {
        self.roles.iter().any(|grant| grant.covers(role))
    }

    /// True when `operation` is granted on every resource type
    pub fn has_unscoped(&self, operation: Operation) -> bool {
        self.roles
            .iter()
            .any(|grant| grant.operation == operation && grant.is_unscoped())
    }

    /// True for local identities
    pub fn is_local(&self) -> bool {
        self.kind == IdentityKind::Local
    }

    /// Organization identifier, absent when the organization is unresolved
    pub fn organization_identifier(&self) -> Option<&Identifier> {
        self.organization.as_ref().map(|o| &o.identifier)
    }

    /// True when the identity is the organization itself rather than a person
    pub fn is_organization_identity(&self) -> bool {
        self.person.is_none()
    }

    /// True when the person holds the practitioner role
    pub fn has_practitioner_role(&self, role: &Coding) -> bool {
        self.person
            .as_ref()
            .is_some_and(|p| p.practitioner_roles.iter().any(|r| r.same_code(role)))
    }

    /// Local identity acting as the organization, or a local practitioner
    /// holding `admin_role`
    pub fn is_local_organization(&self, admin_role: &Coding) -> bool {
        self.is_local() && (self.is_organization_identity() || self.has_practitioner_role(admin_role))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ORGANIZATION_IDENTIFIER_SYSTEM, PRACTITIONER_ROLE_SYSTEM};

    fn org() -> IdentityOrganization {
        IdentityOrganization {
            id: "1".into(),
            identifier: Identifier::new(ORGANIZATION_IDENTIFIER_SYSTEM, "local.org"),
            active: true,
        }
    }

    #[test]
    fn scoped_grant_covers_listed_types_only() {
        let grant = RoleGrant::only(Operation::Read, [ResourceType::Task]);
        assert!(grant.covers(ServerRole::new(Operation::Read, ResourceType::Task)));
        assert!(!grant.covers(ServerRole::new(Operation::Read, ResourceType::Patient)));
        assert!(!grant.covers(ServerRole::new(Operation::Create, ResourceType::Task)));
        assert!(!grant.is_unscoped());
    }

    #[test]
    fn unscoped_grant_covers_every_type() {
        let identity = Identity::organization(
            "local.org",
            IdentityKind::Local,
            org(),
            vec![RoleGrant::all_types(Operation::History)],
        );
        for rt in ResourceType::ALL {
            assert!(identity.has_role(ServerRole::new(Operation::History, *rt)));
        }
        assert!(identity.has_unscoped(Operation::History));
        assert!(!identity.has_unscoped(Operation::Search));
    }

    #[test]
    fn local_organization_requires_admin_role_for_practitioners() {
        let admin = Coding::new(PRACTITIONER_ROLE_SYSTEM, "DSF_ADMIN");
        let person = IdentityPerson {
            identifier: Identifier::new("http://dsf.dev/sid/practitioner-identifier", "p@local"),
            practitioner_roles: vec![Coding::new(PRACTITIONER_ROLE_SYSTEM, "UAC_USER")],
        };
        let mut practitioner =
            Identity::practitioner("p@local", IdentityKind::Local, org(), person, vec![]);
        assert!(!practitioner.is_local_organization(&admin));

        if let Some(person) = practitioner.person.as_mut() {
            person.practitioner_roles.push(admin.clone());
        }
        assert!(practitioner.is_local_organization(&admin));

        practitioner.kind = IdentityKind::Remote;
        assert!(!practitioner.is_local_organization(&admin));
    }
}
