//! Well known organizations, codes and identities

use meridian_core::constants::{ORGANIZATION_IDENTIFIER_SYSTEM, PRACTITIONER_ROLE_SYSTEM};
use meridian_core::resource::{Coding, Identifier};
use meridian_core::{
    Identity, IdentityKind, IdentityOrganization, IdentityPerson, Operation, ResourceType, RoleGrant,
};

/// Base url of the server under test
pub const BASE_URL: &str = "https://local.example/fhir";

/// Identifier value of the local organization
pub const LOCAL_ORG: &str = "local.example";
/// Identifier value of a federated organization
pub const REMOTE_ORG: &str = "remote.example";
/// Identifier value of a second federated organization without memberships
pub const OUTSIDER_ORG: &str = "outsider.example";
/// Identifier value of the consortium both LOCAL_ORG and REMOTE_ORG belong to
pub const PARENT_ORG: &str = "consortium.example";

/// Logical ids of the seeded organizations
pub const LOCAL_ORG_ID: &str = "local";
/// Logical id of REMOTE_ORG
pub const REMOTE_ORG_ID: &str = "remote";
/// Logical id of OUTSIDER_ORG
pub const OUTSIDER_ORG_ID: &str = "outsider";
/// Logical id of PARENT_ORG
pub const PARENT_ORG_ID: &str = "parent";

/// Code system of organization roles
pub const ROLE_SYSTEM: &str = "http://dsf.dev/fhir/CodeSystem/organization-role";
/// Role REMOTE_ORG and LOCAL_ORG hold in PARENT_ORG
pub const ROLE_DIC: &str = "DIC";
/// Role nobody holds
pub const ROLE_HRP: &str = "HRP";

/// Process url of the ping process
pub const PROCESS_URL: &str = "https://local.example/bpe/Process/ping";
/// Process version of the ping process
pub const PROCESS_VERSION: &str = "1.0";
/// Message starting the ping process
pub const MESSAGE_START: &str = "startPing";
/// Task profile of the start message
pub const TASK_PROFILE: &str = "http://local.example/fhir/StructureDefinition/task-start-ping|1.0";

/// `{url}|{version}` of the ping process
pub fn process_canonical() -> String {
    format!("{PROCESS_URL}|{PROCESS_VERSION}")
}

/// Organization identifier with `value`
pub fn organization_identifier(value: &str) -> Identifier {
    Identifier::new(ORGANIZATION_IDENTIFIER_SYSTEM, value)
}

/// Organization role coding
pub fn role(code: &str) -> Coding {
    Coding::new(ROLE_SYSTEM, code)
}

/// Practitioner role coding
pub fn practitioner_role(code: &str) -> Coding {
    Coding::new(PRACTITIONER_ROLE_SYSTEM, code)
}

/// Every operation on every type
pub fn all_roles() -> Vec<RoleGrant> {
    [
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
        Operation::Search,
        Operation::History,
        Operation::PermanentDelete,
        Operation::Websocket,
    ]
    .into_iter()
    .map(RoleGrant::all_types)
    .collect()
}

/// Read, search and history everywhere, create on Task only
pub fn remote_roles() -> Vec<RoleGrant> {
    vec![
        RoleGrant::all_types(Operation::Read),
        RoleGrant::all_types(Operation::Search),
        RoleGrant::all_types(Operation::History),
        RoleGrant::only(Operation::Create, [ResourceType::Task]),
    ]
}

fn member(id: &str, value: &str) -> IdentityOrganization {
    IdentityOrganization {
        id: id.to_string(),
        identifier: organization_identifier(value),
        active: true,
    }
}

/// The local organization acting as itself with every role
pub fn local_organization_identity() -> Identity {
    local_organization_identity_with(all_roles())
}

/// The local organization acting as itself with `roles`
pub fn local_organization_identity_with(roles: Vec<RoleGrant>) -> Identity {
    Identity::organization("local-org", IdentityKind::Local, member(LOCAL_ORG_ID, LOCAL_ORG), roles)
}

/// REMOTE_ORG acting as itself with [`remote_roles`]
pub fn remote_organization_identity() -> Identity {
    Identity::organization(
        "remote-org",
        IdentityKind::Remote,
        member(REMOTE_ORG_ID, REMOTE_ORG),
        remote_roles(),
    )
}

/// OUTSIDER_ORG acting as itself with [`remote_roles`]
pub fn outsider_organization_identity() -> Identity {
    Identity::organization(
        "outsider-org",
        IdentityKind::Remote,
        member(OUTSIDER_ORG_ID, OUTSIDER_ORG),
        remote_roles(),
    )
}

/// A local person holding every server role and `practitioner_roles`
pub fn local_practitioner(practitioner_roles: Vec<Coding>) -> Identity {
    Identity::practitioner(
        "local-practitioner",
        IdentityKind::Local,
        member(LOCAL_ORG_ID, LOCAL_ORG),
        IdentityPerson {
            identifier: Identifier::new("http://dsf.dev/sid/practitioner-identifier", "jane@local.example"),
            practitioner_roles,
        },
        all_roles(),
    )
}
