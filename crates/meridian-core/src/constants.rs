//! Well-known code systems, naming systems and extension urls

/// Code system of read-access tags
pub const READ_ACCESS_TAG_SYSTEM: &str = "http://dsf.dev/fhir/CodeSystem/read-access-tag";
/// Read-access tag code: visible to everyone
pub const READ_ACCESS_ALL: &str = "ALL";
/// Read-access tag code: visible to local identities
pub const READ_ACCESS_LOCAL: &str = "LOCAL";
/// Read-access tag code: visible to one organization
pub const READ_ACCESS_ORGANIZATION: &str = "ORGANIZATION";
/// Read-access tag code: visible to members with a role in a parent organization
pub const READ_ACCESS_ROLE: &str = "ROLE";

/// Extension on an ORGANIZATION tag carrying the organization identifier
pub const EXTENSION_READ_ACCESS_ORGANIZATION: &str =
    "http://dsf.dev/fhir/StructureDefinition/extension-read-access-organization";
/// Extension on a ROLE tag carrying parent organization and role
pub const EXTENSION_READ_ACCESS_PARENT_ORGANIZATION_ROLE: &str =
    "http://dsf.dev/fhir/StructureDefinition/extension-read-access-parent-organization-role";
/// Sub-extension holding the parent organization identifier
pub const EXTENSION_PARENT_ORGANIZATION: &str = "parent-organization";
/// Sub-extension holding the organization role coding
pub const EXTENSION_ORGANIZATION_ROLE: &str = "organization-role";

/// Naming system of organization identifiers
pub const ORGANIZATION_IDENTIFIER_SYSTEM: &str = "http://dsf.dev/sid/organization-identifier";
/// Naming system of endpoint identifiers
pub const ENDPOINT_IDENTIFIER_SYSTEM: &str = "http://dsf.dev/sid/endpoint-identifier";
/// Default naming system of task identifiers
pub const TASK_IDENTIFIER_SYSTEM: &str = "http://dsf.dev/sid/task-identifier";

/// Extension on Organization carrying a certificate thumbprint
pub const EXTENSION_CERTIFICATE_THUMBPRINT: &str =
    "http://dsf.dev/fhir/StructureDefinition/extension-certificate-thumbprint";

/// Code system of task input/output parameter types
pub const BPMN_MESSAGE_SYSTEM: &str = "http://dsf.dev/fhir/CodeSystem/bpmn-message";
/// Parameter code of the message name input
pub const BPMN_MESSAGE_NAME: &str = "message-name";
/// Parameter code of the business key input
pub const BPMN_MESSAGE_BUSINESS_KEY: &str = "business-key";
/// Parameter code of the correlation key input
pub const BPMN_MESSAGE_CORRELATION_KEY: &str = "correlation-key";

/// Code system of process authorization codes
pub const PROCESS_AUTHORIZATION_SYSTEM: &str =
    "http://dsf.dev/fhir/CodeSystem/process-authorization";
/// Process authorization extension on ActivityDefinition
pub const EXTENSION_PROCESS_AUTHORIZATION: &str =
    "http://dsf.dev/fhir/StructureDefinition/extension-process-authorization";
/// Sub-extension holding the message name
pub const EXTENSION_PROCESS_AUTHORIZATION_MESSAGE_NAME: &str = "message-name";
/// Sub-extension holding a task profile
pub const EXTENSION_PROCESS_AUTHORIZATION_TASK_PROFILE: &str = "task-profile";
/// Sub-extension holding a requester coding
pub const EXTENSION_PROCESS_AUTHORIZATION_REQUESTER: &str = "requester";
/// Sub-extension holding a recipient coding
pub const EXTENSION_PROCESS_AUTHORIZATION_RECIPIENT: &str = "recipient";
/// Coding extension naming one organization
pub const EXTENSION_PROCESS_AUTHORIZATION_ORGANIZATION: &str =
    "http://dsf.dev/fhir/StructureDefinition/extension-process-authorization-organization";
/// Coding extension naming one organization plus a practitioner role
pub const EXTENSION_PROCESS_AUTHORIZATION_ORGANIZATION_PRACTITIONER: &str =
    "http://dsf.dev/fhir/StructureDefinition/extension-process-authorization-organization-practitioner";
/// Coding extension naming a parent organization role
pub const EXTENSION_PROCESS_AUTHORIZATION_PARENT_ORGANIZATION_ROLE: &str =
    "http://dsf.dev/fhir/StructureDefinition/extension-process-authorization-parent-organization-role";
/// Coding extension naming a parent organization role plus a practitioner role
pub const EXTENSION_PROCESS_AUTHORIZATION_PARENT_ORGANIZATION_ROLE_PRACTITIONER: &str =
    "http://dsf.dev/fhir/StructureDefinition/extension-process-authorization-parent-organization-role-practitioner";
/// Coding extension holding a practitioner role (on `*_PRACTITIONER` codes)
pub const EXTENSION_PROCESS_AUTHORIZATION_PRACTITIONER: &str =
    "http://dsf.dev/fhir/StructureDefinition/extension-process-authorization-practitioner";
/// Sub-extension holding an organization identifier
pub const EXTENSION_PROCESS_AUTHORIZATION_SUB_ORGANIZATION: &str = "organization";
/// Sub-extension holding a practitioner role coding
pub const EXTENSION_PROCESS_AUTHORIZATION_SUB_PRACTITIONER_ROLE: &str = "practitioner-role";

/// Code system of practitioner roles
pub const PRACTITIONER_ROLE_SYSTEM: &str = "http://dsf.dev/fhir/CodeSystem/practitioner-role";
/// Administrator practitioner role code
pub const PRACTITIONER_ROLE_ADMIN: &str = "DSF_ADMIN";

/// Subscription payload mime types accepted for websocket channels
pub const SUBSCRIPTION_PAYLOADS: [&str; 2] = ["application/fhir+json", "application/fhir+xml"];
