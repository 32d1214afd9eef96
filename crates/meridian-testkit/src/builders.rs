//! Resource builders

use crate::fixtures::{
    organization_identifier, process_canonical, role, LOCAL_ORG, MESSAGE_START, PARENT_ORG,
    PROCESS_URL, PROCESS_VERSION, REMOTE_ORG, ROLE_DIC, ROLE_HRP, ROLE_SYSTEM, TASK_PROFILE,
};
use meridian_authorization::{Locality, ParticipantPredicate, ProcessAuthorization};
use meridian_core::constants::{
    BPMN_MESSAGE_BUSINESS_KEY, BPMN_MESSAGE_NAME, ENDPOINT_IDENTIFIER_SYSTEM,
    EXTENSION_CERTIFICATE_THUMBPRINT, TASK_IDENTIFIER_SYSTEM,
};
use meridian_core::resource::{
    ActivityDefinition, ChannelType, CodeSystem, CodeableConcept, Coding, ConceptDefinition,
    Endpoint, Extension, ExtensionValue, Identifier, NamingSystem, NamingSystemUniqueId,
    Organization, OrganizationAffiliation, PublicationStatus, QuestionnaireResponse,
    QuestionnaireResponseStatus, Reference, Subscription, SubscriptionChannel, Task,
    TaskParameter, TaskRestriction, TaskStatus,
};
use meridian_core::{ReadAccessTag, Resource, ResourceBody, ResourceType};

/// `ALL` read-access tag
pub fn all_tag() -> Coding {
    ReadAccessTag::All.to_coding()
}

/// `LOCAL` read-access tag
pub fn local_tag() -> Coding {
    ReadAccessTag::Local.to_coding()
}

/// `ORGANIZATION` read-access tag for the organization identified by `value`
pub fn organization_tag(value: &str) -> Coding {
    ReadAccessTag::Organization(organization_identifier(value)).to_coding()
}

/// `ROLE` read-access tag for members of `parent` holding `code`
pub fn role_tag(parent: &str, code: &str) -> Coding {
    ReadAccessTag::Role {
        parent: organization_identifier(parent),
        role: role(code),
    }
    .to_coding()
}

/// Logical reference to the organization identified by `value`
pub fn organization_reference(value: &str) -> Reference {
    Reference::logical(ResourceType::Organization, organization_identifier(value))
}

/// Active organization with id `id`, visible to all
pub fn organization(id: &str, identifier: &str) -> Resource {
    Resource::new(ResourceBody::Organization(Organization {
        identifier: vec![organization_identifier(identifier)],
        name: Some(identifier.to_string()),
        ..Organization::default()
    }))
    .with_id(id)
    .with_tag(all_tag())
}

/// Certificate thumbprint extension for an Organization
pub fn certificate_thumbprint(value: &str) -> Extension {
    Extension::new(
        EXTENSION_CERTIFICATE_THUMBPRINT,
        ExtensionValue::String(value.to_string()),
    )
}

/// Endpoint with one endpoint identifier, visible to all
pub fn endpoint(identifier: &str, address: &str) -> Resource {
    Resource::new(ResourceBody::Endpoint(Endpoint {
        identifier: vec![Identifier::new(ENDPOINT_IDENTIFIER_SYSTEM, identifier)],
        address: Some(address.to_string()),
        managing_organization: None,
    }))
    .with_tag(all_tag())
}

/// Active membership of `member` in `parent` with role `code`
pub fn affiliation(parent: &str, member: &str, code: &str, endpoint_identifier: &str) -> Resource {
    Resource::new(ResourceBody::OrganizationAffiliation(OrganizationAffiliation {
        organization: Some(organization_reference(parent)),
        participating_organization: Some(organization_reference(member)),
        endpoint: vec![Reference::logical(
            ResourceType::Endpoint,
            Identifier::new(ENDPOINT_IDENTIFIER_SYSTEM, endpoint_identifier),
        )],
        code: vec![CodeableConcept::of(role(code))],
        ..OrganizationAffiliation::default()
    }))
    .with_tag(all_tag())
}

/// Code system of organization roles defining DIC and HRP
pub fn role_code_system() -> Resource {
    Resource::new(ResourceBody::CodeSystem(CodeSystem {
        url: Some(ROLE_SYSTEM.to_string()),
        version: Some("1.0".to_string()),
        status: Some(PublicationStatus::Active),
        concept: [ROLE_DIC, ROLE_HRP]
            .into_iter()
            .map(|code| ConceptDefinition {
                code: code.to_string(),
                display: None,
            })
            .collect(),
    }))
    .with_tag(all_tag())
}

/// Active naming system `name`, visible to all
pub fn naming_system(name: &str) -> Resource {
    Resource::new(ResourceBody::NamingSystem(NamingSystem {
        name: Some(name.to_string()),
        status: Some(PublicationStatus::Active),
        unique_id: vec![NamingSystemUniqueId {
            kind: "uri".to_string(),
            value: format!("http://local.example/sid/{name}"),
        }],
    }))
    .with_tag(all_tag())
}

/// Websocket subscription on `criteria`, visible locally
pub fn subscription(criteria: &str, payload: Option<&str>) -> Resource {
    Resource::new(ResourceBody::Subscription(Subscription {
        criteria: Some(criteria.to_string()),
        channel: Some(SubscriptionChannel {
            channel_type: Some(ChannelType::Websocket),
            payload: payload.map(str::to_string),
        }),
    }))
    .with_tag(local_tag())
}

/// Members of PARENT_ORG holding DIC, as remote requesters
pub fn remote_dic_requester() -> ParticipantPredicate {
    ParticipantPredicate::Role {
        locality: Locality::Remote,
        parent_organization: organization_identifier(PARENT_ORG),
        role: role(ROLE_DIC),
        practitioner_role: None,
    }
}

/// The local organization, as requester or recipient
pub fn local_organization_participant() -> ParticipantPredicate {
    ParticipantPredicate::Organization {
        locality: Locality::Local,
        organization: organization_identifier(LOCAL_ORG),
        practitioner_role: None,
    }
}

/// Ping start authorization: DIC members of PARENT_ORG may send, the local
/// organization receives
pub fn ping_authorization() -> ProcessAuthorization {
    ProcessAuthorization {
        message_name: MESSAGE_START.to_string(),
        task_profiles: vec![TASK_PROFILE.to_string()],
        requesters: vec![remote_dic_requester(), local_organization_participant()],
        recipients: vec![local_organization_participant()],
    }
}

/// Active ping process definition carrying `authorizations`
pub fn process_definition(authorizations: &[ProcessAuthorization]) -> Resource {
    Resource::new(ResourceBody::ActivityDefinition(ActivityDefinition {
        url: Some(PROCESS_URL.to_string()),
        version: Some(PROCESS_VERSION.to_string()),
        status: Some(PublicationStatus::Active),
        name: Some("Ping".to_string()),
        extension: authorizations.iter().map(ProcessAuthorization::to_extension).collect(),
    }))
    .with_tag(all_tag())
}

/// In-progress QuestionnaireResponse, visible locally
pub fn questionnaire_response(questionnaire: &str) -> Resource {
    Resource::new(ResourceBody::QuestionnaireResponse(QuestionnaireResponse {
        status: Some(QuestionnaireResponseStatus::InProgress),
        questionnaire: Some(questionnaire.to_string()),
        author: None,
        authored: None,
    }))
    .with_tag(local_tag())
}

/// Builder for Task resources
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    task: Task,
    profiles: Vec<String>,
}

impl TaskBuilder {
    /// Requested ping start sent by REMOTE_ORG to the local organization
    pub fn requested() -> Self {
        Self {
            task: Task {
                status: Some(TaskStatus::Requested),
                instantiates_canonical: Some(process_canonical()),
                requester: Some(organization_reference(REMOTE_ORG)),
                restriction: Some(TaskRestriction {
                    recipient: vec![organization_reference(LOCAL_ORG)],
                }),
                input: vec![TaskParameter::bpmn_string(BPMN_MESSAGE_NAME, MESSAGE_START)],
                ..Task::default()
            },
            profiles: vec![TASK_PROFILE.to_string()],
        }
    }

    /// Local draft of the ping start with task identifier `identifier`
    pub fn draft(identifier: &str) -> Self {
        Self::requested()
            .status(TaskStatus::Draft)
            .requester(LOCAL_ORG)
            .identifier(identifier)
    }

    /// Set the status
    pub fn status(mut self, status: TaskStatus) -> Self {
        self.task.status = Some(status);
        self
    }

    /// Requester identified by organization identifier `value`
    pub fn requester(mut self, value: &str) -> Self {
        self.task.requester = Some(organization_reference(value));
        self
    }

    /// Single recipient identified by organization identifier `value`
    pub fn recipient(mut self, value: &str) -> Self {
        self.task.restriction = Some(TaskRestriction {
            recipient: vec![organization_reference(value)],
        });
        self
    }

    /// Set the process canonical
    pub fn canonical(mut self, canonical: &str) -> Self {
        self.task.instantiates_canonical = Some(canonical.to_string());
        self
    }

    /// Replace the message name input
    pub fn message_name(mut self, name: &str) -> Self {
        self.task.input.retain(|p| !p.is_bpmn(BPMN_MESSAGE_NAME));
        self.task
            .input
            .push(TaskParameter::bpmn_string(BPMN_MESSAGE_NAME, name));
        self
    }

    /// Add a business key input
    pub fn business_key(mut self, key: &str) -> Self {
        self.task
            .input
            .push(TaskParameter::bpmn_string(BPMN_MESSAGE_BUSINESS_KEY, key));
        self
    }

    /// Add a task identifier
    pub fn identifier(mut self, value: &str) -> Self {
        self.task
            .identifier
            .push(Identifier::new(TASK_IDENTIFIER_SYSTEM, value));
        self
    }

    /// Add an output parameter
    pub fn output(mut self, code: &str, value: &str) -> Self {
        self.task.output.push(TaskParameter::bpmn_string(code, value));
        self
    }

    /// Replace the claimed profiles
    pub fn profile(mut self, profile: &str) -> Self {
        self.profiles = vec![profile.to_string()];
        self
    }

    /// The Task resource
    pub fn build(self) -> Resource {
        self.profiles
            .into_iter()
            .fold(Resource::new(ResourceBody::Task(self.task)), |resource, profile| {
                resource.with_profile(profile)
            })
    }
}

/// `resource` with its Task status replaced; panics unless a Task
pub fn with_task_status(resource: &Resource, status: TaskStatus) -> Resource {
    let mut next = resource.clone();
    match &mut next.body {
        ResourceBody::Task(task) => task.status = Some(status),
        other => panic!("expected a Task, got {:?}", other),
    }
    next
}
