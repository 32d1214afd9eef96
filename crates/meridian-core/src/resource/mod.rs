//! Minimal resource model
//!
//! Only the fields consulted by authorization predicates are modelled. A
//! [`Resource`] is an envelope (`id`, `version`, [`Meta`]) around a typed
//! [`ResourceBody`]; the JSON form is flat with a `resourceType`
//! discriminator.

mod definition;
mod organization;
mod task;
mod types;
mod workflow;

pub use definition::{
    ActivityDefinition, CodeSystem, ConceptDefinition, Definition, NamingSystem,
    NamingSystemUniqueId, PublicationStatus,
};
pub use organization::{AffiliationEdge, Endpoint, Organization, OrganizationAffiliation};
pub use task::{ParameterValue, Task, TaskParameter, TaskRestriction, TaskStatus};
pub use types::{
    CodeableConcept, Coding, Extension, ExtensionValue, Identifier, Reference, ReferenceTarget,
};
pub use workflow::{
    Binary, ChannelType, QuestionnaireResponse, QuestionnaireResponseStatus, Subscription,
    SubscriptionChannel, TagOnly,
};

use crate::errors::{MeridianError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! resource_types {
    ($($variant:ident),+ $(,)?) => {
        /// Resource types known to the server
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum ResourceType {
            $(
                #[allow(missing_docs)]
                $variant,
            )+
        }

        impl ResourceType {
            /// Every known type, alphabetically
            pub const ALL: &'static [ResourceType] = &[$(ResourceType::$variant),+];

            /// Type name as used in references and queries
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ResourceType::$variant => stringify!($variant),)+
                }
            }
        }

        impl FromStr for ResourceType {
            type Err = MeridianError;

            fn from_str(name: &str) -> Result<Self> {
                match name {
                    $(stringify!($variant) => Ok(ResourceType::$variant),)+
                    other => Err(MeridianError::invalid(format!("unknown resource type {other}"))),
                }
            }
        }
    };
}

resource_types!(
    ActivityDefinition,
    Binary,
    Bundle,
    CodeSystem,
    DocumentReference,
    Endpoint,
    Group,
    HealthcareService,
    Library,
    Location,
    Measure,
    MeasureReport,
    NamingSystem,
    Organization,
    OrganizationAffiliation,
    Patient,
    Practitioner,
    PractitionerRole,
    Provenance,
    Questionnaire,
    QuestionnaireResponse,
    ResearchStudy,
    StructureDefinition,
    Subscription,
    Task,
    ValueSet,
);

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource metadata: profiles and tags
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Meta {
    /// Claimed profile urls
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profile: Vec<String>,
    /// Tags, including read-access tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag: Vec<Coding>,
}

/// Type-specific content of a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resourceType")]
#[allow(missing_docs)]
pub enum ResourceBody {
    ActivityDefinition(ActivityDefinition),
    Binary(Binary),
    CodeSystem(CodeSystem),
    Endpoint(Endpoint),
    NamingSystem(NamingSystem),
    Organization(Organization),
    OrganizationAffiliation(OrganizationAffiliation),
    QuestionnaireResponse(QuestionnaireResponse),
    Subscription(Subscription),
    Task(Task),
    Library(Definition),
    Measure(Definition),
    Questionnaire(Definition),
    StructureDefinition(Definition),
    ValueSet(Definition),
    Bundle(TagOnly),
    DocumentReference(TagOnly),
    Group(TagOnly),
    HealthcareService(TagOnly),
    Location(TagOnly),
    MeasureReport(TagOnly),
    Patient(TagOnly),
    Practitioner(TagOnly),
    PractitionerRole(TagOnly),
    Provenance(TagOnly),
    ResearchStudy(TagOnly),
}

impl ResourceBody {
    /// Type of this body
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ResourceBody::ActivityDefinition(_) => ResourceType::ActivityDefinition,
            ResourceBody::Binary(_) => ResourceType::Binary,
            ResourceBody::CodeSystem(_) => ResourceType::CodeSystem,
            ResourceBody::Endpoint(_) => ResourceType::Endpoint,
            ResourceBody::NamingSystem(_) => ResourceType::NamingSystem,
            ResourceBody::Organization(_) => ResourceType::Organization,
            ResourceBody::OrganizationAffiliation(_) => ResourceType::OrganizationAffiliation,
            ResourceBody::QuestionnaireResponse(_) => ResourceType::QuestionnaireResponse,
            ResourceBody::Subscription(_) => ResourceType::Subscription,
            ResourceBody::Task(_) => ResourceType::Task,
            ResourceBody::Library(_) => ResourceType::Library,
            ResourceBody::Measure(_) => ResourceType::Measure,
            ResourceBody::Questionnaire(_) => ResourceType::Questionnaire,
            ResourceBody::StructureDefinition(_) => ResourceType::StructureDefinition,
            ResourceBody::ValueSet(_) => ResourceType::ValueSet,
            ResourceBody::Bundle(_) => ResourceType::Bundle,
            ResourceBody::DocumentReference(_) => ResourceType::DocumentReference,
            ResourceBody::Group(_) => ResourceType::Group,
            ResourceBody::HealthcareService(_) => ResourceType::HealthcareService,
            ResourceBody::Location(_) => ResourceType::Location,
            ResourceBody::MeasureReport(_) => ResourceType::MeasureReport,
            ResourceBody::Patient(_) => ResourceType::Patient,
            ResourceBody::Practitioner(_) => ResourceType::Practitioner,
            ResourceBody::PractitionerRole(_) => ResourceType::PractitionerRole,
            ResourceBody::Provenance(_) => ResourceType::Provenance,
            ResourceBody::ResearchStudy(_) => ResourceType::ResearchStudy,
        }
    }

    /// Url/version/status view for definitional bodies
    pub fn definition(&self) -> Option<Definition> {
        match self {
            ResourceBody::ActivityDefinition(ad) => Some(ad.definition()),
            ResourceBody::CodeSystem(cs) => Some(cs.definition()),
            ResourceBody::Library(d)
            | ResourceBody::Measure(d)
            | ResourceBody::Questionnaire(d)
            | ResourceBody::StructureDefinition(d)
            | ResourceBody::ValueSet(d) => Some(d.clone()),
            _ => None,
        }
    }

    /// Business identifiers, for types that carry them
    pub fn identifiers(&self) -> &[Identifier] {
        match self {
            ResourceBody::Endpoint(e) => &e.identifier,
            ResourceBody::Organization(o) => &o.identifier,
            ResourceBody::Task(t) => &t.identifier,
            ResourceBody::Bundle(b)
            | ResourceBody::DocumentReference(b)
            | ResourceBody::Group(b)
            | ResourceBody::HealthcareService(b)
            | ResourceBody::Location(b)
            | ResourceBody::MeasureReport(b)
            | ResourceBody::Patient(b)
            | ResourceBody::Practitioner(b)
            | ResourceBody::PractitionerRole(b)
            | ResourceBody::Provenance(b)
            | ResourceBody::ResearchStudy(b) => &b.identifier,
            _ => &[],
        }
    }
}

/// A resource instance: envelope plus typed body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Logical id, assigned by the store on create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Version id, assigned by the store on every write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Metadata
    #[serde(default)]
    pub meta: Meta,
    /// Typed content
    #[serde(flatten)]
    pub body: ResourceBody,
}

impl Resource {
    /// Wrap a body with empty metadata and no id
    pub fn new(body: ResourceBody) -> Self {
        Self {
            id: None,
            version: None,
            meta: Meta::default(),
            body,
        }
    }

    /// Set the logical id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: Coding) -> Self {
        self.meta.tag.push(tag);
        self
    }

    /// Add a profile
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.meta.profile.push(profile.into());
        self
    }

    /// Type of the resource
    pub fn resource_type(&self) -> ResourceType {
        self.body.resource_type()
    }

    /// Logical id or an empty string
    pub fn id_or_empty(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// Literal relative reference (`Type/id`), when an id is assigned
    pub fn local_reference(&self) -> Option<String> {
        self.id
            .as_ref()
            .map(|id| format!("{}/{id}", self.resource_type()))
    }

    /// Task body, when this is a Task
    pub fn as_task(&self) -> Option<&Task> {
        match &self.body {
            ResourceBody::Task(task) => Some(task),
            _ => None,
        }
    }

    /// Organization body, when this is an Organization
    pub fn as_organization(&self) -> Option<&Organization> {
        match &self.body {
            ResourceBody::Organization(org) => Some(org),
            _ => None,
        }
    }

    /// Affiliation body, when this is an OrganizationAffiliation
    pub fn as_affiliation(&self) -> Option<&OrganizationAffiliation> {
        match &self.body {
            ResourceBody::OrganizationAffiliation(affiliation) => Some(affiliation),
            _ => None,
        }
    }

    /// ActivityDefinition body, when this is an ActivityDefinition
    pub fn as_activity_definition(&self) -> Option<&ActivityDefinition> {
        match &self.body {
            ResourceBody::ActivityDefinition(ad) => Some(ad),
            _ => None,
        }
    }

    /// CodeSystem body, when this is a CodeSystem
    pub fn as_code_system(&self) -> Option<&CodeSystem> {
        match &self.body {
            ResourceBody::CodeSystem(cs) => Some(cs),
            _ => None,
        }
    }

    /// Parse a resource from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.id, self.version) {
            (Some(id), Some(version)) => {
                write!(f, "{}/{id}/_history/{version}", self.resource_type())
            }
            (Some(id), None) => write!(f, "{}/{id}", self.resource_type()),
            (None, _) => write!(f, "{} (new)", self.resource_type()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_round_trips_through_name() {
        for rt in ResourceType::ALL {
            assert_eq!(rt.as_str().parse::<ResourceType>().unwrap(), *rt);
        }
        assert!("Nope".parse::<ResourceType>().is_err());
    }

    #[test]
    fn parses_flat_json_with_discriminator() {
        let json = r#"{
            "resourceType": "Endpoint",
            "id": "e1",
            "meta": { "tag": [{ "system": "http://dsf.dev/fhir/CodeSystem/read-access-tag", "code": "ALL" }] },
            "identifier": [{ "system": "http://dsf.dev/sid/endpoint-identifier", "value": "ep.example" }],
            "address": "https://ep.example/fhir"
        }"#;
        let resource = Resource::from_json(json).unwrap();
        assert_eq!(resource.resource_type(), ResourceType::Endpoint);
        assert_eq!(resource.id.as_deref(), Some("e1"));
        assert_eq!(resource.meta.tag.len(), 1);
        assert_eq!(resource.body.identifiers().len(), 1);
        assert_eq!(resource.to_string(), "Endpoint/e1");
    }

    #[test]
    fn definitional_view_covers_url_version_types() {
        let body = ResourceBody::ValueSet(Definition {
            url: Some("http://example.org/vs".into()),
            version: Some("1.0".into()),
            status: Some(PublicationStatus::Active),
        });
        let def = body.definition().unwrap();
        assert_eq!(def.url.as_deref(), Some("http://example.org/vs"));
        assert!(ResourceBody::Patient(TagOnly::default()).definition().is_none());
    }
}
