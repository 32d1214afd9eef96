//! Rule table: structural checks of every tag-governed resource type
//!
//! Natural keys (duplicate and immutability checks) are derived by
//! [`NaturalKeys`](meridian_core::NaturalKeys) and are not repeated here.

use super::tagged::RuleConfig;
use crate::decision::ValidationFailure;
use crate::process::{ProcessDefinition, ProcessDefinitionError};
use meridian_core::constants::{ENDPOINT_IDENTIFIER_SYSTEM, SUBSCRIPTION_PAYLOADS};
use meridian_core::resource::{ChannelType, Definition, PublicationStatus, ResourceBody};
use meridian_core::{Resource, ResourceType, SearchQuery};
use once_cell::sync::Lazy;
use regex::Regex;

#[allow(clippy::expect_used)]
static ENDPOINT_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://([0-9a-zA-Z\.-]+)+(:\d{1,4})?([-\w/]*)$")
        .expect("endpoint address pattern is valid")
});

#[allow(clippy::expect_used)]
static THUMBPRINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-f0-9]{128}$").expect("thumbprint pattern is valid"));

/// Table rows for every type handled by [`TaggedResourceRule`](super::TaggedResourceRule)
pub fn default_rule_configs() -> Vec<RuleConfig> {
    use ResourceType::*;

    let mut configs = vec![
        RuleConfig {
            resource_type: ActivityDefinition,
            validate: activity_definition,
        },
        RuleConfig {
            resource_type: Endpoint,
            validate: endpoint,
        },
        RuleConfig {
            resource_type: NamingSystem,
            validate: naming_system,
        },
        RuleConfig {
            resource_type: Organization,
            validate: organization,
        },
        RuleConfig {
            resource_type: OrganizationAffiliation,
            validate: organization_affiliation,
        },
        RuleConfig {
            resource_type: Subscription,
            validate: subscription,
        },
    ];

    configs.extend(
        [CodeSystem, Library, Measure, Questionnaire, StructureDefinition, ValueSet]
            .into_iter()
            .map(|resource_type| RuleConfig {
                resource_type,
                validate: definitional,
            }),
    );

    configs.extend(
        [
            Bundle,
            DocumentReference,
            Group,
            HealthcareService,
            Location,
            MeasureReport,
            Patient,
            Practitioner,
            PractitionerRole,
            Provenance,
            ResearchStudy,
        ]
        .into_iter()
        .map(RuleConfig::tag_only),
    );

    configs
}

fn check_definition(
    definition: Definition,
    fields: [&'static str; 3],
    failures: &mut Vec<ValidationFailure>,
) {
    let [url, version, status] = fields;
    if definition.url.as_deref().map_or(true, str::is_empty) {
        failures.push(ValidationFailure::Missing { field: url });
    }
    if definition.version.as_deref().map_or(true, str::is_empty) {
        failures.push(ValidationFailure::Missing { field: version });
    }
    check_status(definition.status, status, failures);
}

fn check_status(
    status: Option<PublicationStatus>,
    field: &'static str,
    failures: &mut Vec<ValidationFailure>,
) {
    match status {
        None => failures.push(ValidationFailure::Missing { field }),
        Some(status) if !status.is_publishable() => failures.push(ValidationFailure::NotAllowed {
            field,
            value: status.as_str().to_string(),
        }),
        Some(_) => {}
    }
}

fn definition_fields(resource_type: ResourceType) -> [&'static str; 3] {
    match resource_type {
        ResourceType::ActivityDefinition => [
            "ActivityDefinition.url",
            "ActivityDefinition.version",
            "ActivityDefinition.status",
        ],
        ResourceType::CodeSystem => ["CodeSystem.url", "CodeSystem.version", "CodeSystem.status"],
        ResourceType::Library => ["Library.url", "Library.version", "Library.status"],
        ResourceType::Measure => ["Measure.url", "Measure.version", "Measure.status"],
        ResourceType::Questionnaire => [
            "Questionnaire.url",
            "Questionnaire.version",
            "Questionnaire.status",
        ],
        ResourceType::StructureDefinition => [
            "StructureDefinition.url",
            "StructureDefinition.version",
            "StructureDefinition.status",
        ],
        _ => ["ValueSet.url", "ValueSet.version", "ValueSet.status"],
    }
}

fn definitional(resource: &Resource) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();
    if let Some(definition) = resource.body.definition() {
        check_definition(
            definition,
            definition_fields(resource.resource_type()),
            &mut failures,
        );
    }
    failures
}

fn activity_definition(resource: &Resource) -> Vec<ValidationFailure> {
    let mut failures = definitional(resource);
    if let Some(activity) = resource.as_activity_definition() {
        match ProcessDefinition::parse(activity) {
            Ok(_) | Err(ProcessDefinitionError::MissingCanonical) => {}
            Err(err) => failures.push(ValidationFailure::InvalidProcessAuthorization {
                detail: err.to_string(),
            }),
        }
    }
    failures
}

fn naming_system(resource: &Resource) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();
    let ResourceBody::NamingSystem(ns) = &resource.body else {
        return failures;
    };
    if ns.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
        failures.push(ValidationFailure::Missing {
            field: "NamingSystem.name",
        });
    }
    check_status(ns.status, "NamingSystem.status", &mut failures);
    if ns.unique_id.is_empty() {
        failures.push(ValidationFailure::Missing {
            field: "NamingSystem.uniqueId",
        });
    }
    failures
}

fn endpoint(resource: &Resource) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();
    let ResourceBody::Endpoint(endpoint) = &resource.body else {
        return failures;
    };

    let identifiers = endpoint
        .identifier
        .iter()
        .filter(|i| i.system == ENDPOINT_IDENTIFIER_SYSTEM && !i.is_blank())
        .count();
    if identifiers != 1 {
        failures.push(ValidationFailure::NotExactlyOne {
            field: "Endpoint.identifier",
        });
    }

    match endpoint.address.as_deref() {
        None => failures.push(ValidationFailure::Missing {
            field: "Endpoint.address",
        }),
        Some(address) if !ENDPOINT_ADDRESS.is_match(address) => {
            failures.push(ValidationFailure::PatternMismatch {
                field: "Endpoint.address",
            });
        }
        Some(_) => {}
    }
    failures
}

fn organization(resource: &Resource) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();
    let ResourceBody::Organization(org) = &resource.body else {
        return failures;
    };

    if org.organization_identifiers().filter(|i| !i.is_blank()).count() != 1 {
        failures.push(ValidationFailure::NotExactlyOne {
            field: "Organization.identifier",
        });
    }

    let bad_thumbprint = org
        .thumbprint_extensions()
        .any(|ext| !ext.as_str().is_some_and(|v| THUMBPRINT.is_match(v)));
    if bad_thumbprint {
        failures.push(ValidationFailure::PatternMismatch {
            field: "Organization.extension[certificate-thumbprint]",
        });
    }
    failures
}

fn organization_affiliation(resource: &Resource) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();
    let ResourceBody::OrganizationAffiliation(affiliation) = &resource.body else {
        return failures;
    };

    let usable = |r: &meridian_core::resource::Reference| r.reference.is_some() || r.identifier.is_some();
    if !affiliation.organization.as_ref().is_some_and(usable) {
        failures.push(ValidationFailure::Missing {
            field: "OrganizationAffiliation.organization",
        });
    }
    if !affiliation.participating_organization.as_ref().is_some_and(usable) {
        failures.push(ValidationFailure::Missing {
            field: "OrganizationAffiliation.participatingOrganization",
        });
    }
    if affiliation.endpoint.len() != 1 || !affiliation.endpoint.iter().all(usable) {
        failures.push(ValidationFailure::NotExactlyOne {
            field: "OrganizationAffiliation.endpoint",
        });
    }
    if affiliation.code.is_empty() || affiliation.code.iter().any(|c| c.coding.is_empty()) {
        failures.push(ValidationFailure::Missing {
            field: "OrganizationAffiliation.code.coding",
        });
    }
    failures
}

fn subscription(resource: &Resource) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();
    let ResourceBody::Subscription(subscription) = &resource.body else {
        return failures;
    };

    match subscription.channel_type() {
        None => failures.push(ValidationFailure::Missing {
            field: "Subscription.channel.type",
        }),
        Some(ChannelType::Websocket) => {}
        Some(other) => failures.push(ValidationFailure::NotAllowed {
            field: "Subscription.channel.type",
            value: other.as_str().to_string(),
        }),
    }

    if let Some(payload) = subscription.payload() {
        if !SUBSCRIPTION_PAYLOADS.contains(&payload) {
            failures.push(ValidationFailure::NotAllowed {
                field: "Subscription.channel.payload",
                value: payload.to_string(),
            });
        }
    }

    match subscription.criteria.as_deref() {
        None => failures.push(ValidationFailure::Missing {
            field: "Subscription.criteria",
        }),
        Some(criteria) => match SearchQuery::parse(criteria) {
            Err(err) => failures.push(ValidationFailure::InvalidCriteria {
                detail: err.to_string(),
            }),
            Ok(query) => {
                let unsupported = query.unsupported_parameters();
                if !unsupported.is_empty() {
                    failures.push(ValidationFailure::InvalidCriteria {
                        detail: format!("unsupported parameters {}", unsupported.join(", ")),
                    });
                }
            }
        },
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::constants::{
        EXTENSION_CERTIFICATE_THUMBPRINT, ORGANIZATION_IDENTIFIER_SYSTEM,
    };
    use meridian_core::resource::{
        Endpoint, Extension, ExtensionValue, Identifier, Organization, Subscription,
        SubscriptionChannel,
    };

    fn endpoint_with(address: &str) -> Resource {
        Resource::new(ResourceBody::Endpoint(Endpoint {
            identifier: vec![Identifier::new(ENDPOINT_IDENTIFIER_SYSTEM, "ep.example")],
            address: Some(address.into()),
            managing_organization: None,
        }))
    }

    #[test]
    fn endpoint_address_must_be_https_host_port_path() {
        assert!(endpoint(&endpoint_with("https://ep.example:8443/fhir")).is_empty());
        assert!(endpoint(&endpoint_with("https://ep.example")).is_empty());
        assert_eq!(
            endpoint(&endpoint_with("http://ep.example/fhir")),
            vec![ValidationFailure::PatternMismatch {
                field: "Endpoint.address"
            }]
        );
        assert!(!endpoint(&endpoint_with("https://ep.example/fhir?x=1")).is_empty());
    }

    #[test]
    fn organization_thumbprints_are_lowercase_hex_512() {
        let thumbprint = |value: &str| {
            Extension::new(
                EXTENSION_CERTIFICATE_THUMBPRINT,
                ExtensionValue::String(value.to_string()),
            )
        };
        let mut org = Organization {
            identifier: vec![Identifier::new(ORGANIZATION_IDENTIFIER_SYSTEM, "a.org")],
            extension: vec![thumbprint(&"ab".repeat(64))],
            ..Organization::default()
        };
        assert!(organization(&Resource::new(ResourceBody::Organization(org.clone()))).is_empty());

        org.extension.push(thumbprint(&"AB".repeat(64)));
        assert_eq!(
            organization(&Resource::new(ResourceBody::Organization(org))).len(),
            1
        );
    }

    #[test]
    fn subscription_needs_websocket_and_supported_criteria() {
        let subscription_with = |criteria: &str, payload: Option<&str>| {
            Resource::new(ResourceBody::Subscription(Subscription {
                criteria: Some(criteria.into()),
                channel: Some(SubscriptionChannel {
                    channel_type: Some(ChannelType::Websocket),
                    payload: payload.map(str::to_string),
                }),
            }))
        };

        assert!(subscription(&subscription_with("Task?status=requested", None)).is_empty());
        assert!(subscription(&subscription_with(
            "Task?status=requested",
            Some("application/fhir+json")
        ))
        .is_empty());
        assert_eq!(
            subscription(&subscription_with("Task?status=requested", Some("text/plain"))).len(),
            1
        );
        assert!(matches!(
            subscription(&subscription_with("Task?color=blue", None)).as_slice(),
            [ValidationFailure::InvalidCriteria { .. }]
        ));
        assert!(matches!(
            subscription(&subscription_with("Task/1", None)).as_slice(),
            [ValidationFailure::InvalidCriteria { .. }]
        ));
    }

    #[test]
    fn definitional_status_must_be_publishable() {
        let resource = Resource::new(ResourceBody::ValueSet(Definition {
            url: Some("http://example.org/vs".into()),
            version: None,
            status: Some(PublicationStatus::Unknown),
        }));
        assert_eq!(
            definitional(&resource),
            vec![
                ValidationFailure::Missing {
                    field: "ValueSet.version"
                },
                ValidationFailure::NotAllowed {
                    field: "ValueSet.status",
                    value: "unknown".into()
                },
            ]
        );
    }

    #[test]
    fn every_tagged_type_has_one_row() {
        let configs = default_rule_configs();
        let mut types: Vec<_> = configs.iter().map(|c| c.resource_type).collect();
        let total = types.len();
        types.sort_by_key(|t| t.as_str());
        types.dedup();
        assert_eq!(types.len(), total);
        assert!(!types.contains(&ResourceType::Task));
        assert!(!types.contains(&ResourceType::Binary));
        assert!(!types.contains(&ResourceType::QuestionnaireResponse));
    }
}
