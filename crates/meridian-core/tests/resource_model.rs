//! Resource model integration tests
//!
//! Parses resources in their JSON form and checks the derived views the
//! authorization rules depend on: tags, message names, natural keys and
//! search values.

#![allow(clippy::unwrap_used)]

use meridian_core::constants::TASK_IDENTIFIER_SYSTEM;
use meridian_core::resource::{ReferenceTarget, TaskStatus};
use meridian_core::{NaturalKeys, ReadAccessTag, ReadAccessTags, Resource, ResourceType};

const TASK_JSON: &str = r#"{
    "resourceType": "Task",
    "meta": {
        "profile": ["http://dsf.dev/fhir/StructureDefinition/task-start-ping|1.0"]
    },
    "status": "requested",
    "instantiatesCanonical": "https://x.example/bpe/Process/ping|1.0",
    "requester": {
        "type": "Organization",
        "identifier": { "system": "http://dsf.dev/sid/organization-identifier", "value": "remote.org" }
    },
    "restriction": {
        "recipient": [{ "reference": "Organization/local" }]
    },
    "identifier": [
        { "system": "http://dsf.dev/sid/task-identifier", "value": "https://x.example/bpe/Process/ping/1.0/start" }
    ],
    "input": [
        {
            "type": { "coding": [{ "system": "http://dsf.dev/fhir/CodeSystem/bpmn-message", "code": "message-name" }] },
            "value": { "string": "startPing" }
        }
    ]
}"#;

#[test]
fn task_json_exposes_authorization_fields() {
    let resource = Resource::from_json(TASK_JSON).unwrap();
    let task = resource.as_task().unwrap();

    assert_eq!(task.status, Some(TaskStatus::Requested));
    assert_eq!(task.message_name(), Some("startPing"));
    assert_eq!(task.recipients().len(), 1);
    assert!(matches!(
        task.recipients()[0].target("https://meridian.example/fhir"),
        ReferenceTarget::Local {
            resource_type: ResourceType::Organization,
            id: "local"
        }
    ));
    assert!(matches!(
        task.requester.as_ref().unwrap().target("https://meridian.example/fhir"),
        ReferenceTarget::Logical { .. }
    ));

    let keys = NaturalKeys::new(TASK_IDENTIFIER_SYSTEM).keys(&resource);
    assert_eq!(keys.len(), 1);
    assert!(keys[0].to_query().matches(&resource));
}

#[test]
fn resource_json_round_trips_tags() {
    let json = r#"{
        "resourceType": "Patient",
        "meta": {
            "tag": [
                { "system": "http://dsf.dev/fhir/CodeSystem/read-access-tag", "code": "LOCAL" },
                {
                    "system": "http://dsf.dev/fhir/CodeSystem/read-access-tag",
                    "code": "ORGANIZATION",
                    "extension": [{
                        "url": "http://dsf.dev/fhir/StructureDefinition/extension-read-access-organization",
                        "value": { "valueIdentifier": { "system": "http://dsf.dev/sid/organization-identifier", "value": "a.org" } }
                    }]
                }
            ]
        }
    }"#;
    let resource = Resource::from_json(json).unwrap();
    let tags = ReadAccessTags::from_meta(&resource.meta);
    assert!(tags.is_well_formed());
    assert!(matches!(tags.tags()[1], ReadAccessTag::Organization(_)));

    let reparsed: Resource =
        serde_json::from_str(&serde_json::to_string(&resource).unwrap()).unwrap();
    assert_eq!(reparsed, resource);
}
