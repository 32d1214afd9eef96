//! Snapshot lookup tests: reference resolution, affiliation graph, process
//! definitions and code systems.

#![allow(clippy::unwrap_used)]

use meridian_core::constants::ORGANIZATION_IDENTIFIER_SYSTEM;
use meridian_core::resource::{
    ActivityDefinition, CodeSystem, CodeableConcept, Coding, ConceptDefinition, Identifier,
    Organization, OrganizationAffiliation, PublicationStatus, Reference, ResourceBody,
};
use meridian_core::{Resource, ResourceType};
use meridian_store::{MemoryStore, ResourceStore};

const BASE: &str = "https://meridian.example/fhir";

fn org_id(value: &str) -> Identifier {
    Identifier::new(ORGANIZATION_IDENTIFIER_SYSTEM, value)
}

fn organization(id: &str, identifier: &str) -> Resource {
    Resource::new(ResourceBody::Organization(Organization {
        identifier: vec![org_id(identifier)],
        ..Organization::default()
    }))
    .with_id(id)
}

fn role(code: &str) -> Coding {
    Coding::new("http://dsf.dev/fhir/CodeSystem/organization-role", code)
}

fn seeded() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .seed([
            organization("consortium", "consortium.org"),
            organization("member", "member.org"),
            // logical references on both ends
            Resource::new(ResourceBody::OrganizationAffiliation(OrganizationAffiliation {
                organization: Some(Reference::logical(
                    ResourceType::Organization,
                    org_id("consortium.org"),
                )),
                participating_organization: Some(Reference::logical(
                    ResourceType::Organization,
                    org_id("member.org"),
                )),
                endpoint: vec![Reference::literal("Endpoint/1")],
                code: vec![CodeableConcept::of(role("DIC"))],
                ..OrganizationAffiliation::default()
            })),
            // literal references on both ends
            Resource::new(ResourceBody::OrganizationAffiliation(OrganizationAffiliation {
                active: false,
                organization: Some(Reference::literal("Organization/consortium")),
                participating_organization: Some(Reference::literal("Organization/member")),
                endpoint: vec![Reference::literal("Endpoint/2")],
                code: vec![CodeableConcept::of(role("HRP"))],
            })),
            Resource::new(ResourceBody::CodeSystem(CodeSystem {
                url: Some("http://dsf.dev/fhir/CodeSystem/organization-role".into()),
                version: Some("1.0.0".into()),
                status: Some(PublicationStatus::Active),
                concept: vec![ConceptDefinition {
                    code: "DIC".into(),
                    display: None,
                }],
            })),
            Resource::new(ResourceBody::ActivityDefinition(ActivityDefinition {
                url: Some("https://x.example/bpe/Process/ping".into()),
                version: Some("1.0".into()),
                status: Some(PublicationStatus::Retired),
                ..ActivityDefinition::default()
            })),
        ])
        .unwrap();
    store
}

#[tokio::test]
async fn resolves_literal_and_logical_organizations() {
    let store = seeded();
    let snapshot = store.snapshot().await.unwrap();

    let literal = snapshot
        .resolve_organization(&Reference::literal("Organization/member"), BASE)
        .await
        .unwrap();
    assert_eq!(literal.unwrap().id.as_deref(), Some("member"));

    let absolute = snapshot
        .resolve_organization(
            &Reference::literal(format!("{BASE}/Organization/consortium")),
            BASE,
        )
        .await
        .unwrap();
    assert_eq!(absolute.unwrap().id.as_deref(), Some("consortium"));

    let logical = snapshot
        .resolve_organization(
            &Reference {
                identifier: Some(org_id("consortium.org")),
                ..Reference::default()
            },
            BASE,
        )
        .await
        .unwrap();
    assert_eq!(logical.unwrap().id.as_deref(), Some("consortium"));

    let missing = snapshot
        .resolve_organization(&Reference::literal("Organization/nope"), BASE)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn affiliation_edges_cover_logical_and_literal_references() {
    let store = seeded();
    let snapshot = store.snapshot().await.unwrap();

    let edges = snapshot
        .affiliations_of_member(&org_id("member.org"), BASE)
        .await
        .unwrap();
    assert_eq!(edges.len(), 2);
    assert!(edges.iter().all(|e| e.parent == org_id("consortium.org")));

    let active: Vec<_> = edges.iter().filter(|e| e.active).collect();
    assert_eq!(active.len(), 1);
    assert!(active[0].grants(&org_id("consortium.org"), &org_id("member.org"), &role("DIC")));
}

#[tokio::test]
async fn role_lookup_requires_exact_code() {
    let store = seeded();
    let snapshot = store.snapshot().await.unwrap();
    let system = "http://dsf.dev/fhir/CodeSystem/organization-role";

    assert!(snapshot.code_system_defines(system, "DIC").await.unwrap());
    assert!(!snapshot.code_system_defines(system, "dic").await.unwrap());
    assert!(!snapshot.code_system_defines("http://nope", "DIC").await.unwrap());
}

#[tokio::test]
async fn retired_process_definitions_are_not_found() {
    let store = seeded();
    let snapshot = store.snapshot().await.unwrap();
    let found = snapshot
        .process_definition("https://x.example/bpe/Process/ping", "1.0")
        .await
        .unwrap();
    assert!(found.is_none());
}
