//! Natural keys
//!
//! A natural key is a combination of field values that must be unique among
//! non-deleted resources of one type. The same keys drive the
//! authorization-time duplicate query and the storage uniqueness constraint,
//! so both agree on what "duplicate" means. Most keys are also fixed for the
//! life of a resource; the rest (certificate thumbprints, affiliation roles)
//! may change on update as long as the new values are not held elsewhere.

use crate::constants::{
    ENDPOINT_IDENTIFIER_SYSTEM, ORGANIZATION_IDENTIFIER_SYSTEM, TASK_IDENTIFIER_SYSTEM,
};
use crate::resource::{Resource, ResourceBody, ResourceType};
use crate::search::{search_values, SearchQuery};
use std::fmt;

/// One uniqueness key of a resource value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    /// Type the key is unique within
    pub resource_type: ResourceType,
    /// Key name
    pub name: &'static str,
    /// Search parameters and values making up the key
    pub parameters: Vec<(&'static str, String)>,
    /// Updates must keep the key unchanged
    pub immutable: bool,
}

impl NaturalKey {
    fn new(resource_type: ResourceType, name: &'static str) -> Self {
        Self {
            resource_type,
            name,
            parameters: Vec::new(),
            immutable: true,
        }
    }

    fn unique_only(resource_type: ResourceType, name: &'static str) -> Self {
        Self {
            immutable: false,
            ..Self::new(resource_type, name)
        }
    }

    fn with(mut self, parameter: &'static str, value: impl Into<String>) -> Self {
        self.parameters.push((parameter, value.into()));
        self
    }

    /// Query finding resources holding this key
    pub fn to_query(&self) -> SearchQuery {
        self.parameters
            .iter()
            .fold(SearchQuery::new(self.resource_type), |q, (name, value)| {
                q.param(*name, value.clone())
            })
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)?;
        for (name, value) in &self.parameters {
            write!(f, " {name}={value}")?;
        }
        Ok(())
    }
}

/// Derives natural keys from resource values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalKeys {
    task_identifier_system: String,
}

impl Default for NaturalKeys {
    fn default() -> Self {
        Self::new(TASK_IDENTIFIER_SYSTEM)
    }
}

impl NaturalKeys {
    /// Keys with Task uniqueness on identifiers of `task_identifier_system`
    pub fn new(task_identifier_system: impl Into<String>) -> Self {
        Self {
            task_identifier_system: task_identifier_system.into(),
        }
    }

    /// Every natural key of `resource`; empty for types without keys
    pub fn keys(&self, resource: &Resource) -> Vec<NaturalKey> {
        let rt = resource.resource_type();

        if let Some(definition) = resource.body.definition() {
            return match (definition.url, definition.version) {
                (Some(url), Some(version)) => vec![NaturalKey::new(rt, "url-version")
                    .with("url", url)
                    .with("version", version)],
                _ => Vec::new(),
            };
        }

        match &resource.body {
            ResourceBody::NamingSystem(ns) => ns
                .name
                .iter()
                .map(|name| NaturalKey::new(rt, "name").with("name", name.clone()))
                .collect(),

            ResourceBody::Endpoint(endpoint) => endpoint
                .address
                .iter()
                .map(|address| NaturalKey::new(rt, "address").with("address", address.clone()))
                .chain(
                    endpoint
                        .identifier
                        .iter()
                        .filter(|i| i.system == ENDPOINT_IDENTIFIER_SYSTEM && !i.is_blank())
                        .map(|i| NaturalKey::new(rt, "identifier").with("identifier", i.token())),
                )
                .collect(),

            ResourceBody::Organization(org) => org
                .identifier
                .iter()
                .filter(|i| i.system == ORGANIZATION_IDENTIFIER_SYSTEM && !i.is_blank())
                .map(|i| NaturalKey::new(rt, "identifier").with("identifier", i.token()))
                .chain(org.thumbprints().map(|thumbprint| {
                    NaturalKey::unique_only(rt, "thumbprint").with("thumbprint", thumbprint)
                }))
                .collect(),

            ResourceBody::OrganizationAffiliation(_) => {
                let parents = search_values(resource, "primary-organization");
                let members = search_values(resource, "participating-organization");
                let (Some(parent), Some(member)) = (parents.first(), members.first()) else {
                    return Vec::new();
                };
                let pair = |key: NaturalKey| {
                    key.with("primary-organization", parent.clone())
                        .with("participating-organization", member.clone())
                };

                search_values(resource, "endpoint")
                    .into_iter()
                    .map(|endpoint| {
                        pair(NaturalKey::new(rt, "parent-member-endpoint")).with("endpoint", endpoint)
                    })
                    .chain(search_values(resource, "role").into_iter().map(|role| {
                        pair(NaturalKey::unique_only(rt, "parent-member-role")).with("role", role)
                    }))
                    .collect()
            }

            ResourceBody::Subscription(subscription) => {
                match (&subscription.criteria, subscription.channel_type()) {
                    (Some(criteria), Some(channel_type)) => {
                        vec![NaturalKey::new(rt, "criteria-type-payload")
                            .with("criteria", criteria.clone())
                            .with("type", channel_type.as_str())
                            .with("payload", subscription.payload().unwrap_or_default())]
                    }
                    _ => Vec::new(),
                }
            }

            ResourceBody::Task(task) => task
                .identifiers_in(&self.task_identifier_system)
                .map(|i| NaturalKey::new(rt, "identifier").with("identifier", i.token()))
                .collect(),

            _ => Vec::new(),
        }
    }
}
