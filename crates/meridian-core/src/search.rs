//! Existence/count queries and the search capability catalogue
//!
//! Queries are conjunctions of parameters; each parameter matches when any of
//! its values equals one of the resource's values for that parameter name.
//! Only the parameters listed in [`SearchCapabilities`] are understood.

use crate::errors::{MeridianError, Result};
use crate::resource::{Reference, Resource, ResourceBody, ResourceType};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

/// One query parameter; values are alternatives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchParameter {
    /// Parameter name
    pub name: String,
    /// Accepted values
    pub values: Vec<String>,
}

/// Conjunctive query over one resource type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchQuery {
    /// Type searched
    pub resource_type: ResourceType,
    /// Parameters, all of which must match
    pub parameters: Vec<SearchParameter>,
}

impl SearchQuery {
    /// Query matching every resource of `resource_type`
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            parameters: Vec::new(),
        }
    }

    /// Add a single-valued parameter
    pub fn param(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.any_of(name, [value.into()])
    }

    /// Add a parameter matching any of `values`
    pub fn any_of(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = String>,
    ) -> Self {
        self.parameters.push(SearchParameter {
            name: name.into(),
            values: values.into_iter().collect(),
        });
        self
    }

    /// Parse `Type?name=value&name=v1,v2`; the path must be a single type name
    pub fn parse(criteria: &str) -> Result<Self> {
        let (path, query) = match criteria.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (criteria, None),
        };

        if path.is_empty() || path.contains('/') {
            return Err(MeridianError::invalid(format!(
                "criteria path '{path}' is not a single resource type"
            )));
        }

        let mut parsed = SearchQuery::new(path.parse()?);
        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            if pair.is_empty() {
                continue;
            }
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                MeridianError::invalid(format!("criteria parameter '{pair}' has no value"))
            })?;
            parsed = parsed.any_of(name, value.split(',').map(str::to_string));
        }
        Ok(parsed)
    }

    /// True when `resource` has this query's type and satisfies every parameter
    pub fn matches(&self, resource: &Resource) -> bool {
        resource.resource_type() == self.resource_type
            && self.parameters.iter().all(|p| {
                let actual = search_values(resource, &p.name);
                p.values.iter().any(|v| actual.contains(v))
            })
    }

    /// Parameter names not in the capability catalogue for this type
    pub fn unsupported_parameters(&self) -> Vec<String> {
        self.parameters
            .iter()
            .filter(|p| !SearchCapabilities::supports(self.resource_type, &p.name))
            .map(|p| p.name.clone())
            .collect()
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource_type)?;
        for (i, p) in self.parameters.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{}={}", p.name, p.values.join(","))?;
        }
        Ok(())
    }
}

const COMMON: &[&str] = &["_id", "_profile"];
const DEFINITIONAL: &[&str] = &["url", "version", "status"];
const IDENTIFIED: &[&str] = &["identifier"];

static CATALOGUE: Lazy<HashMap<ResourceType, &'static [&'static str]>> = Lazy::new(|| {
    use ResourceType::*;

    let mut catalogue: HashMap<ResourceType, &'static [&'static str]> = HashMap::new();
    for rt in [
        ActivityDefinition,
        CodeSystem,
        Library,
        Measure,
        Questionnaire,
        StructureDefinition,
        ValueSet,
    ] {
        catalogue.insert(rt, DEFINITIONAL);
    }
    for rt in [
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
    ] {
        catalogue.insert(rt, IDENTIFIED);
    }
    catalogue.insert(Binary, &[]);
    catalogue.insert(Endpoint, &["identifier", "address", "organization"]);
    catalogue.insert(NamingSystem, &["name", "status", "value"]);
    catalogue.insert(Organization, &["identifier", "thumbprint", "active", "name"]);
    catalogue.insert(
        OrganizationAffiliation,
        &[
            "active",
            "primary-organization",
            "primary-organization-identifier",
            "participating-organization",
            "participating-organization-identifier",
            "endpoint",
            "role",
        ],
    );
    catalogue.insert(QuestionnaireResponse, &["status", "questionnaire", "author"]);
    catalogue.insert(Subscription, &["criteria", "type", "payload"]);
    catalogue.insert(Task, &["identifier", "status", "requester", "recipient"]);
    catalogue
});

/// Search parameters understood per resource type
pub struct SearchCapabilities;

impl SearchCapabilities {
    /// Type-specific parameters (the common `_id` and `_profile` are implied)
    pub fn parameters(resource_type: ResourceType) -> &'static [&'static str] {
        CATALOGUE.get(&resource_type).copied().unwrap_or_default()
    }

    /// True when `name` is understood for `resource_type`
    pub fn supports(resource_type: ResourceType, name: &str) -> bool {
        COMMON.contains(&name) || Self::parameters(resource_type).contains(&name)
    }
}

fn references<'a>(refs: impl IntoIterator<Item = &'a Reference>) -> Vec<String> {
    refs.into_iter().filter_map(Reference::search_value).collect()
}

fn identifier_tokens<'a>(
    reference: Option<&'a Reference>,
) -> impl Iterator<Item = String> + 'a {
    reference
        .and_then(|r| r.identifier.as_ref())
        .map(|i| i.token())
        .into_iter()
}

/// Values of `resource` for parameter `name`; empty when not applicable
pub fn search_values(resource: &Resource, name: &str) -> Vec<String> {
    match name {
        "_id" => return resource.id.iter().cloned().collect(),
        "_profile" => return resource.meta.profile.clone(),
        "identifier" => {
            return resource
                .body
                .identifiers()
                .iter()
                .map(|i| i.token())
                .collect()
        }
        _ => {}
    }

    if let Some(definition) = resource.body.definition() {
        return match name {
            "url" => definition.url.into_iter().collect(),
            "version" => definition.version.into_iter().collect(),
            "status" => definition
                .status
                .map(|s| s.as_str().to_string())
                .into_iter()
                .collect(),
            _ => Vec::new(),
        };
    }

    match (&resource.body, name) {
        (ResourceBody::Endpoint(e), "address") => e.address.iter().cloned().collect(),
        (ResourceBody::Endpoint(e), "organization") => references(&e.managing_organization),

        (ResourceBody::NamingSystem(n), "name") => n.name.iter().cloned().collect(),
        (ResourceBody::NamingSystem(n), "status") => n
            .status
            .map(|s| s.as_str().to_string())
            .into_iter()
            .collect(),
        (ResourceBody::NamingSystem(n), "value") => {
            n.unique_id_values().map(str::to_string).collect()
        }

        (ResourceBody::Organization(o), "thumbprint") => {
            o.thumbprints().map(str::to_string).collect()
        }
        (ResourceBody::Organization(o), "active") => vec![o.active.to_string()],
        (ResourceBody::Organization(o), "name") => o.name.iter().cloned().collect(),

        (ResourceBody::OrganizationAffiliation(a), "active") => vec![a.active.to_string()],
        (ResourceBody::OrganizationAffiliation(a), "primary-organization") => {
            references(&a.organization)
        }
        (ResourceBody::OrganizationAffiliation(a), "participating-organization") => {
            references(&a.participating_organization)
        }
        (ResourceBody::OrganizationAffiliation(a), "primary-organization-identifier") => {
            identifier_tokens(a.organization.as_ref()).collect()
        }
        (ResourceBody::OrganizationAffiliation(a), "participating-organization-identifier") => {
            identifier_tokens(a.participating_organization.as_ref()).collect()
        }
        (ResourceBody::OrganizationAffiliation(a), "endpoint") => references(&a.endpoint),
        (ResourceBody::OrganizationAffiliation(a), "role") => {
            a.roles().map(|c| c.token()).collect()
        }

        (ResourceBody::QuestionnaireResponse(q), "status") => q
            .status
            .map(|s| s.as_str().to_string())
            .into_iter()
            .collect(),
        (ResourceBody::QuestionnaireResponse(q), "questionnaire") => {
            q.questionnaire.iter().cloned().collect()
        }
        (ResourceBody::QuestionnaireResponse(q), "author") => references(&q.author),

        (ResourceBody::Subscription(s), "criteria") => s.criteria.iter().cloned().collect(),
        (ResourceBody::Subscription(s), "type") => s
            .channel_type()
            .map(|t| t.as_str().to_string())
            .into_iter()
            .collect(),
        // Absent payload is indexed as the empty string so keys stay exact
        (ResourceBody::Subscription(s), "payload") => {
            vec![s.payload().unwrap_or_default().to_string()]
        }

        (ResourceBody::Task(t), "status") => t
            .status
            .map(|s| s.as_str().to_string())
            .into_iter()
            .collect(),
        (ResourceBody::Task(t), "requester") => references(&t.requester),
        (ResourceBody::Task(t), "recipient") => references(t.recipients()),

        _ => Vec::new(),
    }
}
