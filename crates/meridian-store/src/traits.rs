//! Storage collaborator contract
//!
//! Authorization decisions read through a [`StoreSnapshot`], a consistent
//! read-only view that is dropped before any write begins. Writes go through
//! [`ResourceStore`], which enforces natural-key uniqueness and applies
//! envelopes atomically.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use meridian_core::constants::ORGANIZATION_IDENTIFIER_SYSTEM;
use meridian_core::resource::{AffiliationEdge, Identifier, Reference, ReferenceTarget};
use meridian_core::{Resource, ResourceType, SearchQuery};

/// A stored resource with its deletion marker
#[derive(Debug, Clone, PartialEq)]
pub struct StoredVersion {
    /// Latest version
    pub resource: Resource,
    /// True when soft-deleted
    pub deleted: bool,
}

/// One write in an envelope
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOperation {
    /// Insert a new resource
    Create(Resource),
    /// Replace the current version of an existing resource (id required)
    Update(Resource),
    /// Soft-delete
    Delete {
        /// Type
        resource_type: ResourceType,
        /// Logical id
        id: String,
    },
    /// Remove the resource and its history
    PermanentDelete {
        /// Type
        resource_type: ResourceType,
        /// Logical id
        id: String,
    },
}

/// Outcome of one applied write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteResult {
    /// Stored with a fresh id and version
    Created(Resource),
    /// Stored as a new version
    Updated(Resource),
    /// Soft-deleted
    Deleted {
        /// Type
        resource_type: ResourceType,
        /// Logical id
        id: String,
    },
    /// Removed
    PermanentlyDeleted {
        /// Type
        resource_type: ResourceType,
        /// Logical id
        id: String,
    },
}

/// Consistent read-only view used for one authorization decision
#[async_trait]
pub trait StoreSnapshot: Send + Sync {
    /// Read the latest version, including soft-deleted resources
    async fn read(&self, resource_type: ResourceType, id: &str) -> StoreResult<Option<StoredVersion>>;

    /// Non-deleted resources matching `query`
    ///
    /// Fails with [`StoreError::UnsupportedQuery`] when the query names
    /// parameters outside the capability catalogue.
    async fn search(&self, query: &SearchQuery) -> StoreResult<Vec<Resource>>;

    /// Number of non-deleted resources matching `query`
    async fn count(&self, query: &SearchQuery) -> StoreResult<usize> {
        Ok(self.search(query).await?.len())
    }

    /// True when at least one non-deleted resource matches `query`
    async fn exists(&self, query: &SearchQuery) -> StoreResult<bool> {
        Ok(self.count(query).await? > 0)
    }

    /// Resolve a literal or logical reference to a non-deleted resource
    async fn resolve(&self, reference: &Reference, server_base_url: &str) -> StoreResult<Option<Resource>> {
        match reference.target(server_base_url) {
            ReferenceTarget::Local { resource_type, id } => Ok(self
                .read(resource_type, id)
                .await?
                .filter(|stored| !stored.deleted)
                .map(|stored| stored.resource)),
            ReferenceTarget::Logical {
                resource_type: Some(resource_type),
                identifier,
            } => {
                let query = SearchQuery::new(resource_type).param("identifier", identifier.token());
                let mut found = self.search(&query).await?;
                // Ambiguous logical references do not resolve
                Ok(if found.len() == 1 { found.pop() } else { None })
            }
            ReferenceTarget::Logical {
                resource_type: None,
                ..
            }
            | ReferenceTarget::External(_)
            | ReferenceTarget::Unresolvable => Ok(None),
        }
    }

    /// Resolve a reference that must point at an Organization
    async fn resolve_organization(
        &self,
        reference: &Reference,
        server_base_url: &str,
    ) -> StoreResult<Option<Resource>> {
        let mut reference = reference.clone();
        if reference.reference.is_none() && reference.resource_type.is_none() {
            reference.resource_type = Some(ResourceType::Organization);
        }
        Ok(self
            .resolve(&reference, server_base_url)
            .await?
            .filter(|r| r.resource_type() == ResourceType::Organization))
    }

    /// The non-deleted organization with this identifier
    async fn organization_by_identifier(&self, identifier: &Identifier) -> StoreResult<Option<Resource>> {
        let query = SearchQuery::new(ResourceType::Organization).param("identifier", identifier.token());
        Ok(self.search(&query).await?.into_iter().next())
    }

    /// True when some code system with url `system` defines `code`
    async fn code_system_defines(&self, system: &str, code: &str) -> StoreResult<bool> {
        let query = SearchQuery::new(ResourceType::CodeSystem).param("url", system);
        Ok(self
            .search(&query)
            .await?
            .iter()
            .filter_map(Resource::as_code_system)
            .any(|cs| cs.defines(code)))
    }

    /// Draft or active process definition with this url and version
    async fn process_definition(&self, url: &str, version: &str) -> StoreResult<Option<Resource>> {
        let query = SearchQuery::new(ResourceType::ActivityDefinition)
            .param("url", url)
            .param("version", version)
            .any_of("status", ["draft".to_string(), "active".to_string()]);
        Ok(self.search(&query).await?.into_iter().next())
    }

    /// Affiliation edges whose member is the organization `member`
    ///
    /// Affiliations may reference the member logically (by identifier) or
    /// literally; both are found. Parents referenced literally are resolved to
    /// their organization identifier; edges whose parent cannot be identified
    /// are dropped.
    async fn affiliations_of_member(
        &self,
        member: &Identifier,
        server_base_url: &str,
    ) -> StoreResult<Vec<AffiliationEdge>> {
        let by_identifier = SearchQuery::new(ResourceType::OrganizationAffiliation)
            .param("participating-organization-identifier", member.token());
        let mut affiliations = self.search(&by_identifier).await?;

        if let Some(reference) = self
            .organization_by_identifier(member)
            .await?
            .and_then(|org| org.local_reference())
        {
            let by_reference = SearchQuery::new(ResourceType::OrganizationAffiliation)
                .param("participating-organization", reference);
            for found in self.search(&by_reference).await? {
                if !affiliations.iter().any(|a| a.id == found.id) {
                    affiliations.push(found);
                }
            }
        }

        let mut edges = Vec::with_capacity(affiliations.len());
        for affiliation in affiliations.iter().filter_map(Resource::as_affiliation) {
            let Some(parent_ref) = affiliation.organization.as_ref() else {
                continue;
            };
            let parent = match parent_ref
                .identifier
                .as_ref()
                .filter(|i| i.system == ORGANIZATION_IDENTIFIER_SYSTEM)
            {
                Some(identifier) => Some(identifier.clone()),
                None => self
                    .resolve_organization(parent_ref, server_base_url)
                    .await?
                    .and_then(|org| {
                        org.as_organization()
                            .and_then(|o| o.organization_identifier().cloned())
                    }),
            };

            if let Some(parent) = parent {
                edges.push(AffiliationEdge {
                    parent,
                    member: member.clone(),
                    roles: affiliation.roles().cloned().collect(),
                    active: affiliation.active,
                });
            }
        }
        Ok(edges)
    }
}

/// Resource storage
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Open a consistent read-only snapshot
    async fn snapshot(&self) -> StoreResult<Box<dyn StoreSnapshot>>;

    /// Read the latest version, including soft-deleted resources
    async fn read(&self, resource_type: ResourceType, id: &str) -> StoreResult<Option<StoredVersion>>;

    /// Apply all operations or none; natural-key uniqueness is enforced
    /// across the envelope and the existing data
    async fn apply_atomically(&self, operations: Vec<WriteOperation>) -> StoreResult<Vec<WriteResult>>;

    /// Insert a resource, assigning id and version
    async fn create(&self, resource: Resource) -> StoreResult<Resource> {
        match single(self.apply_atomically(vec![WriteOperation::Create(resource)]).await?)? {
            WriteResult::Created(created) => Ok(created),
            other => Err(unexpected(&other)),
        }
    }

    /// Store a new version of an existing resource
    async fn update(&self, resource: Resource) -> StoreResult<Resource> {
        match single(self.apply_atomically(vec![WriteOperation::Update(resource)]).await?)? {
            WriteResult::Updated(updated) => Ok(updated),
            other => Err(unexpected(&other)),
        }
    }

    /// Soft-delete
    async fn delete(&self, resource_type: ResourceType, id: &str) -> StoreResult<()> {
        let op = WriteOperation::Delete {
            resource_type,
            id: id.to_string(),
        };
        single(self.apply_atomically(vec![op]).await?).map(|_| ())
    }

    /// Remove a resource and its history
    async fn permanent_delete(&self, resource_type: ResourceType, id: &str) -> StoreResult<()> {
        let op = WriteOperation::PermanentDelete {
            resource_type,
            id: id.to_string(),
        };
        single(self.apply_atomically(vec![op]).await?).map(|_| ())
    }
}

fn single(mut results: Vec<WriteResult>) -> StoreResult<WriteResult> {
    match (results.pop(), results.is_empty()) {
        (Some(result), true) => Ok(result),
        _ => Err(StoreError::unavailable(
            "store returned an unexpected number of write results",
        )),
    }
}

fn unexpected(result: &WriteResult) -> StoreError {
    StoreError::unavailable(format!("store returned unexpected write result {result:?}"))
}
