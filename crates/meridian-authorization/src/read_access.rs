//! Read-access tag evaluation
//!
//! Validity: the tag set must be well formed (see
//! [`ReadAccessTags::is_well_formed`]) and every ORGANIZATION and ROLE tag must
//! reference an existing organization, and for ROLE an existing role code.
//! Visibility: a tag matches an identity when ALL, LOCAL for local identities,
//! ORGANIZATION naming the identity's organization, or ROLE held by the
//! identity's organization through an active affiliation.

use crate::error::AuthResult;
use async_trait::async_trait;
use futures::future::try_join_all;
use meridian_core::resource::{AffiliationEdge, Coding, Identifier, Meta};
use meridian_core::{Identity, ReadAccessTag, ReadAccessTags};
use meridian_store::StoreSnapshot;
use tracing::debug;

/// Existence checks for the organizations and roles tags refer to
#[async_trait]
pub trait TagReferents: Send + Sync {
    /// True when a non-deleted organization has this identifier
    async fn organization_exists(&self, identifier: &Identifier) -> AuthResult<bool>;

    /// True when a code system with url `role.system` defines `role.code`
    async fn role_exists(&self, role: &Coding) -> AuthResult<bool>;
}

/// [`TagReferents`] answered from a store snapshot
pub struct SnapshotReferents<'a> {
    snapshot: &'a dyn StoreSnapshot,
}

impl<'a> SnapshotReferents<'a> {
    /// Wrap a snapshot
    pub fn new(snapshot: &'a dyn StoreSnapshot) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl TagReferents for SnapshotReferents<'_> {
    async fn organization_exists(&self, identifier: &Identifier) -> AuthResult<bool> {
        Ok(self
            .snapshot
            .organization_by_identifier(identifier)
            .await?
            .is_some())
    }

    async fn role_exists(&self, role: &Coding) -> AuthResult<bool> {
        Ok(self
            .snapshot
            .code_system_defines(&role.system, &role.code)
            .await?)
    }
}

/// Validity and visibility of read-access tags
pub struct ReadAccessEvaluator;

impl ReadAccessEvaluator {
    /// True when `meta` carries a well-formed tag set whose references exist
    pub async fn is_valid(meta: &Meta, referents: &dyn TagReferents) -> AuthResult<bool> {
        let tags = ReadAccessTags::from_meta(meta);
        if !tags.is_well_formed() {
            debug!(malformed = tags.malformed().len(), "Read-access tags not well formed");
            return Ok(false);
        }

        let checks = tags.tags().iter().map(|tag| Self::tag_valid(tag, referents));
        Ok(try_join_all(checks).await?.into_iter().all(|valid| valid))
    }

    async fn tag_valid(tag: &ReadAccessTag, referents: &dyn TagReferents) -> AuthResult<bool> {
        let valid = match tag {
            ReadAccessTag::All | ReadAccessTag::Local => true,
            ReadAccessTag::Organization(identifier) => {
                referents.organization_exists(identifier).await?
            }
            ReadAccessTag::Role { parent, role } => {
                referents.organization_exists(parent).await? && referents.role_exists(role).await?
            }
        };
        if !valid {
            debug!(tag = %tag, "Read-access tag references unknown organization or role");
        }
        Ok(valid)
    }

    /// Tags in `meta` granting `identity` visibility; `affiliations` are the
    /// edges whose member is the identity's organization
    pub fn matching_tags(
        meta: &Meta,
        identity: &Identity,
        affiliations: &[AffiliationEdge],
    ) -> Vec<ReadAccessTag> {
        let organization = identity.organization_identifier();
        ReadAccessTags::from_meta(meta)
            .tags()
            .iter()
            .filter(|tag| match tag {
                ReadAccessTag::All => true,
                ReadAccessTag::Local => identity.is_local(),
                ReadAccessTag::Organization(identifier) => organization == Some(identifier),
                ReadAccessTag::Role { parent, role } => organization.is_some_and(|member| {
                    affiliations.iter().any(|edge| edge.grants(parent, member, role))
                }),
            })
            .cloned()
            .collect()
    }

    /// [`Self::matching_tags`] with affiliations loaded from `snapshot` only
    /// when a ROLE tag needs them
    pub async fn visible_tags(
        snapshot: &dyn StoreSnapshot,
        meta: &Meta,
        identity: &Identity,
        server_base_url: &str,
    ) -> AuthResult<Vec<ReadAccessTag>> {
        let affiliations = match identity.organization_identifier() {
            Some(member) if ReadAccessTags::from_meta(meta).has_role_tags() => {
                snapshot.affiliations_of_member(member, server_base_url).await?
            }
            _ => Vec::new(),
        };
        Ok(Self::matching_tags(meta, identity, &affiliations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::constants::ORGANIZATION_IDENTIFIER_SYSTEM;
    use meridian_core::{IdentityKind, IdentityOrganization};
    use std::collections::HashSet;

    struct Known {
        organizations: HashSet<String>,
        roles: HashSet<String>,
    }

    #[async_trait]
    impl TagReferents for Known {
        async fn organization_exists(&self, identifier: &Identifier) -> AuthResult<bool> {
            Ok(self.organizations.contains(&identifier.value))
        }

        async fn role_exists(&self, role: &Coding) -> AuthResult<bool> {
            Ok(self.roles.contains(&role.code))
        }
    }

    fn known() -> Known {
        Known {
            organizations: ["a.org", "consortium.org"].iter().map(|s| s.to_string()).collect(),
            roles: ["DIC"].iter().map(|s| s.to_string()).collect(),
        }
    }

    fn org(value: &str) -> Identifier {
        Identifier::new(ORGANIZATION_IDENTIFIER_SYSTEM, value)
    }

    fn role(code: &str) -> Coding {
        Coding::new("http://dsf.dev/fhir/CodeSystem/organization-role", code)
    }

    fn meta(tags: &[ReadAccessTag]) -> Meta {
        Meta {
            profile: vec![],
            tag: tags.iter().map(ReadAccessTag::to_coding).collect(),
        }
    }

    fn identity(kind: IdentityKind, organization: &str) -> Identity {
        Identity::organization(
            organization,
            kind,
            IdentityOrganization {
                id: organization.to_string(),
                identifier: org(organization),
                active: true,
            },
            vec![],
        )
    }

    #[tokio::test]
    async fn organization_tag_requires_existing_organization() {
        let valid = meta(&[ReadAccessTag::Local, ReadAccessTag::Organization(org("a.org"))]);
        assert!(ReadAccessEvaluator::is_valid(&valid, &known()).await.unwrap());

        let unknown = meta(&[ReadAccessTag::Local, ReadAccessTag::Organization(org("b.org"))]);
        assert!(!ReadAccessEvaluator::is_valid(&unknown, &known()).await.unwrap());
    }

    #[tokio::test]
    async fn role_tag_requires_parent_and_role() {
        let valid = meta(&[
            ReadAccessTag::Local,
            ReadAccessTag::Role {
                parent: org("consortium.org"),
                role: role("DIC"),
            },
        ]);
        assert!(ReadAccessEvaluator::is_valid(&valid, &known()).await.unwrap());

        let unknown_role = meta(&[
            ReadAccessTag::Local,
            ReadAccessTag::Role {
                parent: org("consortium.org"),
                role: role("XYZ"),
            },
        ]);
        assert!(!ReadAccessEvaluator::is_valid(&unknown_role, &known()).await.unwrap());
    }

    #[tokio::test]
    async fn empty_tags_are_invalid() {
        assert!(!ReadAccessEvaluator::is_valid(&Meta::default(), &known()).await.unwrap());
    }

    #[test]
    fn local_tag_matches_only_local_identities() {
        let tags = meta(&[ReadAccessTag::Local]);
        assert_eq!(
            ReadAccessEvaluator::matching_tags(&tags, &identity(IdentityKind::Local, "l.org"), &[]),
            vec![ReadAccessTag::Local]
        );
        assert!(ReadAccessEvaluator::matching_tags(
            &tags,
            &identity(IdentityKind::Remote, "r.org"),
            &[]
        )
        .is_empty());
    }

    #[test]
    fn role_tag_matches_through_active_affiliation() {
        let tag = ReadAccessTag::Role {
            parent: org("consortium.org"),
            role: role("DIC"),
        };
        let tags = meta(&[ReadAccessTag::Local, tag.clone()]);
        let remote = identity(IdentityKind::Remote, "a.org");
        let edge = AffiliationEdge {
            parent: org("consortium.org"),
            member: org("a.org"),
            roles: vec![role("DIC")],
            active: true,
        };

        assert_eq!(
            ReadAccessEvaluator::matching_tags(&tags, &remote, std::slice::from_ref(&edge)),
            vec![tag]
        );

        let inactive = AffiliationEdge {
            active: false,
            ..edge
        };
        assert!(ReadAccessEvaluator::matching_tags(&tags, &remote, &[inactive]).is_empty());
    }

    #[test]
    fn organization_tag_matches_named_organization() {
        let tags = meta(&[ReadAccessTag::Local, ReadAccessTag::Organization(org("a.org"))]);
        let hits = ReadAccessEvaluator::matching_tags(
            &tags,
            &identity(IdentityKind::Remote, "a.org"),
            &[],
        );
        assert_eq!(hits, vec![ReadAccessTag::Organization(org("a.org"))]);
    }
}
