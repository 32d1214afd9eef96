//! Per-resource-type authorization rules
//!
//! Every resource type is guarded by one [`AuthorizationRule`]. Rules read
//! through the [`RuleContext`] snapshot only; they never write.

mod binary;
mod questionnaire_response;
mod table;
mod tagged;
mod task;

pub use binary::BinaryRule;
pub use questionnaire_response::QuestionnaireResponseRule;
pub use table::default_rule_configs;
pub use tagged::{RuleConfig, TaggedResourceRule, Validator};
pub use task::TaskRule;

use crate::decision::{Decision, DenialReason};
use crate::error::AuthResult;
use crate::process::ProcessRegistry;
use crate::provider::AuthorizationRuleProvider;
use crate::read_access::ReadAccessEvaluator;
use async_trait::async_trait;
use meridian_core::constants::ORGANIZATION_IDENTIFIER_SYSTEM;
use meridian_core::resource::{Identifier, Reference};
use meridian_core::{Identity, NaturalKeys, Operation, Resource, ResourceType, ServerConfig, ServerRole};
use meridian_store::StoreSnapshot;
use tracing::debug;

/// Everything a rule may consult while deciding
pub struct RuleContext<'a> {
    /// Read-only view for this decision
    pub snapshot: &'a dyn StoreSnapshot,
    /// Deployment configuration
    pub config: &'a ServerConfig,
    /// All rules, for delegation (Binary security contexts)
    pub rules: &'a AuthorizationRuleProvider,
    /// Parsed process definitions
    pub processes: &'a ProcessRegistry,
}

impl RuleContext<'_> {
    /// Natural keys shared with the store
    pub fn keys(&self) -> &NaturalKeys {
        self.rules.keys()
    }

    /// Identifier of the local organization
    pub fn local_organization_identifier(&self) -> Identifier {
        Identifier::new(
            ORGANIZATION_IDENTIFIER_SYSTEM,
            self.config.local_organization_identifier.clone(),
        )
    }

    /// The stored local organization
    pub async fn local_organization(&self) -> AuthResult<Option<Resource>> {
        Ok(self
            .snapshot
            .organization_by_identifier(&self.local_organization_identifier())
            .await?)
    }

    /// Organization identifier behind `reference`, `None` when it does not
    /// resolve to an organization with exactly one identifier
    pub async fn organization_identifier_of(
        &self,
        reference: &Reference,
    ) -> AuthResult<Option<Identifier>> {
        let resolved = self
            .snapshot
            .resolve_organization(reference, &self.config.server_base_url)
            .await?;
        Ok(resolved.and_then(|org| {
            org.as_organization()
                .and_then(|o| o.organization_identifier().cloned())
        }))
    }

    /// Read decision from the tags of `existing` alone; the caller checks READ
    pub async fn read_by_tags(&self, identity: &Identity, existing: &Resource) -> AuthResult<Decision> {
        let visible = ReadAccessEvaluator::visible_tags(
            self.snapshot,
            &existing.meta,
            identity,
            &self.config.server_base_url,
        )
        .await?;

        Ok(match visible.first() {
            Some(tag) => {
                debug!(resource = %existing, matching = visible.len(), "Read-access tags match");
                Decision::granted(format!("identity with role READ, read-access tag {tag} matches"))
            }
            None => Decision::denied(DenialReason::NoMatchingReadAccessTag),
        })
    }

    /// True when any natural key of `resource` is already held
    pub async fn is_duplicate(&self, resource: &Resource) -> AuthResult<bool> {
        for key in self.keys().keys(resource) {
            if self.snapshot.exists(&key.to_query()).await? {
                debug!(key = %key, "Natural key already held");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Names of immutable natural keys whose values differ between `old` and `new`
    pub fn changed_keys(&self, old: &Resource, new: &Resource) -> Vec<&'static str> {
        let before: Vec<_> = self.keys().keys(old).into_iter().filter(|k| k.immutable).collect();
        let after: Vec<_> = self.keys().keys(new).into_iter().filter(|k| k.immutable).collect();
        let mut changed: Vec<&'static str> = before
            .iter()
            .filter(|k| !after.contains(k))
            .chain(after.iter().filter(|k| !before.contains(k)))
            .map(|k| k.name)
            .collect();
        changed.sort_unstable();
        changed.dedup();
        changed
    }

    /// True when `new` adds a natural key that another resource already holds
    ///
    /// Keys `old` carries are its own and skipped; only keys allowed to change
    /// on update can be new here once [`Self::changed_keys`] is empty.
    pub async fn holds_added_key(&self, old: &Resource, new: &Resource) -> AuthResult<bool> {
        let before = self.keys().keys(old);
        for key in self.keys().keys(new) {
            if before.contains(&key) {
                continue;
            }
            if self.snapshot.exists(&key.to_query()).await? {
                debug!(key = %key, "Natural key already held");
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Authorization contract of one resource type
///
/// A denial is a normal [`Decision`]; `Err` means no decision could be
/// reached.
#[async_trait]
pub trait AuthorizationRule: Send + Sync {
    /// Type guarded by this rule
    fn resource_type(&self) -> ResourceType;

    /// May `identity` create `new`?
    async fn reason_create_allowed(
        &self,
        ctx: &RuleContext<'_>,
        identity: &Identity,
        new: &Resource,
    ) -> AuthResult<Decision>;

    /// May `identity` read `existing`?
    async fn reason_read_allowed(
        &self,
        ctx: &RuleContext<'_>,
        identity: &Identity,
        existing: &Resource,
    ) -> AuthResult<Decision>;

    /// May `identity` replace `old` with `new`?
    async fn reason_update_allowed(
        &self,
        ctx: &RuleContext<'_>,
        identity: &Identity,
        old: &Resource,
        new: &Resource,
    ) -> AuthResult<Decision>;

    /// May `identity` delete `old`?
    async fn reason_delete_allowed(
        &self,
        ctx: &RuleContext<'_>,
        identity: &Identity,
        old: &Resource,
    ) -> AuthResult<Decision>;

    /// Local identity with PERMANENT_DELETE whose plain delete is also granted
    async fn reason_permanent_delete_allowed(
        &self,
        ctx: &RuleContext<'_>,
        identity: &Identity,
        old: &Resource,
    ) -> AuthResult<Decision> {
        if let Err(reason) = require_local(identity)
            .and_then(|()| require_role(identity, Operation::PermanentDelete, self.resource_type()))
        {
            return Ok(Decision::denied(reason));
        }
        Ok(match self.reason_delete_allowed(ctx, identity, old).await? {
            Decision::Granted { reason } => {
                Decision::granted(format!("local identity with role PERMANENT_DELETE, {reason}"))
            }
            denied => denied,
        })
    }

    /// Granted iff the identity holds SEARCH for this type
    fn reason_search_allowed(&self, identity: &Identity) -> Decision {
        role_only(identity, Operation::Search, self.resource_type())
    }

    /// Granted iff the identity holds HISTORY for this type
    fn reason_history_allowed(&self, identity: &Identity) -> Decision {
        role_only(identity, Operation::History, self.resource_type())
    }

    /// Local identity holding WEBSOCKET for this type
    fn reason_websocket_allowed(&self, identity: &Identity) -> Decision {
        require_local(identity)
            .and_then(|()| require_role(identity, Operation::Websocket, self.resource_type()))
            .map(|()| format!("local identity with role WEBSOCKET on {}", self.resource_type()))
            .into()
    }
}

pub(crate) fn require_role(
    identity: &Identity,
    operation: Operation,
    resource_type: ResourceType,
) -> Result<(), DenialReason> {
    let role = ServerRole::new(operation, resource_type);
    if identity.has_role(role) {
        Ok(())
    } else {
        Err(DenialReason::MissingRole(role))
    }
}

pub(crate) fn require_local(identity: &Identity) -> Result<(), DenialReason> {
    if identity.is_local() {
        Ok(())
    } else {
        Err(DenialReason::NotLocalIdentity)
    }
}

pub(crate) fn require_local_organization(
    ctx: &RuleContext<'_>,
    identity: &Identity,
) -> Result<(), DenialReason> {
    if identity.is_local_organization(&ctx.config.admin_role()) {
        Ok(())
    } else {
        Err(DenialReason::NotLocalOrganization)
    }
}

fn role_only(identity: &Identity, operation: Operation, resource_type: ResourceType) -> Decision {
    require_role(identity, operation, resource_type)
        .map(|()| format!("identity with role {operation} on {resource_type}"))
        .into()
}
