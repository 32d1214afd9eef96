use super::{require_local, require_role, AuthorizationRule, RuleContext};
use crate::decision::{Decision, DenialReason, ValidationFailure};
use crate::error::AuthResult;
use crate::read_access::{ReadAccessEvaluator, SnapshotReferents};
use async_trait::async_trait;
use meridian_core::{Identity, Operation, Resource, ResourceType};

/// Structural check of a resource value; returns every failure found
pub type Validator = fn(&Resource) -> Vec<ValidationFailure>;

/// One row of the rule table
#[derive(Clone, Copy)]
pub struct RuleConfig {
    /// Type the row applies to
    pub resource_type: ResourceType,
    /// Type specific structural checks
    pub validate: Validator,
}

impl RuleConfig {
    /// Row without structural checks
    pub fn tag_only(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            validate: |_| Vec::new(),
        }
    }
}

/// Rule for resources whose visibility is governed by read-access tags
///
/// Create and update need a local identity, the role, a valid value with a
/// valid tag set; create additionally needs an unheld natural key. Update
/// must keep immutable natural keys and may only add keys nobody else holds.
/// Read is decided by the tag model.
pub struct TaggedResourceRule {
    config: RuleConfig,
}

impl TaggedResourceRule {
    /// Rule for one table row
    pub fn new(config: RuleConfig) -> Self {
        Self { config }
    }

    async fn failures(&self, ctx: &RuleContext<'_>, resource: &Resource) -> AuthResult<Vec<ValidationFailure>> {
        let mut failures = (self.config.validate)(resource);
        let referents = SnapshotReferents::new(ctx.snapshot);
        if !ReadAccessEvaluator::is_valid(&resource.meta, &referents).await? {
            failures.push(ValidationFailure::InvalidReadAccessTag);
        }
        Ok(failures)
    }

    fn local_with(&self, identity: &Identity, operation: Operation) -> Result<(), DenialReason> {
        require_local(identity).and_then(|()| require_role(identity, operation, self.config.resource_type))
    }
}

#[async_trait]
impl AuthorizationRule for TaggedResourceRule {
    fn resource_type(&self) -> ResourceType {
        self.config.resource_type
    }

    async fn reason_create_allowed(
        &self,
        ctx: &RuleContext<'_>,
        identity: &Identity,
        new: &Resource,
    ) -> AuthResult<Decision> {
        if let Err(reason) = self.local_with(identity, Operation::Create) {
            return Ok(Decision::denied(reason));
        }

        let failures = self.failures(ctx, new).await?;
        if !failures.is_empty() {
            return Ok(Decision::denied(DenialReason::Invalid(failures)));
        }
        if ctx.is_duplicate(new).await? {
            return Ok(Decision::denied(DenialReason::AlreadyExists));
        }

        Ok(Decision::granted(format!(
            "local identity with role CREATE on {}, resource valid and unique",
            self.config.resource_type
        )))
    }

    async fn reason_read_allowed(
        &self,
        ctx: &RuleContext<'_>,
        identity: &Identity,
        existing: &Resource,
    ) -> AuthResult<Decision> {
        if let Err(reason) = require_role(identity, Operation::Read, self.config.resource_type) {
            return Ok(Decision::denied(reason));
        }

        ctx.read_by_tags(identity, existing).await
    }

    async fn reason_update_allowed(
        &self,
        ctx: &RuleContext<'_>,
        identity: &Identity,
        old: &Resource,
        new: &Resource,
    ) -> AuthResult<Decision> {
        if let Err(reason) = self.local_with(identity, Operation::Update) {
            return Ok(Decision::denied(reason));
        }

        let failures = self.failures(ctx, new).await?;
        if !failures.is_empty() {
            return Ok(Decision::denied(DenialReason::Invalid(failures)));
        }
        let changed = ctx.changed_keys(old, new);
        if !changed.is_empty() {
            return Ok(Decision::denied(DenialReason::ImmutableFieldsChanged(changed)));
        }
        if ctx.holds_added_key(old, new).await? {
            return Ok(Decision::denied(DenialReason::AlreadyExists));
        }

        Ok(Decision::granted(format!(
            "local identity with role UPDATE on {}, resource valid, immutable fields unchanged",
            self.config.resource_type
        )))
    }

    async fn reason_delete_allowed(
        &self,
        _ctx: &RuleContext<'_>,
        identity: &Identity,
        _old: &Resource,
    ) -> AuthResult<Decision> {
        Ok(self
            .local_with(identity, Operation::Delete)
            .map(|()| format!("local identity with role DELETE on {}", self.config.resource_type))
            .into())
    }
}
