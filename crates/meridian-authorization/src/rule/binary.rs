use super::{require_local, require_role, AuthorizationRule, RuleContext};
use crate::decision::{Decision, DenialReason, ValidationFailure};
use crate::error::AuthResult;
use crate::read_access::{ReadAccessEvaluator, SnapshotReferents};
use async_trait::async_trait;
use meridian_core::resource::ResourceBody;
use meridian_core::{Identity, Operation, Resource, ResourceType};
use tracing::debug;

/// Binary: visible through its own tags or through its security context
///
/// Exactly one of the two must be valid. With a security context, reading the
/// Binary is allowed iff reading the context resource is.
#[derive(Debug, Default)]
pub struct BinaryRule;

impl BinaryRule {
    async fn security_context(
        ctx: &RuleContext<'_>,
        resource: &Resource,
    ) -> AuthResult<Option<Resource>> {
        let ResourceBody::Binary(binary) = &resource.body else {
            return Ok(None);
        };
        let Some(reference) = binary.security_context.as_ref() else {
            return Ok(None);
        };
        let target = ctx
            .snapshot
            .resolve(reference, &ctx.config.server_base_url)
            .await?;
        Ok(target.filter(|t| {
            t.resource_type() != ResourceType::Binary && ctx.rules.rule(t.resource_type()).is_some()
        }))
    }

    async fn failures(
        ctx: &RuleContext<'_>,
        resource: &Resource,
    ) -> AuthResult<Vec<ValidationFailure>> {
        let referents = SnapshotReferents::new(ctx.snapshot);
        let tag = ReadAccessEvaluator::is_valid(&resource.meta, &referents).await?;
        let context = Self::security_context(ctx, resource).await?.is_some();
        Ok(match (tag, context) {
            (true, true) => vec![ValidationFailure::TagAndSecurityContext],
            (false, false) => vec![ValidationFailure::NoTagOrSecurityContext],
            _ => Vec::new(),
        })
    }
}

#[async_trait]
impl AuthorizationRule for BinaryRule {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Binary
    }

    async fn reason_create_allowed(
        &self,
        ctx: &RuleContext<'_>,
        identity: &Identity,
        new: &Resource,
    ) -> AuthResult<Decision> {
        if let Err(reason) = require_local(identity)
            .and_then(|()| require_role(identity, Operation::Create, ResourceType::Binary))
        {
            return Ok(Decision::denied(reason));
        }
        let failures = Self::failures(ctx, new).await?;
        if !failures.is_empty() {
            return Ok(Decision::denied(DenialReason::Invalid(failures)));
        }
        Ok(Decision::granted(
            "local identity with role CREATE on Binary, read-access tag or securityContext valid",
        ))
    }

    async fn reason_read_allowed(
        &self,
        ctx: &RuleContext<'_>,
        identity: &Identity,
        existing: &Resource,
    ) -> AuthResult<Decision> {
        if let Err(reason) = require_role(identity, Operation::Read, ResourceType::Binary) {
            return Ok(Decision::denied(reason));
        }

        if let Some(target) = Self::security_context(ctx, existing).await? {
            let Some(rule) = ctx.rules.rule(target.resource_type()) else {
                return Ok(Decision::denied(DenialReason::NoRule(target.resource_type())));
            };
            debug!(binary = %existing, context = %target, "Delegating Binary read to securityContext");
            return Ok(match rule.reason_read_allowed(ctx, identity, &target).await? {
                Decision::Granted { reason } => {
                    Decision::granted(format!("securityContext {target} readable: {reason}"))
                }
                denied => denied,
            });
        }

        ctx.read_by_tags(identity, existing).await
    }

    async fn reason_update_allowed(
        &self,
        ctx: &RuleContext<'_>,
        identity: &Identity,
        _old: &Resource,
        new: &Resource,
    ) -> AuthResult<Decision> {
        if let Err(reason) = require_local(identity)
            .and_then(|()| require_role(identity, Operation::Update, ResourceType::Binary))
        {
            return Ok(Decision::denied(reason));
        }
        let failures = Self::failures(ctx, new).await?;
        if !failures.is_empty() {
            return Ok(Decision::denied(DenialReason::Invalid(failures)));
        }
        Ok(Decision::granted(
            "local identity with role UPDATE on Binary, read-access tag or securityContext valid",
        ))
    }

    async fn reason_delete_allowed(
        &self,
        _ctx: &RuleContext<'_>,
        identity: &Identity,
        _old: &Resource,
    ) -> AuthResult<Decision> {
        Ok(require_local(identity)
            .and_then(|()| require_role(identity, Operation::Delete, ResourceType::Binary))
            .map(|()| "local identity with role DELETE on Binary".to_string())
            .into())
    }
}
