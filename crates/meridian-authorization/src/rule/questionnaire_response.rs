use super::{require_local, require_local_organization, require_role, AuthorizationRule, RuleContext};
use crate::decision::{Decision, DenialReason, ValidationFailure};
use crate::error::AuthResult;
use crate::read_access::{ReadAccessEvaluator, SnapshotReferents};
use async_trait::async_trait;
use meridian_core::resource::{QuestionnaireResponse, QuestionnaireResponseStatus, ResourceBody};
use meridian_core::{Identity, Operation, Resource, ResourceType};

use QuestionnaireResponseStatus::{Amended, Completed, InProgress, Stopped};

/// QuestionnaireResponse lifecycle: created in-progress by the local
/// organization, then completed or stopped, and completed ones amended
#[derive(Debug, Default)]
pub struct QuestionnaireResponseRule;

fn body(resource: &Resource) -> Option<&QuestionnaireResponse> {
    match &resource.body {
        ResourceBody::QuestionnaireResponse(response) => Some(response),
        _ => None,
    }
}

fn status_name(status: Option<QuestionnaireResponseStatus>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.as_str().to_string())
}

impl QuestionnaireResponseRule {
    async fn failures(
        ctx: &RuleContext<'_>,
        resource: &Resource,
    ) -> AuthResult<Vec<ValidationFailure>> {
        let mut failures = Vec::new();
        let response = body(resource);

        if response.and_then(|r| r.questionnaire.as_deref()).map_or(true, str::is_empty) {
            failures.push(ValidationFailure::Missing {
                field: "QuestionnaireResponse.questionnaire",
            });
        }
        if let Some(response) = response {
            if matches!(response.status, Some(Completed) | Some(Amended)) {
                if response.author.is_none() {
                    failures.push(ValidationFailure::Missing {
                        field: "QuestionnaireResponse.author",
                    });
                }
                if response.authored.is_none() {
                    failures.push(ValidationFailure::Missing {
                        field: "QuestionnaireResponse.authored",
                    });
                }
            }
        }

        let referents = SnapshotReferents::new(ctx.snapshot);
        if !ReadAccessEvaluator::is_valid(&resource.meta, &referents).await? {
            failures.push(ValidationFailure::InvalidReadAccessTag);
        }
        Ok(failures)
    }
}

#[async_trait]
impl AuthorizationRule for QuestionnaireResponseRule {
    fn resource_type(&self) -> ResourceType {
        ResourceType::QuestionnaireResponse
    }

    async fn reason_create_allowed(
        &self,
        ctx: &RuleContext<'_>,
        identity: &Identity,
        new: &Resource,
    ) -> AuthResult<Decision> {
        if let Err(reason) = require_role(identity, Operation::Create, ResourceType::QuestionnaireResponse)
            .and_then(|()| require_local_organization(ctx, identity))
        {
            return Ok(Decision::denied(reason));
        }

        let status = body(new).and_then(|r| r.status);
        if status != Some(InProgress) {
            return Ok(Decision::denied(DenialReason::IllegalTransition {
                from: status_name(None),
                to: status_name(status),
            }));
        }

        let failures = Self::failures(ctx, new).await?;
        if !failures.is_empty() {
            return Ok(Decision::denied(DenialReason::Invalid(failures)));
        }
        Ok(Decision::granted(
            "local organization identity with role CREATE, QuestionnaireResponse in-progress",
        ))
    }

    async fn reason_read_allowed(
        &self,
        ctx: &RuleContext<'_>,
        identity: &Identity,
        existing: &Resource,
    ) -> AuthResult<Decision> {
        if let Err(reason) = require_role(identity, Operation::Read, ResourceType::QuestionnaireResponse) {
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
        if let Err(reason) = require_role(identity, Operation::Update, ResourceType::QuestionnaireResponse)
            .and_then(|()| require_local(identity))
        {
            return Ok(Decision::denied(reason));
        }

        let (before, after) = (body(old), body(new));
        let from = before.and_then(|r| r.status);
        let to = after.and_then(|r| r.status);
        let legal = matches!(
            (from, to),
            (Some(InProgress), Some(Completed))
                | (Some(InProgress), Some(Stopped))
                | (Some(Completed), Some(Amended))
        );
        if !legal {
            return Ok(Decision::denied(DenialReason::IllegalTransition {
                from: status_name(from),
                to: status_name(to),
            }));
        }

        if before.map(|r| &r.questionnaire) != after.map(|r| &r.questionnaire) {
            return Ok(Decision::denied(DenialReason::ImmutableFieldsChanged(vec![
                "QuestionnaireResponse.questionnaire",
            ])));
        }

        let failures = Self::failures(ctx, new).await?;
        if !failures.is_empty() {
            return Ok(Decision::denied(DenialReason::Invalid(failures)));
        }
        Ok(Decision::granted(format!(
            "local identity with role UPDATE, QuestionnaireResponse {} -> {}",
            status_name(from),
            status_name(to)
        )))
    }

    async fn reason_delete_allowed(
        &self,
        _ctx: &RuleContext<'_>,
        identity: &Identity,
        _old: &Resource,
    ) -> AuthResult<Decision> {
        Ok(require_role(identity, Operation::Delete, ResourceType::QuestionnaireResponse)
            .and_then(|()| require_local(identity))
            .map(|()| "local identity with role DELETE on QuestionnaireResponse".to_string())
            .into())
    }
}
