//! Task lifecycle
//!
//! Legal status changes:
//!
//! | old         | new         | who                          |
//! |-------------|-------------|------------------------------|
//! | none        | draft       | local organization identity  |
//! | none        | requested   | authorized requester         |
//! | draft       | draft       | local organization identity  |
//! | requested   | in-progress | local organization identity  |
//! | in-progress | completed   | local organization identity  |
//! | in-progress | failed      | local organization identity  |
//!
//! A requested Task needs both an authorized requester (the identity) and an
//! authorized recipient (the local organization) for its process, message
//! name and profile. Later transitions recheck the recipient side only.

use super::{require_local_organization, require_role, AuthorizationRule, RuleContext};
use crate::decision::{Decision, DenialReason, ProcessDenial, ValidationFailure};
use crate::error::{AuthResult, AuthorizationError};
use crate::process::{first_match, Candidate, Locality, ProcessCanonical};
use async_trait::async_trait;
use meridian_core::constants::BPMN_MESSAGE_BUSINESS_KEY;
use meridian_core::resource::{Identifier, Task, TaskStatus};
use meridian_core::{Identity, Operation, Resource, ResourceType};
use tracing::{debug, warn};

/// Which create-time checks apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Requester and recipient both local, task identifier required
    Draft,
    /// Requester is the identity's organization, recipient local
    Requested,
}

/// Hand-written Task rule
#[derive(Debug, Default)]
pub struct TaskRule;

fn status_name(status: Option<TaskStatus>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.as_str().to_string())
}

fn body(resource: &Resource) -> AuthResult<&Task> {
    resource
        .as_task()
        .ok_or_else(|| AuthorizationError::configuration(format!("{resource} routed to the Task rule")))
}

/// Fields of `new` differing from `old` among requester, restriction,
/// instantiatesCanonical and input; adding one business key input is allowed
/// when `allow_business_key` is set and `old` has none
fn changed_fields(old: &Task, new: &Task, allow_business_key: bool) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if old.requester != new.requester {
        changed.push("Task.requester");
    }
    if old.restriction != new.restriction {
        changed.push("Task.restriction");
    }
    if old.instantiates_canonical != new.instantiates_canonical {
        changed.push("Task.instantiatesCanonical");
    }
    if input_changed(old, new, allow_business_key) {
        changed.push("Task.input");
    }
    changed
}

fn input_changed(old: &Task, new: &Task, allow_business_key: bool) -> bool {
    if old.input == new.input {
        return false;
    }
    if !allow_business_key || old.has_business_key() {
        return true;
    }

    let (added, rest): (Vec<_>, Vec<_>) = new
        .input
        .iter()
        .partition(|p| p.is_bpmn(BPMN_MESSAGE_BUSINESS_KEY));
    let rest_unchanged = rest.len() == old.input.len() && rest.iter().zip(&old.input).all(|(a, b)| *a == b);
    !(rest_unchanged && added.len() == 1 && added[0].non_blank_string().is_some())
}

impl TaskRule {
    async fn field_failures(
        ctx: &RuleContext<'_>,
        identity: &Identity,
        task: &Task,
        stage: Stage,
    ) -> AuthResult<Vec<ValidationFailure>> {
        let mut failures = Vec::new();
        let local = ctx.local_organization_identifier();

        match task.requester.as_ref() {
            None => failures.push(ValidationFailure::Missing {
                field: "Task.requester",
            }),
            Some(reference) => match ctx.organization_identifier_of(reference).await? {
                None => failures.push(ValidationFailure::Unresolvable {
                    field: "Task.requester",
                }),
                Some(requester) => match stage {
                    Stage::Draft if requester != local => {
                        failures.push(ValidationFailure::NotLocalOrganization {
                            field: "Task.requester",
                        });
                    }
                    Stage::Requested if identity.organization_identifier() != Some(&requester) => {
                        failures.push(ValidationFailure::NotIdentityOrganization {
                            field: "Task.requester",
                        });
                    }
                    _ => {}
                },
            },
        }

        match task.recipients() {
            [reference] => match ctx.organization_identifier_of(reference).await? {
                None => failures.push(ValidationFailure::Unresolvable {
                    field: "Task.restriction.recipient",
                }),
                Some(recipient) if recipient != local => {
                    failures.push(ValidationFailure::NotLocalOrganization {
                        field: "Task.restriction.recipient",
                    });
                }
                Some(_) => {}
            },
            _ => failures.push(ValidationFailure::NotExactlyOne {
                field: "Task.restriction.recipient",
            }),
        }

        match task.instantiates_canonical.as_deref() {
            None => failures.push(ValidationFailure::Missing {
                field: "Task.instantiatesCanonical",
            }),
            Some(canonical) if ProcessCanonical::parse(canonical).is_none() => {
                failures.push(ValidationFailure::PatternMismatch {
                    field: "Task.instantiatesCanonical",
                });
            }
            Some(_) => {}
        }

        if task.message_name().is_none() {
            failures.push(ValidationFailure::NotExactlyOne {
                field: "Task.input[message-name]",
            });
        }

        if !task.output.is_empty() {
            failures.push(ValidationFailure::NotEmpty {
                field: "Task.output",
            });
        }

        if stage == Stage::Draft
            && task.identifiers_in(&ctx.config.task_identifier_system).count() != 1
        {
            failures.push(ValidationFailure::NotExactlyOne {
                field: "Task.identifier[task-identifier]",
            });
        }

        Ok(failures)
    }

    /// Process authorization of `resource`; the requester side is evaluated
    /// only when `requester` is given
    async fn process_authorization(
        ctx: &RuleContext<'_>,
        requester: Option<&Identity>,
        resource: &Resource,
        task: &Task,
    ) -> AuthResult<Result<String, DenialReason>> {
        let (Some(canonical), Some(message_name)) = (
            task.instantiates_canonical
                .as_deref()
                .and_then(ProcessCanonical::parse),
            task.message_name(),
        ) else {
            return Ok(Err(DenialReason::Invalid(vec![
                ValidationFailure::PatternMismatch {
                    field: "Task.instantiatesCanonical",
                },
            ])));
        };

        let Some(local) = ctx.local_organization().await? else {
            warn!(
                identifier = %ctx.config.local_organization_identifier,
                "Local organization not found"
            );
            return Ok(Err(DenialReason::LocalOrganizationUnknown));
        };
        let Some(local_org) = local.as_organization() else {
            return Ok(Err(DenialReason::LocalOrganizationUnknown));
        };

        let Some(definition) = ctx
            .processes
            .resolve(ctx.snapshot, &canonical.url, &canonical.version)
            .await?
        else {
            return Ok(Err(DenialReason::ProcessNotFound {
                url: canonical.url,
                version: canonical.version,
            }));
        };

        let profiles = &resource.meta.profile;
        let base = &ctx.config.server_base_url;

        let recipient_predicates =
            definition.recipients(&canonical.url, &canonical.version, message_name, profiles);
        let recipient = Candidate::from_organization(local_org, Locality::Local);
        let recipient_affiliations = match recipient.organization.as_ref() {
            Some(member) => ctx.snapshot.affiliations_of_member(member, base).await?,
            None => Vec::new(),
        };
        let recipient_match = first_match(recipient_predicates, &recipient, &recipient_affiliations);

        let requester_match = match requester {
            None => None,
            Some(identity) => {
                let candidate = Candidate::from_identity(identity);
                let affiliations = match identity.organization_identifier() {
                    Some(member) => ctx.snapshot.affiliations_of_member(member, base).await?,
                    None => Vec::new(),
                };
                let predicates =
                    definition.requesters(&canonical.url, &canonical.version, message_name, profiles);
                Some(first_match(predicates, &candidate, &affiliations).cloned())
            }
        };

        let requester_ok = requester_match.as_ref().map_or(true, Option::is_some);
        if let Some(side) = ProcessDenial::from_sides(requester_ok, recipient_match.is_some()) {
            debug!(
                process = %canonical.url,
                version = %canonical.version,
                message = message_name,
                side = %side,
                "Process authorization failed"
            );
            return Ok(Err(DenialReason::ProcessNotAuthorized(side)));
        }

        let mut reason = format!(
            "process {}|{} message {message_name} authorized",
            canonical.url, canonical.version
        );
        if let Some(Some(predicate)) = requester_match {
            reason.push_str(&format!(" for requester {predicate}"));
        }
        if let Some(predicate) = recipient_match {
            reason.push_str(&format!(" and recipient {predicate}"));
        }
        Ok(Ok(reason))
    }

    async fn requester_organization(
        ctx: &RuleContext<'_>,
        task: &Task,
    ) -> AuthResult<Option<Identifier>> {
        match task.requester.as_ref() {
            Some(reference) => ctx.organization_identifier_of(reference).await,
            None => Ok(None),
        }
    }

    async fn create_draft(
        ctx: &RuleContext<'_>,
        identity: &Identity,
        new: &Resource,
        task: &Task,
    ) -> AuthResult<Decision> {
        if let Err(reason) = require_local_organization(ctx, identity) {
            return Ok(Decision::denied(reason));
        }
        let failures = Self::field_failures(ctx, identity, task, Stage::Draft).await?;
        if !failures.is_empty() {
            return Ok(Decision::denied(DenialReason::Invalid(failures)));
        }
        if ctx.is_duplicate(new).await? {
            return Ok(Decision::denied(DenialReason::AlreadyExists));
        }
        Ok(Decision::granted(
            "local organization identity, Task draft valid, task identifier unique",
        ))
    }

    async fn create_requested(
        ctx: &RuleContext<'_>,
        identity: &Identity,
        new: &Resource,
        task: &Task,
    ) -> AuthResult<Decision> {
        let failures = Self::field_failures(ctx, identity, task, Stage::Requested).await?;
        if !failures.is_empty() {
            return Ok(Decision::denied(DenialReason::Invalid(failures)));
        }
        Ok(Self::process_authorization(ctx, Some(identity), new, task)
            .await?
            .map(|reason| format!("Task requested valid, {reason}"))
            .into())
    }

    async fn recipient_transition(
        ctx: &RuleContext<'_>,
        identity: &Identity,
        old: &Task,
        new_resource: &Resource,
        new: &Task,
        allow_business_key: bool,
    ) -> AuthResult<Decision> {
        if let Err(reason) = require_local_organization(ctx, identity) {
            return Ok(Decision::denied(reason));
        }
        let changed = changed_fields(old, new, allow_business_key);
        if !changed.is_empty() {
            return Ok(Decision::denied(DenialReason::ImmutableFieldsChanged(changed)));
        }
        Ok(Self::process_authorization(ctx, None, new_resource, new)
            .await?
            .map(|reason| {
                format!(
                    "local organization identity, Task {} -> {}, {reason}",
                    status_name(old.status),
                    status_name(new.status)
                )
            })
            .into())
    }
}

#[async_trait]
impl AuthorizationRule for TaskRule {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Task
    }

    async fn reason_create_allowed(
        &self,
        ctx: &RuleContext<'_>,
        identity: &Identity,
        new: &Resource,
    ) -> AuthResult<Decision> {
        if let Err(reason) = require_role(identity, Operation::Create, ResourceType::Task) {
            return Ok(Decision::denied(reason));
        }
        let task = body(new)?;
        match task.status {
            Some(TaskStatus::Draft) => Self::create_draft(ctx, identity, new, task).await,
            Some(TaskStatus::Requested) => Self::create_requested(ctx, identity, new, task).await,
            None => Ok(Decision::denied(DenialReason::Invalid(vec![
                ValidationFailure::Missing {
                    field: "Task.status",
                },
            ]))),
            other => Ok(Decision::denied(DenialReason::IllegalTransition {
                from: status_name(None),
                to: status_name(other),
            })),
        }
    }

    async fn reason_read_allowed(
        &self,
        ctx: &RuleContext<'_>,
        identity: &Identity,
        existing: &Resource,
    ) -> AuthResult<Decision> {
        if let Err(reason) = require_role(identity, Operation::Read, ResourceType::Task) {
            return Ok(Decision::denied(reason));
        }
        let task = body(existing)?;
        let Some(organization) = identity.organization_identifier() else {
            return Ok(Decision::denied(DenialReason::NotTaskParticipant));
        };

        if Self::requester_organization(ctx, task).await?.as_ref() == Some(organization) {
            return Ok(Decision::granted(
                "identity with role READ, organization is Task.requester",
            ));
        }

        if identity.is_local() {
            if let [reference] = task.recipients() {
                if ctx.organization_identifier_of(reference).await?.as_ref() == Some(organization) {
                    return Ok(Decision::granted(
                        "local identity with role READ, organization is Task.restriction.recipient",
                    ));
                }
            }
        }

        Ok(Decision::denied(DenialReason::NotTaskParticipant))
    }

    async fn reason_update_allowed(
        &self,
        ctx: &RuleContext<'_>,
        identity: &Identity,
        old: &Resource,
        new: &Resource,
    ) -> AuthResult<Decision> {
        if let Err(reason) = require_role(identity, Operation::Update, ResourceType::Task) {
            return Ok(Decision::denied(reason));
        }
        let (old_task, new_task) = (body(old)?, body(new)?);

        match (old_task.status, new_task.status) {
            (Some(TaskStatus::Draft), Some(TaskStatus::Draft)) => {
                if let Err(reason) = require_local_organization(ctx, identity) {
                    return Ok(Decision::denied(reason));
                }
                let failures = Self::field_failures(ctx, identity, new_task, Stage::Draft).await?;
                if !failures.is_empty() {
                    return Ok(Decision::denied(DenialReason::Invalid(failures)));
                }
                let changed = ctx.changed_keys(old, new);
                if !changed.is_empty() {
                    return Ok(Decision::denied(DenialReason::ImmutableFieldsChanged(changed)));
                }
                Ok(Decision::granted(
                    "local organization identity, Task draft valid, task identifier unchanged",
                ))
            }

            (Some(TaskStatus::Requested), Some(TaskStatus::InProgress)) => {
                if !new_task.output.is_empty() {
                    return Ok(Decision::denied(DenialReason::Invalid(vec![
                        ValidationFailure::NotEmpty {
                            field: "Task.output",
                        },
                    ])));
                }
                Self::recipient_transition(ctx, identity, old_task, new, new_task, true).await
            }

            (
                Some(TaskStatus::InProgress),
                Some(TaskStatus::Completed) | Some(TaskStatus::Failed),
            ) => Self::recipient_transition(ctx, identity, old_task, new, new_task, false).await,

            (from, to) => Ok(Decision::denied(DenialReason::IllegalTransition {
                from: status_name(from),
                to: status_name(to),
            })),
        }
    }

    async fn reason_delete_allowed(
        &self,
        ctx: &RuleContext<'_>,
        identity: &Identity,
        old: &Resource,
    ) -> AuthResult<Decision> {
        if let Err(reason) = require_local_organization(ctx, identity)
            .and_then(|()| require_role(identity, Operation::Delete, ResourceType::Task))
        {
            return Ok(Decision::denied(reason));
        }
        let task = body(old)?;
        if task.status != Some(TaskStatus::Draft) {
            return Ok(Decision::denied(DenialReason::IllegalTransition {
                from: status_name(task.status),
                to: "deleted".to_string(),
            }));
        }
        Ok(Decision::granted(
            "local organization identity with role DELETE, Task draft",
        ))
    }
}
