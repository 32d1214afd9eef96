//! Write path: authorize, release the snapshot, then write
//!
//! The storage uniqueness constraint backs the authorization-time duplicate
//! check; a constraint violation at write time becomes the same forbidden
//! outcome as a denied duplicate.

use crate::decision::{Decision, DenialReason};
use crate::error::AuthorizationError;
use crate::service::{AuthorizationRequest, AuthorizationService};
use meridian_core::{Identity, Resource, ResourceType};
use meridian_store::{ResourceStore, StoreError, StoredVersion, WriteOperation, WriteResult};
use tracing::{debug, info, warn};

/// One client operation on one resource
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Create a resource
    Create(Resource),
    /// Replace the stored resource with the same type and id
    Update(Resource),
    /// Soft-delete
    Delete {
        /// Type
        resource_type: ResourceType,
        /// Logical id
        id: String,
    },
    /// Remove with history
    PermanentDelete {
        /// Type
        resource_type: ResourceType,
        /// Logical id
        id: String,
    },
    /// Read the latest version
    Read {
        /// Type
        resource_type: ResourceType,
        /// Logical id
        id: String,
    },
}

/// Result of one command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// Stored as a new resource
    Created(Resource),
    /// Stored as a new version
    Updated(Resource),
    /// Deleted (soft or permanent)
    Deleted {
        /// Type
        resource_type: ResourceType,
        /// Logical id
        id: String,
    },
    /// Read granted
    Read(Resource),
    /// Denied, or lost a uniqueness race
    Forbidden(DenialReason),
    /// Target does not exist
    NotFound {
        /// Type
        resource_type: ResourceType,
        /// Logical id
        id: String,
    },
    /// No decision could be reached or the write failed
    Fault(AuthorizationError),
}

impl CommandOutcome {
    /// HTTP-style status code
    pub fn status_code(&self) -> u16 {
        match self {
            CommandOutcome::Created(_) => 201,
            CommandOutcome::Updated(_) | CommandOutcome::Read(_) => 200,
            CommandOutcome::Deleted { .. } => 204,
            CommandOutcome::Forbidden(_) => 403,
            CommandOutcome::NotFound { .. } => 404,
            CommandOutcome::Fault(_) => 500,
        }
    }

    /// True for granted and applied commands
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            CommandOutcome::Created(_)
                | CommandOutcome::Updated(_)
                | CommandOutcome::Deleted { .. }
                | CommandOutcome::Read(_)
        )
    }

    fn not_found(resource_type: ResourceType, id: impl Into<String>) -> Self {
        CommandOutcome::NotFound {
            resource_type,
            id: id.into(),
        }
    }
}

impl From<WriteResult> for CommandOutcome {
    fn from(result: WriteResult) -> Self {
        match result {
            WriteResult::Created(resource) => CommandOutcome::Created(resource),
            WriteResult::Updated(resource) => CommandOutcome::Updated(resource),
            WriteResult::Deleted { resource_type, id }
            | WriteResult::PermanentlyDeleted { resource_type, id } => {
                CommandOutcome::Deleted { resource_type, id }
            }
        }
    }
}

/// Result of an atomic transaction
#[derive(Debug, Clone, PartialEq)]
pub enum BundleOutcome {
    /// Every entry applied; outcomes in entry order
    Committed(Vec<CommandOutcome>),
    /// Nothing applied; the first failing entry's outcome
    Rejected(CommandOutcome),
}

enum Prepared {
    Write(WriteOperation),
    Done(CommandOutcome),
}

/// Executes commands, transactions and batches
#[derive(Debug)]
pub struct CommandExecutor<S: ResourceStore> {
    service: AuthorizationService<S>,
}

impl<S: ResourceStore> CommandExecutor<S> {
    /// Executor deciding through `service`
    pub fn new(service: AuthorizationService<S>) -> Self {
        Self { service }
    }

    /// Underlying authorization service
    pub fn service(&self) -> &AuthorizationService<S> {
        &self.service
    }

    /// Authorize and apply one command
    pub async fn execute(&self, identity: &Identity, command: Command) -> CommandOutcome {
        match self.prepare(identity, command).await {
            Prepared::Done(outcome) => outcome,
            Prepared::Write(op) => match self.commit(vec![op]).await {
                Ok(mut outcomes) => outcomes.pop().unwrap_or_else(|| {
                    CommandOutcome::Fault(AuthorizationError::Store(StoreError::unavailable(
                        "store returned no write result",
                    )))
                }),
                Err(outcome) => outcome,
            },
        }
    }

    /// Authorize every entry, then apply all writes in one envelope; any
    /// denial or write failure rejects the whole transaction
    pub async fn transaction(&self, identity: &Identity, commands: Vec<Command>) -> BundleOutcome {
        let entries = commands.len();
        let mut slots: Vec<Option<CommandOutcome>> = Vec::with_capacity(entries);
        let mut operations = Vec::new();

        for command in commands {
            match self.prepare(identity, command).await {
                Prepared::Write(op) => {
                    operations.push(op);
                    slots.push(None);
                }
                Prepared::Done(outcome) if outcome.is_success() => slots.push(Some(outcome)),
                Prepared::Done(outcome) => {
                    warn!(identity = %identity.name, entries, status = outcome.status_code(), "Transaction rejected before write");
                    return BundleOutcome::Rejected(outcome);
                }
            }
        }

        let mut written = match self.commit(operations).await {
            Ok(outcomes) => outcomes.into_iter(),
            Err(outcome) => {
                warn!(identity = %identity.name, entries, status = outcome.status_code(), "Transaction rejected by store");
                return BundleOutcome::Rejected(outcome);
            }
        };
        let mut outcomes = Vec::with_capacity(entries);
        for slot in slots {
            match slot.or_else(|| written.next()) {
                Some(outcome) => outcomes.push(outcome),
                None => {
                    return BundleOutcome::Rejected(CommandOutcome::Fault(AuthorizationError::Store(
                        StoreError::unavailable("store returned fewer write results than operations"),
                    )))
                }
            }
        }

        info!(identity = %identity.name, entries, "Transaction committed");
        BundleOutcome::Committed(outcomes)
    }

    /// Execute every entry on its own, in order
    pub async fn batch(&self, identity: &Identity, commands: Vec<Command>) -> Vec<CommandOutcome> {
        let mut outcomes = Vec::with_capacity(commands.len());
        for command in commands {
            outcomes.push(self.execute(identity, command).await);
        }
        debug!(
            identity = %identity.name,
            entries = outcomes.len(),
            succeeded = outcomes.iter().filter(|o| o.is_success()).count(),
            "Batch executed"
        );
        outcomes
    }

    async fn prepare(&self, identity: &Identity, command: Command) -> Prepared {
        match command {
            Command::Create(resource) => {
                let decision = self
                    .service
                    .authorize(identity, AuthorizationRequest::Create(&resource))
                    .await;
                Self::gate(decision, || WriteOperation::Create(resource))
            }

            Command::Update(resource) => {
                let resource_type = resource.resource_type();
                let Some(id) = resource.id.clone() else {
                    return Prepared::Done(CommandOutcome::not_found(resource_type, ""));
                };
                let old = match self.live(resource_type, &id).await {
                    Ok(old) => old,
                    Err(outcome) => return Prepared::Done(outcome),
                };
                let decision = self
                    .service
                    .authorize(
                        identity,
                        AuthorizationRequest::Update {
                            old: &old,
                            new: &resource,
                        },
                    )
                    .await;
                Self::gate(decision, || WriteOperation::Update(resource))
            }

            Command::Delete { resource_type, id } => {
                let old = match self.live(resource_type, &id).await {
                    Ok(old) => old,
                    Err(outcome) => return Prepared::Done(outcome),
                };
                let decision = self
                    .service
                    .authorize(identity, AuthorizationRequest::Delete(&old))
                    .await;
                Self::gate(decision, || WriteOperation::Delete { resource_type, id })
            }

            Command::PermanentDelete { resource_type, id } => {
                let old = match self.stored(resource_type, &id).await {
                    Ok(stored) => stored.resource,
                    Err(outcome) => return Prepared::Done(outcome),
                };
                let decision = self
                    .service
                    .authorize(identity, AuthorizationRequest::PermanentDelete(&old))
                    .await;
                Self::gate(decision, || WriteOperation::PermanentDelete { resource_type, id })
            }

            Command::Read { resource_type, id } => {
                let existing = match self.live(resource_type, &id).await {
                    Ok(existing) => existing,
                    Err(outcome) => return Prepared::Done(outcome),
                };
                let outcome = match self
                    .service
                    .authorize(identity, AuthorizationRequest::Read(&existing))
                    .await
                {
                    Ok(Decision::Granted { .. }) => CommandOutcome::Read(existing),
                    Ok(Decision::Denied { reason }) => CommandOutcome::Forbidden(reason),
                    Err(err) => CommandOutcome::Fault(err),
                };
                Prepared::Done(outcome)
            }
        }
    }

    fn gate(
        decision: Result<Decision, AuthorizationError>,
        write: impl FnOnce() -> WriteOperation,
    ) -> Prepared {
        match decision {
            Ok(Decision::Granted { .. }) => Prepared::Write(write()),
            Ok(Decision::Denied { reason }) => Prepared::Done(CommandOutcome::Forbidden(reason)),
            Err(err) => Prepared::Done(CommandOutcome::Fault(err)),
        }
    }

    async fn stored(&self, resource_type: ResourceType, id: &str) -> Result<StoredVersion, CommandOutcome> {
        match self.service.store().read(resource_type, id).await {
            Ok(Some(stored)) => Ok(stored),
            Ok(None) => Err(CommandOutcome::not_found(resource_type, id)),
            Err(err) => Err(Self::write_failure(err)),
        }
    }

    async fn live(&self, resource_type: ResourceType, id: &str) -> Result<Resource, CommandOutcome> {
        let stored = self.stored(resource_type, id).await?;
        if stored.deleted {
            return Err(CommandOutcome::not_found(resource_type, id));
        }
        Ok(stored.resource)
    }

    async fn commit(&self, operations: Vec<WriteOperation>) -> Result<Vec<CommandOutcome>, CommandOutcome> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }
        match self.service.store().apply_atomically(operations).await {
            Ok(results) => Ok(results.into_iter().map(CommandOutcome::from).collect()),
            Err(err) => Err(Self::write_failure(err)),
        }
    }

    fn write_failure(err: StoreError) -> CommandOutcome {
        match err {
            StoreError::UniqueConstraintViolation { key } => {
                warn!(key = %key, "Unique constraint violated at write time");
                CommandOutcome::Forbidden(DenialReason::AlreadyExists)
            }
            StoreError::NotFound { resource_type, id } => CommandOutcome::not_found(resource_type, id),
            other => {
                warn!(kind = other.kind(), "Store write failed");
                debug!(error = %other, "Store write failure detail");
                CommandOutcome::Fault(AuthorizationError::from(other))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_outcomes() {
        let deleted = CommandOutcome::Deleted {
            resource_type: ResourceType::Task,
            id: "1".into(),
        };
        assert_eq!(deleted.status_code(), 204);
        assert_eq!(CommandOutcome::Forbidden(DenialReason::AlreadyExists).status_code(), 403);
        assert_eq!(CommandOutcome::not_found(ResourceType::Task, "1").status_code(), 404);
        assert_eq!(
            CommandOutcome::Fault(AuthorizationError::configuration("bad query")).status_code(),
            500
        );
    }

    #[test]
    fn constraint_violations_become_forbidden() {
        let outcome = CommandExecutor::<meridian_store::MemoryStore>::write_failure(
            StoreError::UniqueConstraintViolation {
                key: "NamingSystem?name=x".into(),
            },
        );
        assert_eq!(outcome, CommandOutcome::Forbidden(DenialReason::AlreadyExists));
        assert!(!outcome.is_success());
    }
}
