//! Authorization service: dispatch, snapshot handling and decision logging
//!
//! Every decision runs against its own read-only snapshot, which is dropped
//! before the caller performs any write.

use crate::decision::{Decision, DenialReason};
use crate::error::{AuthResult, AuthorizationError};
use crate::process::ProcessRegistry;
use crate::provider::AuthorizationRuleProvider;
use crate::rule::RuleContext;
use meridian_core::{Identity, Operation, Resource, ResourceType, ServerConfig};
use meridian_store::ResourceStore;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One operation to authorize
#[derive(Debug, Clone, Copy)]
pub enum AuthorizationRequest<'a> {
    /// Create `new`
    Create(&'a Resource),
    /// Read `existing`
    Read(&'a Resource),
    /// Replace `old` with `new`
    Update {
        /// Stored value
        old: &'a Resource,
        /// Candidate value
        new: &'a Resource,
    },
    /// Soft-delete the stored value
    Delete(&'a Resource),
    /// Remove the stored value and its history
    PermanentDelete(&'a Resource),
    /// Search a type
    Search(ResourceType),
    /// History of a type
    History(ResourceType),
    /// History across every type
    RootHistory,
    /// Subscribe to a type over websocket
    Websocket(ResourceType),
}

impl AuthorizationRequest<'_> {
    /// Operation requested
    pub fn operation(&self) -> Operation {
        match self {
            AuthorizationRequest::Create(_) => Operation::Create,
            AuthorizationRequest::Read(_) => Operation::Read,
            AuthorizationRequest::Update { .. } => Operation::Update,
            AuthorizationRequest::Delete(_) => Operation::Delete,
            AuthorizationRequest::PermanentDelete(_) => Operation::PermanentDelete,
            AuthorizationRequest::Search(_) => Operation::Search,
            AuthorizationRequest::History(_) | AuthorizationRequest::RootHistory => {
                Operation::History
            }
            AuthorizationRequest::Websocket(_) => Operation::Websocket,
        }
    }

    /// Type the request targets, `None` for root history
    pub fn resource_type(&self) -> Option<ResourceType> {
        match self {
            AuthorizationRequest::Create(r)
            | AuthorizationRequest::Read(r)
            | AuthorizationRequest::Delete(r)
            | AuthorizationRequest::PermanentDelete(r) => Some(r.resource_type()),
            AuthorizationRequest::Update { new, .. } => Some(new.resource_type()),
            AuthorizationRequest::Search(rt)
            | AuthorizationRequest::History(rt)
            | AuthorizationRequest::Websocket(rt) => Some(*rt),
            AuthorizationRequest::RootHistory => None,
        }
    }
}

impl fmt::Display for AuthorizationRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationRequest::Create(r)
            | AuthorizationRequest::Read(r)
            | AuthorizationRequest::Delete(r)
            | AuthorizationRequest::PermanentDelete(r) => write!(f, "{} {r}", self.operation()),
            AuthorizationRequest::Update { new, .. } => write!(f, "UPDATE {new}"),
            AuthorizationRequest::Search(rt)
            | AuthorizationRequest::History(rt)
            | AuthorizationRequest::Websocket(rt) => write!(f, "{} {rt}", self.operation()),
            AuthorizationRequest::RootHistory => f.write_str("HISTORY (all types)"),
        }
    }
}

/// Entry point for authorization decisions
pub struct AuthorizationService<S: ResourceStore> {
    store: Arc<S>,
    config: ServerConfig,
    rules: AuthorizationRuleProvider,
    processes: ProcessRegistry,
}

impl<S: ResourceStore> AuthorizationService<S> {
    /// Service with the default rule set
    pub fn new(store: Arc<S>, config: ServerConfig) -> Self {
        let rules = AuthorizationRuleProvider::with_defaults(&config);
        Self::with_rules(store, config, rules)
    }

    /// Service with a custom rule set
    pub fn with_rules(store: Arc<S>, config: ServerConfig, rules: AuthorizationRuleProvider) -> Self {
        Self {
            store,
            config,
            rules,
            processes: ProcessRegistry::new(),
        }
    }

    /// Backing store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Deployment configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Registered rules
    pub fn rules(&self) -> &AuthorizationRuleProvider {
        &self.rules
    }

    /// Decide `request` for `identity`, logging the outcome
    pub async fn authorize(
        &self,
        identity: &Identity,
        request: AuthorizationRequest<'_>,
    ) -> AuthResult<Decision> {
        let result = self.decide(identity, request).await;
        match &result {
            Ok(Decision::Granted { reason }) => {
                info!(identity = %identity.name, request = %request, reason = %reason, "Operation allowed");
            }
            Ok(Decision::Denied { reason }) => {
                warn!(identity = %identity.name, request = %request, reason = %reason, "Operation denied");
            }
            Err(err) => {
                warn!(identity = %identity.name, request = %request, kind = err.kind(), "Authorization failed");
                debug!(identity = %identity.name, request = %request, error = %err, "Authorization fault detail");
            }
        }
        result
    }

    async fn decide(
        &self,
        identity: &Identity,
        request: AuthorizationRequest<'_>,
    ) -> AuthResult<Decision> {
        let Some(resource_type) = request.resource_type() else {
            return Ok(if identity.has_unscoped(Operation::History) {
                Decision::granted("identity with role HISTORY for all resource types")
            } else {
                Decision::denied(DenialReason::MissingUnscopedRole(Operation::History))
            });
        };
        let Some(rule) = self.rules.rule(resource_type) else {
            return Ok(Decision::denied(DenialReason::NoRule(resource_type)));
        };

        match request {
            AuthorizationRequest::Search(_) => return Ok(rule.reason_search_allowed(identity)),
            AuthorizationRequest::History(_) => return Ok(rule.reason_history_allowed(identity)),
            AuthorizationRequest::Websocket(_) => return Ok(rule.reason_websocket_allowed(identity)),
            _ => {}
        }

        let snapshot = self.store.snapshot().await?;
        let ctx = RuleContext {
            snapshot: snapshot.as_ref(),
            config: &self.config,
            rules: &self.rules,
            processes: &self.processes,
        };
        match request {
            AuthorizationRequest::Create(new) => rule.reason_create_allowed(&ctx, identity, new).await,
            AuthorizationRequest::Read(existing) => {
                rule.reason_read_allowed(&ctx, identity, existing).await
            }
            AuthorizationRequest::Update { old, new } => {
                if old.resource_type() != new.resource_type() {
                    return Err(AuthorizationError::configuration(format!(
                        "update changes resource type {} -> {}",
                        old.resource_type(),
                        new.resource_type()
                    )));
                }
                rule.reason_update_allowed(&ctx, identity, old, new).await
            }
            AuthorizationRequest::Delete(old) => rule.reason_delete_allowed(&ctx, identity, old).await,
            AuthorizationRequest::PermanentDelete(old) => {
                rule.reason_permanent_delete_allowed(&ctx, identity, old).await
            }
            other => Err(AuthorizationError::configuration(format!(
                "request {other} does not read a snapshot"
            ))),
        }
    }
}

impl<S: ResourceStore> fmt::Debug for AuthorizationService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationService")
            .field("config", &self.config)
            .field("rules", &self.rules)
            .field("processes", &self.processes.len())
            .finish()
    }
}
