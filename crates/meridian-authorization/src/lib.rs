//! # Meridian Authorization
//!
//! Decides, for every operation on every resource instance, whether the
//! acting identity may proceed, and why.
//!
//! ## Layers
//!
//! - [`read_access`]: validity and visibility of read-access tags
//! - [`process`]: typed process authorizations parsed from process definitions
//! - [`rule`]: the per-type rule contract, the rule table and the Task and
//!   QuestionnaireResponse state machines
//! - [`provider`]: rule dispatch by resource type
//! - [`service`]: snapshot handling and decision logging
//! - [`command`]: the write path, transactions and batches
//!
//! ## Outcomes
//!
//! A denial is a [`Decision::Denied`] value carrying a structured
//! [`DenialReason`]. An [`AuthorizationError`] means no decision could be
//! reached. A uniqueness violation at write time is reported exactly like a
//! denied duplicate.

#![forbid(unsafe_code)]

/// Write path
pub mod command;

/// Decisions and denial reasons
pub mod decision;

/// Fault types
pub mod error;

/// Process authorization
pub mod process;

/// Rule dispatch
pub mod provider;

/// Read-access tag evaluation
pub mod read_access;

/// Per-type rules
pub mod rule;

/// Authorization service
pub mod service;

pub use command::{BundleOutcome, Command, CommandExecutor, CommandOutcome};
pub use decision::{Decision, DenialReason, ProcessDenial, ValidationFailure};
pub use error::{AuthResult, AuthorizationError};
pub use process::{
    Candidate, Locality, ParticipantPredicate, ProcessAuthorization, ProcessCanonical,
    ProcessDefinition, ProcessDefinitionError, ProcessRegistry,
};
pub use provider::AuthorizationRuleProvider;
pub use read_access::{ReadAccessEvaluator, SnapshotReferents, TagReferents};
pub use rule::{AuthorizationRule, RuleContext};
pub use service::{AuthorizationRequest, AuthorizationService};
