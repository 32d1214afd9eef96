//! Authorization decisions and structured denial reasons
//!
//! Reasons stay typed until they reach the logging boundary, where they are
//! rendered through `Display`.

use meridian_core::{Operation, ResourceType, ServerRole};
use std::fmt;

/// Outcome of one authorization check
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Operation may proceed
    Granted {
        /// Why it was granted
        reason: String,
    },
    /// Operation is forbidden
    Denied {
        /// Why it was denied
        reason: DenialReason,
    },
}

impl Decision {
    /// Grant with `reason`
    pub fn granted(reason: impl Into<String>) -> Self {
        Decision::Granted {
            reason: reason.into(),
        }
    }

    /// Deny with `reason`
    pub fn denied(reason: DenialReason) -> Self {
        Decision::Denied { reason }
    }

    /// True when granted
    pub fn is_granted(&self) -> bool {
        matches!(self, Decision::Granted { .. })
    }

    /// Denial reason, when denied
    pub fn denial(&self) -> Option<&DenialReason> {
        match self {
            Decision::Granted { .. } => None,
            Decision::Denied { reason } => Some(reason),
        }
    }
}

impl From<Result<String, DenialReason>> for Decision {
    fn from(result: Result<String, DenialReason>) -> Self {
        match result {
            Ok(reason) => Decision::granted(reason),
            Err(reason) => Decision::denied(reason),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Granted { reason } => write!(f, "granted: {reason}"),
            Decision::Denied { reason } => write!(f, "denied: {reason}"),
        }
    }
}

/// Which side of a Task failed process authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessDenial {
    /// The requesting identity is not an authorized requester
    Requester,
    /// The local organization is not an authorized recipient
    Recipient,
    /// Neither side is authorized
    RequesterAndRecipient,
}

impl ProcessDenial {
    /// Combine per-side outcomes; `None` when both sides are authorized
    pub fn from_sides(requester_ok: bool, recipient_ok: bool) -> Option<Self> {
        match (requester_ok, recipient_ok) {
            (true, true) => None,
            (false, true) => Some(ProcessDenial::Requester),
            (true, false) => Some(ProcessDenial::Recipient),
            (false, false) => Some(ProcessDenial::RequesterAndRecipient),
        }
    }
}

impl fmt::Display for ProcessDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProcessDenial::Requester => "requester",
            ProcessDenial::Recipient => "recipient",
            ProcessDenial::RequesterAndRecipient => "requester and recipient",
        })
    }
}

/// One structural problem with a resource value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    /// Required element absent
    Missing {
        /// Element path
        field: &'static str,
    },
    /// Element must occur exactly once
    NotExactlyOne {
        /// Element path
        field: &'static str,
    },
    /// Element value outside the allowed set
    NotAllowed {
        /// Element path
        field: &'static str,
        /// Offending value
        value: String,
    },
    /// Element value does not match the expected pattern
    PatternMismatch {
        /// Element path
        field: &'static str,
    },
    /// Element must be empty
    NotEmpty {
        /// Element path
        field: &'static str,
    },
    /// Reference does not resolve
    Unresolvable {
        /// Element path
        field: &'static str,
    },
    /// Reference must point at the local organization
    NotLocalOrganization {
        /// Element path
        field: &'static str,
    },
    /// Reference must point at the requesting identity's organization
    NotIdentityOrganization {
        /// Element path
        field: &'static str,
    },
    /// No valid read-access tag
    InvalidReadAccessTag,
    /// Binary carries both a valid tag and a valid security context
    TagAndSecurityContext,
    /// Binary carries neither a valid tag nor a valid security context
    NoTagOrSecurityContext,
    /// Process authorization extensions are malformed
    InvalidProcessAuthorization {
        /// What is wrong
        detail: String,
    },
    /// Subscription criteria unusable
    InvalidCriteria {
        /// What is wrong
        detail: String,
    },
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::Missing { field } => write!(f, "{field} missing"),
            ValidationFailure::NotExactlyOne { field } => {
                write!(f, "{field} missing or more than one")
            }
            ValidationFailure::NotAllowed { field, value } => {
                write!(f, "{field} value '{value}' not allowed")
            }
            ValidationFailure::PatternMismatch { field } => {
                write!(f, "{field} does not match the expected pattern")
            }
            ValidationFailure::NotEmpty { field } => write!(f, "{field} not empty"),
            ValidationFailure::Unresolvable { field } => {
                write!(f, "{field} could not be resolved")
            }
            ValidationFailure::NotLocalOrganization { field } => {
                write!(f, "{field} is not the local organization")
            }
            ValidationFailure::NotIdentityOrganization { field } => {
                write!(f, "{field} is not the organization of the requesting identity")
            }
            ValidationFailure::InvalidReadAccessTag => f.write_str("read-access tag missing or invalid"),
            ValidationFailure::TagAndSecurityContext => {
                f.write_str("read-access tag and securityContext both set")
            }
            ValidationFailure::NoTagOrSecurityContext => {
                f.write_str("neither a valid read-access tag nor a valid securityContext")
            }
            ValidationFailure::InvalidProcessAuthorization { detail } => {
                write!(f, "process authorization invalid: {detail}")
            }
            ValidationFailure::InvalidCriteria { detail } => {
                write!(f, "criteria invalid: {detail}")
            }
        }
    }
}

/// Why an operation was denied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// Identity lacks the role
    MissingRole(ServerRole),
    /// Identity lacks the operation for every resource type
    MissingUnscopedRole(Operation),
    /// Operation requires a local identity
    NotLocalIdentity,
    /// Operation requires the local organization (or its administrator)
    NotLocalOrganization,
    /// Resource value failed validation
    Invalid(Vec<ValidationFailure>),
    /// A resource with the same natural key exists
    AlreadyExists,
    /// Update changes fields that must stay fixed
    ImmutableFieldsChanged(Vec<&'static str>),
    /// No read-access tag grants the identity visibility
    NoMatchingReadAccessTag,
    /// Identity is neither the requester nor a local recipient of the task
    NotTaskParticipant,
    /// Status change outside the lifecycle
    IllegalTransition {
        /// Old status, `none` on create
        from: String,
        /// New status
        to: String,
    },
    /// Referenced process definition not found in draft/active status
    ProcessNotFound {
        /// Process url
        url: String,
        /// Process version
        version: String,
    },
    /// Process authorization failed
    ProcessNotAuthorized(ProcessDenial),
    /// The configured local organization is not stored
    LocalOrganizationUnknown,
    /// No rule is registered for the resource type
    NoRule(ResourceType),
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::MissingRole(role) => write!(f, "identity lacks role {role}"),
            DenialReason::MissingUnscopedRole(op) => {
                write!(f, "identity lacks role {op} for all resource types")
            }
            DenialReason::NotLocalIdentity => f.write_str("not a local identity"),
            DenialReason::NotLocalOrganization => f.write_str("not a local organization identity"),
            DenialReason::Invalid(failures) => {
                let rendered: Vec<String> = failures.iter().map(ToString::to_string).collect();
                write!(f, "resource not valid: {}", rendered.join(", "))
            }
            DenialReason::AlreadyExists => f.write_str("unique resource already exists"),
            DenialReason::ImmutableFieldsChanged(fields) => {
                write!(f, "modification of {} not allowed", fields.join(", "))
            }
            DenialReason::NoMatchingReadAccessTag => f.write_str("no matching read-access tag"),
            DenialReason::NotTaskParticipant => {
                f.write_str("identity is neither the requester nor a local recipient")
            }
            DenialReason::IllegalTransition { from, to } => {
                write!(f, "status change {from} -> {to} not allowed")
            }
            DenialReason::ProcessNotFound { url, version } => {
                write!(f, "process {url}|{version} not found in status draft or active")
            }
            DenialReason::ProcessNotAuthorized(side) => {
                write!(f, "process not authorized for {side}")
            }
            DenialReason::LocalOrganizationUnknown => f.write_str("local organization not found"),
            DenialReason::NoRule(rt) => write!(f, "no authorization rule for {rt}"),
        }
    }
}
