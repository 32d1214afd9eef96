//! Task: the workflow message resource

use super::{CodeableConcept, Coding, Identifier, Reference};
use crate::constants::{BPMN_MESSAGE_BUSINESS_KEY, BPMN_MESSAGE_NAME, BPMN_MESSAGE_SYSTEM};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[allow(missing_docs)]
pub enum TaskStatus {
    Draft,
    Requested,
    Received,
    Accepted,
    Rejected,
    Ready,
    Cancelled,
    InProgress,
    OnHold,
    Failed,
    Completed,
    EnteredInError,
}

impl TaskStatus {
    /// Wire code
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Draft => "draft",
            TaskStatus::Requested => "requested",
            TaskStatus::Received => "received",
            TaskStatus::Accepted => "accepted",
            TaskStatus::Rejected => "rejected",
            TaskStatus::Ready => "ready",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::OnHold => "on-hold",
            TaskStatus::Failed => "failed",
            TaskStatus::Completed => "completed",
            TaskStatus::EnteredInError => "entered-in-error",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a task input or output parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum ParameterValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    Coding(Coding),
    Reference(Reference),
}

/// Task input or output parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskParameter {
    /// Parameter type
    #[serde(rename = "type")]
    pub kind: CodeableConcept,
    /// Parameter value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ParameterValue>,
}

impl TaskParameter {
    /// Parameter typed by a bpmn-message code carrying a string value
    pub fn bpmn_string(code: &str, value: impl Into<String>) -> Self {
        Self {
            kind: CodeableConcept::of(Coding::new(BPMN_MESSAGE_SYSTEM, code)),
            value: Some(ParameterValue::String(value.into())),
        }
    }

    /// True when the parameter type carries the bpmn-message `code`
    pub fn is_bpmn(&self, code: &str) -> bool {
        self.kind.has(BPMN_MESSAGE_SYSTEM, code)
    }

    /// String value, when non-blank
    pub fn non_blank_string(&self) -> Option<&str> {
        match &self.value {
            Some(ParameterValue::String(value)) if !value.trim().is_empty() => Some(value),
            _ => None,
        }
    }
}

/// Restriction on who should act on the task
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskRestriction {
    /// Intended recipients
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipient: Vec<Reference>,
}

/// Task
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Lifecycle status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// Process canonical `url|version`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instantiates_canonical: Option<String>,
    /// Requesting organization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<Reference>,
    /// Recipient restriction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restriction: Option<TaskRestriction>,
    /// Business identifiers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,
    /// Authoring time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authored_on: Option<DateTime<Utc>>,
    /// Inputs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input: Vec<TaskParameter>,
    /// Outputs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<TaskParameter>,
}

impl Task {
    /// Recipient references, empty when no restriction is set
    pub fn recipients(&self) -> &[Reference] {
        self.restriction
            .as_ref()
            .map(|r| r.recipient.as_slice())
            .unwrap_or_default()
    }

    /// Non-blank message-name input values
    pub fn message_names(&self) -> impl Iterator<Item = &str> {
        self.input
            .iter()
            .filter(|p| p.is_bpmn(BPMN_MESSAGE_NAME))
            .filter_map(TaskParameter::non_blank_string)
    }

    /// Number of message-name inputs, blank or not
    pub fn message_name_inputs(&self) -> usize {
        self.input
            .iter()
            .filter(|p| p.is_bpmn(BPMN_MESSAGE_NAME))
            .count()
    }

    /// The message name, when exactly one non-blank message-name input exists
    pub fn message_name(&self) -> Option<&str> {
        if self.message_name_inputs() != 1 {
            return None;
        }
        self.message_names().next()
    }

    /// True when any input is a business-key parameter
    pub fn has_business_key(&self) -> bool {
        self.input.iter().any(|p| p.is_bpmn(BPMN_MESSAGE_BUSINESS_KEY))
    }

    /// Identifiers in the given naming system with non-blank values
    pub fn identifiers_in<'a>(&'a self, system: &'a str) -> impl Iterator<Item = &'a Identifier> {
        self.identifier
            .iter()
            .filter(move |i| i.system == system && !i.is_blank())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_uses_kebab_case_on_the_wire() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        let parsed: TaskStatus = serde_json::from_str("\"entered-in-error\"").unwrap();
        assert_eq!(parsed, TaskStatus::EnteredInError);
    }

    #[test]
    fn message_name_requires_a_single_non_blank_input() {
        let mut task = Task {
            input: vec![TaskParameter::bpmn_string(BPMN_MESSAGE_NAME, "ping")],
            ..Task::default()
        };
        assert_eq!(task.message_name(), Some("ping"));

        task.input
            .push(TaskParameter::bpmn_string(BPMN_MESSAGE_NAME, "pong"));
        assert_eq!(task.message_name(), None);

        task.input = vec![TaskParameter::bpmn_string(BPMN_MESSAGE_NAME, "  ")];
        assert_eq!(task.message_name(), None);
    }
}
