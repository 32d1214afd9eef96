//! Subscriptions, binaries, questionnaire responses and tag-only resources

use super::{Identifier, Reference};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Notification channel type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[allow(missing_docs)]
pub enum ChannelType {
    RestHook,
    Websocket,
    Email,
    Sms,
    Message,
}

impl ChannelType {
    /// Wire code
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::RestHook => "rest-hook",
            ChannelType::Websocket => "websocket",
            ChannelType::Email => "email",
            ChannelType::Sms => "sms",
            ChannelType::Message => "message",
        }
    }
}

/// Subscription channel
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubscriptionChannel {
    /// Channel type
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub channel_type: Option<ChannelType>,
    /// Payload mime type, absent for id-only notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

/// Subscription
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Subscription {
    /// Search criteria (`Type?param=value&...`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<String>,
    /// Channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<SubscriptionChannel>,
}

impl Subscription {
    /// Channel type, when a channel is set
    pub fn channel_type(&self) -> Option<ChannelType> {
        self.channel.as_ref().and_then(|c| c.channel_type)
    }

    /// Payload mime type, when set
    pub fn payload(&self) -> Option<&str> {
        self.channel.as_ref().and_then(|c| c.payload.as_deref())
    }
}

/// Binary content
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binary {
    /// Mime type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Resource whose visibility the binary inherits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<Reference>,
    /// Base64 content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// QuestionnaireResponse status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[allow(missing_docs)]
pub enum QuestionnaireResponseStatus {
    InProgress,
    Completed,
    Amended,
    EnteredInError,
    Stopped,
}

impl QuestionnaireResponseStatus {
    /// Wire code
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionnaireResponseStatus::InProgress => "in-progress",
            QuestionnaireResponseStatus::Completed => "completed",
            QuestionnaireResponseStatus::Amended => "amended",
            QuestionnaireResponseStatus::EnteredInError => "entered-in-error",
            QuestionnaireResponseStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for QuestionnaireResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answers to a questionnaire, used for user tasks
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuestionnaireResponse {
    /// Status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<QuestionnaireResponseStatus>,
    /// Canonical of the questionnaire answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questionnaire: Option<String>,
    /// Who completed the answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Reference>,
    /// When the answers were completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authored: Option<DateTime<Utc>>,
}

/// Resource whose only authorization-relevant content is its tags
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TagOnly {
    /// Business identifiers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,
}
