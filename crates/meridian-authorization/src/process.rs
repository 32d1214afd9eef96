//! Process authorization
//!
//! A process definition (ActivityDefinition) lists, per message name and task
//! profile, who may send (requesters) and who may receive (recipients) Tasks
//! of that process. The loosely typed extensions are parsed once into
//! [`ParticipantPredicate`]s; parsed definitions are cached per stored
//! version by [`ProcessRegistry`].

use crate::error::AuthResult;
use meridian_core::constants::{
    EXTENSION_ORGANIZATION_ROLE, EXTENSION_PARENT_ORGANIZATION, EXTENSION_PROCESS_AUTHORIZATION,
    EXTENSION_PROCESS_AUTHORIZATION_MESSAGE_NAME, EXTENSION_PROCESS_AUTHORIZATION_ORGANIZATION,
    EXTENSION_PROCESS_AUTHORIZATION_ORGANIZATION_PRACTITIONER,
    EXTENSION_PROCESS_AUTHORIZATION_PARENT_ORGANIZATION_ROLE,
    EXTENSION_PROCESS_AUTHORIZATION_PARENT_ORGANIZATION_ROLE_PRACTITIONER,
    EXTENSION_PROCESS_AUTHORIZATION_PRACTITIONER, EXTENSION_PROCESS_AUTHORIZATION_RECIPIENT,
    EXTENSION_PROCESS_AUTHORIZATION_REQUESTER, EXTENSION_PROCESS_AUTHORIZATION_SUB_ORGANIZATION,
    EXTENSION_PROCESS_AUTHORIZATION_SUB_PRACTITIONER_ROLE,
    EXTENSION_PROCESS_AUTHORIZATION_TASK_PROFILE, ORGANIZATION_IDENTIFIER_SYSTEM,
    PROCESS_AUTHORIZATION_SYSTEM,
};
use meridian_core::resource::{
    ActivityDefinition, AffiliationEdge, Coding, Extension, ExtensionValue, Identifier,
    Organization,
};
use meridian_core::{Identity, IdentityKind};
use meridian_store::StoreSnapshot;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

static PROCESS_CANONICAL: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(
        r"^(?P<url>https?://(?P<domain>(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z0-9]{1,63})/bpe/Process/(?P<name>[a-zA-Z0-9-]+))\|(?P<version>\d+\.\d+)$",
    )
    .expect("process canonical pattern is valid")
});

/// Parsed `instantiatesCanonical` of a Task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCanonical {
    /// Process url without version
    pub url: String,
    /// Domain of the process url
    pub domain: String,
    /// Process name
    pub name: String,
    /// `major.minor` version
    pub version: String,
}

impl ProcessCanonical {
    /// Parse `{scheme}://{domain}/bpe/Process/{name}|{major.minor}`
    pub fn parse(canonical: &str) -> Option<Self> {
        let captures = PROCESS_CANONICAL.captures(canonical)?;
        Some(Self {
            url: captures.name("url")?.as_str().to_string(),
            domain: captures.name("domain")?.as_str().to_string(),
            name: captures.name("name")?.as_str().to_string(),
            version: captures.name("version")?.as_str().to_string(),
        })
    }
}

/// Whether a participant must be local or remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locality {
    /// Part of this deployment
    Local,
    /// Federated party
    Remote,
}

impl From<IdentityKind> for Locality {
    fn from(kind: IdentityKind) -> Self {
        match kind {
            IdentityKind::Local => Locality::Local,
            IdentityKind::Remote => Locality::Remote,
        }
    }
}

/// Party evaluated against requester or recipient predicates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Local or remote
    pub locality: Locality,
    /// Organization identifier, absent when unresolved
    pub organization: Option<Identifier>,
    /// Whether the organization is active
    pub active: bool,
    /// Practitioner roles; `None` for organization identities
    pub practitioner_roles: Option<Vec<Coding>>,
}

impl Candidate {
    /// The requesting identity
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            locality: identity.kind.into(),
            organization: identity.organization.as_ref().map(|o| o.identifier.clone()),
            active: identity.organization.as_ref().is_some_and(|o| o.active),
            practitioner_roles: identity
                .person
                .as_ref()
                .map(|p| p.practitioner_roles.clone()),
        }
    }

    /// An organization acting as itself
    pub fn from_organization(organization: &Organization, locality: Locality) -> Self {
        Self {
            locality,
            organization: organization.organization_identifier().cloned(),
            active: organization.active,
            practitioner_roles: None,
        }
    }

    fn roles_match(&self, practitioner_role: Option<&Coding>) -> bool {
        match (practitioner_role, &self.practitioner_roles) {
            (None, None) => true,
            (Some(required), Some(held)) => held.iter().any(|r| r.same_code(required)),
            _ => false,
        }
    }
}

/// Who may act as requester or recipient
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParticipantPredicate {
    /// Any active organization of the given locality
    All {
        /// Required locality
        locality: Locality,
        /// Practitioner role, when persons are addressed
        practitioner_role: Option<Coding>,
    },
    /// One organization
    Organization {
        /// Required locality
        locality: Locality,
        /// Organization identifier
        organization: Identifier,
        /// Practitioner role, when persons are addressed
        practitioner_role: Option<Coding>,
    },
    /// Members holding a role in a parent organization
    Role {
        /// Required locality
        locality: Locality,
        /// Parent (consortium) identifier
        parent_organization: Identifier,
        /// Member role
        role: Coding,
        /// Practitioner role, when persons are addressed
        practitioner_role: Option<Coding>,
    },
}

impl ParticipantPredicate {
    fn locality(&self) -> Locality {
        match self {
            ParticipantPredicate::All { locality, .. }
            | ParticipantPredicate::Organization { locality, .. }
            | ParticipantPredicate::Role { locality, .. } => *locality,
        }
    }

    fn practitioner_role(&self) -> Option<&Coding> {
        match self {
            ParticipantPredicate::All {
                practitioner_role, ..
            }
            | ParticipantPredicate::Organization {
                practitioner_role, ..
            }
            | ParticipantPredicate::Role {
                practitioner_role, ..
            } => practitioner_role.as_ref(),
        }
    }

    /// True when `candidate` satisfies this predicate; `affiliations` are the
    /// edges whose member is the candidate's organization
    pub fn is_authorized(&self, candidate: &Candidate, affiliations: &[AffiliationEdge]) -> bool {
        let Some(member) = candidate.organization.as_ref() else {
            return false;
        };
        if !candidate.active
            || candidate.locality != self.locality()
            || !candidate.roles_match(self.practitioner_role())
        {
            return false;
        }

        match self {
            ParticipantPredicate::All { .. } => true,
            ParticipantPredicate::Organization { organization, .. } => organization == member,
            ParticipantPredicate::Role {
                parent_organization,
                role,
                ..
            } => affiliations
                .iter()
                .any(|edge| edge.grants(parent_organization, member, role)),
        }
    }

    /// Authorization code of this predicate
    pub fn code(&self) -> &'static str {
        let local = self.locality() == Locality::Local;
        let person = self.practitioner_role().is_some();
        match (self, local, person) {
            (ParticipantPredicate::All { .. }, true, false) => "LOCAL_ALL",
            (ParticipantPredicate::All { .. }, true, true) => "LOCAL_ALL_PRACTITIONER",
            (ParticipantPredicate::All { .. }, false, _) => "REMOTE_ALL",
            (ParticipantPredicate::Organization { .. }, true, false) => "LOCAL_ORGANIZATION",
            (ParticipantPredicate::Organization { .. }, true, true) => {
                "LOCAL_ORGANIZATION_PRACTITIONER"
            }
            (ParticipantPredicate::Organization { .. }, false, _) => "REMOTE_ORGANIZATION",
            (ParticipantPredicate::Role { .. }, true, false) => "LOCAL_ROLE",
            (ParticipantPredicate::Role { .. }, true, true) => "LOCAL_ROLE_PRACTITIONER",
            (ParticipantPredicate::Role { .. }, false, _) => "REMOTE_ROLE",
        }
    }

    /// Encode as a process-authorization coding with its parameter extension
    pub fn to_coding(&self) -> Coding {
        let coding = Coding::new(PROCESS_AUTHORIZATION_SYSTEM, self.code());
        let identifier = |url: &str, id: &Identifier| {
            Extension::new(url, ExtensionValue::Identifier(id.clone()))
        };
        let code = |url: &str, c: &Coding| Extension::new(url, ExtensionValue::Coding(c.clone()));

        match self {
            ParticipantPredicate::All {
                practitioner_role: None,
                ..
            } => coding,
            ParticipantPredicate::All {
                practitioner_role: Some(role),
                ..
            } => coding.with_extension(code(EXTENSION_PROCESS_AUTHORIZATION_PRACTITIONER, role)),
            ParticipantPredicate::Organization {
                organization,
                practitioner_role: None,
                ..
            } => coding.with_extension(identifier(
                EXTENSION_PROCESS_AUTHORIZATION_ORGANIZATION,
                organization,
            )),
            ParticipantPredicate::Organization {
                organization,
                practitioner_role: Some(role),
                ..
            } => coding.with_extension(Extension::complex(
                EXTENSION_PROCESS_AUTHORIZATION_ORGANIZATION_PRACTITIONER,
                vec![
                    identifier(EXTENSION_PROCESS_AUTHORIZATION_SUB_ORGANIZATION, organization),
                    code(EXTENSION_PROCESS_AUTHORIZATION_SUB_PRACTITIONER_ROLE, role),
                ],
            )),
            ParticipantPredicate::Role {
                parent_organization,
                role,
                practitioner_role,
                ..
            } => {
                let mut subs = vec![
                    identifier(EXTENSION_PARENT_ORGANIZATION, parent_organization),
                    code(EXTENSION_ORGANIZATION_ROLE, role),
                ];
                let url = match practitioner_role {
                    None => EXTENSION_PROCESS_AUTHORIZATION_PARENT_ORGANIZATION_ROLE,
                    Some(practitioner_role) => {
                        subs.push(code(
                            EXTENSION_PROCESS_AUTHORIZATION_SUB_PRACTITIONER_ROLE,
                            practitioner_role,
                        ));
                        EXTENSION_PROCESS_AUTHORIZATION_PARENT_ORGANIZATION_ROLE_PRACTITIONER
                    }
                };
                coding.with_extension(Extension::complex(url, subs))
            }
        }
    }

    /// Parse a process-authorization coding
    pub fn from_coding(coding: &Coding) -> Result<Self, ProcessDefinitionError> {
        let invalid = |detail: &str| ProcessDefinitionError::InvalidPredicate {
            code: coding.code.clone(),
            detail: detail.to_string(),
        };
        if coding.system != PROCESS_AUTHORIZATION_SYSTEM {
            return Err(invalid("unknown code system"));
        }

        let only = |url: &'static str| {
            single_extension(coding, url)
                .ok_or_else(|| invalid("parameter extension missing or repeated"))
        };
        let organization_id = |ext: Option<&Extension>| {
            ext.and_then(Extension::as_identifier)
                .filter(|id| id.system == ORGANIZATION_IDENTIFIER_SYSTEM && !id.is_blank())
                .cloned()
                .ok_or_else(|| invalid("organization identifier missing"))
        };
        let role_coding = |ext: Option<&Extension>| {
            ext.and_then(Extension::as_coding)
                .filter(|c| !c.system.is_empty() && !c.code.is_empty())
                .map(|c| Coding::new(c.system.clone(), c.code.clone()))
                .ok_or_else(|| invalid("role coding missing"))
        };

        let (locality, kind) = match coding.code.split_once('_') {
            Some(("LOCAL", kind)) => (Locality::Local, kind),
            Some(("REMOTE", kind)) => (Locality::Remote, kind),
            _ => return Err(invalid("unknown code")),
        };

        match (locality, kind) {
            (_, "ALL") => Ok(ParticipantPredicate::All {
                locality,
                practitioner_role: None,
            }),
            (Locality::Local, "ALL_PRACTITIONER") => Ok(ParticipantPredicate::All {
                locality,
                practitioner_role: Some(role_coding(Some(only(
                    EXTENSION_PROCESS_AUTHORIZATION_PRACTITIONER,
                )?))?),
            }),
            (_, "ORGANIZATION") => Ok(ParticipantPredicate::Organization {
                locality,
                organization: organization_id(Some(only(
                    EXTENSION_PROCESS_AUTHORIZATION_ORGANIZATION,
                )?))?,
                practitioner_role: None,
            }),
            (Locality::Local, "ORGANIZATION_PRACTITIONER") => {
                let ext = only(EXTENSION_PROCESS_AUTHORIZATION_ORGANIZATION_PRACTITIONER)?;
                Ok(ParticipantPredicate::Organization {
                    locality,
                    organization: organization_id(
                        ext.single_sub(EXTENSION_PROCESS_AUTHORIZATION_SUB_ORGANIZATION),
                    )?,
                    practitioner_role: Some(role_coding(
                        ext.single_sub(EXTENSION_PROCESS_AUTHORIZATION_SUB_PRACTITIONER_ROLE),
                    )?),
                })
            }
            (_, "ROLE") => {
                let ext = only(EXTENSION_PROCESS_AUTHORIZATION_PARENT_ORGANIZATION_ROLE)?;
                Ok(ParticipantPredicate::Role {
                    locality,
                    parent_organization: organization_id(
                        ext.single_sub(EXTENSION_PARENT_ORGANIZATION),
                    )?,
                    role: role_coding(ext.single_sub(EXTENSION_ORGANIZATION_ROLE))?,
                    practitioner_role: None,
                })
            }
            (Locality::Local, "ROLE_PRACTITIONER") => {
                let ext = only(EXTENSION_PROCESS_AUTHORIZATION_PARENT_ORGANIZATION_ROLE_PRACTITIONER)?;
                Ok(ParticipantPredicate::Role {
                    locality,
                    parent_organization: organization_id(
                        ext.single_sub(EXTENSION_PARENT_ORGANIZATION),
                    )?,
                    role: role_coding(ext.single_sub(EXTENSION_ORGANIZATION_ROLE))?,
                    practitioner_role: Some(role_coding(
                        ext.single_sub(EXTENSION_PROCESS_AUTHORIZATION_SUB_PRACTITIONER_ROLE),
                    )?),
                })
            }
            _ => Err(invalid("unknown code")),
        }
    }
}

impl fmt::Display for ParticipantPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())?;
        match self {
            ParticipantPredicate::All { .. } => {}
            ParticipantPredicate::Organization { organization, .. } => {
                write!(f, "({})", organization.value)?;
            }
            ParticipantPredicate::Role {
                parent_organization,
                role,
                ..
            } => write!(f, "({}, {})", parent_organization.value, role.code)?,
        }
        if let Some(role) = self.practitioner_role() {
            write!(f, "[{}]", role.code)?;
        }
        Ok(())
    }
}

fn single_extension<'a>(coding: &'a Coding, url: &'a str) -> Option<&'a Extension> {
    let mut matching = coding.extensions(url);
    match (matching.next(), matching.next()) {
        (Some(ext), None) => Some(ext),
        _ => None,
    }
}

/// Returns the first predicate authorizing `candidate`
pub fn first_match<'a>(
    predicates: &'a [ParticipantPredicate],
    candidate: &Candidate,
    affiliations: &[AffiliationEdge],
) -> Option<&'a ParticipantPredicate> {
    predicates
        .iter()
        .find(|p| p.is_authorized(candidate, affiliations))
}

/// Why process authorization extensions could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessDefinitionError {
    /// Url or version missing
    #[error("process definition lacks url or version")]
    MissingCanonical,
    /// No authorization extension present
    #[error("no process authorization extension")]
    NoAuthorizations,
    /// An authorization entry is malformed
    #[error("process authorization {index}: {detail}")]
    InvalidAuthorization {
        /// Position among authorization extensions
        index: usize,
        /// What is wrong
        detail: String,
    },
    /// A requester or recipient coding is malformed
    #[error("{code}: {detail}")]
    InvalidPredicate {
        /// Authorization code
        code: String,
        /// What is wrong
        detail: String,
    },
}

/// One authorization entry of a process definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessAuthorization {
    /// Message name the entry applies to
    pub message_name: String,
    /// Task profiles the entry applies to
    pub task_profiles: Vec<String>,
    /// Who may send
    pub requesters: Vec<ParticipantPredicate>,
    /// Who may receive; always local
    pub recipients: Vec<ParticipantPredicate>,
}

impl ProcessAuthorization {
    /// Encode as a process-authorization extension
    pub fn to_extension(&self) -> Extension {
        let mut subs = vec![Extension::new(
            EXTENSION_PROCESS_AUTHORIZATION_MESSAGE_NAME,
            ExtensionValue::String(self.message_name.clone()),
        )];
        subs.extend(self.task_profiles.iter().map(|p| {
            Extension::new(
                EXTENSION_PROCESS_AUTHORIZATION_TASK_PROFILE,
                ExtensionValue::Canonical(p.clone()),
            )
        }));
        subs.extend(self.requesters.iter().map(|p| {
            Extension::new(
                EXTENSION_PROCESS_AUTHORIZATION_REQUESTER,
                ExtensionValue::Coding(p.to_coding()),
            )
        }));
        subs.extend(self.recipients.iter().map(|p| {
            Extension::new(
                EXTENSION_PROCESS_AUTHORIZATION_RECIPIENT,
                ExtensionValue::Coding(p.to_coding()),
            )
        }));
        Extension::complex(EXTENSION_PROCESS_AUTHORIZATION, subs)
    }

    fn from_extension(index: usize, ext: &Extension) -> Result<Self, ProcessDefinitionError> {
        let invalid = |detail: &str| ProcessDefinitionError::InvalidAuthorization {
            index,
            detail: detail.to_string(),
        };

        let message_name = ext
            .single_sub(EXTENSION_PROCESS_AUTHORIZATION_MESSAGE_NAME)
            .and_then(Extension::as_str)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| invalid("message-name missing or repeated"))?
            .to_string();

        let task_profiles = ext
            .subs(EXTENSION_PROCESS_AUTHORIZATION_TASK_PROFILE)
            .map(|sub| sub.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .filter(|profiles| !profiles.is_empty())
            .ok_or_else(|| invalid("task-profile missing or not a canonical"))?;

        let predicates = |url: &str| -> Result<Vec<ParticipantPredicate>, ProcessDefinitionError> {
            let parsed = ext
                .subs(url)
                .map(|sub| {
                    sub.as_coding()
                        .ok_or_else(|| invalid("participant is not a coding"))
                        .and_then(ParticipantPredicate::from_coding)
                })
                .collect::<Result<Vec<_>, _>>()?;
            if parsed.is_empty() {
                return Err(invalid("no participant listed"));
            }
            Ok(parsed)
        };

        let requesters = predicates(EXTENSION_PROCESS_AUTHORIZATION_REQUESTER)?;
        let recipients = predicates(EXTENSION_PROCESS_AUTHORIZATION_RECIPIENT)?;
        if recipients.iter().any(|r| r.locality() != Locality::Local) {
            return Err(invalid("recipients must be local"));
        }

        Ok(Self {
            message_name,
            task_profiles,
            requesters,
            recipients,
        })
    }
}

/// Parsed process definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDefinition {
    /// Process url
    pub url: String,
    /// Process version
    pub version: String,
    /// Authorization entries in declaration order
    pub authorizations: Vec<ProcessAuthorization>,
}

impl ProcessDefinition {
    /// Parse the authorization extensions of `definition`; fails unless every
    /// entry is well formed and at least one exists
    pub fn parse(definition: &ActivityDefinition) -> Result<Self, ProcessDefinitionError> {
        let (Some(url), Some(version)) = (&definition.url, &definition.version) else {
            return Err(ProcessDefinitionError::MissingCanonical);
        };

        let authorizations = definition
            .extension
            .iter()
            .filter(|e| e.url == EXTENSION_PROCESS_AUTHORIZATION)
            .enumerate()
            .map(|(index, ext)| ProcessAuthorization::from_extension(index, ext))
            .collect::<Result<Vec<_>, _>>()?;

        if authorizations.is_empty() {
            return Err(ProcessDefinitionError::NoAuthorizations);
        }

        Ok(Self {
            url: url.clone(),
            version: version.clone(),
            authorizations,
        })
    }

    fn entry(
        &self,
        url: &str,
        version: &str,
        message_name: &str,
        profiles: &[String],
    ) -> Option<&ProcessAuthorization> {
        if self.url != url || self.version != version {
            return None;
        }
        self.authorizations.iter().find(|a| {
            a.message_name == message_name && a.task_profiles.iter().any(|p| profiles.contains(p))
        })
    }

    /// Requester predicates of the first entry matching the message name and
    /// any of `profiles`; empty when nothing matches
    pub fn requesters(
        &self,
        url: &str,
        version: &str,
        message_name: &str,
        profiles: &[String],
    ) -> &[ParticipantPredicate] {
        self.entry(url, version, message_name, profiles)
            .map(|a| a.requesters.as_slice())
            .unwrap_or_default()
    }

    /// Recipient predicates of the first matching entry
    pub fn recipients(
        &self,
        url: &str,
        version: &str,
        message_name: &str,
        profiles: &[String],
    ) -> &[ParticipantPredicate] {
        self.entry(url, version, message_name, profiles)
            .map(|a| a.recipients.as_slice())
            .unwrap_or_default()
    }
}

/// Cache of parsed process definitions, one entry per stored resource id
///
/// An entry is reused while the stored version it was parsed from is current
/// and replaced once a newer version is resolved.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    parsed: RwLock<HashMap<String, (u64, Arc<ProcessDefinition>)>>,
}

impl ProcessRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Draft or active definition for `url|version`, parsed once per stored
    /// version; definitions that fail to parse are treated as absent
    pub async fn resolve(
        &self,
        snapshot: &dyn StoreSnapshot,
        url: &str,
        version: &str,
    ) -> AuthResult<Option<Arc<ProcessDefinition>>> {
        let Some(resource) = snapshot.process_definition(url, version).await? else {
            debug!(url, version, "Process definition not found");
            return Ok(None);
        };
        let Some(activity) = resource.as_activity_definition() else {
            return Ok(None);
        };

        let id = resource.id.clone().unwrap_or_default();
        let stored_version = resource.version.unwrap_or_default();
        if let Some((cached_version, parsed)) = self.parsed.read().get(&id) {
            if *cached_version == stored_version {
                return Ok(Some(parsed.clone()));
            }
        }

        match ProcessDefinition::parse(activity) {
            Ok(parsed) => {
                let parsed = Arc::new(parsed);
                self.parsed.write().insert(id, (stored_version, parsed.clone()));
                Ok(Some(parsed))
            }
            Err(err) => {
                warn!(url, version, error = %err, "Stored process definition has invalid authorizations");
                self.parsed.write().remove(&id);
                Ok(None)
            }
        }
    }

    /// Number of cached definitions
    pub fn len(&self) -> usize {
        self.parsed.read().len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.parsed.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::constants::PRACTITIONER_ROLE_SYSTEM;
    use meridian_core::resource::PublicationStatus;
    use proptest::prelude::*;

    fn org(value: &str) -> Identifier {
        Identifier::new(ORGANIZATION_IDENTIFIER_SYSTEM, value)
    }

    fn role(code: &str) -> Coding {
        Coding::new("http://dsf.dev/fhir/CodeSystem/organization-role", code)
    }

    fn candidate(locality: Locality, organization: &str) -> Candidate {
        Candidate {
            locality,
            organization: Some(org(organization)),
            active: true,
            practitioner_roles: None,
        }
    }

    fn definition(authorizations: Vec<ProcessAuthorization>) -> ActivityDefinition {
        ActivityDefinition {
            url: Some("https://x.example/bpe/Process/ping".into()),
            version: Some("1.0".into()),
            status: Some(PublicationStatus::Active),
            name: None,
            extension: authorizations.iter().map(ProcessAuthorization::to_extension).collect(),
        }
    }

    fn ping_authorization() -> ProcessAuthorization {
        ProcessAuthorization {
            message_name: "startPing".into(),
            task_profiles: vec!["http://x.example/fhir/StructureDefinition/task-start-ping|1.0".into()],
            requesters: vec![
                ParticipantPredicate::Organization {
                    locality: Locality::Remote,
                    organization: org("a.org"),
                    practitioner_role: None,
                },
                ParticipantPredicate::Role {
                    locality: Locality::Remote,
                    parent_organization: org("consortium.org"),
                    role: role("DIC"),
                    practitioner_role: None,
                },
            ],
            recipients: vec![ParticipantPredicate::All {
                locality: Locality::Local,
                practitioner_role: None,
            }],
        }
    }

    #[tokio::test]
    async fn registry_replaces_superseded_versions() {
        use meridian_core::resource::ResourceBody;
        use meridian_core::Resource;
        use meridian_store::{MemoryStore, ResourceStore};

        let store = MemoryStore::new();
        let stored = store
            .create(Resource::new(ResourceBody::ActivityDefinition(definition(vec![
                ping_authorization(),
            ]))))
            .await
            .unwrap();
        let url = "https://x.example/bpe/Process/ping";
        let registry = ProcessRegistry::new();

        let first = registry
            .resolve(&*store.snapshot().await.unwrap(), url, "1.0")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.authorizations.len(), 1);

        let mut pong = ping_authorization();
        pong.message_name = "startPong".into();
        let mut next = stored.clone();
        next.body = ResourceBody::ActivityDefinition(definition(vec![ping_authorization(), pong]));
        store.update(next).await.unwrap();

        let second = registry
            .resolve(&*store.snapshot().await.unwrap(), url, "1.0")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.authorizations.len(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn parses_process_canonical() {
        let parsed = ProcessCanonical::parse("https://x.example/bpe/Process/ping|1.0").unwrap();
        assert_eq!(parsed.url, "https://x.example/bpe/Process/ping");
        assert_eq!(parsed.domain, "x.example");
        assert_eq!(parsed.name, "ping");
        assert_eq!(parsed.version, "1.0");

        assert!(ProcessCanonical::parse("https://x.example/bpe/Process/ping|1").is_none());
        assert!(ProcessCanonical::parse("https://x.example/Process/ping|1.0").is_none());
        assert!(ProcessCanonical::parse("ftp://x.example/bpe/Process/ping|1.0").is_none());
    }

    #[test]
    fn parses_authorizations_from_extensions() {
        let parsed = ProcessDefinition::parse(&definition(vec![ping_authorization()])).unwrap();
        assert_eq!(parsed.authorizations, vec![ping_authorization()]);
    }

    #[test]
    fn rejects_remote_recipients_and_missing_entries() {
        let mut remote_recipient = ping_authorization();
        remote_recipient.recipients = vec![ParticipantPredicate::All {
            locality: Locality::Remote,
            practitioner_role: None,
        }];
        assert!(matches!(
            ProcessDefinition::parse(&definition(vec![remote_recipient])),
            Err(ProcessDefinitionError::InvalidAuthorization { .. })
        ));
        assert_eq!(
            ProcessDefinition::parse(&definition(vec![])),
            Err(ProcessDefinitionError::NoAuthorizations)
        );
    }

    #[test]
    fn lookup_requires_matching_canonical_message_and_profile() {
        let parsed = ProcessDefinition::parse(&definition(vec![ping_authorization()])).unwrap();
        let profiles = vec!["http://x.example/fhir/StructureDefinition/task-start-ping|1.0".to_string()];
        let url = "https://x.example/bpe/Process/ping";

        assert_eq!(parsed.requesters(url, "1.0", "startPing", &profiles).len(), 2);
        assert_eq!(parsed.recipients(url, "1.0", "startPing", &profiles).len(), 1);
        assert!(parsed.requesters(url, "1.1", "startPing", &profiles).is_empty());
        assert!(parsed.requesters(url, "1.0", "pong", &profiles).is_empty());
        assert!(parsed.requesters(url, "1.0", "startPing", &[]).is_empty());
    }

    #[test]
    fn first_match_short_circuits_in_order() {
        let requesters = ping_authorization().requesters;
        let edge = AffiliationEdge {
            parent: org("consortium.org"),
            member: org("b.org"),
            roles: vec![role("DIC")],
            active: true,
        };

        let a = candidate(Locality::Remote, "a.org");
        assert_eq!(first_match(&requesters, &a, &[]), Some(&requesters[0]));

        let b = candidate(Locality::Remote, "b.org");
        assert_eq!(first_match(&requesters, &b, &[]), None);
        assert_eq!(
            first_match(&requesters, &b, std::slice::from_ref(&edge)),
            Some(&requesters[1])
        );

        let local_a = candidate(Locality::Local, "a.org");
        assert_eq!(first_match(&requesters, &local_a, &[]), None);
    }

    #[test]
    fn inactive_or_unresolved_candidates_never_match() {
        let all = ParticipantPredicate::All {
            locality: Locality::Remote,
            practitioner_role: None,
        };
        let mut inactive = candidate(Locality::Remote, "a.org");
        inactive.active = false;
        assert!(!all.is_authorized(&inactive, &[]));

        let mut unresolved = candidate(Locality::Remote, "a.org");
        unresolved.organization = None;
        assert!(!all.is_authorized(&unresolved, &[]));
    }

    #[test]
    fn practitioner_predicates_need_the_practitioner_role() {
        let admin = Coding::new(PRACTITIONER_ROLE_SYSTEM, "DSF_ADMIN");
        let predicate = ParticipantPredicate::All {
            locality: Locality::Local,
            practitioner_role: Some(admin.clone()),
        };
        let mut person = candidate(Locality::Local, "l.org");
        person.practitioner_roles = Some(vec![]);
        assert!(!predicate.is_authorized(&person, &[]));

        person.practitioner_roles = Some(vec![admin]);
        assert!(predicate.is_authorized(&person, &[]));

        // organization identities never satisfy practitioner predicates
        assert!(!predicate.is_authorized(&candidate(Locality::Local, "l.org"), &[]));
    }

    fn predicate_strategy() -> impl Strategy<Value = ParticipantPredicate> {
        let locality = prop_oneof![Just(Locality::Local), Just(Locality::Remote)];
        let practitioner = proptest::option::of("[A-Z_]{3,10}")
            .prop_map(|code| code.map(|c| Coding::new(PRACTITIONER_ROLE_SYSTEM, c)));
        (locality, practitioner, 0..3u8, "[a-z]{1,6}\\.org", "[A-Z]{2,4}").prop_map(
            |(locality, practitioner_role, kind, organization, role_code)| {
                // practitioner roles only exist for local predicates
                let practitioner_role = practitioner_role.filter(|_| locality == Locality::Local);
                match kind {
                    0 => ParticipantPredicate::All {
                        locality,
                        practitioner_role,
                    },
                    1 => ParticipantPredicate::Organization {
                        locality,
                        organization: org(&organization),
                        practitioner_role,
                    },
                    _ => ParticipantPredicate::Role {
                        locality,
                        parent_organization: org(&organization),
                        role: role(&role_code),
                        practitioner_role,
                    },
                }
            },
        )
    }

    proptest! {
        #[test]
        fn predicates_decode_from_their_codings(predicate in predicate_strategy()) {
            let decoded = ParticipantPredicate::from_coding(&predicate.to_coding()).unwrap();
            prop_assert_eq!(decoded, predicate);
        }
    }
}
