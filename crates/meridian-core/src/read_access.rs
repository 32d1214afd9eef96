//! Read-access tag structure
//!
//! Visibility is carried as tags of the read-access code system in
//! `meta.tag`. ORGANIZATION and ROLE tags carry their parameters as tag
//! extensions. This module only parses and checks structure; existence of the
//! referenced organizations and roles is checked against the store by the
//! authorization crate.

use crate::constants::{
    EXTENSION_ORGANIZATION_ROLE, EXTENSION_PARENT_ORGANIZATION,
    EXTENSION_READ_ACCESS_ORGANIZATION, EXTENSION_READ_ACCESS_PARENT_ORGANIZATION_ROLE,
    ORGANIZATION_IDENTIFIER_SYSTEM, READ_ACCESS_ALL, READ_ACCESS_LOCAL, READ_ACCESS_ORGANIZATION,
    READ_ACCESS_ROLE, READ_ACCESS_TAG_SYSTEM,
};
use crate::resource::{Coding, Extension, ExtensionValue, Identifier, Meta};
use std::fmt;

/// A parsed read-access tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReadAccessTag {
    /// Visible to every identity
    All,
    /// Visible to local identities
    Local,
    /// Visible to one organization
    Organization(Identifier),
    /// Visible to members of `parent` holding `role`
    Role {
        /// Parent organization identifier
        parent: Identifier,
        /// Member role
        role: Coding,
    },
}

impl ReadAccessTag {
    /// Tag code
    pub fn code(&self) -> &'static str {
        match self {
            ReadAccessTag::All => READ_ACCESS_ALL,
            ReadAccessTag::Local => READ_ACCESS_LOCAL,
            ReadAccessTag::Organization(_) => READ_ACCESS_ORGANIZATION,
            ReadAccessTag::Role { .. } => READ_ACCESS_ROLE,
        }
    }

    /// Encode as a meta tag coding
    pub fn to_coding(&self) -> Coding {
        let coding = Coding::new(READ_ACCESS_TAG_SYSTEM, self.code());
        match self {
            ReadAccessTag::All | ReadAccessTag::Local => coding,
            ReadAccessTag::Organization(identifier) => coding.with_extension(Extension::new(
                EXTENSION_READ_ACCESS_ORGANIZATION,
                ExtensionValue::Identifier(identifier.clone()),
            )),
            ReadAccessTag::Role { parent, role } => coding.with_extension(Extension::complex(
                EXTENSION_READ_ACCESS_PARENT_ORGANIZATION_ROLE,
                vec![
                    Extension::new(
                        EXTENSION_PARENT_ORGANIZATION,
                        ExtensionValue::Identifier(parent.clone()),
                    ),
                    Extension::new(
                        EXTENSION_ORGANIZATION_ROLE,
                        ExtensionValue::Coding(role.clone()),
                    ),
                ],
            )),
        }
    }

    fn parse(coding: &Coding) -> Option<Result<Self, MalformedTag>> {
        if coding.system != READ_ACCESS_TAG_SYSTEM {
            return None;
        }

        let malformed = |reason| MalformedTag {
            code: coding.code.clone(),
            reason,
        };

        let parsed = match coding.code.as_str() {
            READ_ACCESS_ALL => Ok(ReadAccessTag::All),
            READ_ACCESS_LOCAL => Ok(ReadAccessTag::Local),
            READ_ACCESS_ORGANIZATION => single(coding, EXTENSION_READ_ACCESS_ORGANIZATION)
                .and_then(Extension::as_identifier)
                .filter(|id| id.system == ORGANIZATION_IDENTIFIER_SYSTEM && !id.is_blank())
                .map(|id| ReadAccessTag::Organization(id.clone()))
                .ok_or_else(|| malformed("missing or invalid organization extension")),
            READ_ACCESS_ROLE => single(coding, EXTENSION_READ_ACCESS_PARENT_ORGANIZATION_ROLE)
                .and_then(|ext| {
                    let parent = ext
                        .single_sub(EXTENSION_PARENT_ORGANIZATION)?
                        .as_identifier()
                        .filter(|id| {
                            id.system == ORGANIZATION_IDENTIFIER_SYSTEM && !id.is_blank()
                        })?;
                    let role = ext.single_sub(EXTENSION_ORGANIZATION_ROLE)?.as_coding()?;
                    Some(ReadAccessTag::Role {
                        parent: parent.clone(),
                        role: Coding::new(role.system.clone(), role.code.clone()),
                    })
                })
                .ok_or_else(|| malformed("missing or invalid parent-organization-role extension")),
            _ => return None,
        };

        Some(parsed)
    }
}

fn single<'a>(coding: &'a Coding, url: &'a str) -> Option<&'a Extension> {
    let mut matching = coding.extensions(url);
    match (matching.next(), matching.next()) {
        (Some(ext), None) => Some(ext),
        _ => None,
    }
}

impl fmt::Display for ReadAccessTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadAccessTag::All | ReadAccessTag::Local => f.write_str(self.code()),
            ReadAccessTag::Organization(identifier) => {
                write!(f, "{}({})", self.code(), identifier.value)
            }
            ReadAccessTag::Role { parent, role } => {
                write!(f, "{}({}, {})", self.code(), parent.value, role)
            }
        }
    }
}

/// A read-access tag that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedTag {
    /// Tag code
    pub code: String,
    /// What is wrong with it
    pub reason: &'static str,
}

/// Read-access tags of one resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadAccessTags {
    tags: Vec<ReadAccessTag>,
    malformed: Vec<MalformedTag>,
}

impl ReadAccessTags {
    /// Collect the read-access tags in `meta`; tags of other systems and
    /// unknown codes are ignored
    pub fn from_meta(meta: &Meta) -> Self {
        let mut collected = Self::default();
        for parsed in meta.tag.iter().filter_map(ReadAccessTag::parse) {
            match parsed {
                Ok(tag) => collected.tags.push(tag),
                Err(malformed) => collected.malformed.push(malformed),
            }
        }
        collected
    }

    /// Well-formed tags
    pub fn tags(&self) -> &[ReadAccessTag] {
        &self.tags
    }

    /// Tags that failed to parse
    pub fn malformed(&self) -> &[MalformedTag] {
        &self.malformed
    }

    /// True when no read-access tag is present at all
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.malformed.is_empty()
    }

    /// True when any ROLE tag is present
    pub fn has_role_tags(&self) -> bool {
        self.tags
            .iter()
            .any(|t| matches!(t, ReadAccessTag::Role { .. }))
    }

    /// Shape check: exactly one LOCAL tag plus any ORGANIZATION/ROLE tags, or
    /// exactly one ALL tag alone; nothing malformed
    pub fn is_well_formed(&self) -> bool {
        let total = self.tags.len() + self.malformed.len();
        let locals = self.count(|t| matches!(t, ReadAccessTag::Local));
        let alls = self.count(|t| matches!(t, ReadAccessTag::All));

        let local_shape = locals == 1 && alls == 0 && total >= 1;
        let all_shape = alls == 1 && total == 1;

        self.malformed.is_empty() && (local_shape ^ all_shape)
    }

    fn count(&self, predicate: impl Fn(&ReadAccessTag) -> bool) -> usize {
        self.tags.iter().filter(|t| predicate(t)).count()
    }
}
