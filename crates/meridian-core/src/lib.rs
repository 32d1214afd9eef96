//! # Meridian Core
//!
//! Foundation types for the Meridian authorization engine:
//!
//! - [`identity`]: acting parties, role grants, locality
//! - [`resource`]: the minimal resource model consulted by authorization rules
//! - [`read_access`]: structure of read-access (visibility) tags
//! - [`natural_key`]: uniqueness keys shared by duplicate checks and storage
//! - [`search`]: existence/count queries and the search capability catalogue
//! - [`config`]: server configuration
//!
//! This crate performs no I/O beyond loading configuration files.

pub mod config;
pub mod constants;
pub mod errors;
pub mod identity;
pub mod natural_key;
pub mod read_access;
pub mod resource;
pub mod search;

pub use config::ServerConfig;
pub use errors::{MeridianError, Result};
pub use identity::{
    Identity, IdentityKind, IdentityOrganization, IdentityPerson, Operation, RoleGrant,
    ServerRole,
};
pub use natural_key::{NaturalKey, NaturalKeys};
pub use read_access::{ReadAccessTag, ReadAccessTags};
pub use resource::{Resource, ResourceBody, ResourceType};
pub use search::{SearchCapabilities, SearchQuery};
