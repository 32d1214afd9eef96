//! Server configuration
//!
//! Loaded from TOML, then overridden by `MERIDIAN_*` environment variables,
//! then validated. Every field has a default so a partial file is enough.

use crate::constants::{PRACTITIONER_ROLE_ADMIN, PRACTITIONER_ROLE_SYSTEM, TASK_IDENTIFIER_SYSTEM};
use crate::errors::{MeridianError, Result};
use crate::resource::Coding;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "MERIDIAN_";

/// Practitioner role granting organization-level rights to a local person
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRole {
    /// Code system
    pub system: String,
    /// Code
    pub code: String,
}

impl AdminRole {
    /// As a coding
    pub fn coding(&self) -> Coding {
        Coding::new(self.system.clone(), self.code.clone())
    }
}

impl Default for AdminRole {
    fn default() -> Self {
        Self {
            system: PRACTITIONER_ROLE_SYSTEM.to_string(),
            code: PRACTITIONER_ROLE_ADMIN.to_string(),
        }
    }
}

/// Configuration of one server deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base url of this server; absolute references under it are local
    pub server_base_url: String,
    /// Organization identifier value of the local organization
    pub local_organization_identifier: String,
    /// Practitioner role treated as acting for the local organization
    pub admin_practitioner_role: AdminRole,
    /// Naming system of unique task identifiers
    pub task_identifier_system: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_base_url: "https://localhost/fhir".to_string(),
            local_organization_identifier: String::new(),
            admin_practitioner_role: AdminRole::default(),
            task_identifier_system: TASK_IDENTIFIER_SYSTEM.to_string(),
        }
    }
}

impl ServerConfig {
    /// Default configuration for the given local organization
    pub fn for_local_organization(identifier: impl Into<String>) -> Self {
        Self {
            local_organization_identifier: identifier.into(),
            ..Self::default()
        }
    }

    /// Parse TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MeridianError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&content)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Apply `MERIDIAN_*` overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply `MERIDIAN_*` overrides from `vars`; other names are ignored
    pub fn merge_with_vars(&mut self, vars: impl IntoIterator<Item = (String, String)>) -> Result<()> {
        for (name, value) in vars {
            if let Some(key) = name.strip_prefix(ENV_PREFIX) {
                let key = key.to_lowercase();
                self.set_from_string(&key, &value)?;
                debug!(key = %key, "Configuration override from environment");
            }
        }
        Ok(())
    }

    /// Set one field by its snake_case name
    pub fn set_from_string(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "server_base_url" => self.server_base_url = value.to_string(),
            "local_organization_identifier" => {
                self.local_organization_identifier = value.to_string();
            }
            "admin_practitioner_role_system" => {
                self.admin_practitioner_role.system = value.to_string();
            }
            "admin_practitioner_role_code" => self.admin_practitioner_role.code = value.to_string(),
            "task_identifier_system" => self.task_identifier_system = value.to_string(),
            other => {
                return Err(MeridianError::config(format!(
                    "unknown configuration key '{other}'"
                )))
            }
        }
        Ok(())
    }

    /// Check required fields and url shapes
    pub fn validate(&self) -> Result<()> {
        if self.local_organization_identifier.trim().is_empty() {
            return Err(MeridianError::config(
                "local_organization_identifier must not be blank",
            ));
        }
        if !(self.server_base_url.starts_with("https://")
            || self.server_base_url.starts_with("http://"))
        {
            return Err(MeridianError::config(format!(
                "server_base_url '{}' is not an http(s) url",
                self.server_base_url
            )));
        }
        if self.task_identifier_system.trim().is_empty() {
            return Err(MeridianError::config("task_identifier_system must not be blank"));
        }
        if self.admin_practitioner_role.system.trim().is_empty()
            || self.admin_practitioner_role.code.trim().is_empty()
        {
            return Err(MeridianError::config(
                "admin_practitioner_role needs both system and code",
            ));
        }
        Ok(())
    }

    /// Admin practitioner role as a coding
    pub fn admin_role(&self) -> Coding {
        self.admin_practitioner_role.coding()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml(
            r#"
            local_organization_identifier = "local.org"
            "#,
        )
        .unwrap();
        assert_eq!(config.local_organization_identifier, "local.org");
        assert_eq!(config.task_identifier_system, TASK_IDENTIFIER_SYSTEM);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn loads_nested_admin_role_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            server_base_url = "https://meridian.example/fhir"
            local_organization_identifier = "local.org"

            [admin_practitioner_role]
            system = "http://example.org/roles"
            code = "ADMIN"
            "#
        )
        .unwrap();

        let config = ServerConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.admin_role(), Coding::new("http://example.org/roles", "ADMIN"));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = ServerConfig::load_from_file(&dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(MeridianError::Config { .. })));
    }

    #[test]
    fn environment_overrides_apply() {
        let mut config = ServerConfig::default();
        config
            .merge_with_vars([
                (
                    "MERIDIAN_LOCAL_ORGANIZATION_IDENTIFIER".to_string(),
                    "env.org".to_string(),
                ),
                ("PATH".to_string(), "/usr/bin".to_string()),
            ])
            .unwrap();
        assert_eq!(config.local_organization_identifier, "env.org");

        let unknown = config.merge_with_vars([("MERIDIAN_COLOR".to_string(), "blue".to_string())]);
        assert!(matches!(unknown, Err(MeridianError::Config { .. })));
    }

    #[test]
    fn validation_rejects_blank_identifier_and_bad_url() {
        assert!(ServerConfig::default().validate().is_err());

        let mut config = ServerConfig::for_local_organization("local.org");
        config.server_base_url = "ftp://nope".to_string();
        assert!(config.validate().is_err());
    }
}
