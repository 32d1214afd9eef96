//! Configuration, seed and identity loading

use anyhow::{anyhow, bail, Context, Result};
use meridian_authorization::{AuthorizationRequest, AuthorizationService, CommandExecutor, Decision};
use meridian_core::{Identity, NaturalKeys, Resource, ResourceType, ServerConfig};
use meridian_store::{MemoryStore, ResourceStore};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Load `path` if it exists, apply environment overrides, validate
pub fn load_config(path: &Path) -> Result<ServerConfig> {
    let mut config = if path.exists() {
        ServerConfig::load_from_file(path)?
    } else {
        debug!(path = %path.display(), "Config file absent, using defaults");
        ServerConfig::default()
    };
    config.merge_with_env()?;
    config.validate()?;
    Ok(config)
}

/// Parse JSON from a file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// `Type/id` into its parts
pub fn parse_target(target: &str) -> Result<(ResourceType, String)> {
    let (type_name, id) = target
        .split_once('/')
        .ok_or_else(|| anyhow!("expected Type/id, got '{target}'"))?;
    if id.is_empty() || id.contains('/') {
        bail!("expected Type/id, got '{target}'");
    }
    Ok((type_name.parse()?, id.to_string()))
}

/// Seeded store, authorization service and acting identity
pub struct Session {
    /// Executor over the seeded store
    pub executor: CommandExecutor<MemoryStore>,
    /// Acting identity
    pub identity: Identity,
}

impl Session {
    /// Seed a store from `seed` and load the identity from `identity`
    pub fn open(config: ServerConfig, seed: &Path, identity: &Path) -> Result<Self> {
        let store = MemoryStore::with_keys(NaturalKeys::new(config.task_identifier_system.clone()));
        let text = std::fs::read_to_string(seed).with_context(|| format!("reading {}", seed.display()))?;
        let seeded = store.seed_json(&text)?;
        info!(resources = seeded.len(), "Seeded store");

        let identity: Identity = read_json(identity)?;
        Ok(Self {
            executor: CommandExecutor::new(AuthorizationService::new(Arc::new(store), config)),
            identity,
        })
    }

    /// Decide `request` for the session identity
    pub async fn authorize(&self, request: AuthorizationRequest<'_>) -> Result<Decision> {
        Ok(self.executor.service().authorize(&self.identity, request).await?)
    }

    /// The non-deleted resource named by `Type/id`
    pub async fn live(&self, target: &str) -> Result<Resource> {
        let (resource_type, id) = parse_target(target)?;
        self.stored(resource_type, &id, false).await
    }

    /// The resource named by `Type/id`, deleted or not
    pub async fn any(&self, target: &str) -> Result<Resource> {
        let (resource_type, id) = parse_target(target)?;
        self.stored(resource_type, &id, true).await
    }

    async fn stored(&self, resource_type: ResourceType, id: &str, include_deleted: bool) -> Result<Resource> {
        match self.executor.service().store().read(resource_type, id).await? {
            Some(stored) if include_deleted || !stored.deleted => Ok(stored.resource),
            _ => bail!("{resource_type}/{id} not found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn targets_need_type_and_id() {
        let (rt, id) = parse_target("Task/42").unwrap();
        assert_eq!((rt, id.as_str()), (ResourceType::Task, "42"));
        assert!(parse_target("Task").is_err());
        assert!(parse_target("Task/").is_err());
        assert!(parse_target("Nope/1").is_err());
        assert!(parse_target("Task/1/_history/2").is_err());
    }

    #[test]
    fn config_file_is_validated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server_base_url = \"ftp://local.example\"").unwrap();
        writeln!(file, "local_organization_identifier = \"local.example\"").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn session_seeds_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed.json");
        std::fs::write(
            &seed,
            r#"[{"resourceType":"NamingSystem","id":"ns","name":"ns","status":"active"}]"#,
        )
        .unwrap();
        let identity = dir.path().join("identity.json");
        std::fs::write(&identity, r#"{"name":"cli","kind":"local","roles":[]}"#).unwrap();

        let session = Session::open(
            ServerConfig::for_local_organization("local.example"),
            &seed,
            &identity,
        )
        .unwrap();
        assert_eq!(session.identity.name, "cli");
        assert_eq!(session.executor.service().store().state().live_count(), 1);
    }
}
