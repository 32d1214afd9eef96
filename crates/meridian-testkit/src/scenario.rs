//! Seeded federation used by integration tests
//!
//! Seeds the local organization, REMOTE_ORG and OUTSIDER_ORG, the consortium
//! PARENT_ORG with LOCAL_ORG and REMOTE_ORG as DIC members, the organization
//! role code system, and the ping process definition.

use crate::builders::{affiliation, endpoint, organization, ping_authorization, process_definition, role_code_system};
use crate::fixtures::{
    BASE_URL, LOCAL_ORG, LOCAL_ORG_ID, OUTSIDER_ORG, OUTSIDER_ORG_ID, PARENT_ORG, PARENT_ORG_ID,
    REMOTE_ORG, REMOTE_ORG_ID, ROLE_DIC,
};
use meridian_authorization::{AuthorizationService, CommandExecutor, ProcessAuthorization};
use meridian_core::{NaturalKeys, Resource, ServerConfig};
use meridian_store::MemoryStore;
use std::sync::Arc;

/// A seeded in-memory store plus the matching configuration
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Seeded store
    pub store: Arc<MemoryStore>,
    /// Configuration naming LOCAL_ORG as the local organization
    pub config: ServerConfig,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario {
    /// The federation with the default ping authorization
    pub fn new() -> Self {
        Self::with_authorizations(&[ping_authorization()])
    }

    /// The federation with a ping process carrying `authorizations`; no
    /// process definition is stored when empty
    pub fn with_authorizations(authorizations: &[ProcessAuthorization]) -> Self {
        let scenario = Self::empty();
        scenario.seed([
            organization(LOCAL_ORG_ID, LOCAL_ORG),
            organization(REMOTE_ORG_ID, REMOTE_ORG),
            organization(OUTSIDER_ORG_ID, OUTSIDER_ORG),
            organization(PARENT_ORG_ID, PARENT_ORG),
            endpoint("local-endpoint", "https://local.example/fhir"),
            endpoint("remote-endpoint", "https://remote.example/fhir"),
            affiliation(PARENT_ORG, LOCAL_ORG, ROLE_DIC, "local-endpoint"),
            affiliation(PARENT_ORG, REMOTE_ORG, ROLE_DIC, "remote-endpoint"),
            role_code_system(),
        ]);
        if !authorizations.is_empty() {
            scenario.seed([process_definition(authorizations)]);
        }
        scenario
    }

    /// An empty store configured for LOCAL_ORG
    pub fn empty() -> Self {
        let config = ServerConfig {
            server_base_url: BASE_URL.to_string(),
            ..ServerConfig::for_local_organization(LOCAL_ORG)
        };
        let store = MemoryStore::with_keys(NaturalKeys::new(config.task_identifier_system.clone()));
        Self {
            store: Arc::new(store),
            config,
        }
    }

    /// Store `resources` without authorization; panics on failure
    pub fn seed(&self, resources: impl IntoIterator<Item = Resource>) -> Vec<Resource> {
        self.store.seed(resources).expect("seed resources")
    }

    /// Authorization service over the store
    pub fn service(&self) -> AuthorizationService<MemoryStore> {
        AuthorizationService::new(self.store.clone(), self.config.clone())
    }

    /// Command executor over the store
    pub fn executor(&self) -> CommandExecutor<MemoryStore> {
        CommandExecutor::new(self.service())
    }
}
