//! Rule dispatch by resource type

use crate::rule::{
    default_rule_configs, AuthorizationRule, BinaryRule, QuestionnaireResponseRule, TaggedResourceRule,
    TaskRule,
};
use meridian_core::{NaturalKeys, ResourceType, ServerConfig};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Maps every resource type to its authorization rule
pub struct AuthorizationRuleProvider {
    rules: HashMap<ResourceType, Box<dyn AuthorizationRule>>,
    keys: NaturalKeys,
}

impl AuthorizationRuleProvider {
    /// Provider without any rule; every lookup misses
    pub fn empty(keys: NaturalKeys) -> Self {
        Self {
            rules: HashMap::new(),
            keys,
        }
    }

    /// The rule table plus the Binary, Task and QuestionnaireResponse rules
    pub fn with_defaults(config: &ServerConfig) -> Self {
        let mut provider = Self::empty(NaturalKeys::new(config.task_identifier_system.clone()));
        for row in default_rule_configs() {
            provider.register(TaggedResourceRule::new(row));
        }
        provider.register(BinaryRule);
        provider.register(TaskRule);
        provider.register(QuestionnaireResponseRule);
        debug!(rules = provider.rules.len(), "Authorization rules registered");
        provider
    }

    /// Install `rule`, replacing any rule for the same type
    pub fn register(&mut self, rule: impl AuthorizationRule + 'static) {
        self.rules.insert(rule.resource_type(), Box::new(rule));
    }

    /// Rule guarding `resource_type`
    pub fn rule(&self, resource_type: ResourceType) -> Option<&dyn AuthorizationRule> {
        self.rules.get(&resource_type).map(|rule| rule.as_ref())
    }

    /// Natural keys used for duplicate and immutability checks
    pub fn keys(&self) -> &NaturalKeys {
        &self.keys
    }

    /// Types with a registered rule
    pub fn resource_types(&self) -> Vec<ResourceType> {
        let mut types: Vec<_> = self.rules.keys().copied().collect();
        types.sort_unstable();
        types
    }
}

impl fmt::Debug for AuthorizationRuleProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationRuleProvider")
            .field("resource_types", &self.resource_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_resource_type() {
        let provider = AuthorizationRuleProvider::with_defaults(&ServerConfig::default());
        assert_eq!(provider.resource_types(), ResourceType::ALL.to_vec());
        for rt in ResourceType::ALL {
            assert_eq!(provider.rule(*rt).map(|r| r.resource_type()), Some(*rt));
        }
    }

    #[test]
    fn empty_provider_has_no_rules() {
        let provider = AuthorizationRuleProvider::empty(NaturalKeys::default());
        assert!(provider.rule(ResourceType::Task).is_none());
    }
}
