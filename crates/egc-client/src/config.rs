use serde::{Deserialize, Serialize};

use egc_identity::IdentityPolicy;
use egc_types::IdentityKey;

use crate::error::{CacheError, CacheResult};

/// When a query goes to the executor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPolicy {
    /// Always execute, then answer from the store.
    #[default]
    NetworkOnly,
    /// Answer from the store if the read is complete, otherwise execute.
    CacheFirst,
    /// Never execute; a miss is an error.
    CacheOnly,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Record holding root query fields.
    pub root_query_key: IdentityKey,
    /// Record holding root mutation fields.
    pub root_mutation_key: IdentityKey,
    /// Identity rules applied to types without a declared key.
    pub identity: IdentityPolicy,
    /// Policy used by [`EntityCache::query`](crate::EntityCache::query).
    pub fetch_policy: FetchPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root_query_key: IdentityKey::from(IdentityKey::ROOT_QUERY),
            root_mutation_key: IdentityKey::from(IdentityKey::ROOT_MUTATION),
            identity: IdentityPolicy::default(),
            fetch_policy: FetchPolicy::default(),
        }
    }
}

impl CacheConfig {
    pub fn from_toml_str(text: &str) -> CacheResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| CacheError::Config(e.to_string()))?;
        if config.root_query_key == config.root_mutation_key {
            return Err(CacheError::Config(format!(
                "query and mutation roots share key {}",
                config.root_query_key
            )));
        }
        Ok(config)
    }

    pub fn with_fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.fetch_policy = policy;
        self
    }

    pub fn with_identity(mut self, identity: IdentityPolicy) -> Self {
        self.identity = identity;
        self
    }
}
