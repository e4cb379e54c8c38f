//! Runtime configuration, read from TOML.
//!
//! ```toml
//! [transport]
//! repeat_attempts = 3
//! interest_lifetime_ms = 4000
//!
//! [producer]
//! owner_policy = "data-owner"
//!
//! [issuer]
//! token_lifetime_ms = 3600000
//! ```
use std::{fs, path::Path, time::Duration};
use serde::{Deserialize, Serialize};
use crate::error::AbacError;
use crate::utils::policy::Policy;

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NabacConfig {
    pub transport: TransportConfig,
    pub producer: ProducerConfig,
    pub issuer: IssuerConfig,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    /// Attempts per request before a transport error is terminal.
    pub repeat_attempts: u32,
    pub interest_lifetime_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig { repeat_attempts: 3, interest_lifetime_ms: 4000 }
    }
}

impl TransportConfig {
    pub fn interest_lifetime(&self) -> Duration {
        Duration::from_millis(self.interest_lifetime_ms)
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProducerConfig {
    /// When set, SET_POLICY commands must carry an attribute signature
    /// satisfying this policy.
    pub owner_policy: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IssuerConfig {
    /// How long an attribute token stays acceptable after issue.
    pub token_lifetime_ms: u64,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        IssuerConfig { token_lifetime_ms: 3_600_000 }
    }
}

impl IssuerConfig {
    pub fn token_lifetime(&self) -> Duration {
        Duration::from_millis(self.token_lifetime_ms)
    }
}

impl NabacConfig {
    pub fn from_toml_str(text: &str) -> Result<NabacConfig, AbacError> {
        let config: NabacConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<NabacConfig, AbacError> {
        let text = fs::read_to_string(path.as_ref()).map_err(|e| {
            AbacError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        NabacConfig::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), AbacError> {
        if self.transport.repeat_attempts == 0 {
            return Err(AbacError::Config("repeat_attempts must be at least 1".into()));
        }
        if self.transport.interest_lifetime_ms == 0 {
            return Err(AbacError::Config("interest_lifetime_ms must be positive".into()));
        }
        if self.issuer.token_lifetime_ms == 0 {
            return Err(AbacError::Config("token_lifetime_ms must be positive".into()));
        }
        if let Some(policy) = &self.producer.owner_policy {
            Policy::parse(policy)
                .map_err(|e| AbacError::Config(format!("owner_policy: {}", e)))?;
        }
        Ok(())
    }

    /// The parsed owner policy, if configured.
    pub fn owner_policy(&self) -> Result<Option<Policy>, AbacError> {
        self.producer.owner_policy.as_deref().map(Policy::parse).transpose()
    }
}
