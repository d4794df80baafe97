use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use prv_ledger::REGISTRY_PROGRAM;
use prv_types::Address;

use crate::retry::BackoffPolicy;

/// Client configuration. Durations are in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Registry program, as 64 hex characters.
    #[serde(with = "address_hex")]
    pub program: Address,
    /// How long to wait for a submitted transaction to be confirmed.
    pub submit_timeout_ms: u64,
    pub reader: ReaderConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            program: REGISTRY_PROGRAM,
            submit_timeout_ms: 30_000,
            reader: ReaderConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}

/// Settings of the resilient registry reader.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Minimum spacing between non-forced refreshes.
    pub cooldown_ms: u64,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
    pub max_retries: u32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 2_000,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_ms: 1_000,
            max_retries: 3,
        }
    }
}

impl ReaderConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(self.base_delay_ms),
            cap: Duration::from_millis(self.max_delay_ms),
            jitter: Duration::from_millis(self.jitter_ms),
            max_retries: self.max_retries,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

mod address_hex {
    use prv_types::Address;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&address.to_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = ClientConfig::default();
        assert_eq!(config.submit_timeout(), Duration::from_secs(30));
        assert_eq!(config.reader.cooldown(), Duration::from_secs(2));
        assert_eq!(config.reader.backoff(), BackoffPolicy::default());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
            submit_timeout_ms = 5000

            [reader]
            max_retries = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.submit_timeout_ms, 5_000);
        assert_eq!(config.reader.max_retries, 5);
        assert_eq!(config.reader.cooldown_ms, 2_000);
        assert_eq!(config.program, REGISTRY_PROGRAM);
    }

    #[test]
    fn program_is_hex() {
        let hex = "11".repeat(32);
        let config = ClientConfig::from_toml_str(&format!("program = \"{hex}\"")).unwrap();
        assert_eq!(config.program, Address::from_raw([0x11; 32]));
        assert!(ClientConfig::from_toml_str("program = \"zz\"").is_err());
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[reader]\ncooldown_ms = 10").unwrap();
        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.reader.cooldown_ms, 10);
        assert!(matches!(
            ClientConfig::load("/nonexistent/prv.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
