//! The structured server configuration.
//!
//! One JSON document under the server root. A missing file is written out
//! with defaults so a fresh deployment starts from something editable.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use voxgate_loop::LoopConfig;
use voxgate_protocol::{
    CodecConfig, CompressionKind, EncryptionKey, EncryptionKind, DEFAULT_PORT,
};
use voxgate_world::CacheConfig;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub event_loop: EventLoopConfig,
    pub chunk_generator: ChunkGeneratorConfig,
    pub seed_user: SeedUserConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkConfig {
    pub port: u16,
    pub compression: CompressionKind,
    pub encryption: EncryptionKind,
    pub encryption_key_base64: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            compression: CompressionKind::None,
            encryption: EncryptionKind::None,
            encryption_key_base64: String::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventLoopConfig {
    pub tick_interval_ms: u64,
    pub max_actions_per_tick: usize,
    pub slow_action_threshold_ms: u64,
    pub enable_detailed_metrics: bool,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            max_actions_per_tick: 256,
            slow_action_threshold_ms: 10,
            enable_detailed_metrics: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChunkGeneratorConfig {
    pub seed: i32,
    pub cache_expiration_minutes: u64,
    pub initial_chunk_radius: i32,
}

impl Default for ChunkGeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 1337,
            cache_expiration_minutes: 30,
            initial_chunk_radius: 2,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SeedUserConfig {
    pub email: String,
    pub password: String,
}

impl Default for SeedUserConfig {
    fn default() -> Self {
        Self {
            email: "admin@voxgate.local".into(),
            password: "change-me".into(),
        }
    }
}

impl ServerConfig {
    /// Reads the config file, creating it with defaults when absent.
    pub fn load_or_create(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config at {}", path.display()))?;
            let config = serde_json::from_str(&raw)
                .with_context(|| format!("parsing config at {}", path.display()))?;

            info!(path = %path.display(), "configuration loaded");
            Ok(config)
        } else {
            let config = Self::default();
            let raw = serde_json::to_string_pretty(&config)?;
            std::fs::write(path, raw)
                .with_context(|| format!("writing default config to {}", path.display()))?;

            info!(path = %path.display(), "default configuration written");
            Ok(config)
        }
    }
}

impl NetworkConfig {
    /// Resolves the codec the packet processor runs with.
    ///
    /// An enabled cipher with no configured key gets a generated one; the
    /// base64 form is logged once so the operator can pin it for clients.
    pub fn codec_config(&self) -> anyhow::Result<CodecConfig> {
        let key = if self.encryption == EncryptionKind::None {
            EncryptionKey::empty()
        } else if self.encryption_key_base64.trim().is_empty() {
            let key = EncryptionKey::generate(self.encryption);
            warn!(
                key = %key.to_base64(),
                "encryption enabled without a key; generated one for this run"
            );
            key
        } else {
            EncryptionKey::from_base64(&self.encryption_key_base64)
                .context("decoding network.encryptionKeyBase64")?
        };

        Ok(CodecConfig {
            compression: self.compression,
            encryption: self.encryption,
            key,
        })
    }
}

impl EventLoopConfig {
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            max_actions_per_tick: self.max_actions_per_tick,
            slow_action_threshold: Duration::from_millis(self.slow_action_threshold_ms),
            detailed_metrics: self.enable_detailed_metrics,
            ..LoopConfig::default()
        }
    }
}

impl ChunkGeneratorConfig {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.cache_expiration_minutes * 60),
            lru_capacity: None,
            initial_radius: self.initial_chunk_radius,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_file_gets_defaults_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voxgate.json");

        let config = ServerConfig::load_or_create(&path).unwrap();
        assert_eq!(config.network.port, DEFAULT_PORT);
        assert!(path.exists());

        // And the written file parses back to the same thing.
        let reloaded = ServerConfig::load_or_create(&path).unwrap();
        assert_eq!(reloaded.network.port, config.network.port);
        assert_eq!(reloaded.chunk_generator.seed, config.chunk_generator.seed);
    }

    #[test]
    fn documented_section_names_parse() {
        let raw = r#"{
            "network": {
                "port": 7700,
                "compression": "LZ4",
                "encryption": "ChaCha20Poly1305",
                "encryptionKeyBase64": ""
            },
            "eventLoop": { "tickIntervalMs": 25, "maxActionsPerTick": 64 },
            "chunkGenerator": { "seed": 42, "cacheExpirationMinutes": 5, "initialChunkRadius": 1 }
        }"#;

        let config: ServerConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.network.port, 7700);
        assert_eq!(config.network.compression, CompressionKind::Lz4);
        assert_eq!(config.network.encryption, EncryptionKind::ChaCha20Poly1305);
        assert_eq!(config.event_loop.tick_interval_ms, 25);
        assert_eq!(config.event_loop.max_actions_per_tick, 64);
        // Unlisted fields fall back to defaults.
        assert_eq!(config.event_loop.slow_action_threshold_ms, 10);
        assert_eq!(config.chunk_generator.initial_chunk_radius, 1);
    }

    #[test]
    fn enabled_encryption_without_key_generates_one() {
        let network = NetworkConfig {
            encryption: EncryptionKind::Aes256,
            ..NetworkConfig::default()
        };

        let codec = network.codec_config().unwrap();
        assert_eq!(codec.key.as_slice().len(), 32);
    }
}
