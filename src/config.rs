use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::backend::node::NodeConfig;
use crate::error::CommandRejection;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    // Reproductor
    pub default_volume: u16,
    pub volume_min: u16,
    pub volume_max: u16,
    pub history_limit: usize,
    pub queue_preview: usize,

    // Temporizadores (ventanas deliberadas, no timeouts)
    pub idle_timeout: Duration,
    pub track_end_grace: Duration,
    pub exception_cooldown: Duration,
    pub refresh_debounce: Duration,

    // Nodos de audio
    pub node_retry_limit: u32,
    pub node_backoff_start: Duration,
    pub node_backoff_step: Duration,
    pub nodes: Vec<NodeConfig>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = Self {
            // Reproductor
            default_volume: env_parse("DEFAULT_VOLUME", 100)?,
            volume_min: env_parse("VOLUME_MIN", 5)?,
            volume_max: env_parse("VOLUME_MAX", 100)?,
            history_limit: env_parse("HISTORY_LIMIT", 20)?,
            queue_preview: env_parse("QUEUE_PREVIEW", 3)?,

            // Temporizadores
            idle_timeout: Duration::from_secs(env_parse("IDLE_TIMEOUT_SECS", 180)?),
            track_end_grace: Duration::from_millis(env_parse("TRACK_END_GRACE_MS", 500)?),
            exception_cooldown: Duration::from_secs(env_parse("EXCEPTION_COOLDOWN_SECS", 6)?),
            refresh_debounce: Duration::from_secs(env_parse("REFRESH_DEBOUNCE_SECS", 5)?),

            // Nodos
            node_retry_limit: env_parse("NODE_RETRY_LIMIT", 25)?,
            node_backoff_start: Duration::from_secs(env_parse("NODE_BACKOFF_START_SECS", 7)?),
            node_backoff_step: Duration::from_secs(env_parse("NODE_BACKOFF_STEP_SECS", 2)?),
            nodes: load_nodes()?,
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Valida la configuración antes de usarla.
    pub fn validate(&self) -> Result<()> {
        if self.volume_min == 0 {
            anyhow::bail!("VOLUME_MIN debe ser mayor que 0");
        }

        if self.volume_min >= self.volume_max {
            anyhow::bail!(
                "VOLUME_MIN ({}) debe ser menor que VOLUME_MAX ({})",
                self.volume_min,
                self.volume_max
            );
        }

        if self.default_volume < self.volume_min || self.default_volume > self.volume_max {
            anyhow::bail!(
                "DEFAULT_VOLUME debe estar entre {} y {}",
                self.volume_min,
                self.volume_max
            );
        }

        if self.history_limit == 0 {
            anyhow::bail!("HISTORY_LIMIT debe ser mayor que 0");
        }

        if self.node_retry_limit == 0 {
            anyhow::bail!("NODE_RETRY_LIMIT debe ser mayor que 0");
        }

        for node in &self.nodes {
            node.endpoint()?;
        }

        Ok(())
    }

    /// Validación del lado del invocador: el núcleo solo recibe
    /// volúmenes ya acotados al rango configurado.
    pub fn parse_volume(&self, value: i64) -> Result<u16, CommandRejection> {
        if value < self.volume_min as i64 || value > self.volume_max as i64 {
            return Err(CommandRejection::VolumeOutOfRange {
                min: self.volume_min,
                max: self.volume_max,
            });
        }
        Ok(value as u16)
    }

    /// Parsea la lista de nodos del formato JSON de `AUDIO_NODES`.
    pub fn parse_nodes(json: &str) -> Result<Vec<NodeConfig>> {
        let nodes: Vec<NodeConfig> = serde_json::from_str(json)?;
        Ok(nodes)
    }
}

fn load_nodes() -> Result<Vec<NodeConfig>> {
    if let Ok(json) = std::env::var("AUDIO_NODES") {
        return Settings::parse_nodes(&json);
    }

    // Fallback: un único nodo descrito por variables sueltas
    let Ok(host) = std::env::var("LAVALINK_HOST") else {
        return Ok(Vec::new());
    };

    Ok(vec![NodeConfig {
        host,
        port: env_parse("LAVALINK_PORT", 2333)?,
        password: std::env::var("LAVALINK_PASSWORD")
            .unwrap_or_else(|_| "youshallnotpass".to_string()),
        identifier: std::env::var("LAVALINK_IDENTIFIER").unwrap_or_else(|_| "main".to_string()),
        region: std::env::var("LAVALINK_REGION").unwrap_or_default(),
        secure: env_parse("LAVALINK_SECURE", false)?,
    }])
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().parse()?),
        _ => Ok(default),
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_volume: 100,
            volume_min: 5,
            volume_max: 100,
            history_limit: 20,
            queue_preview: 3,

            idle_timeout: Duration::from_secs(180),
            track_end_grace: Duration::from_millis(500),
            exception_cooldown: Duration::from_secs(6),
            refresh_debounce: Duration::from_secs(5),

            node_retry_limit: 25,
            node_backoff_start: Duration::from_secs(7),
            node_backoff_step: Duration::from_secs(2),
            nodes: Vec::new(),
        }
    }
}
