use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use url::Url;

use crate::config::Settings;
use crate::error::PlayerError;

/// Descriptor de un nodo de audio remoto.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub identifier: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub secure: bool,
}

impl NodeConfig {
    pub fn rest_uri(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    pub fn endpoint(&self) -> Result<Url> {
        Url::parse(&self.rest_uri())
            .with_context(|| format!("endpoint inválido para el nodo [{}]", self.identifier))
    }
}

/// Estadísticas operativas reportadas periódicamente por un nodo.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeStats {
    pub players: u32,
    pub playing_players: u32,
    pub uptime_ms: u64,
    pub memory_used: u64,
    pub memory_free: u64,
    pub memory_allocated: u64,
    pub cpu_cores: u32,
    pub system_load: f64,
    pub lavalink_load: f64,
}

impl NodeStats {
    /// Penalización de carga usada para elegir el mejor nodo: jugadores
    /// activos más una penalización exponencial por CPU.
    pub fn penalty(&self) -> f64 {
        let player_penalty = self.playing_players as f64;
        let cpu_penalty = 1.05_f64.powf(100.0 * self.system_load) * 10.0 - 10.0;
        player_penalty + cpu_penalty
    }
}

/// Nodo registrado en el pool.
#[derive(Debug)]
pub struct Node {
    config: NodeConfig,
    available: AtomicBool,
    stats: RwLock<Option<(NodeStats, DateTime<Utc>)>>,
}

impl Node {
    fn new(config: NodeConfig) -> Self {
        Self {
            config,
            available: AtomicBool::new(true),
            stats: RwLock::new(None),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.config.identifier
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    fn penalty(&self) -> f64 {
        self.stats
            .read()
            .as_ref()
            .map(|(s, _)| s.penalty())
            .unwrap_or(0.0)
    }
}

/// Vista de solo lectura de un nodo para reportes operativos.
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub identifier: String,
    pub region: String,
    pub available: bool,
    pub stats: Option<NodeStats>,
    pub stats_updated_at: Option<DateTime<Utc>>,
}

/// Pool de nodos de audio: registro con reintentos, selección por carga
/// y estadísticas para reportes.
pub struct NodePool {
    nodes: DashMap<String, Arc<Node>>,
    http: reqwest::Client,
    settings: Arc<Settings>,
}

impl NodePool {
    pub fn new(settings: Arc<Settings>) -> Arc<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Arc::new(Self {
            nodes: DashMap::new(),
            http,
            settings,
        })
    }

    /// Lanza la conexión de todos los nodos configurados en segundo plano.
    pub fn spawn_connect_all(self: &Arc<Self>) {
        for node in self.settings.nodes.clone() {
            self.spawn_connect(node);
        }
    }

    pub fn spawn_connect(self: &Arc<Self>, config: NodeConfig) {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            pool.connect(config).await;
        });
    }

    /// Sondea el endpoint HTTP del nodo con un presupuesto acotado de
    /// reintentos y backoff lineal; al responder lo registra para el
    /// ruteo de reproducción. Agotar los reintentos abandona el nodo
    /// sin tumbar el proceso.
    pub async fn connect(&self, config: NodeConfig) {
        let endpoint = match config.endpoint() {
            Ok(url) => url,
            Err(e) => {
                error!("❌ Nodo [{}] descartado: {:?}", config.identifier, e);
                return;
            }
        };

        let limit = self.settings.node_retry_limit;
        let mut backoff = self.settings.node_backoff_start;
        let mut attempt = 1u32;

        loop {
            if attempt >= limit {
                error!(
                    "❌ Todas las tentativas de conectar al nodo [{}] fallaron.",
                    config.identifier
                );
                return;
            }

            // Cualquier respuesta HTTP cuenta como nodo alcanzable
            match self.http.get(endpoint.clone()).send().await {
                Ok(_) => break,
                Err(_) => {
                    warn!(
                        "🔄 Falla al conectar al nodo [{}], tentativa: {}/{}",
                        config.identifier, attempt, limit
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                    backoff += self.settings.node_backoff_step;
                }
            }
        }

        info!(
            "✅ Servidor de música [{}] está listo para uso!",
            config.identifier
        );
        let identifier = config.identifier.clone();
        self.nodes.insert(identifier, Arc::new(Node::new(config)));
    }

    /// Devuelve el nodo disponible con la carga más favorable.
    pub fn best_node(&self) -> Result<Arc<Node>, PlayerError> {
        self.nodes
            .iter()
            .filter(|entry| entry.value().is_available())
            .min_by(|a, b| {
                a.value()
                    .penalty()
                    .total_cmp(&b.value().penalty())
            })
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(PlayerError::NoNodeAvailable)
    }

    /// Ingiere estadísticas frescas de un nodo.
    pub fn record_stats(&self, identifier: &str, stats: NodeStats) {
        if let Some(node) = self.nodes.get(identifier) {
            *node.stats.write() = Some((stats, Utc::now()));
        }
    }

    /// Excluye un nodo de la selección (caída detectada por el transporte).
    pub fn mark_unavailable(&self, identifier: &str) {
        if let Some(node) = self.nodes.get(identifier) {
            node.available.store(false, Ordering::Release);
            warn!("⚠️ Nodo [{}] excluido de la selección", identifier);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Reportes de solo lectura para el comando de estadísticas.
    pub fn reports(&self) -> Vec<NodeReport> {
        self.nodes
            .iter()
            .map(|entry| {
                let node = entry.value();
                let snapshot = node.stats.read().clone();
                let (stats, updated) = match snapshot {
                    Some((s, at)) => (Some(s), Some(at)),
                    None => (None, None),
                };
                NodeReport {
                    identifier: node.config.identifier.clone(),
                    region: node.config.region.clone(),
                    available: node.is_available(),
                    stats,
                    stats_updated_at: updated,
                }
            })
            .collect()
    }
}
