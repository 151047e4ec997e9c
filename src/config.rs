//! Configuração carregada a partir de `faction-ops.toml`.
//!
//! Três seções: `[api]`, `[resilience]` e `[optimizer]`. Campos ausentes usam
//! os defaults abaixo. A variável de ambiente `FACTION_OPS_API_KEY` tem
//! precedência sobre o arquivo.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::api::{CircuitBreakerConfig, RetryPolicy};
use crate::error::Error;
use crate::optimizer::OptimizerConfig;

/// Arquivo procurado no diretório atual quando `--config` não é passado.
pub const DEFAULT_CONFIG_FILE: &str = "faction-ops.toml";

/// Variável de ambiente que sobrescreve `api.api_key`.
pub const API_KEY_ENV: &str = "FACTION_OPS_API_KEY";

/// Configuração de nível superior.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FactionOpsConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub resilience: ResilienceConfig,

    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

/// Endpoint e credencial da API de facções.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Chave da API. Vazia significa requisições sem cabeçalho de autorização.
    #[serde(default)]
    pub api_key: String,

    /// Timeout por requisição HTTP, em segundos.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pausa entre facções durante um `fetch`, em milissegundos.
    #[serde(default = "default_faction_delay_ms")]
    pub faction_delay_ms: u64,
}

/// Limitador, retentativas e circuit breaker.
#[derive(Debug, Clone, Deserialize)]
pub struct ResilienceConfig {
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Total de tentativas por chamada lógica.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_open_duration_ms")]
    pub open_duration_ms: u64,
}

fn default_base_url() -> String {
    "https://api.torn.com/v2".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_faction_delay_ms() -> u64 {
    5000
}

fn default_min_interval_ms() -> u64 {
    2000
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    2000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_open_duration_ms() -> u64 {
    60_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
            faction_delay_ms: default_faction_delay_ms(),
        }
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            failure_threshold: default_failure_threshold(),
            open_duration_ms: default_open_duration_ms(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn faction_delay(&self) -> Duration {
        Duration::from_millis(self.faction_delay_ms)
    }
}

impl ResilienceConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            multiplier: self.multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            open_duration: Duration::from_millis(self.open_duration_ms),
        }
    }
}

impl FactionOpsConfig {
    /// Carrega a configuração.
    ///
    /// Com `path` explícito o arquivo precisa existir. Sem ele, procura
    /// `faction-ops.toml` no diretório atual e usa os defaults se não achar.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    bail!("config file not found: {}", path.display());
                }
                Self::from_file(path)?
            }
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env_key(std::env::var(API_KEY_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = toml::from_str::<FactionOpsConfig>(&contents)
            .map_err(Error::from)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    // Variável de ambiente tem precedência sobre o arquivo para a chave API.
    fn apply_env_key(&mut self, value: Option<String>) {
        if let Some(key) = value
            && !key.is_empty()
        {
            self.api.api_key = key;
        }
    }

    fn validate(&self) -> crate::Result<()> {
        let r = &self.resilience;
        if !r.multiplier.is_finite() || r.multiplier < 1.0 {
            return Err(Error::Config(format!(
                "resilience.multiplier must be >= 1.0, got {}",
                r.multiplier
            )));
        }
        if r.failure_threshold == 0 {
            return Err(Error::Config(
                "resilience.failure_threshold must be at least 1".into(),
            ));
        }
        if !self.optimizer.qualify_threshold.is_finite() {
            return Err(Error::Config("optimizer.qualify_threshold must be finite".into()));
        }
        let min_score = self.optimizer.min_acceptance_score;
        if !min_score.is_finite() || min_score < 0.0 {
            return Err(Error::Config(format!(
                "optimizer.min_acceptance_score must be a finite non-negative number, got {min_score}"
            )));
        }
        Ok(())
    }
}
