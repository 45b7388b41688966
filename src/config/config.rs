// src/config/config.rs
use crate::network::endpoint::EndpointTable;
use crate::types::{AlgorithmType, SolverBackend};
use crate::utils::error::MinerError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the mining client
///
/// Loaded once at startup and never modified afterwards; runtime components
/// receive the pieces they need (endpoint table, solver settings) by value
/// or through shared immutable handles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Hash algorithm (e.g., "cryptonight-v7")
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Wallet address or pool username
    pub user: String,

    /// Worker password (often "x" if not required)
    #[serde(default = "default_password")]
    pub password: String,

    /// Pool URLs in priority order (first = preferred)
    pub pools: Vec<String>,

    /// Solver settings
    #[serde(default)]
    pub solver: SolverConfig,

    /// Seconds between metrics lines
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// Seconds between keepalive messages to the pool
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,

    /// Log level used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Solver backend selection and parallelism
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Backend to hash on
    #[serde(default)]
    pub backend: SolverBackend,

    /// Number of solvers (0 = one per CPU core)
    #[serde(default)]
    pub threads: usize,

    /// Nonces each solver hashes between job checks
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            backend: SolverBackend::default(),
            threads: 0,
            batch_size: default_batch_size(),
        }
    }
}

fn default_algorithm() -> String {
    "cryptonight-v7".into()
}

fn default_password() -> String {
    "x".into()
}

fn default_batch_size() -> u32 {
    16
}

fn default_stats_interval() -> u64 {
    10
}

fn default_keepalive() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Loads configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded and validated configuration
    /// * `Err(MinerError)` - If file couldn't be read, parsed or validated
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MinerError> {
        let path = path.into();
        let config_str = std::fs::read_to_string(&path).map_err(|e| {
            MinerError::ConfigError(format!(
                "Failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::parse(&config_str)
    }

    /// Parses and validates TOML text
    pub fn parse(text: &str) -> Result<Self, MinerError> {
        let config: Config = toml::from_str(text)
            .map_err(|e| MinerError::ConfigError(format!("Invalid config format: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints
    pub fn validate(&self) -> Result<(), MinerError> {
        self.algorithm_type()?;
        self.endpoints()?;
        if self.solver.batch_size == 0 {
            return Err(MinerError::ConfigError("solver.batch_size must be positive".into()));
        }
        if self.stats_interval_secs == 0 {
            return Err(MinerError::ConfigError("stats_interval_secs must be positive".into()));
        }
        Ok(())
    }

    /// Parsed algorithm
    pub fn algorithm_type(&self) -> Result<AlgorithmType, MinerError> {
        self.algorithm
            .parse()
            .map_err(|_| MinerError::ConfigError(format!("Invalid algorithm: {}", self.algorithm)))
    }

    /// Endpoint table built from `pools`
    pub fn endpoints(&self) -> Result<EndpointTable, MinerError> {
        EndpointTable::from_urls(&self.pools)
    }

    /// Effective solver count
    pub fn solver_threads(&self) -> usize {
        match self.solver.threads {
            0 => num_cpus::get(),
            n => n,
        }
    }

    /// Metrics period
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    /// Keepalive period, `None` when disabled (0)
    pub fn keepalive_interval(&self) -> Option<Duration> {
        (self.keepalive_secs > 0).then(|| Duration::from_secs(self.keepalive_secs))
    }

    /// Generates a configuration template string
    ///
    /// # Arguments
    /// * `tls` - Use a TLS pool URL in the example
    ///
    /// # Returns
    /// String containing a commented TOML configuration template
    pub fn generate_template(tls: bool) -> String {
        let scheme = if tls { "stratum+ssl" } else { "stratum+tcp" };
        let mut template = String::new();
        template.push_str("# CryptoNight Miner Configuration\n\n");
        template.push_str("# Supported algorithms: cryptonight, cryptonight-v7, cryptonight-r\n");
        template.push_str("algorithm = \"cryptonight-v7\"\n");
        template.push_str("user = \"your_wallet_address\"\n");
        template.push_str("password = \"x\"\n");
        template.push_str("# Pools in priority order; the first reachable one is used\n");
        template.push_str("pools = [\n");
        template.push_str(&format!("    \"{}://pool.example.com:3333\",\n", scheme));
        template.push_str(&format!("    \"{}://backup.example.com:3333\",\n", scheme));
        template.push_str("]\n");
        template.push_str("stats_interval_secs = 10\n");
        template.push_str("keepalive_secs = 60\n");
        template.push_str("log_level = \"info\"\n\n");
        template.push_str("[solver]\n");
        template.push_str("# Backends: cpu, opencl, vulkan\n");
        template.push_str("backend = \"cpu\"\n");
        template.push_str("# Number of solvers (0 = auto-detect)\n");
        template.push_str("threads = 0\n");
        template.push_str("# Nonces per solver batch\n");
        template.push_str("batch_size = 16\n");

        template
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_back() {
        for tls in [false, true] {
            let config = Config::parse(&Config::generate_template(tls)).unwrap();
            assert_eq!(config.pools.len(), 2);
            let endpoints = config.endpoints().unwrap();
            assert_eq!(endpoints[0].use_tls, tls);
            assert_eq!(config.solver.backend, SolverBackend::Cpu);
            assert_eq!(config.algorithm_type().unwrap(), AlgorithmType::CryptoNightV7);
        }
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let config = Config::parse("user = \"w\"\npools = [\"pool:3333\"]\n").unwrap();
        assert_eq!(config.password, "x");
        assert_eq!(config.solver.batch_size, 16);
        assert_eq!(config.stats_interval(), Duration::from_secs(10));
        assert!(config.solver_threads() >= 1);
    }

    #[test]
    fn empty_pool_list_is_rejected() {
        assert!(Config::parse("user = \"w\"\npools = []\n").is_err());
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let text = "algorithm = \"sha256\"\nuser = \"w\"\npools = [\"pool:3333\"]\n";
        assert!(matches!(Config::parse(text), Err(MinerError::ConfigError(_))));
    }
}
