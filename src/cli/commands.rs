// src/cli/commands.rs
use crate::types::{AlgorithmType, SolverBackend};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CryptoNight pool miner with priority failover
#[derive(Parser, Debug)]
#[command(name = "cn-miner-rs")]
#[command(version, about, long_about = None)]
pub struct Commands {
    /// The action to perform (start mining, run benchmarks, or generate config)
    #[command(subcommand)]
    pub action: Action,
}

/// Top-level commands for the miner application
#[derive(Subcommand, Debug)]
pub enum Action {
    /// Start mining operation with specified options
    Start(StartOptions),

    /// Run the solver pool on a synthetic job and report hash rates
    Benchmark(BenchmarkOptions),

    /// Generate configuration file template
    Config(ConfigOptions),
}

/// Options for starting the mining operation
#[derive(Parser, Debug)]
pub struct StartOptions {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Number of solvers to run (overrides config)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Hash algorithm to use (overrides config)
    #[arg(short, long)]
    pub algorithm: Option<AlgorithmType>,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

/// Options for running mining benchmarks
#[derive(Parser, Debug)]
pub struct BenchmarkOptions {
    /// Algorithm to benchmark
    #[arg(short, long, default_value = "cryptonight-v7")]
    pub algorithm: AlgorithmType,

    /// Solver backend to benchmark
    #[arg(short, long, default_value = "cpu")]
    pub backend: SolverBackend,

    /// Duration of benchmark in seconds
    #[arg(short, long, default_value_t = 60)]
    pub duration: u64,

    /// Number of solvers to use
    #[arg(short, long, default_value_t = num_cpus::get())]
    pub threads: usize,
}

/// Options for generating configuration files
#[derive(Parser, Debug)]
pub struct ConfigOptions {
    /// Output file path
    #[arg(short, long, default_value = "config.toml")]
    pub output: PathBuf,

    /// Use TLS pool URLs in the template
    #[arg(long)]
    pub tls: bool,
}
