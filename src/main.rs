// src/main.rs
use clap::Parser;
use cn_miner_rs::miner::algorithm::cryptonight::CryptoNightAlgo;
use cn_miner_rs::miner::solver;
use cn_miner_rs::protocol::StratumSession;
use cn_miner_rs::utils::logging::{init_bench_logging, parse_level};
use cn_miner_rs::*;
use log::LevelFilter;
use std::sync::Arc;
use std::time::Duration;

/// Main entry point for the miner
///
/// Parses command line arguments and delegates to the subcommand handler.
fn main() -> Result<(), MinerError> {
    let cli = cli::Commands::parse();

    match cli.action {
        cli::Action::Start(opts) => start_mining(opts),
        cli::Action::Benchmark(opts) => run_benchmark(opts),
        cli::Action::Config(opts) => generate_config(opts),
    }
}

/// Starts mining with the given configuration
///
/// # Operations
/// 1. Loads configuration and applies CLI overrides
/// 2. Initializes logging
/// 3. Builds the solvers and starts their worker threads
/// 4. Runs the connection pool and orchestrator on a single-threaded reactor
///    until Ctrl-C
fn start_mining(opts: cli::StartOptions) -> Result<(), MinerError> {
    let mut config = config::load(&opts.config)?;
    // Apply CLI overrides
    if let Some(workers) = opts.workers {
        config.solver.threads = workers;
    }
    if let Some(algo) = opts.algorithm {
        config.algorithm = algo.to_string();
    }

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        parse_level(&config.log_level)
    };
    init_logging(level);

    let endpoints = config.endpoints()?;
    let algorithm = create_algorithm(config.algorithm_type()?);
    let solvers = solver::build(
        config.solver.backend,
        algorithm,
        config.solver_threads(),
        config.solver.batch_size,
    )?;

    log::info!(
        "Mining {} with {} {} solver(s) across {} pool(s)",
        config.algorithm,
        solvers.len(),
        config.solver.backend,
        endpoints.len()
    );

    // Reactor: one thread owns all network I/O and timers
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        let transport = TcpTransport::new()?;
        let connections = ConnectionPool::new(endpoints, transport)?;
        let solver_pool = SolverPool::new(solvers, config.stats_interval())?;
        let session = StratumSession::new(config.user.clone(), config.password.clone());

        let foreman = Foreman::new(connections, solver_pool, session, config.keepalive_interval());
        foreman
            .run(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::error!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            })
            .await
    })
}

/// Runs the solver pool on a synthetic job
///
/// # Operations
/// 1. Initializes benchmark-specific logging
/// 2. Builds the requested solvers
/// 3. Publishes one job with an unreachable target
/// 4. Collects metrics ticks for the requested duration
fn run_benchmark(opts: cli::BenchmarkOptions) -> Result<(), MinerError> {
    init_bench_logging();

    let algorithm = create_algorithm(opts.algorithm);
    let solvers = solver::build(opts.backend, algorithm, opts.threads.max(1), 16)?;

    log::info!(
        "Starting {} benchmark for {} seconds on {} solver(s)",
        opts.algorithm,
        opts.duration,
        solvers.len()
    );

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        let mut pool = SolverPool::new(solvers, Duration::from_secs(5))?;
        pool.new_job("benchmark", vec![0u8; 76], 0)?;

        let deadline = tokio::time::sleep(Duration::from_secs(opts.duration));
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                event = pool.next_event() => match event {
                    Some(SolverEvent::MetricsTick(report)) => log::debug!("{}", report),
                    Some(SolverEvent::SolutionFound(_)) => {}
                    None => break,
                },
            }
        }

        // Report final results
        let report = pool.metrics();
        pool.stop();
        log::info!("Benchmark results:");
        log::info!("Total hashes: {}", report.hashes_total());
        log::info!("Average hashrate: {:.2} H/s", report.avg_hashrate());
        for solver in &report.solvers {
            log::info!("  {}", solver);
        }
        log::logger().flush(); // Ensure final results appear
        Ok(())
    })
}

/// Writes the configuration template to the requested file
fn generate_config(opts: cli::ConfigOptions) -> Result<(), MinerError> {
    let config = config::generate_template(opts.tls);
    std::fs::write(opts.output, config)?;
    Ok(())
}

/// Creates the hash function for `algo`
fn create_algorithm(algo: AlgorithmType) -> Arc<dyn Algorithm> {
    Arc::new(CryptoNightAlgo::new(algo))
}
