// src/utils/logging.rs
//! Logging configuration and utilities
//!
//! Sets up `env_logger` with the miner's line format. Every subsystem logs
//! through the `log` facade; this module only decides where lines go and
//! which levels pass.

use env_logger::{Builder, Target};
use log::LevelFilter;
use std::env;

/// Initializes the logging subsystem
///
/// `RUST_LOG` wins when it is set; otherwise `level` is applied to every
/// module.
pub fn init_logging(level: LevelFilter) {
    let mut builder = common_log_config();

    if env::var("RUST_LOG").is_ok() {
        builder.parse_env("RUST_LOG");
    } else {
        builder.filter_level(level);
    }

    // A second init (tests, embedding) keeps the first logger.
    let _ = builder.try_init();
}

/// Configures benchmark-specific logging (debug unless `RUST_LOG` says otherwise)
pub fn init_bench_logging() {
    init_logging(LevelFilter::Debug);
}

/// Parses a textual level such as `"info"` or `"warn"`, falling back to info
pub fn parse_level(level: &str) -> LevelFilter {
    level.parse().unwrap_or(LevelFilter::Info)
}

/// Creates a base logger builder with the common format:
/// `[<unix seconds> <level> <module>:<line>] <message>` on stdout.
fn common_log_config() -> Builder {
    let mut builder = Builder::new();

    builder
        .format(|buf, record| {
            use std::io::Write;
            let ts = buf.timestamp_seconds();
            let level = record.level();
            let module = record.module_path().unwrap_or_default();
            let line = record.line().unwrap_or(0);

            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                ts,
                level,
                module,
                line,
                record.args()
            )
        })
        .target(Target::Stdout);

    builder
}
