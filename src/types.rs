// src/types.rs
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported CryptoNight hashing variants
///
/// The variant decides which tweaks the CryptoNight primitive applies; the
/// job dispatch machinery is identical for all of them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum AlgorithmType {
    /// Original CryptoNight (variant 0)
    #[clap(name = "cryptonight")]
    CryptoNight,

    /// CryptoNight variant 7 algorithm (legacy)
    ///
    /// Monero's PoW between March 2018 and the CryptoNight-R fork.
    #[clap(name = "cryptonight-v7")]
    CryptoNightV7,

    /// CryptoNight-R algorithm (legacy)
    #[clap(name = "cryptonight-r")]
    CryptoNightR,
}

impl AlgorithmType {
    /// Variant number understood by the CryptoNight primitive
    pub fn variant(self) -> i32 {
        match self {
            AlgorithmType::CryptoNight => 0,
            AlgorithmType::CryptoNightV7 => 1,
            AlgorithmType::CryptoNightR => 4,
        }
    }
}

impl fmt::Display for AlgorithmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgorithmType::CryptoNight => write!(f, "cryptonight"),
            AlgorithmType::CryptoNightV7 => write!(f, "cryptonight-v7"),
            AlgorithmType::CryptoNightR => write!(f, "cryptonight-r"),
        }
    }
}

impl FromStr for AlgorithmType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cn" | "cn/0" | "cryptonight" => Ok(AlgorithmType::CryptoNight),
            "cnv7" | "cn/1" | "cryptonight-v7" => Ok(AlgorithmType::CryptoNightV7),
            "cnr" | "cn/r" | "cryptonight-r" => Ok(AlgorithmType::CryptoNightR),
            _ => Err(format!("Unknown algorithm: {}", s)),
        }
    }
}

/// Hashing backend a solver runs on
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverBackend {
    /// One OS thread hashing on the CPU
    #[default]
    Cpu,
    /// OpenCL compute kernel
    #[clap(name = "opencl")]
    OpenCl,
    /// Vulkan compute kernel
    Vulkan,
}

impl fmt::Display for SolverBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverBackend::Cpu => write!(f, "cpu"),
            SolverBackend::OpenCl => write!(f, "opencl"),
            SolverBackend::Vulkan => write!(f, "vulkan"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_aliases_parse() {
        assert_eq!("cn/1".parse::<AlgorithmType>(), Ok(AlgorithmType::CryptoNightV7));
        assert_eq!("CryptoNight-R".parse::<AlgorithmType>(), Ok(AlgorithmType::CryptoNightR));
        assert!("randomx".parse::<AlgorithmType>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for algo in [
            AlgorithmType::CryptoNight,
            AlgorithmType::CryptoNightV7,
            AlgorithmType::CryptoNightR,
        ] {
            assert_eq!(algo.to_string().parse::<AlgorithmType>(), Ok(algo));
        }
    }
}
