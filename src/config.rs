use clap::builder::FalseyValueParser;
use clap::{Parser, ValueEnum};
use l2fwd_packet::{ChecksumUpdate, MutateOptions};

use crate::engine::{EngineConfig, UnitId};
use crate::error::ForwarderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChecksumMode {
    /// Bump the checksum field by one after the TTL decrement.
    Placeholder,
    /// RFC 1624 incremental update; keeps the header checksum correct.
    Incremental,
}

impl From<ChecksumMode> for ChecksumUpdate {
    fn from(mode: ChecksumMode) -> Self {
        match mode {
            ChecksumMode::Placeholder => ChecksumUpdate::Placeholder,
            ChecksumMode::Incremental => ChecksumUpdate::Incremental,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "l2fwd", version, about = "Forward frames between paired ports")]
pub struct Args {
    /// Execution unit that runs the polling loop.
    ///
    /// Environment variable: `L2FWD_FORWARDING_UNIT`.
    #[arg(long, env = "L2FWD_FORWARDING_UNIT", default_value_t = 1)]
    forwarding_unit: UnitId,

    /// Number of execution units, including the control unit 0.
    ///
    /// Defaults to the available parallelism (at least 2).
    ///
    /// Environment variable: `L2FWD_WORKERS`.
    #[arg(long, env = "L2FWD_WORKERS")]
    workers: Option<u32>,

    /// Leave Ethernet addresses untouched.
    ///
    /// Environment variable: `L2FWD_NO_MAC_SWAP`.
    #[arg(long, env = "L2FWD_NO_MAC_SWAP", value_parser = FalseyValueParser::new())]
    no_mac_swap: bool,

    /// Release IPv4 packets that fail header validation instead of forwarding them.
    ///
    /// Environment variable: `L2FWD_DROP_INVALID`.
    #[arg(long, env = "L2FWD_DROP_INVALID", value_parser = FalseyValueParser::new())]
    drop_invalid: bool,

    /// How the IPv4 header checksum follows the TTL decrement.
    ///
    /// `incremental` produces correct checksums and changes the bytes on the wire compared to the
    /// default.
    ///
    /// Environment variable: `L2FWD_CHECKSUM`.
    #[arg(
        long,
        env = "L2FWD_CHECKSUM",
        value_enum,
        default_value_t = ChecksumMode::Placeholder
    )]
    checksum: ChecksumMode,

    /// Number of simulated ports.
    ///
    /// Environment variable: `L2FWD_PORTS`.
    #[arg(long, env = "L2FWD_PORTS", default_value_t = 2)]
    ports: u16,

    /// Synthetic UDP frames queued on every port at startup.
    ///
    /// Environment variable: `L2FWD_SIM_FRAMES`.
    #[arg(long, env = "L2FWD_SIM_FRAMES", default_value_t = 0)]
    sim_frames: usize,

    /// Log filter (tracing-subscriber EnvFilter syntax). Falls back to `RUST_LOG`, then `info`.
    ///
    /// Environment variable: `L2FWD_LOG_LEVEL`.
    #[arg(long, env = "L2FWD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON.
    ///
    /// Environment variable: `L2FWD_LOG_JSON`.
    #[arg(long, env = "L2FWD_LOG_JSON", value_parser = FalseyValueParser::new())]
    log_json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwarderConfig {
    pub engine: EngineConfig,
    pub workers: u32,
    pub ports: u16,
    pub sim_frames: usize,
    pub log_level: Option<String>,
    pub log_json: bool,
}

impl ForwarderConfig {
    /// Parse the process command line and environment. Exits on `--help` or a usage error.
    ///
    /// The result is not validated yet; call [`ForwarderConfig::validate`] once logging is up.
    pub fn load() -> Self {
        Self::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Self {
        let log_level = args.log_level.and_then(|v| {
            let v = v.trim().to_string();
            (!v.is_empty()).then_some(v)
        });

        Self {
            engine: EngineConfig {
                forwarding_unit: args.forwarding_unit,
                mutate: MutateOptions {
                    mac_swap: !args.no_mac_swap,
                    checksum: args.checksum.into(),
                },
                drop_invalid: args.drop_invalid,
            },
            workers: args.workers.unwrap_or_else(default_workers),
            ports: args.ports,
            sim_frames: args.sim_frames,
            log_level,
            log_json: args.log_json,
        }
    }

    pub fn validate(&self) -> Result<(), ForwarderError> {
        if self.workers == 0 {
            return Err(ForwarderError::InvalidConfig(
                "at least one execution unit is required".to_string(),
            ));
        }
        let unit = self.engine.forwarding_unit;
        if unit == 0 || unit >= self.workers {
            return Err(ForwarderError::InvalidConfig(format!(
                "forwarding unit {unit} is not a worker unit (1..{})",
                self.workers
            )));
        }
        Ok(())
    }
}

fn default_workers() -> u32 {
    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    u32::try_from(cores).unwrap_or(u32::MAX).max(2)
}
