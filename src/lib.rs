//! Two-port-pair L2/L3 forwarder.
//!
//! Frames received on port `p` leave on port `p ^ 1` after an optional MAC swap and an IPv4 TTL
//! decrement. Device access goes through [`l2fwd_io::PacketIo`]; header work is done by
//! [`l2fwd_packet`].
#![forbid(unsafe_code)]

pub mod affinity;
pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod pairing;
pub mod shutdown;

pub use affinity::Pinning;
pub use bootstrap::init_ports;
pub use config::ForwarderConfig;
pub use engine::{
    launch_units, EngineConfig, EngineCounters, EngineReport, EngineState, ForwardingEngine,
    PortOutcome, UnitId, MAX_BURST,
};
pub use error::ForwarderError;
pub use monitor::{check_link_status, report_stats, write_stats_report, LinkSummary};
pub use pairing::{check_topology, pair_of};
pub use shutdown::ShutdownController;
