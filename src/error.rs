use l2fwd_io::{IoError, PortId};

/// Fatal startup failures. Per-packet problems never surface here.
#[derive(Debug, thiserror::Error)]
pub enum ForwarderError {
    #[error("failed to set up port {port}")]
    DeviceSetupFailure {
        port: PortId,
        #[source]
        source: IoError,
    },

    #[error("number of ports must be even and at least 2 (found {ports})")]
    InvalidTopology { ports: u16 },

    #[error("failed to launch execution unit {unit}")]
    UnitSpawn {
        unit: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
