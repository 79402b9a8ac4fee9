use l2fwd_io::{PacketIo, QueueConfig};

use crate::error::ForwarderError;

/// Configure, start and set promiscuous mode on every port, in port order.
///
/// The first failing port aborts the whole bring-up.
pub fn init_ports<P: PacketIo + ?Sized>(io: &P) -> Result<(), ForwarderError> {
    let queues = QueueConfig::default();
    for port in 0..io.port_count() {
        io.configure_port(port, &queues)
            .and_then(|()| io.start_port(port))
            .map_err(|source| ForwarderError::DeviceSetupFailure { port, source })?;
        io.enable_promiscuous(port);
        tracing::debug!(
            port,
            rx_ring = queues.rx_ring_size,
            tx_ring = queues.tx_ring_size,
            "port started"
        );
    }
    Ok(())
}
