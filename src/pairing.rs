use l2fwd_io::PortId;

use crate::error::ForwarderError;

/// Port that frames received on `port` are transmitted out of.
///
/// Ports are paired `0<->1`, `2<->3`, ...; only meaningful for an even port count.
#[inline]
pub const fn pair_of(port: PortId) -> PortId {
    port ^ 1
}

/// Accept only topologies where every port has a partner.
pub fn check_topology(ports: u16) -> Result<(), ForwarderError> {
    if ports < 2 || ports % 2 != 0 {
        return Err(ForwarderError::InvalidTopology { ports });
    }
    Ok(())
}
