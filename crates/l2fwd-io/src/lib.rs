//! Packet I/O provider interface used by the forwarding engine.
//!
//! The engine never talks to a device driver directly. Everything it needs (port setup, burst
//! RX/TX, buffer release, link state and driver counters) goes through [`PacketIo`]. Buffers are
//! owned values: handing one to [`PacketIo::transmit_burst`] or [`PacketIo::release`] moves it, so
//! a buffer can be neither leaked by the engine nor released twice.
#![forbid(unsafe_code)]

pub mod memory;

use std::sync::Arc;

pub use memory::{Mbuf, MemoryPorts, TransmittedFrame};

pub type PortId = u16;
pub type QueueId = u16;

/// Descriptors in each port's RX ring.
pub const RX_RING_SIZE: u16 = 128;
/// Descriptors in each port's TX ring.
pub const TX_RING_SIZE: u16 = 512;
/// Packet buffers provisioned per port.
pub const NUM_MBUFS: usize = 8191;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum IoError {
    #[error("port {0} does not exist")]
    NoSuchPort(PortId),

    #[error("port {port}: {reason}")]
    QueueSetup { port: PortId, reason: &'static str },

    #[error("port {0} is not configured")]
    NotConfigured(PortId),

    #[error("port {0} is not started")]
    PortStopped(PortId),

    #[error("port {port}: RX ring full")]
    RingFull { port: PortId },

    #[error("packet buffer pool exhausted")]
    PoolExhausted,

    #[error("device error: {0}")]
    Device(String),
}

/// One frame held in a provider-owned buffer.
pub trait PacketBuf: Send {
    fn data(&self) -> &[u8];

    fn data_mut(&mut self) -> &mut [u8];

    /// Frame length as reported by the link layer.
    fn pkt_len(&self) -> usize {
        self.data().len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub rx_queues: u16,
    pub tx_queues: u16,
    pub rx_ring_size: u16,
    pub tx_ring_size: u16,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            rx_queues: 1,
            tx_queues: 1,
            rx_ring_size: RX_RING_SIZE,
            tx_ring_size: TX_RING_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Up { speed_mbps: u32 },
    Down,
}

/// Cumulative driver counters for one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortStats {
    pub received: u64,
    pub transmitted: u64,
    pub dropped: u64,
}

/// Device access used by the forwarder.
///
/// RX and TX calls never block: they return whatever the queue can do right now, which may be
/// nothing. Each queue is only ever polled by one execution unit.
pub trait PacketIo: Send + Sync {
    type Buf: PacketBuf;

    fn port_count(&self) -> u16;

    fn configure_port(&self, port: PortId, config: &QueueConfig) -> Result<(), IoError>;

    fn start_port(&self, port: PortId) -> Result<(), IoError>;

    fn enable_promiscuous(&self, port: PortId);

    /// Append up to `max` received buffers to `out`, returning how many were appended.
    fn receive_burst(
        &self,
        port: PortId,
        queue: QueueId,
        out: &mut Vec<Self::Buf>,
        max: usize,
    ) -> usize;

    /// Transmit buffers from the front of `burst`, returning how many were accepted.
    ///
    /// Accepted buffers are removed from `burst`. A rejected tail stays in `burst`, in order, and
    /// remains owned by the caller.
    fn transmit_burst(&self, port: PortId, queue: QueueId, burst: &mut Vec<Self::Buf>) -> usize;

    fn release(&self, buf: Self::Buf);

    fn link_state(&self, port: PortId) -> LinkState;

    fn stats(&self, port: PortId) -> PortStats;
}

impl<T: PacketIo + ?Sized> PacketIo for Arc<T> {
    type Buf = T::Buf;

    fn port_count(&self) -> u16 {
        <T as PacketIo>::port_count(&**self)
    }

    fn configure_port(&self, port: PortId, config: &QueueConfig) -> Result<(), IoError> {
        <T as PacketIo>::configure_port(&**self, port, config)
    }

    fn start_port(&self, port: PortId) -> Result<(), IoError> {
        <T as PacketIo>::start_port(&**self, port)
    }

    fn enable_promiscuous(&self, port: PortId) {
        <T as PacketIo>::enable_promiscuous(&**self, port)
    }

    fn receive_burst(
        &self,
        port: PortId,
        queue: QueueId,
        out: &mut Vec<Self::Buf>,
        max: usize,
    ) -> usize {
        <T as PacketIo>::receive_burst(&**self, port, queue, out, max)
    }

    fn transmit_burst(&self, port: PortId, queue: QueueId, burst: &mut Vec<Self::Buf>) -> usize {
        <T as PacketIo>::transmit_burst(&**self, port, queue, burst)
    }

    fn release(&self, buf: Self::Buf) {
        <T as PacketIo>::release(&**self, buf)
    }

    fn link_state(&self, port: PortId) -> LinkState {
        <T as PacketIo>::link_state(&**self, port)
    }

    fn stats(&self, port: PortId) -> PortStats {
        <T as PacketIo>::stats(&**self, port)
    }
}

impl<T: PacketIo + ?Sized> PacketIo for &T {
    type Buf = T::Buf;

    fn port_count(&self) -> u16 {
        <T as PacketIo>::port_count(&**self)
    }

    fn configure_port(&self, port: PortId, config: &QueueConfig) -> Result<(), IoError> {
        <T as PacketIo>::configure_port(&**self, port, config)
    }

    fn start_port(&self, port: PortId) -> Result<(), IoError> {
        <T as PacketIo>::start_port(&**self, port)
    }

    fn enable_promiscuous(&self, port: PortId) {
        <T as PacketIo>::enable_promiscuous(&**self, port)
    }

    fn receive_burst(
        &self,
        port: PortId,
        queue: QueueId,
        out: &mut Vec<Self::Buf>,
        max: usize,
    ) -> usize {
        <T as PacketIo>::receive_burst(&**self, port, queue, out, max)
    }

    fn transmit_burst(&self, port: PortId, queue: QueueId, burst: &mut Vec<Self::Buf>) -> usize {
        <T as PacketIo>::transmit_burst(&**self, port, queue, burst)
    }

    fn release(&self, buf: Self::Buf) {
        <T as PacketIo>::release(&**self, buf)
    }

    fn link_state(&self, port: PortId) -> LinkState {
        <T as PacketIo>::link_state(&**self, port)
    }

    fn stats(&self, port: PortId) -> PortStats {
        <T as PacketIo>::stats(&**self, port)
    }
}
