//! In-memory [`PacketIo`] provider.
//!
//! `MemoryPorts` models a set of NIC ports backed by a shared, bounded buffer pool. Frames enter a
//! port through [`MemoryPorts::inject`] (the "wire" side of the RX ring) and leave it through
//! [`PacketIo::transmit_burst`], where they are recorded for inspection and their buffers go back
//! to the pool. Pool accounting makes leaks and double releases observable.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::{
    IoError, LinkState, PacketBuf, PacketIo, PortId, PortStats, QueueConfig, QueueId, NUM_MBUFS,
    TX_RING_SIZE,
};

const DEFAULT_LINK_SPEED_MBPS: u32 = 10_000;
/// Released ids kept for inspection; older entries are dropped first.
const RELEASE_LOG_LEN: usize = TX_RING_SIZE as usize;

#[derive(Debug, PartialEq, Eq)]
pub struct Mbuf {
    id: u64,
    data: Vec<u8>,
}

impl Mbuf {
    /// Pool-unique identity, stable for the lifetime of the buffer.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl PacketBuf for Mbuf {
    fn data(&self) -> &[u8] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// A frame accepted by a port's TX queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmittedFrame {
    pub id: u64,
    pub data: Vec<u8>,
}

#[derive(Debug)]
struct PortState {
    config: Option<QueueConfig>,
    started: bool,
    promiscuous: bool,
    link: LinkState,
    setup_fault: Option<&'static str>,
}

#[derive(Debug)]
struct MemoryPort {
    state: Mutex<PortState>,
    rx: Mutex<VecDeque<Mbuf>>,
    tx: Mutex<VecDeque<TransmittedFrame>>,
    tx_limit: AtomicUsize,
    received: AtomicU64,
    transmitted: AtomicU64,
    dropped: AtomicU64,
}

impl MemoryPort {
    fn new() -> Self {
        Self {
            state: Mutex::new(PortState {
                config: None,
                started: false,
                promiscuous: false,
                link: LinkState::Up {
                    speed_mbps: DEFAULT_LINK_SPEED_MBPS,
                },
                setup_fault: None,
            }),
            rx: Mutex::new(VecDeque::new()),
            tx: Mutex::new(VecDeque::new()),
            tx_limit: AtomicUsize::new(usize::MAX),
            received: AtomicU64::new(0),
            transmitted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue configuration if the port is running.
    fn running_config(&self) -> Option<QueueConfig> {
        let state = lock(&self.state);
        state.config.filter(|_| state.started)
    }
}

#[derive(Debug)]
pub struct MemoryPorts {
    ports: Vec<MemoryPort>,
    pool_capacity: usize,
    in_use: AtomicUsize,
    next_id: AtomicU64,
    released: Mutex<VecDeque<u64>>,
}

impl MemoryPorts {
    /// Create `port_count` ports sharing a pool of [`NUM_MBUFS`] buffers per port.
    pub fn new(port_count: u16) -> Self {
        Self::with_pool_capacity(port_count, NUM_MBUFS * usize::from(port_count))
    }

    pub fn with_pool_capacity(port_count: u16, pool_capacity: usize) -> Self {
        Self {
            ports: (0..port_count).map(|_| MemoryPort::new()).collect(),
            pool_capacity,
            in_use: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            released: Mutex::new(VecDeque::new()),
        }
    }

    fn port(&self, port: PortId) -> Result<&MemoryPort, IoError> {
        self.ports
            .get(usize::from(port))
            .ok_or(IoError::NoSuchPort(port))
    }

    /// Deliver `frame` to `port`'s RX ring, returning the id of the buffer that now holds it.
    ///
    /// A full ring or an empty pool drops the frame and counts it in the port's `dropped` counter.
    pub fn inject(&self, port: PortId, frame: &[u8]) -> Result<u64, IoError> {
        let p = self.port(port)?;
        let config = p.running_config().ok_or(IoError::PortStopped(port))?;

        let mut rx = lock(&p.rx);
        if rx.len() >= usize::from(config.rx_ring_size) {
            p.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(IoError::RingFull { port });
        }
        let mbuf = match self.alloc(frame.to_vec()) {
            Ok(mbuf) => mbuf,
            Err(err) => {
                p.dropped.fetch_add(1, Ordering::Relaxed);
                return Err(err);
            }
        };
        let id = mbuf.id;
        rx.push_back(mbuf);
        p.received.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    pub fn set_link(&self, port: PortId, link: LinkState) -> Result<(), IoError> {
        lock(&self.port(port)?.state).link = link;
        Ok(())
    }

    /// Cap the number of buffers a single `transmit_burst` on `port` accepts (`None` = no cap).
    pub fn set_tx_limit(&self, port: PortId, limit: Option<usize>) -> Result<(), IoError> {
        self.port(port)?
            .tx_limit
            .store(limit.unwrap_or(usize::MAX), Ordering::Relaxed);
        Ok(())
    }

    /// Make the next `configure_port` on `port` fail with `reason`.
    pub fn inject_setup_fault(&self, port: PortId, reason: &'static str) -> Result<(), IoError> {
        lock(&self.port(port)?.state).setup_fault = Some(reason);
        Ok(())
    }

    /// Drain the record of frames transmitted on `port`, oldest first.
    ///
    /// The record holds at most one TX ring's worth of frames; older entries are discarded.
    pub fn take_transmitted(&self, port: PortId) -> Vec<TransmittedFrame> {
        match self.port(port) {
            Ok(p) => lock(&p.tx).drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Ids of the most recent buffers returned through [`PacketIo::release`], in release order.
    pub fn released_ids(&self) -> Vec<u64> {
        lock(&self.released).iter().copied().collect()
    }

    /// Buffers currently allocated from the pool (queued on RX or held by a caller).
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    pub fn rx_pending(&self, port: PortId) -> usize {
        self.port(port).map(|p| lock(&p.rx).len()).unwrap_or(0)
    }

    pub fn is_started(&self, port: PortId) -> bool {
        self.port(port).is_ok_and(|p| lock(&p.state).started)
    }

    pub fn is_promiscuous(&self, port: PortId) -> bool {
        self.port(port).is_ok_and(|p| lock(&p.state).promiscuous)
    }

    fn alloc(&self, data: Vec<u8>) -> Result<Mbuf, IoError> {
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.pool_capacity).then_some(n + 1)
            })
            .map_err(|_| IoError::PoolExhausted)?;
        Ok(Mbuf {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            data,
        })
    }

    fn free(&self) {
        self.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

impl PacketIo for MemoryPorts {
    type Buf = Mbuf;

    fn port_count(&self) -> u16 {
        self.ports.len() as u16
    }

    fn configure_port(&self, port: PortId, config: &QueueConfig) -> Result<(), IoError> {
        let mut state = lock(&self.port(port)?.state);
        if let Some(reason) = state.setup_fault.take() {
            return Err(IoError::Device(reason.to_string()));
        }
        if state.started {
            return Err(IoError::QueueSetup {
                port,
                reason: "port is running",
            });
        }
        if config.rx_queues != 1 || config.tx_queues != 1 {
            return Err(IoError::QueueSetup {
                port,
                reason: "exactly one RX and one TX queue are supported",
            });
        }
        if config.rx_ring_size == 0 || config.tx_ring_size == 0 {
            return Err(IoError::QueueSetup {
                port,
                reason: "ring size must be non-zero",
            });
        }
        state.config = Some(*config);
        Ok(())
    }

    fn start_port(&self, port: PortId) -> Result<(), IoError> {
        let mut state = lock(&self.port(port)?.state);
        if state.config.is_none() {
            return Err(IoError::NotConfigured(port));
        }
        state.started = true;
        Ok(())
    }

    fn enable_promiscuous(&self, port: PortId) {
        match self.port(port) {
            Ok(p) => lock(&p.state).promiscuous = true,
            Err(err) => tracing::debug!("enable_promiscuous: {err}"),
        }
    }

    fn receive_burst(
        &self,
        port: PortId,
        queue: QueueId,
        out: &mut Vec<Mbuf>,
        max: usize,
    ) -> usize {
        let Ok(p) = self.port(port) else {
            return 0;
        };
        if !p
            .running_config()
            .is_some_and(|config| queue < config.rx_queues)
        {
            return 0;
        }

        let mut rx = lock(&p.rx);
        let n = rx.len().min(max);
        out.extend(rx.drain(..n));
        n
    }

    fn transmit_burst(&self, port: PortId, queue: QueueId, burst: &mut Vec<Mbuf>) -> usize {
        let Ok(p) = self.port(port) else {
            return 0;
        };
        let Some(config) = p
            .running_config()
            .filter(|config| queue < config.tx_queues)
        else {
            return 0;
        };

        let n = burst.len().min(p.tx_limit.load(Ordering::Relaxed));
        let record_cap = usize::from(config.tx_ring_size);
        let mut tx = lock(&p.tx);
        for mbuf in burst.drain(..n) {
            if tx.len() >= record_cap {
                tx.pop_front();
            }
            tx.push_back(TransmittedFrame {
                id: mbuf.id,
                data: mbuf.data,
            });
            self.free();
        }
        p.transmitted.fetch_add(n as u64, Ordering::Relaxed);
        n
    }

    fn release(&self, buf: Mbuf) {
        let mut released = lock(&self.released);
        if released.len() >= RELEASE_LOG_LEN {
            released.pop_front();
        }
        released.push_back(buf.id);
        drop(released);
        self.free();
    }

    fn link_state(&self, port: PortId) -> LinkState {
        self.port(port)
            .map(|p| lock(&p.state).link)
            .unwrap_or(LinkState::Down)
    }

    fn stats(&self, port: PortId) -> PortStats {
        self.port(port)
            .map(|p| PortStats {
                received: p.received.load(Ordering::Relaxed),
                transmitted: p.transmitted.load(Ordering::Relaxed),
                dropped: p.dropped.load(Ordering::Relaxed),
            })
            .unwrap_or_default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RX_RING_SIZE;

    fn started(port_count: u16) -> MemoryPorts {
        let io = MemoryPorts::new(port_count);
        for port in 0..port_count {
            io.configure_port(port, &QueueConfig::default()).unwrap();
            io.start_port(port).unwrap();
        }
        io
    }

    #[test]
    fn receive_preserves_injection_order_and_respects_max() {
        let io = started(2);
        let ids: Vec<u64> = (0..5u8)
            .map(|i| io.inject(0, &[i; 20]).unwrap())
            .collect();

        let mut burst = Vec::new();
        assert_eq!(io.receive_burst(0, 0, &mut burst, 3), 3);
        assert_eq!(io.receive_burst(0, 0, &mut burst, 32), 2);
        assert_eq!(burst.iter().map(Mbuf::id).collect::<Vec<_>>(), ids);
        assert_eq!(burst[4].data(), &[4u8; 20]);
        assert_eq!(io.receive_burst(0, 0, &mut burst, 32), 0);
    }

    #[test]
    fn full_rx_ring_drops_and_counts() {
        let io = started(2);
        for _ in 0..RX_RING_SIZE {
            io.inject(1, &[0; 60]).unwrap();
        }
        assert_eq!(io.inject(1, &[0; 60]), Err(IoError::RingFull { port: 1 }));
        assert_eq!(
            io.stats(1),
            PortStats {
                received: u64::from(RX_RING_SIZE),
                transmitted: 0,
                dropped: 1,
            }
        );
    }

    #[test]
    fn exhausted_pool_drops_and_counts() {
        let io = MemoryPorts::with_pool_capacity(2, 1);
        for port in 0..2 {
            io.configure_port(port, &QueueConfig::default()).unwrap();
            io.start_port(port).unwrap();
        }
        io.inject(0, &[0; 60]).unwrap();
        assert_eq!(io.inject(0, &[0; 60]), Err(IoError::PoolExhausted));
        assert_eq!(io.stats(0).dropped, 1);
    }

    #[test]
    fn tx_limit_leaves_rejected_tail_with_caller() {
        let io = started(2);
        for i in 0..5u8 {
            io.inject(0, &[i; 20]).unwrap();
        }
        let mut burst = Vec::new();
        io.receive_burst(0, 0, &mut burst, 32);
        let ids: Vec<u64> = burst.iter().map(Mbuf::id).collect();

        io.set_tx_limit(1, Some(2)).unwrap();
        assert_eq!(io.transmit_burst(1, 0, &mut burst), 2);
        assert_eq!(burst.iter().map(Mbuf::id).collect::<Vec<_>>(), ids[2..]);

        let sent: Vec<u64> = io.take_transmitted(1).iter().map(|f| f.id).collect();
        assert_eq!(sent, ids[..2]);
        assert_eq!(io.in_use(), 3);

        for mbuf in burst.drain(..) {
            io.release(mbuf);
        }
        assert_eq!(io.in_use(), 0);
        assert_eq!(io.released_ids(), ids[2..]);
    }

    #[test]
    fn release_log_keeps_only_the_latest_ids() {
        let io = started(2);
        let total = RELEASE_LOG_LEN + 10;
        let mut last = 0;
        for _ in 0..total {
            io.inject(0, &[0; 60]).unwrap();
            let mut burst = Vec::new();
            io.receive_burst(0, 0, &mut burst, 1);
            let mbuf = burst.pop().unwrap();
            last = mbuf.id();
            io.release(mbuf);
        }

        let released = io.released_ids();
        assert_eq!(released.len(), RELEASE_LOG_LEN);
        assert_eq!(released.last(), Some(&last));
        assert_eq!(released[0], last - RELEASE_LOG_LEN as u64 + 1);
        assert_eq!(io.in_use(), 0);
    }

    #[test]
    fn stopped_ports_neither_receive_nor_transmit() {
        let io = MemoryPorts::new(2);
        assert_eq!(io.inject(0, &[0; 60]), Err(IoError::PortStopped(0)));
        let mut burst = Vec::new();
        assert_eq!(io.receive_burst(0, 0, &mut burst, 32), 0);
        assert_eq!(io.transmit_burst(1, 0, &mut burst), 0);
    }

    #[test]
    fn start_requires_configuration() {
        let io = MemoryPorts::new(2);
        assert_eq!(io.start_port(0), Err(IoError::NotConfigured(0)));
        assert_eq!(io.start_port(7), Err(IoError::NoSuchPort(7)));
    }

    #[test]
    fn multi_queue_configuration_is_rejected() {
        let io = MemoryPorts::new(2);
        let config = QueueConfig {
            rx_queues: 2,
            ..Default::default()
        };
        assert!(matches!(
            io.configure_port(0, &config),
            Err(IoError::QueueSetup { port: 0, .. })
        ));
    }

    #[test]
    fn setup_fault_fails_configure_once() {
        let io = MemoryPorts::new(2);
        io.inject_setup_fault(1, "firmware hiccup").unwrap();
        assert_eq!(
            io.configure_port(1, &QueueConfig::default()),
            Err(IoError::Device("firmware hiccup".to_string()))
        );
        assert_eq!(io.configure_port(1, &QueueConfig::default()), Ok(()));
    }

    #[test]
    fn link_state_defaults_up_and_unknown_ports_are_down() {
        let io = MemoryPorts::new(2);
        assert!(matches!(io.link_state(0), LinkState::Up { .. }));
        io.set_link(1, LinkState::Down).unwrap();
        assert_eq!(io.link_state(1), LinkState::Down);
        assert_eq!(io.link_state(9), LinkState::Down);
    }
}
