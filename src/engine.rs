//! The forwarding loop.
//!
//! A single designated execution unit busy-polls every port in turn. Each received burst is run
//! through parse, validate and mutate per packet, then handed as a whole to the paired port's TX
//! queue. Whatever the TX queue does not accept is released back to the provider.

use std::sync::Arc;
use std::thread::JoinHandle;

use l2fwd_io::{PacketBuf, PacketIo, PortId, QueueId};
use l2fwd_packet::{mutate_frame, parse_frame, validate_ipv4, MutateOptions, ParsedFrame};

use crate::affinity::{pin_current_thread, Pinning};
use crate::error::ForwarderError;
use crate::pairing::{check_topology, pair_of};
use crate::shutdown::ShutdownController;

/// Upper bound on buffers pulled from one RX queue per poll.
pub const MAX_BURST: usize = 32;

const RX_QUEUE: QueueId = 0;
const TX_QUEUE: QueueId = 0;

/// Identity of a logical execution unit. Unit 0 is the control unit that waits for signals.
pub type UnitId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Not yet assigned a role.
    Idle,
    Polling,
    /// Shutdown observed between passes.
    Draining,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// The only unit that enters the polling loop.
    pub forwarding_unit: UnitId,
    pub mutate: MutateOptions,
    /// Release IPv4 packets that fail validation instead of forwarding them.
    pub drop_invalid: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            forwarding_unit: 1,
            mutate: MutateOptions::default(),
            drop_invalid: false,
        }
    }
}

/// Cumulative engine-side counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineCounters {
    pub passes: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
    /// Buffers from a partially accepted burst that were released instead of sent.
    pub released_tail: u64,
    pub parse_shortages: u64,
    pub validation_rejections: u64,
    pub dropped_invalid: u64,
}

/// What one poll of one port did.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortOutcome {
    pub received: usize,
    /// Buffers handed to the paired port's TX queue.
    pub submitted: usize,
    pub transmitted: usize,
    pub released: usize,
    pub dropped_invalid: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineReport {
    pub unit: UnitId,
    /// Whether this unit ran the polling loop.
    pub polled: bool,
    pub state: EngineState,
    pub counters: EngineCounters,
    pub pinning: Pinning,
}

pub struct ForwardingEngine<P: PacketIo> {
    io: P,
    config: EngineConfig,
    ports: u16,
    state: EngineState,
    counters: EngineCounters,
    burst: Vec<P::Buf>,
}

impl<P: PacketIo> ForwardingEngine<P> {
    pub fn new(io: P, config: EngineConfig) -> Result<Self, ForwarderError> {
        let ports = io.port_count();
        check_topology(ports)?;
        Ok(Self {
            io,
            config,
            ports,
            state: EngineState::Idle,
            counters: EngineCounters::default(),
            burst: Vec::with_capacity(MAX_BURST),
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn counters(&self) -> EngineCounters {
        self.counters
    }

    /// Assign a role to `unit`: the forwarding unit moves to `Polling`, any other unit straight to
    /// `Stopped`. Returns whether `unit` should poll.
    pub fn start(&mut self, unit: UnitId) -> bool {
        if self.state != EngineState::Idle {
            return self.state == EngineState::Polling;
        }
        if unit != self.config.forwarding_unit {
            tracing::info!(unit, "not the forwarding unit, exiting");
            self.transition(EngineState::Stopped);
            return false;
        }
        tracing::info!(
            unit,
            ports = self.ports,
            "forwarding packets (burst size {MAX_BURST})"
        );
        self.transition(EngineState::Polling);
        true
    }

    /// Leave the polling loop. Only called between passes, so no burst is ever in flight here.
    pub fn stop(&mut self) {
        if self.state == EngineState::Polling {
            self.transition(EngineState::Draining);
        }
        if self.state != EngineState::Stopped {
            self.transition(EngineState::Stopped);
        }
    }

    /// Run `unit` until `shutdown` is requested.
    ///
    /// The flag is checked once per full pass over all ports.
    pub fn run(&mut self, unit: UnitId, shutdown: &ShutdownController) -> EngineReport {
        let polled = self.start(unit);
        if polled {
            while !shutdown.is_requested() {
                self.poll_pass();
            }
            self.stop();
            tracing::info!(
                unit,
                rx = self.counters.rx_packets,
                tx = self.counters.tx_packets,
                released = self.counters.released_tail,
                "forwarding stopped"
            );
        }
        EngineReport {
            unit,
            polled,
            state: self.state,
            counters: self.counters,
            pinning: Pinning::NotRequested,
        }
    }

    /// Poll every port once, in port order. Returns the number of buffers transmitted.
    pub fn poll_pass(&mut self) -> usize {
        self.counters.passes += 1;
        let mut transmitted = 0;
        for port in 0..self.ports {
            transmitted += self.poll_port(port).transmitted;
        }
        transmitted
    }

    pub fn poll_port(&mut self, port: PortId) -> PortOutcome {
        let mut burst = std::mem::take(&mut self.burst);
        burst.clear();

        let received = self
            .io
            .receive_burst(port, RX_QUEUE, &mut burst, MAX_BURST);
        let mut outcome = PortOutcome {
            received,
            ..Default::default()
        };
        if received == 0 {
            self.burst = burst;
            return outcome;
        }
        self.counters.rx_packets += received as u64;

        let mut keep = [true; MAX_BURST];
        for (buf, verdict) in burst.iter_mut().zip(keep.iter_mut()) {
            *verdict = self.process(buf);
        }
        if self.config.drop_invalid {
            for idx in (0..burst.len().min(MAX_BURST)).rev() {
                if !keep[idx] {
                    self.io.release(burst.remove(idx));
                    outcome.dropped_invalid += 1;
                }
            }
            self.counters.dropped_invalid += outcome.dropped_invalid as u64;
        }

        let pair = pair_of(port);
        outcome.submitted = burst.len();
        if outcome.submitted > 0 {
            outcome.transmitted = self.io.transmit_burst(pair, TX_QUEUE, &mut burst);
        }

        if !burst.is_empty() {
            tracing::debug!(
                port = pair,
                submitted = outcome.submitted,
                transmitted = outcome.transmitted,
                "TX queue full, releasing untransmitted tail"
            );
            outcome.released = burst.len();
            for buf in burst.drain(..) {
                self.io.release(buf);
            }
        }
        self.counters.tx_packets += outcome.transmitted as u64;
        self.counters.released_tail += outcome.released as u64;

        self.burst = burst;
        outcome
    }

    /// Parse, validate and mutate one frame in place. Returns `false` when the frame should be
    /// dropped.
    fn process(&mut self, buf: &mut P::Buf) -> bool {
        let wire_len = buf.pkt_len();
        let parsed = match parse_frame(buf.data()) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.counters.parse_shortages += 1;
                tracing::debug!(wire_len, "forwarding unparsed frame: {err}");
                return true;
            }
        };
        if parsed.truncated.is_some() {
            self.counters.parse_shortages += 1;
        }
        trace_frame(&parsed);

        let mut valid = true;
        if let Some(ip) = parsed.ipv4() {
            if let Err(rejection) = validate_ipv4(ip, wire_len) {
                self.counters.validation_rejections += 1;
                valid = false;
                tracing::debug!(src = %ip.src, dst = %ip.dst, "invalid IPv4 packet: {rejection}");
            }
        }
        if !valid && self.config.drop_invalid {
            return false;
        }

        if let Err(err) = mutate_frame(buf.data_mut(), &parsed, self.config.mutate) {
            tracing::debug!("frame not rewritten: {err}");
        }
        valid
    }

    fn transition(&mut self, next: EngineState) {
        debug_assert!(
            matches!(
                (self.state, next),
                (EngineState::Idle, EngineState::Polling)
                    | (EngineState::Idle, EngineState::Stopped)
                    | (EngineState::Polling, EngineState::Draining)
                    | (EngineState::Draining, EngineState::Stopped)
            ),
            "bad engine transition {:?} -> {next:?}",
            self.state
        );
        tracing::trace!(from = ?self.state, to = ?next, "engine state");
        self.state = next;
    }
}

fn trace_frame(parsed: &ParsedFrame) {
    if !tracing::enabled!(tracing::Level::TRACE) {
        return;
    }
    let ports = parsed.ports();
    if let Some(ip) = parsed.ipv4() {
        tracing::trace!(
            src_mac = %parsed.src_mac,
            dst_mac = %parsed.dest_mac,
            src = %ip.src,
            dst = %ip.dst,
            ttl = ip.ttl,
            protocol = ip.protocol,
            src_port = ports.src,
            dst_port = ports.dst,
            "ipv4 frame"
        );
    } else if let Some(ip) = parsed.ipv6() {
        tracing::trace!(
            src_mac = %parsed.src_mac,
            dst_mac = %parsed.dest_mac,
            src = %ip.src,
            dst = %ip.dst,
            hop_limit = ip.hop_limit,
            next_header = ip.next_header,
            src_port = ports.src,
            dst_port = ports.dst,
            "ipv6 frame"
        );
    } else {
        tracing::trace!(
            src_mac = %parsed.src_mac,
            dst_mac = %parsed.dest_mac,
            ethertype = parsed.ethertype,
            "non-ip frame"
        );
    }
}

/// Spawn execution units `1..workers` as named threads, each running its own engine over `io`.
///
/// Each thread pins itself to its core before touching a port. Unit 0 is the caller and stays
/// unpinned.
pub fn launch_units<P>(
    io: Arc<P>,
    workers: u32,
    config: EngineConfig,
    shutdown: Arc<ShutdownController>,
) -> Result<Vec<JoinHandle<EngineReport>>, ForwarderError>
where
    P: PacketIo + 'static,
{
    let mut handles = Vec::new();
    for unit in 1..workers {
        let mut engine = ForwardingEngine::new(Arc::clone(&io), config)?;
        let shutdown = Arc::clone(&shutdown);
        let handle = std::thread::Builder::new()
            .name(format!("l2fwd-unit-{unit}"))
            .spawn(move || {
                let pinning = pin_current_thread(unit);
                EngineReport {
                    pinning,
                    ..engine.run(unit, &shutdown)
                }
            })
            .map_err(|source| ForwarderError::UnitSpawn { unit, source })?;
        handles.push(handle);
    }
    Ok(handles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use l2fwd_io::{MemoryPorts, QueueConfig};
    use l2fwd_packet::UdpFrameBuilder;

    fn ports(count: u16) -> MemoryPorts {
        let io = MemoryPorts::new(count);
        for port in 0..count {
            io.configure_port(port, &QueueConfig::default()).unwrap();
            io.start_port(port).unwrap();
        }
        io
    }

    #[test]
    fn odd_topology_is_refused() {
        let io = MemoryPorts::new(3);
        assert!(matches!(
            ForwardingEngine::new(&io, EngineConfig::default()),
            Err(ForwarderError::InvalidTopology { ports: 3 })
        ));
    }

    #[test]
    fn non_designated_unit_stops_without_io() {
        let io = ports(2);
        io.inject(0, &[0u8; 60]).unwrap();
        let mut engine = ForwardingEngine::new(&io, EngineConfig::default()).unwrap();
        assert_eq!(engine.state(), EngineState::Idle);

        let report = engine.run(2, &ShutdownController::new());
        assert!(!report.polled);
        assert_eq!(report.state, EngineState::Stopped);
        assert_eq!(report.pinning, Pinning::NotRequested);
        assert_eq!(report.counters, EngineCounters::default());
        assert_eq!(io.rx_pending(0), 1);
    }

    #[test]
    fn designated_unit_moves_through_polling_to_stopped() {
        let io = ports(2);
        let mut engine = ForwardingEngine::new(&io, EngineConfig::default()).unwrap();
        assert!(engine.start(1));
        assert_eq!(engine.state(), EngineState::Polling);
        engine.poll_pass();
        engine.stop();
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[test]
    fn run_returns_once_shutdown_is_requested() {
        let io = ports(2);
        let shutdown = ShutdownController::new();
        shutdown.request();
        let mut engine = ForwardingEngine::new(&io, EngineConfig::default()).unwrap();
        let report = engine.run(1, &shutdown);
        assert!(report.polled);
        assert_eq!(report.state, EngineState::Stopped);
        assert_eq!(report.counters.passes, 0);
    }

    #[test]
    fn invalid_packet_is_forwarded_by_default() {
        let io = ports(2);
        let mut frame = UdpFrameBuilder::default().build_vec().unwrap();
        frame[14] = 0x65; // version 6 inside an IPv4 ethertype
        io.inject(1, &frame).unwrap();

        let mut engine = ForwardingEngine::new(&io, EngineConfig::default()).unwrap();
        let outcome = engine.poll_port(1);
        assert_eq!(outcome.transmitted, 1);
        assert_eq!(engine.counters().validation_rejections, 1);

        let sent = io.take_transmitted(0);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].data[14 + 8], 63);
    }

    #[test]
    fn runt_frame_is_forwarded_untouched() {
        let io = ports(2);
        io.inject(0, &[0xab; 10]).unwrap();
        let mut engine = ForwardingEngine::new(&io, EngineConfig::default()).unwrap();
        assert_eq!(engine.poll_port(0).transmitted, 1);
        assert_eq!(engine.counters().parse_shortages, 1);
        assert_eq!(io.take_transmitted(1)[0].data, vec![0xab; 10]);
    }

    #[test]
    fn burst_is_capped_at_max_burst() {
        let io = ports(2);
        let frame = UdpFrameBuilder::default().build_vec().unwrap();
        for _ in 0..40 {
            io.inject(0, &frame).unwrap();
        }
        let mut engine = ForwardingEngine::new(&io, EngineConfig::default()).unwrap();
        assert_eq!(engine.poll_port(0).received, MAX_BURST);
        assert_eq!(engine.poll_port(0).received, 8);
        assert_eq!(io.take_transmitted(1).len(), 40);
    }
}
