//! Link checks at startup and the counter report at shutdown.

use std::io::{self, Write};

use l2fwd_io::{LinkState, PacketIo, PortId, PortStats};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSummary {
    pub links: Vec<(PortId, LinkState)>,
}

impl LinkSummary {
    pub fn all_up(&self) -> bool {
        self.down_ports().next().is_none()
    }

    pub fn down_ports(&self) -> impl Iterator<Item = PortId> + '_ {
        self.links
            .iter()
            .filter(|(_, link)| *link == LinkState::Down)
            .map(|(port, _)| *port)
    }
}

/// Query and log every port's link. A down link only produces a warning.
pub fn check_link_status<P: PacketIo + ?Sized>(io: &P) -> LinkSummary {
    let links: Vec<_> = (0..io.port_count())
        .map(|port| {
            let link = io.link_state(port);
            match link {
                LinkState::Up { speed_mbps } => {
                    tracing::info!(port, speed_mbps, "link up");
                }
                LinkState::Down => tracing::info!(port, "link down"),
            }
            (port, link)
        })
        .collect();

    let summary = LinkSummary { links };
    if !summary.all_up() {
        let down: Vec<PortId> = summary.down_ports().collect();
        tracing::warn!(?down, "some ports are down");
    }
    summary
}

pub fn collect_stats<P: PacketIo + ?Sized>(io: &P) -> Vec<(PortId, PortStats)> {
    (0..io.port_count())
        .map(|port| (port, io.stats(port)))
        .collect()
}

pub fn write_stats_report<W: Write>(out: &mut W, stats: &[(PortId, PortStats)]) -> io::Result<()> {
    for (port, s) in stats {
        writeln!(out)?;
        writeln!(out, "Statistics for port {port}")?;
        writeln!(
            out,
            "RX: {:>12} TX: {:>12} dropped: {:>12}",
            s.received, s.transmitted, s.dropped
        )?;
    }
    out.flush()
}

/// Snapshot every port's driver counters, log them, and print the report to `out`.
pub fn report_stats<P: PacketIo + ?Sized, W: Write>(io: &P, out: &mut W) -> io::Result<()> {
    let stats = collect_stats(io);
    for (port, s) in &stats {
        tracing::info!(
            port,
            rx = s.received,
            tx = s.transmitted,
            dropped = s.dropped,
            "port statistics"
        );
    }
    write_stats_report(out, &stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use l2fwd_io::MemoryPorts;

    #[test]
    fn down_link_is_reported_but_not_fatal() {
        let io = MemoryPorts::new(4);
        io.set_link(2, LinkState::Down).unwrap();
        let summary = check_link_status(&io);
        assert_eq!(summary.links.len(), 4);
        assert!(!summary.all_up());
        assert_eq!(summary.down_ports().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn all_links_up_by_default() {
        let io = MemoryPorts::new(2);
        assert!(check_link_status(&io).all_up());
    }

    #[test]
    fn report_has_one_block_per_port() {
        let stats = [
            (
                0,
                PortStats {
                    received: 10,
                    transmitted: 7,
                    dropped: 1,
                },
            ),
            (1, PortStats::default()),
        ];
        let mut out = Vec::new();
        write_stats_report(&mut out, &stats).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.matches("Statistics for port").count(), 2);
        assert!(text.contains("Statistics for port 0\nRX:           10 TX:            7 dropped:            1\n"));
        assert!(text.contains("Statistics for port 1\n"));
    }
}
