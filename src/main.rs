#![forbid(unsafe_code)]

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use l2fwd::{
    check_link_status, check_topology, init_ports, launch_units, report_stats, ForwarderConfig,
    ShutdownController,
};
use l2fwd_io::{MemoryPorts, PacketIo};
use l2fwd_packet::{ChecksumUpdate, MacAddr, UdpFrameBuilder};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = ForwarderConfig::load();
    init_tracing(&config);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &ForwarderConfig) {
    let configured = config
        .log_level
        .as_deref()
        .map(EnvFilter::try_new)
        .transpose();
    let (filter, bad_directive) = match configured {
        Ok(Some(filter)) => (filter, None),
        Ok(None) => (default_filter(), None),
        Err(err) => (default_filter(), Some(err)),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    if let Some(err) = bad_directive {
        tracing::warn!("ignoring invalid log level: {err}");
    }
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

async fn run(config: ForwarderConfig) -> anyhow::Result<()> {
    config.validate()?;

    let io = Arc::new(MemoryPorts::new(config.ports));
    let ports = io.port_count();
    check_topology(ports)?;
    tracing::info!(ports, "ports available");

    init_ports(&*io).context("port initialization failed")?;
    seed_frames(&io, config.sim_frames)?;

    let mutate = config.engine.mutate;
    if mutate.mac_swap {
        tracing::info!("MAC address swapping enabled");
    }
    if mutate.checksum == ChecksumUpdate::Incremental {
        tracing::info!("IPv4 checksum updated incrementally after TTL decrement");
    }
    if config.engine.drop_invalid {
        tracing::info!("dropping IPv4 packets that fail validation");
    }
    check_link_status(&*io);

    let shutdown = Arc::new(ShutdownController::new());
    let units = launch_units(
        Arc::clone(&io),
        config.workers,
        config.engine,
        Arc::clone(&shutdown),
    )?;
    tracing::info!(
        workers = config.workers,
        forwarding_unit = config.engine.forwarding_unit,
        "execution units launched"
    );

    wait_for_signal().await;
    if shutdown.request() {
        tracing::info!("signal received, preparing to exit");
        report_stats(&*io, &mut std::io::stdout().lock())
            .context("failed to write port statistics")?;
    }

    for handle in units {
        let report = handle
            .join()
            .map_err(|_| anyhow::anyhow!("execution unit panicked"))?;
        if report.polled {
            let c = report.counters;
            tracing::info!(
                unit = report.unit,
                pinning = ?report.pinning,
                passes = c.passes,
                rx = c.rx_packets,
                tx = c.tx_packets,
                released = c.released_tail,
                parse_shortages = c.parse_shortages,
                rejected = c.validation_rejections,
                dropped_invalid = c.dropped_invalid,
                "engine report"
            );
        }
    }
    Ok(())
}

/// Queue `count` synthetic UDP frames on every port so the simulated topology has traffic.
fn seed_frames(io: &MemoryPorts, count: usize) -> anyhow::Result<()> {
    if count == 0 {
        return Ok(());
    }
    for port in 0..io.port_count() {
        let [hi, lo] = port.to_be_bytes();
        let frame = UdpFrameBuilder {
            dest_mac: MacAddr([0x02, 0x00, 0x00, 0x01, hi, lo]),
            src_mac: MacAddr([0x02, 0x00, 0x00, 0x00, hi, lo]),
            src_port: 40000u16.wrapping_add(port),
            payload: b"l2fwd",
            ..Default::default()
        }
        .build_vec()
        .context("failed to build synthetic frame")?;

        let mut seeded = 0usize;
        for _ in 0..count {
            if let Err(err) = io.inject(port, &frame) {
                tracing::warn!(port, seeded, "stopped seeding frames: {err}");
                break;
            }
            seeded += 1;
        }
        tracing::debug!(port, seeded, "seeded synthetic frames");
    }
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = sigterm => {},
    }
}
