use assert_cmd::Command;

fn l2fwd() -> Command {
    let mut cmd = Command::cargo_bin("l2fwd").unwrap();
    for var in [
        "L2FWD_FORWARDING_UNIT",
        "L2FWD_WORKERS",
        "L2FWD_NO_MAC_SWAP",
        "L2FWD_DROP_INVALID",
        "L2FWD_CHECKSUM",
        "L2FWD_PORTS",
        "L2FWD_SIM_FRAMES",
        "L2FWD_LOG_LEVEL",
        "L2FWD_LOG_JSON",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn odd_port_count_exits_non_zero() {
    let output = l2fwd().args(["--ports", "3"]).output().unwrap();
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("even and at least 2"), "stdout: {stdout}");
}

#[test]
fn single_port_exits_non_zero() {
    l2fwd().args(["--ports", "1"]).assert().failure();
}

#[test]
fn zero_workers_exits_non_zero() {
    l2fwd().args(["--workers", "0"]).assert().failure();
}

#[test]
fn unknown_checksum_mode_is_a_usage_error() {
    l2fwd().args(["--checksum", "full"]).assert().failure().code(2);
}
