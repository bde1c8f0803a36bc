use super::*;
use clap::Parser;

#[test]
fn cli_parses_config_path_and_flags() {
    let cli = Cli::try_parse_from([
        "hsm-shipperd",
        "-c",
        "/etc/hsm_shipper.toml",
        "--run-once",
        "--maintenance-now",
    ])
    .unwrap();

    assert_eq!(cli.config, PathBuf::from("/etc/hsm_shipper.toml"));
    assert!(cli.run_once);
    assert!(cli.maintenance_now);
}

#[test]
fn cli_defaults_flags_to_false() {
    let cli = Cli::try_parse_from(["hsm-shipperd", "-c", "/etc/hsm_shipper.toml"]).unwrap();
    assert!(!cli.run_once);
    assert!(!cli.maintenance_now);
}

#[test]
fn cli_requires_a_config_path() {
    assert!(Cli::try_parse_from(["hsm-shipperd"]).is_err());
}

#[test]
fn unix_now_returns_a_plausible_epoch_second() {
    // Any time after this crate was conceived; guards against an accidental
    // `unwrap_or(0)` fallback firing on a healthy clock.
    assert!(unix_now() > 1_700_000_000);
}

#[test]
fn file_writer_creates_the_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("nested").join("hsm-shipperd.log");

    let _ = file_writer(&log_path);

    assert!(log_path.parent().unwrap().is_dir());
}
