//! CLI front-end for the `fakewiimote` core.
//!
//! This binary is deliberately thin: it is the "CLI, logging, platform
//! bring-up glue" the specification places out of scope for the core
//! itself. It wires a [`Manager`] to a conservative in-process fake of the
//! HCI/L2CAP collaborators so the tick loop can run (and be watched via
//! `RUST_LOG`) without a real Bluetooth controller or USB gamepad attached.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fakewiimote::addr::BdAddr;
use fakewiimote::error::Result;
use fakewiimote::hci::ConnHandle;
use fakewiimote::transport::{HciTransport, L2capTransport};
use fakewiimote::{Config, Manager};

/// Presents synthetic Wiimote controllers to a Bluetooth host, sourcing
/// their input from physical USB gamepads.
#[derive(Parser, Debug)]
#[command(name = "fakewiimoted", version, about)]
struct Args {
    /// Path to a TOML config file overriding `Config::default()`.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Maximum simultaneously active fake Wiimote sessions; overrides
    /// both the default and any value from `--config`.
    #[arg(long)]
    max_sessions: Option<usize>,

    /// Tick period in milliseconds (`§5`: the core tolerates 1-20ms).
    #[arg(long, default_value_t = 10)]
    tick_ms: u64,

    /// Increase log verbosity; repeatable (`-v`, `-vv`, `-vvv`).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// A conservative fake of the HCI collaborator (`§1` Out of scope, `§6`):
/// every primitive always succeeds and logs what it was asked to send, so
/// the tick loop can be smoke-tested without a real controller.
#[derive(Debug, Default)]
struct NullHci {
    next_handle: u16,
}

impl HciTransport for NullHci {
    fn request_connection(&mut self, bd_addr: BdAddr, class: [u8; 3], link_type: u8) -> bool {
        info!(?bd_addr, ?class, link_type, "hci_request_connection");
        true
    }

    fn enqueue_event(&mut self, event: Vec<u8>) -> Result<()> {
        info!(len = event.len(), "enqueue hci event");
        Ok(())
    }

    fn alloc_con_handle(&mut self) -> ConnHandle {
        self.next_handle += 1;
        ConnHandle::new(self.next_handle)
    }
}

/// A conservative fake of the L2CAP collaborator, paired with [`NullHci`].
#[derive(Debug, Default)]
struct NullL2cap;

impl L2capTransport for NullL2cap {
    fn send(&mut self, handle: ConnHandle, packet: Vec<u8>) -> Result<()> {
        info!(?handle, len = packet.len(), "l2cap send");
        Ok(())
    }
}

fn load_config(args: &Args) -> Config {
    let mut config = match &args.config {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(s) => Config::from_toml_str(&s).unwrap_or_else(|e| {
                warn!(error = %e, path = %path.display(), "failed to parse config, using defaults");
                Config::default()
            }),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to read config, using defaults");
                Config::default()
            }
        },
        None => Config::default(),
    };
    if let Some(max_sessions) = args.max_sessions {
        config.max_sessions = max_sessions;
    }
    config
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_path_falls_back_to_defaults_silently() {
        let args = Args {
            config: None,
            max_sessions: None,
            tick_ms: 10,
            verbose: 0,
        };
        let config = load_config(&args);
        assert_eq!(config.max_sessions, Config::default().max_sessions);
    }

    #[test]
    fn max_sessions_flag_overrides_the_loaded_config() {
        let args = Args {
            config: None,
            max_sessions: Some(2),
            tick_ms: 10,
            verbose: 0,
        };
        let config = load_config(&args);
        assert_eq!(config.max_sessions, 2);
    }

    #[tracing_test::traced_test]
    #[test]
    fn unparsable_config_file_warns_and_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join(format!("fakewiimoted-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad_config.toml");
        std::fs::write(&path, "max_sessions = \"not a number\"").unwrap();

        let args = Args {
            config: Some(path.clone()),
            max_sessions: None,
            tick_ms: 10,
            verbose: 0,
        };
        let config = load_config(&args);
        assert_eq!(config.max_sessions, Config::default().max_sessions);
        assert!(logs_contain("failed to parse config, using defaults"));

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_dir(&dir);
    }
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = load_config(&args);
    info!(?config, "starting fakewiimote daemon");

    let mut manager = Manager::new(&config);
    let mut hci = NullHci::default();
    let mut l2cap = NullL2cap;
    let period = Duration::from_millis(args.tick_ms.max(1));

    loop {
        manager.tick(&mut hci, &mut l2cap);
        std::thread::sleep(period);
    }
}
