//! drpd: RealPort relay daemon, entry point.
//!
//! Bridges one local virtual-serial device node to a remote Digi terminal
//! server, reconnecting for ever.
//!
//! # Usage
//!
//! ```text
//! drpd [OPTIONS] <DEVICE> <SERVER>
//!
//! Options:
//!   -p, --port <PORT>        remote port [default: 771, or 1027 with TLS]
//!   -l, --link <FIELDS>      fast_rate[,fast_delay[,slow_rate[,slow_delay[,header_size]]]]
//!   -e, --encrypt <MODE>     none | encrypt | verify | mutual [default: none]
//!   -t, --timeout <SECS>     idle timeout; 0 or absent disables it
//!   -6, --ipv6               resolve and connect over IPv6
//!   -i, --interactive        wait for Enter between sessions
//!   -v, --verbose            debug-level logging
//!   -c, --config <FILE>      TOML file supplying any of the above
//!       --ca-file <FILE>     extra PEM trust anchors for verify mode
//! ```
//!
//! # Environment variable overrides
//!
//! Every option can also come from a `DRPD_*` variable (`DRPD_DEVICE`,
//! `DRPD_SERVER`, `DRPD_PORT`, `DRPD_LINK`, `DRPD_ENCRYPT`, `DRPD_TIMEOUT`,
//! `DRPD_IPV6`, `DRPD_INTERACTIVE`, `DRPD_VERBOSE`, `DRPD_CONFIG`,
//! `DRPD_CA_FILE`).  Command-line arguments take precedence over variables,
//! and both take precedence over the configuration file.
//!
//! # Architecture overview
//!
//! ```text
//! /dev/<device>  (raw bytes)
//!       ↕
//! drpd  ← this process
//!   domain/          DaemonConfig, TOML file
//!   application/     relay engine, peer check
//!   infrastructure/
//!     device         non-blocking device handle
//!     transport/tls  TCP socket, rustls client
//!     connection_manager  resolve → connect → session → pause → …
//!       ↕
//! RealPort unit  (TCP 771, or TLS 1027)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use realport_core::{AddressFamily, Endpoint, LinkConfig, SecurityMode};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use realport_relay::domain::{
    DaemonConfig, FileConfig, DEVICE_OPEN_WATCHDOG, MAX_IDLE_TIMEOUT_SECS, RETRY_DELAY,
};
use realport_relay::infrastructure::{
    load_ca_file, ConnectionManager, DeviceHandle, SystemResolver, TlsContext,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// RealPort relay daemon.
///
/// Keeps a connection to a Digi terminal server open and copies bytes
/// between it and a local virtual-serial device.
#[derive(Debug, Parser)]
#[command(
    name = "drpd",
    about = "RealPort relay between a virtual-serial device and a Digi terminal server",
    version
)]
struct Cli {
    /// Virtual-serial device node, e.g. /dev/dty/a000s.
    #[arg(env = "DRPD_DEVICE")]
    device: Option<PathBuf>,

    /// Host name or address of the terminal server.
    ///
    /// With `--encrypt verify` this is also the name the server certificate
    /// must carry.
    #[arg(env = "DRPD_SERVER")]
    server: Option<String>,

    /// Remote port.  Defaults to 771, or 1027 when TLS is used.
    #[arg(short, long, env = "DRPD_PORT")]
    port: Option<u16>,

    /// Link parameters pushed to the device once at startup.
    ///
    /// One to five comma-separated fields:
    /// fast_rate,fast_delay,slow_rate,slow_delay,header_size.
    #[arg(short, long, env = "DRPD_LINK")]
    link: Option<LinkConfig>,

    /// Connection security: none, encrypt, verify or mutual.
    #[arg(short, long, env = "DRPD_ENCRYPT")]
    encrypt: Option<SecurityMode>,

    /// Close a session after this many seconds without data from the
    /// server.  0 disables the check; at most one week.
    #[arg(
        short,
        long,
        env = "DRPD_TIMEOUT",
        value_parser = clap::value_parser!(u64).range(0..=MAX_IDLE_TIMEOUT_SECS)
    )]
    timeout: Option<u64>,

    /// Resolve and connect over IPv6.
    #[arg(short = '6', long, env = "DRPD_IPV6")]
    ipv6: bool,

    /// Wait for Enter on stdin between sessions instead of a fixed pause.
    #[arg(short, long, env = "DRPD_INTERACTIVE")]
    interactive: bool,

    /// Log routine events and debug detail.
    #[arg(short, long, env = "DRPD_VERBOSE")]
    verbose: bool,

    /// Optional TOML configuration file with a `[daemon]` table.
    #[arg(short, long, env = "DRPD_CONFIG")]
    config: Option<PathBuf>,

    /// Extra PEM trust anchors used with `--encrypt verify`.
    #[arg(long, env = "DRPD_CA_FILE")]
    ca_file: Option<PathBuf>,
}

impl Cli {
    /// Merges the parsed arguments over `file` into a [`DaemonConfig`].
    ///
    /// Options given on the command line win; switches are on when either
    /// source turns them on.  The port falls back to the security mode's
    /// default.
    ///
    /// # Errors
    ///
    /// Returns an error when neither source names the device or the server,
    /// or when the file's idle timeout is out of range.
    fn into_daemon_config(self, file: FileConfig) -> anyhow::Result<DaemonConfig> {
        let section = file.daemon;

        let device = self
            .device
            .or(section.device)
            .context("no device given: pass DEVICE or set `device` in the config file")?;
        let host = self
            .server
            .or(section.server)
            .filter(|host| !host.trim().is_empty())
            .context("no server given: pass SERVER or set `server` in the config file")?;

        let timeout = self.timeout.or(section.timeout).unwrap_or(0);
        anyhow::ensure!(
            timeout <= MAX_IDLE_TIMEOUT_SECS,
            "idle timeout {timeout}s exceeds the maximum of {MAX_IDLE_TIMEOUT_SECS}s"
        );

        let security = self.encrypt.or(section.encrypt).unwrap_or_default();
        let port = self
            .port
            .or(section.port)
            .unwrap_or_else(|| security.default_port());
        let family = if self.ipv6 || section.ipv6 {
            AddressFamily::V6
        } else {
            AddressFamily::V4
        };

        Ok(DaemonConfig {
            device,
            endpoint: Endpoint::new(host, port, family),
            security,
            link: self.link.or(section.link),
            idle_timeout: DaemonConfig::idle_timeout_from_secs(timeout),
            interactive: self.interactive || section.interactive,
            verbose: self.verbose || section.verbose,
            ca_file: self.ca_file.or(section.ca_file),
            retry_delay: RETRY_DELAY,
        })
    }
}

/// Builds the TLS client when the security mode needs one.
fn build_tls(config: &DaemonConfig) -> anyhow::Result<Option<TlsContext>> {
    if !config.security.is_secure() {
        if config.ca_file.is_some() {
            warn!("CA file ignored: the connection is not encrypted");
        }
        return Ok(None);
    }

    let extra_roots = match &config.ca_file {
        Some(path) if config.security.verifies_peer() => load_ca_file(path)
            .with_context(|| format!("cannot load trust anchors from {}", path.display()))?,
        Some(_) => {
            warn!("CA file ignored: the server certificate is not verified in this mode");
            Vec::new()
        }
        None => Vec::new(),
    };

    let tls = TlsContext::new(config.security, extra_roots).context("cannot set up TLS")?;
    Ok(Some(tls))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. Arguments are parsed and merged over the optional configuration file.
/// 2. Logging is initialised (`RUST_LOG`, else `info`, or `debug` with
///    `--verbose`).
/// 3. The device is opened under a watchdog and the link parameters, if
///    any, are pushed to it.
/// 4. The TLS client is built for secure modes.
/// 5. The connection manager runs until a fatal error, Ctrl+C or SIGTERM.
///
/// Any failure in steps 1 to 4 exits non-zero with the error chain.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // ── Configuration ─────────────────────────────────────────────────────────
    let cli = Cli::parse();
    let file = match &cli.config {
        Some(path) => FileConfig::load(path)
            .with_context(|| format!("cannot load configuration file {}", path.display()))?,
        None => FileConfig::default(),
    };
    let config = cli.into_daemon_config(file)?;

    init_tracing(config.verbose);
    info!(
        device = %config.device.display(),
        endpoint = %config.endpoint,
        family = %config.endpoint.family,
        security = %config.security,
        idle_timeout_secs = config.idle_timeout.map(|t| t.as_secs()),
        "drpd starting"
    );

    if let Err(e) = run(config).await {
        error!(error = %format!("{e:#}"), "drpd exiting");
        return Err(e);
    }
    Ok(())
}

/// Steps 3 to 5 of startup, then the relay itself.
async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    // ── Device ────────────────────────────────────────────────────────────────
    let device = DeviceHandle::open(&config.device, DEVICE_OPEN_WATCHDOG)
        .await
        .context("cannot open device")?;
    if let Some(link) = &config.link {
        device
            .apply_link(link)
            .context("cannot apply link configuration")?;
    }

    // ── TLS ───────────────────────────────────────────────────────────────────
    let tls = build_tls(&config)?;

    // ── Relay until stopped ───────────────────────────────────────────────────
    let mut sigterm =
        signal(SignalKind::terminate()).context("cannot install SIGTERM handler")?;
    let mut manager = ConnectionManager::new(config, device, Arc::new(SystemResolver), tls);

    tokio::select! {
        result = manager.run() => match result {
            Ok(never) => match never {},
            Err(fatal) => return Err(fatal).context("relay stopped"),
        },
        _ = tokio::signal::ctrl_c() => info!("received Ctrl+C, shutting down"),
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
    }

    info!(sessions = manager.sessions(), "drpd stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
