//! proxydhcpd - ProxyDHCP server for PXE boot redirection.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use nix::sys::signal::{SigSet, Signal};
use tracing_subscriber::EnvFilter;

use proxydhcpd::authz::{AllowAll, Allower, FileAllower};
use proxydhcpd::config::ProxyConfig;
use proxydhcpd::proxydhcp::ProxyDhcpServer;

#[derive(Parser)]
#[command(name = "proxydhcpd")]
#[command(about = "ProxyDHCP server answering PXE boot requests alongside an existing DHCP server")]
struct Cli {
    /// IP associated to the network interface to listen on.
    #[arg(long, default_value_t = Ipv4Addr::UNSPECIFIED)]
    proxy_bind_ip: Ipv4Addr,

    /// IP and port of the TFTP server providing iPXE binaries (e.g. 192.168.2.5:69).
    #[arg(long)]
    remote_tftp: SocketAddrV4,

    /// IP and port of the HTTP server providing iPXE binaries (e.g. 192.168.2.4:80).
    #[arg(long)]
    remote_http: SocketAddrV4,

    /// URL where the iPXE script is served (e.g. http://192.168.2.3:8080).
    #[arg(long)]
    remote_ipxe: String,

    /// Name of the iPXE script handed to chainloaded clients.
    #[arg(long, default_value = "auto.ipxe")]
    ipxe_script_name: String,

    /// Custom user class (DHCP option 77) that pivots a client to the iPXE script.
    #[arg(long, default_value = "")]
    custom_user_class: String,

    /// Path to a `mac,allow` allowlist. All clients are allowed when omitted.
    #[arg(long)]
    allow_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = match ProxyConfig::new(
        cli.proxy_bind_ip,
        cli.remote_tftp,
        cli.remote_http,
        &cli.remote_ipxe,
        cli.ipxe_script_name,
        cli.custom_user_class,
    ) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let allower: Arc<dyn Allower> = match &cli.allow_file {
        Some(path) => match FileAllower::load(path) {
            Ok(allower) => Arc::new(allower),
            Err(e) => {
                eprintln!("error: failed to load allowlist: {e:#}");
                return ExitCode::FAILURE;
            }
        },
        None => Arc::new(AllowAll),
    };

    // Block the shutdown signals before any thread starts so they all
    // inherit the mask and the main thread can sigwait below.
    let mut signals = SigSet::empty();
    signals.add(Signal::SIGINT);
    signals.add(Signal::SIGTERM);
    if let Err(e) = signals.thread_block() {
        eprintln!("error: failed to set up signal handling: {e}");
        return ExitCode::FAILURE;
    }

    let server = ProxyDhcpServer::new(config, allower);
    let running = server.running_flag();

    thread::spawn(move || {
        match signals.wait() {
            Ok(signal) => tracing::info!("received {signal}, shutting down"),
            Err(e) => tracing::error!("signal wait failed: {e}"),
        }
        running.store(false, Ordering::SeqCst);
    });

    match server.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
