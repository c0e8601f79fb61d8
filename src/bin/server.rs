//! calcwire Server Binary
//!
//! Serves the calculator protocol on the chosen transport.

use std::path::PathBuf;

use calcwire::{Config, Server, TransportKind};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

/// calcwire Server
#[derive(Parser, Debug)]
#[command(name = "calcwire-server")]
#[command(about = "Calculator service over TCP, UDP and UNIX-domain sockets")]
#[command(version)]
struct Args {
    /// Transport: tcp, udp, unix-stream or unix-dgram
    #[arg(short, long, default_value = "tcp")]
    transport: TransportKind,

    /// Listen address (host:port) for tcp/udp
    #[arg(short, long, default_value = "0.0.0.0:6666")]
    listen: String,

    /// Socket file for the unix transports
    #[arg(short, long, default_value = "/tmp/calc_svc.sock")]
    socket: PathBuf,

    /// Ring buffer capacity per connection, in bytes
    #[arg(short, long, default_value = "256")]
    ring_buffer: usize,

    /// Maximum concurrent connections (stream transports)
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Close idle connections after this many milliseconds (0 = never)
    #[arg(long, default_value = "0")]
    idle_timeout_ms: u64,

    /// Share one calculator memory across all connections
    #[arg(long)]
    shared_memory: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,calcwire=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("calcwire Server v{}", calcwire::VERSION);
    tracing::info!("Transport: {}", args.transport);

    // Build config from args
    let config = Config::builder()
        .transport(args.transport)
        .listen_addr(&args.listen)
        .socket_path(&args.socket)
        .ring_buffer_size(args.ring_buffer)
        .max_connections(args.max_connections)
        .read_timeout_ms(args.idle_timeout_ms)
        .shared_memory(args.shared_memory)
        .build();

    let server = match Server::bind(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Listening on {}", server.local_endpoint());

    // Set up Ctrl+C handler
    let shutdown = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        shutdown.shutdown();
    }) {
        tracing::warn!("Could not install Ctrl+C handler: {}", e);
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
