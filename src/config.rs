//! Configuration for calcwire
//!
//! Centralized configuration with sensible defaults.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::CalcError;

/// Socket family and type used to carry the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// TCP stream socket
    Tcp,

    /// UDP datagram socket
    Udp,

    /// UNIX-domain stream socket
    UnixStream,

    /// UNIX-domain datagram socket
    UnixDatagram,
}

impl TransportKind {
    /// Whether this transport is connection-oriented
    pub fn is_stream(self) -> bool {
        matches!(self, TransportKind::Tcp | TransportKind::UnixStream)
    }

    /// Whether this transport is addressed by a filesystem path
    pub fn is_unix(self) -> bool {
        matches!(self, TransportKind::UnixStream | TransportKind::UnixDatagram)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Tcp => "tcp",
            TransportKind::Udp => "udp",
            TransportKind::UnixStream => "unix-stream",
            TransportKind::UnixDatagram => "unix-dgram",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(TransportKind::Tcp),
            "udp" => Ok(TransportKind::Udp),
            "unix-stream" | "unix" | "uds" => Ok(TransportKind::UnixStream),
            "unix-dgram" | "unix-datagram" => Ok(TransportKind::UnixDatagram),
            other => Err(CalcError::Config(format!(
                "unknown transport '{}' (expected tcp, udp, unix-stream or unix-dgram)",
                other
            ))),
        }
    }
}

/// Main configuration for a calcwire server
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Transport Configuration
    // -------------------------------------------------------------------------
    /// Which socket type to serve on
    pub transport: TransportKind,

    /// Listen address (host:port) for TCP and UDP
    pub listen_addr: String,

    /// Socket file for the UNIX-domain transports
    pub socket_path: PathBuf,

    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Capacity of each deserializer ring buffer (bytes)
    pub ring_buffer_size: usize,

    /// Size of a single read from a stream connection (bytes)
    pub read_chunk_size: usize,

    /// Receive buffer for a single datagram (bytes)
    pub datagram_buffer_size: usize,

    // -------------------------------------------------------------------------
    // Connection Configuration
    // -------------------------------------------------------------------------
    /// Max concurrent stream connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = block forever)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = block forever)
    pub write_timeout_ms: u64,

    /// How often the accept/recv loop checks for shutdown (milliseconds)
    pub accept_poll_ms: u64,

    // -------------------------------------------------------------------------
    // Service Configuration
    // -------------------------------------------------------------------------
    /// Share one calculator memory across all stream connections
    pub shared_memory: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: TransportKind::Tcp,
            listen_addr: "127.0.0.1:6666".to_string(),
            socket_path: PathBuf::from("/tmp/calc_svc.sock"),
            ring_buffer_size: 256,
            read_chunk_size: 128,
            datagram_buffer_size: 256,
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 0,
            accept_poll_ms: 50,
            shared_memory: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check values that would otherwise fail deep inside the server
    pub fn validate(&self) -> crate::Result<()> {
        if self.ring_buffer_size < 2 {
            return Err(CalcError::Config(format!(
                "ring_buffer_size must be at least 2, got {}",
                self.ring_buffer_size
            )));
        }
        if self.read_chunk_size == 0 {
            return Err(CalcError::Config("read_chunk_size must be non-zero".to_string()));
        }
        if self.datagram_buffer_size == 0 {
            return Err(CalcError::Config("datagram_buffer_size must be non-zero".to_string()));
        }
        if self.max_connections == 0 {
            return Err(CalcError::Config("max_connections must be non-zero".to_string()));
        }
        if self.accept_poll_ms == 0 {
            return Err(CalcError::Config("accept_poll_ms must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the transport kind
    pub fn transport(mut self, transport: TransportKind) -> Self {
        self.config.transport = transport;
        self
    }

    /// Set the TCP/UDP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the UNIX socket path
    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.socket_path = path.into();
        self
    }

    /// Set the deserializer ring buffer capacity (in bytes)
    pub fn ring_buffer_size(mut self, size: usize) -> Self {
        self.config.ring_buffer_size = size;
        self
    }

    /// Set the stream read chunk size (in bytes)
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.config.read_chunk_size = size;
        self
    }

    /// Set the datagram receive buffer size (in bytes)
    pub fn datagram_buffer_size(mut self, size: usize) -> Self {
        self.config.datagram_buffer_size = size;
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the shutdown poll interval (in milliseconds)
    pub fn accept_poll_ms(mut self, ms: u64) -> Self {
        self.config.accept_poll_ms = ms;
        self
    }

    /// Share calculator memory across connections
    pub fn shared_memory(mut self, shared: bool) -> Self {
        self.config.shared_memory = shared;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// Configuration for a calcwire client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Which socket type to connect with
    pub transport: TransportKind,

    /// Server address (host:port) for TCP and UDP
    pub server_addr: String,

    /// Server socket file for the UNIX-domain transports
    pub socket_path: PathBuf,

    /// Local socket file a UNIX datagram client binds to receive replies.
    /// Derived from the process id when unset.
    pub local_socket_path: Option<PathBuf>,

    /// Capacity of the response deserializer ring buffer (bytes)
    pub ring_buffer_size: usize,

    /// How long `call` waits for the matching response (milliseconds)
    pub response_timeout_ms: u64,

    /// How often the reader thread checks for close (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Tcp,
            server_addr: "127.0.0.1:6666".to_string(),
            socket_path: PathBuf::from("/tmp/calc_svc.sock"),
            local_socket_path: None,
            ring_buffer_size: 128,
            response_timeout_ms: 5000,
            poll_interval_ms: 50,
        }
    }
}

impl ClientConfig {
    /// Derive a client config that targets the endpoint a server config serves
    pub fn for_server(config: &Config) -> Self {
        Self {
            transport: config.transport,
            server_addr: config.listen_addr.clone(),
            socket_path: config.socket_path.clone(),
            ..Self::default()
        }
    }
}
