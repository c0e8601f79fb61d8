//! Server
//!
//! Binds the configured transport and dispatches to the stream or datagram
//! serving loop.

use std::fmt;
use std::net::{SocketAddr, TcpListener, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[cfg(unix)]
use std::os::unix::net::{UnixDatagram, UnixListener};
#[cfg(unix)]
use std::path::{Path, PathBuf};

use crate::config::{Config, TransportKind};
use crate::error::{CalcError, Result};

use super::datagram::DatagramServer;
use super::stream::StreamServer;

/// Address a server is reachable at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Inet(SocketAddr),
    #[cfg(unix)]
    Unix(PathBuf),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Inet(addr) => write!(f, "{}", addr),
            #[cfg(unix)]
            Endpoint::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Requests a graceful stop of a running server
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

enum Bound {
    Tcp(StreamServer<TcpListener>),
    Udp(DatagramServer<UdpSocket>),
    #[cfg(unix)]
    UnixStream(StreamServer<UnixListener>),
    #[cfg(unix)]
    UnixDatagram(DatagramServer<UnixDatagram>),
}

/// Calculator server for any of the supported transports
pub struct Server {
    bound: Bound,
    endpoint: Endpoint,
    transport: TransportKind,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Bind the endpoint described by the config
    ///
    /// A port of 0 binds an ephemeral port; see [`Server::local_endpoint`].
    pub fn bind(config: Config) -> Result<Self> {
        config.validate()?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let transport = config.transport;

        let (bound, endpoint) = match transport {
            TransportKind::Tcp => {
                let listener = TcpListener::bind(&config.listen_addr)
                    .map_err(|e| bind_error(&config.listen_addr, e))?;
                let endpoint = Endpoint::Inet(listener.local_addr()?);
                (Bound::Tcp(StreamServer::new(listener, config, flag)), endpoint)
            }
            TransportKind::Udp => {
                let socket = UdpSocket::bind(&config.listen_addr)
                    .map_err(|e| bind_error(&config.listen_addr, e))?;
                let endpoint = Endpoint::Inet(socket.local_addr()?);
                (Bound::Udp(DatagramServer::new(socket, config, flag)), endpoint)
            }
            #[cfg(unix)]
            TransportKind::UnixStream => {
                let path = config.socket_path.clone();
                remove_stale_socket(&path)?;
                let listener = UnixListener::bind(&path)
                    .map_err(|e| bind_error(&path.display(), e))?;
                (
                    Bound::UnixStream(StreamServer::new(listener, config, flag)),
                    Endpoint::Unix(path),
                )
            }
            #[cfg(unix)]
            TransportKind::UnixDatagram => {
                let path = config.socket_path.clone();
                remove_stale_socket(&path)?;
                let socket = UnixDatagram::bind(&path)
                    .map_err(|e| bind_error(&path.display(), e))?;
                (
                    Bound::UnixDatagram(DatagramServer::new(socket, config, flag)),
                    Endpoint::Unix(path),
                )
            }
            #[cfg(not(unix))]
            TransportKind::UnixStream | TransportKind::UnixDatagram => {
                return Err(CalcError::Config(format!(
                    "{} sockets are not available on this platform",
                    transport
                )));
            }
        };

        tracing::info!("Bound {} server at {}", transport, endpoint);

        Ok(Self {
            bound,
            endpoint,
            transport,
            shutdown,
        })
    }

    /// Where clients should connect
    pub fn local_endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
        }
    }

    /// Serve until shutdown is requested (blocking)
    pub fn run(self) -> Result<()> {
        let result = match self.bound {
            Bound::Tcp(mut server) => server.run(),
            Bound::Udp(mut server) => server.run(),
            #[cfg(unix)]
            Bound::UnixStream(mut server) => server.run(),
            #[cfg(unix)]
            Bound::UnixDatagram(mut server) => server.run(),
        };

        #[cfg(unix)]
        if let Endpoint::Unix(path) = &self.endpoint {
            let _ = std::fs::remove_file(path);
        }

        result
    }

    /// Serve on a dedicated thread
    pub fn spawn(self) -> Result<RunningServer> {
        let endpoint = self.endpoint.clone();
        let shutdown = self.shutdown_handle();

        let thread = thread::Builder::new()
            .name("calc-accept".to_string())
            .spawn(move || self.run())?;

        Ok(RunningServer {
            endpoint,
            shutdown,
            thread: Some(thread),
        })
    }
}

/// A server running on its own thread; stopped when dropped
pub struct RunningServer {
    endpoint: Endpoint,
    shutdown: ShutdownHandle,
    thread: Option<JoinHandle<Result<()>>>,
}

impl RunningServer {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Signal shutdown and wait for the serving thread
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.shutdown();
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| CalcError::Network("server thread panicked".to_string()))?,
            None => Ok(()),
        }
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.shutdown.shutdown();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn bind_error(addr: impl fmt::Display, err: std::io::Error) -> CalcError {
    CalcError::Network(format!("could not bind {}: {}", addr, err))
}

/// Remove a socket file left behind by a previous run
#[cfg(unix)]
fn remove_stale_socket(path: &Path) -> Result<()> {
    use std::os::unix::fs::FileTypeExt;

    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            tracing::debug!("Removing stale socket file {}", path.display());
            std::fs::remove_file(path)?;
            Ok(())
        }
        Ok(_) => Err(CalcError::Config(format!(
            "{} exists and is not a socket",
            path.display()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
