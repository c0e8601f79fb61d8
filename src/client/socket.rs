//! Client sockets
//!
//! One connected socket per transport kind, behind a single enum so the
//! client does not need to be generic.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::path::PathBuf;
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::net::{UnixDatagram, UnixStream};
#[cfg(unix)]
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::{ClientConfig, TransportKind};
use crate::error::{CalcError, Result};

/// A socket connected to a calcwire server
pub(crate) enum ClientSocket {
    Tcp(TcpStream),
    Udp(UdpSocket),
    #[cfg(unix)]
    UnixStream(UnixStream),
    #[cfg(unix)]
    UnixDatagram(UnixDatagram),
}

impl ClientSocket {
    /// Connect according to the config
    ///
    /// Also returns the path of a socket file the client created, if any,
    /// so it can be removed on close.
    pub(crate) fn connect(config: &ClientConfig) -> Result<(Self, Option<PathBuf>)> {
        match config.transport {
            TransportKind::Tcp => {
                let stream = TcpStream::connect(&config.server_addr).map_err(|e| {
                    CalcError::Network(format!("could not connect to {}: {}", config.server_addr, e))
                })?;
                stream.set_nodelay(true)?;
                Ok((ClientSocket::Tcp(stream), None))
            }
            TransportKind::Udp => {
                let server = resolve(&config.server_addr)?;
                let local = if server.is_ipv4() {
                    SocketAddr::from(([0, 0, 0, 0], 0))
                } else {
                    SocketAddr::from(([0u16; 8], 0))
                };

                let socket = UdpSocket::bind(local)?;
                socket.connect(server)?;
                Ok((ClientSocket::Udp(socket), None))
            }
            #[cfg(unix)]
            TransportKind::UnixStream => {
                let stream = UnixStream::connect(&config.socket_path).map_err(|e| {
                    CalcError::Network(format!(
                        "could not connect to {}: {}",
                        config.socket_path.display(),
                        e
                    ))
                })?;
                Ok((ClientSocket::UnixStream(stream), None))
            }
            #[cfg(unix)]
            TransportKind::UnixDatagram => {
                // The server can only reply to a named socket
                let local = config
                    .local_socket_path
                    .clone()
                    .unwrap_or_else(unique_client_path);
                if local.exists() {
                    std::fs::remove_file(&local)?;
                }

                let socket = UnixDatagram::bind(&local)?;
                if let Err(e) = socket.connect(&config.socket_path) {
                    let _ = std::fs::remove_file(&local);
                    return Err(CalcError::Network(format!(
                        "could not connect to {}: {}",
                        config.socket_path.display(),
                        e
                    )));
                }
                Ok((ClientSocket::UnixDatagram(socket), Some(local)))
            }
            #[cfg(not(unix))]
            TransportKind::UnixStream | TransportKind::UnixDatagram => Err(CalcError::Config(
                format!("{} sockets are not available on this platform", config.transport),
            )),
        }
    }

    pub(crate) fn try_clone(&self) -> io::Result<Self> {
        Ok(match self {
            ClientSocket::Tcp(s) => ClientSocket::Tcp(s.try_clone()?),
            ClientSocket::Udp(s) => ClientSocket::Udp(s.try_clone()?),
            #[cfg(unix)]
            ClientSocket::UnixStream(s) => ClientSocket::UnixStream(s.try_clone()?),
            #[cfg(unix)]
            ClientSocket::UnixDatagram(s) => ClientSocket::UnixDatagram(s.try_clone()?),
        })
    }

    /// Datagram sockets deliver whole messages per receive
    pub(crate) fn is_datagram(&self) -> bool {
        match self {
            ClientSocket::Tcp(_) => false,
            ClientSocket::Udp(_) => true,
            #[cfg(unix)]
            ClientSocket::UnixStream(_) => false,
            #[cfg(unix)]
            ClientSocket::UnixDatagram(_) => true,
        }
    }

    /// Send one complete frame
    pub(crate) fn send_frame(&self, frame: &[u8]) -> io::Result<()> {
        let sent = match self {
            ClientSocket::Tcp(s) => return (&*s).write_all(frame),
            ClientSocket::Udp(s) => s.send(frame)?,
            #[cfg(unix)]
            ClientSocket::UnixStream(s) => return (&*s).write_all(frame),
            #[cfg(unix)]
            ClientSocket::UnixDatagram(s) => s.send(frame)?,
        };

        if sent < frame.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("wrote {} of {} bytes", sent, frame.len()),
            ));
        }
        Ok(())
    }

    pub(crate) fn recv_chunk(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ClientSocket::Tcp(s) => (&*s).read(buf),
            ClientSocket::Udp(s) => s.recv(buf),
            #[cfg(unix)]
            ClientSocket::UnixStream(s) => (&*s).read(buf),
            #[cfg(unix)]
            ClientSocket::UnixDatagram(s) => s.recv(buf),
        }
    }

    pub(crate) fn set_recv_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            ClientSocket::Tcp(s) => s.set_read_timeout(timeout),
            ClientSocket::Udp(s) => s.set_read_timeout(timeout),
            #[cfg(unix)]
            ClientSocket::UnixStream(s) => s.set_read_timeout(timeout),
            #[cfg(unix)]
            ClientSocket::UnixDatagram(s) => s.set_read_timeout(timeout),
        }
    }

    /// Stop further traffic; streams wake their blocked reader
    pub(crate) fn close(&self) {
        let _ = match self {
            ClientSocket::Tcp(s) => s.shutdown(Shutdown::Both),
            ClientSocket::Udp(_) => Ok(()),
            #[cfg(unix)]
            ClientSocket::UnixStream(s) => s.shutdown(Shutdown::Both),
            #[cfg(unix)]
            ClientSocket::UnixDatagram(s) => s.shutdown(Shutdown::Both),
        };
    }
}

fn resolve(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|e| CalcError::Network(format!("could not resolve {}: {}", addr, e)))?
        .next()
        .ok_or_else(|| CalcError::Network(format!("no address found for {}", addr)))
}

#[cfg(unix)]
fn unique_client_path() -> PathBuf {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("calcwire-client-{}-{}.sock", std::process::id(), n))
}
