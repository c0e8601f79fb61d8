//! Transport primitives
//!
//! Thin traits over the std socket types so the stream and datagram servers
//! can be written once for both the INET and the UNIX families.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::net::{self as unix, UnixDatagram, UnixListener, UnixStream};

// =============================================================================
// Stream Transports
// =============================================================================

/// An accepted, connection-oriented socket
pub trait StreamConnection: Read + Write + Send + Sized + 'static {
    /// Second handle to the same socket (reader and writer live apart)
    fn try_clone_conn(&self) -> io::Result<Self>;

    /// Human-readable peer for logs
    fn peer_label(&self) -> String;

    /// Apply read/write timeouts; `None` blocks forever
    fn set_io_timeouts(&self, read: Option<Duration>, write: Option<Duration>) -> io::Result<()>;

    /// Accepted sockets may inherit non-blocking mode from the listener
    fn set_blocking(&self) -> io::Result<()>;

    /// Close both directions, waking any blocked reader
    fn shutdown_conn(&self) -> io::Result<()>;
}

/// A listening, connection-oriented socket
pub trait StreamListener: Send + 'static {
    type Conn: StreamConnection;

    fn accept_conn(&self) -> io::Result<Self::Conn>;

    fn set_accept_nonblocking(&self, nonblocking: bool) -> io::Result<()>;

    fn local_label(&self) -> String;
}

impl StreamConnection for TcpStream {
    fn try_clone_conn(&self) -> io::Result<Self> {
        self.try_clone()
    }

    fn peer_label(&self) -> String {
        self.peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    fn set_io_timeouts(&self, read: Option<Duration>, write: Option<Duration>) -> io::Result<()> {
        // Disable Nagle's algorithm, responses are tiny
        self.set_nodelay(true)?;
        self.set_read_timeout(read)?;
        self.set_write_timeout(write)
    }

    fn set_blocking(&self) -> io::Result<()> {
        self.set_nonblocking(false)
    }

    fn shutdown_conn(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

impl StreamListener for TcpListener {
    type Conn = TcpStream;

    fn accept_conn(&self) -> io::Result<TcpStream> {
        self.accept().map(|(stream, _)| stream)
    }

    fn set_accept_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.set_nonblocking(nonblocking)
    }

    fn local_label(&self) -> String {
        self.local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

#[cfg(unix)]
impl StreamConnection for UnixStream {
    fn try_clone_conn(&self) -> io::Result<Self> {
        self.try_clone()
    }

    fn peer_label(&self) -> String {
        // Clients of a UNIX socket are normally unnamed
        match self.peer_addr() {
            Ok(addr) => unix_addr_label(&addr),
            Err(_) => "unknown".to_string(),
        }
    }

    fn set_io_timeouts(&self, read: Option<Duration>, write: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(read)?;
        self.set_write_timeout(write)
    }

    fn set_blocking(&self) -> io::Result<()> {
        self.set_nonblocking(false)
    }

    fn shutdown_conn(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

#[cfg(unix)]
impl StreamListener for UnixListener {
    type Conn = UnixStream;

    fn accept_conn(&self) -> io::Result<UnixStream> {
        self.accept().map(|(stream, _)| stream)
    }

    fn set_accept_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.set_nonblocking(nonblocking)
    }

    fn local_label(&self) -> String {
        match self.local_addr() {
            Ok(addr) => unix_addr_label(&addr),
            Err(_) => "unknown".to_string(),
        }
    }
}

// =============================================================================
// Datagram Transports
// =============================================================================

/// A connectionless socket that answers each packet's sender
pub trait DatagramSocket: Send + 'static {
    type Addr: Clone + std::fmt::Debug + Send;

    fn recv_packet(&self, buf: &mut [u8]) -> io::Result<(usize, Self::Addr)>;

    fn send_packet(&self, buf: &[u8], peer: &Self::Addr) -> io::Result<usize>;

    /// Bounds how long `recv_packet` blocks
    fn set_recv_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    fn local_label(&self) -> String;
}

impl DatagramSocket for UdpSocket {
    type Addr = SocketAddr;

    fn recv_packet(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.recv_from(buf)
    }

    fn send_packet(&self, buf: &[u8], peer: &SocketAddr) -> io::Result<usize> {
        self.send_to(buf, peer)
    }

    fn set_recv_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(timeout)
    }

    fn local_label(&self) -> String {
        self.local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

#[cfg(unix)]
impl DatagramSocket for UnixDatagram {
    type Addr = unix::SocketAddr;

    fn recv_packet(&self, buf: &mut [u8]) -> io::Result<(usize, unix::SocketAddr)> {
        self.recv_from(buf)
    }

    fn send_packet(&self, buf: &[u8], peer: &unix::SocketAddr) -> io::Result<usize> {
        match peer.as_pathname() {
            Some(path) => self.send_to(buf, path),
            None => Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "peer socket is unnamed, cannot reply",
            )),
        }
    }

    fn set_recv_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(timeout)
    }

    fn local_label(&self) -> String {
        match self.local_addr() {
            Ok(addr) => unix_addr_label(&addr),
            Err(_) => "unknown".to_string(),
        }
    }
}

#[cfg(unix)]
fn unix_addr_label(addr: &unix::SocketAddr) -> String {
    match addr.as_pathname() {
        Some(path) => path.display().to_string(),
        None => "unnamed".to_string(),
    }
}

// =============================================================================
// Error Classification
// =============================================================================

/// The peer went away; not a server error
pub fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
    )
}

/// A blocking call gave up because of a timeout or non-blocking mode
pub fn is_timeout(err: &io::Error) -> bool {
    // Windows reports TimedOut where unix reports WouldBlock
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
