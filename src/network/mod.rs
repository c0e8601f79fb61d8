//! Network Module
//!
//! Transport adapters and the server built on them.
//!
//! ## Architecture
//! - Stream transports (TCP, UNIX stream): single acceptor thread, one
//!   worker thread per connection, each owning its own deserializer
//! - Datagram transports (UDP, UNIX datagram): one single-threaded receive
//!   loop, one deserializer for the process, replies addressed per packet
//! - Requests are answered through a [`Session`] bound to the transport

mod transport;
mod session;
mod connection;
mod stream;
mod datagram;
mod server;

pub use transport::{
    is_disconnect, is_timeout, DatagramSocket, StreamConnection, StreamListener,
};
pub use session::{ResponseWriter, Session, StreamWriter};
pub use connection::Connection;
pub use stream::StreamServer;
pub use datagram::{DatagramReply, DatagramServer};
pub use server::{Endpoint, RunningServer, Server, ShutdownHandle};
