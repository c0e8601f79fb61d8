//! Transport Tests
//!
//! Tests for the connection handler, the stream accept loop and the
//! datagram receive loop over real sockets.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use calcwire::network::{
    is_disconnect, is_timeout, Connection, DatagramServer, StreamServer,
};
use calcwire::{CalcService, Calculator, Config};

// =============================================================================
// Test Helpers
// =============================================================================

const TIMEOUT: Duration = Duration::from_secs(5);

fn test_config() -> Config {
    Config::builder().accept_poll_ms(10).build()
}

/// Read until `expected` bytes arrived (responses may be split)
fn read_exact_text(stream: &mut impl Read, expected: usize) -> String {
    let mut buf = vec![0u8; expected];
    stream.read_exact(&mut buf).unwrap();
    String::from_utf8(buf).unwrap()
}

fn udp_pair() -> (UdpSocket, SocketAddr, UdpSocket, SocketAddr) {
    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    let server_addr = server.local_addr().unwrap();
    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    client.set_read_timeout(Some(TIMEOUT)).unwrap();
    let client_addr = client.local_addr().unwrap();
    (server, server_addr, client, client_addr)
}

fn recv_text(socket: &UdpSocket) -> String {
    let mut buf = [0u8; 256];
    let (n, _) = socket.recv_from(&mut buf).unwrap();
    String::from_utf8(buf[..n].to_vec()).unwrap()
}

// =============================================================================
// Connection Tests
// =============================================================================

#[test]
fn test_connection_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let mut client = TcpStream::connect(addr).unwrap();
    client.set_read_timeout(Some(TIMEOUT)).unwrap();
    let (accepted, _) = listener.accept().unwrap();

    let service: Arc<dyn Calculator> = Arc::new(CalcService::new());
    let config = test_config();
    let worker = thread::spawn(move || {
        let mut conn = Connection::new(accepted, service, &config).unwrap();
        let result = conn.handle();
        (result.is_ok(), conn.requests_handled())
    });

    // Message split across two writes
    client.write_all(b"1620#MUL#16").unwrap();
    client.flush().unwrap();
    thread::sleep(Duration::from_millis(20));
    client.write_all(b"#20$").unwrap();
    assert_eq!(read_exact_text(&mut client, 11), "1620#0#320$");

    client.write_all(b"2#DIV#5#0$3#XYZ#1#1$").unwrap();
    assert_eq!(read_exact_text(&mut client, 12), "2#4#0$3#2#0$");

    client.shutdown(Shutdown::Write).unwrap();
    let (ok, handled) = worker.join().unwrap();
    assert!(ok);
    assert_eq!(handled, 2);
}

#[cfg(unix)]
#[test]
fn test_connection_over_unix_stream() {
    use std::os::unix::net::UnixStream;

    let (server_side, mut client) = UnixStream::pair().unwrap();
    client.set_read_timeout(Some(TIMEOUT)).unwrap();

    let config = test_config();
    let worker = thread::spawn(move || {
        let mut conn =
            Connection::new(server_side, Arc::new(CalcService::new()), &config).unwrap();
        conn.handle().is_ok()
    });

    client.write_all(b"1#ADDM#5#5$2#GETMEM#0#0$").unwrap();
    assert_eq!(read_exact_text(&mut client, 14), "1#0#10$2#0#10$");

    drop(client);
    assert!(worker.join().unwrap());
}

#[cfg(unix)]
#[test]
fn test_connection_reports_overflow_and_recovers() {
    use std::os::unix::net::UnixStream;

    let (server_side, mut client) = UnixStream::pair().unwrap();
    client.set_read_timeout(Some(TIMEOUT)).unwrap();

    let config = Config::builder().ring_buffer_size(16).read_chunk_size(8).build();
    let worker = thread::spawn(move || {
        let mut conn =
            Connection::new(server_side, Arc::new(CalcService::new()), &config).unwrap();
        conn.handle().is_ok()
    });

    client
        .write_all(b"1#ADD#12345678901234567890#1$2#SUB#3#1$")
        .unwrap();
    assert_eq!(read_exact_text(&mut client, 13), "-1#1#0$2#0#2$");

    drop(client);
    assert!(worker.join().unwrap());
}

// =============================================================================
// Stream Server Tests
// =============================================================================

#[test]
fn test_stream_server_isolates_memory_per_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&shutdown);
    let server = thread::spawn(move || {
        let mut server = StreamServer::new(listener, test_config(), flag);
        server.run().is_ok()
    });

    let mut first = TcpStream::connect(addr).unwrap();
    first.set_read_timeout(Some(TIMEOUT)).unwrap();
    first.write_all(b"1#ADDM#5#5$").unwrap();
    assert_eq!(read_exact_text(&mut first, 7), "1#0#10$");

    let mut second = TcpStream::connect(addr).unwrap();
    second.set_read_timeout(Some(TIMEOUT)).unwrap();
    second.write_all(b"1#GETMEM#0#0$").unwrap();
    assert_eq!(read_exact_text(&mut second, 6), "1#0#0$");

    shutdown.store(true, Ordering::Relaxed);
    assert!(server.join().unwrap());
}

#[test]
fn test_stream_server_shared_memory() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Arc::new(AtomicBool::new(false));

    let config = Config::builder()
        .accept_poll_ms(10)
        .shared_memory(true)
        .build();
    let flag = Arc::clone(&shutdown);
    let server = thread::spawn(move || StreamServer::new(listener, config, flag).run().is_ok());

    let mut first = TcpStream::connect(addr).unwrap();
    first.set_read_timeout(Some(TIMEOUT)).unwrap();
    first.write_all(b"1#ADDM#5#5$").unwrap();
    assert_eq!(read_exact_text(&mut first, 7), "1#0#10$");

    let mut second = TcpStream::connect(addr).unwrap();
    second.set_read_timeout(Some(TIMEOUT)).unwrap();
    second.write_all(b"1#GETMEM#0#0$").unwrap();
    assert_eq!(read_exact_text(&mut second, 7), "1#0#10$");

    shutdown.store(true, Ordering::Relaxed);
    assert!(server.join().unwrap());
}

#[test]
fn test_stream_server_rejects_over_limit() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Arc::new(AtomicBool::new(false));

    let config = Config::builder()
        .accept_poll_ms(10)
        .max_connections(1)
        .build();
    let flag = Arc::clone(&shutdown);
    let server = thread::spawn(move || StreamServer::new(listener, config, flag).run().is_ok());

    let mut first = TcpStream::connect(addr).unwrap();
    first.set_read_timeout(Some(TIMEOUT)).unwrap();
    first.write_all(b"1#ADD#1#1$").unwrap();
    assert_eq!(read_exact_text(&mut first, 6), "1#0#2$");

    // The second client is accepted and immediately closed
    let mut second = TcpStream::connect(addr).unwrap();
    second.set_read_timeout(Some(TIMEOUT)).unwrap();
    let mut buf = [0u8; 16];
    match second.read(&mut buf) {
        Ok(n) => assert_eq!(n, 0),
        Err(e) => assert!(is_disconnect(&e), "unexpected error: {}", e),
    }

    shutdown.store(true, Ordering::Relaxed);
    assert!(server.join().unwrap());
}

#[test]
fn test_stream_server_shutdown_closes_open_connections() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&shutdown);
    let server = thread::spawn(move || StreamServer::new(listener, test_config(), flag).run());

    let mut client = TcpStream::connect(addr).unwrap();
    client.set_read_timeout(Some(TIMEOUT)).unwrap();
    client.write_all(b"1#ADD#1#1$").unwrap();
    assert_eq!(read_exact_text(&mut client, 6), "1#0#2$");

    // An idle client must not keep the server from stopping
    shutdown.store(true, Ordering::Relaxed);
    assert!(server.join().unwrap().is_ok());

    let mut buf = [0u8; 16];
    match client.read(&mut buf) {
        Ok(n) => assert_eq!(n, 0),
        Err(e) => assert!(is_disconnect(&e), "unexpected error: {}", e),
    }
}

// =============================================================================
// Datagram Server Tests
// =============================================================================

#[test]
fn test_datagram_packet_answered_to_sender() {
    let (server_socket, _, client, client_addr) = udp_pair();
    let mut server = DatagramServer::new(server_socket, test_config(), Arc::default());

    server.handle_packet(b"1620#MUL#16#20$", client_addr).unwrap();
    assert_eq!(recv_text(&client), "1620#0#320$");
}

#[test]
fn test_datagram_without_frame_gets_unattributed_error() {
    let (server_socket, _, client, client_addr) = udp_pair();
    let mut server = DatagramServer::new(server_socket, test_config(), Arc::default());

    server.handle_packet(b"hello", client_addr).unwrap();
    assert_eq!(recv_text(&client), "-1#1#0$");
}

#[test]
fn test_datagram_fragment_not_carried_over() {
    let (server_socket, _, client, client_addr) = udp_pair();
    let mut server = DatagramServer::new(server_socket, test_config(), Arc::default());

    server.handle_packet(b"1#ADD#1", client_addr).unwrap();
    assert_eq!(recv_text(&client), "-1#1#0$");

    // Were the fragment kept, this would parse as "1#ADD#12#ADD#2#2"
    server.handle_packet(b"2#ADD#2#2$", client_addr).unwrap();
    assert_eq!(recv_text(&client), "2#0#4$");
}

#[test]
fn test_datagram_parse_error_gets_single_reply() {
    let (server_socket, _, client, client_addr) = udp_pair();
    let mut server = DatagramServer::new(server_socket, test_config(), Arc::default());

    server.handle_packet(b"7#XYZ#1#2$", client_addr).unwrap();
    assert_eq!(recv_text(&client), "7#2#0$");

    // Nothing else queued
    client
        .set_read_timeout(Some(Duration::from_millis(100)))
        .unwrap();
    let mut buf = [0u8; 64];
    let err = client.recv_from(&mut buf).unwrap_err();
    assert!(is_timeout(&err));
}

#[test]
fn test_datagram_memory_persists_across_packets() {
    let (server_socket, _, client, client_addr) = udp_pair();
    let mut server = DatagramServer::new(server_socket, test_config(), Arc::default());

    server.handle_packet(b"1#ADDM#5#5$", client_addr).unwrap();
    assert_eq!(recv_text(&client), "1#0#10$");
    server.handle_packet(b"2#GETMEM#0#0$", client_addr).unwrap();
    assert_eq!(recv_text(&client), "2#0#10$");
}

#[test]
fn test_datagram_run_loop_stops_on_shutdown() {
    let (server_socket, server_addr, client, _) = udp_pair();
    let shutdown = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&shutdown);
    let server = thread::spawn(move || {
        let mut server = DatagramServer::new(server_socket, test_config(), flag);
        let result = server.run();
        (result.is_ok(), server.packets_received())
    });

    client.send_to(b"1#SUB#10#4$", server_addr).unwrap();
    assert_eq!(recv_text(&client), "1#0#6$");

    shutdown.store(true, Ordering::Relaxed);
    let (ok, packets) = server.join().unwrap();
    assert!(ok);
    assert_eq!(packets, 1);
}

// =============================================================================
// Error Classification Tests
// =============================================================================

#[test]
fn test_error_classification() {
    assert!(is_disconnect(&io::Error::from(io::ErrorKind::BrokenPipe)));
    assert!(is_disconnect(&io::Error::from(io::ErrorKind::ConnectionReset)));
    assert!(!is_disconnect(&io::Error::from(io::ErrorKind::WouldBlock)));

    assert!(is_timeout(&io::Error::from(io::ErrorKind::WouldBlock)));
    assert!(is_timeout(&io::Error::from(io::ErrorKind::TimedOut)));
    assert!(!is_timeout(&io::Error::from(io::ErrorKind::BrokenPipe)));
}
