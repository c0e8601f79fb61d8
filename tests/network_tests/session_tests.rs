//! Session Tests
//!
//! Tests for request handling and response writing, independent of any
//! socket.

use std::io;
use std::sync::Arc;

use calcwire::network::{ResponseWriter, Session, StreamWriter};
use calcwire::protocol::{MessageHandler, Method, ParseError, Request, RingDeserializer, Role};
use calcwire::{CalcError, CalcService, Calculator};

// =============================================================================
// Test Helpers
// =============================================================================

fn session() -> Session<StreamWriter<Vec<u8>>> {
    Session::new(StreamWriter(Vec::new()), Arc::new(CalcService::new()))
}

fn written(session: &Session<StreamWriter<Vec<u8>>>) -> String {
    String::from_utf8(session.writer().0.clone()).unwrap()
}

/// Writer whose peer has gone away
struct BrokenWriter;

impl ResponseWriter for BrokenWriter {
    fn send_response(&mut self, _frame: &[u8]) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer closed"))
    }
}

// =============================================================================
// Request Handling Tests
// =============================================================================

#[test]
fn test_handle_each_method() {
    let s = session();
    let cases = [
        (Method::Add, 2.0, 3.0, 5.0),
        (Method::Sub, 2.0, 3.0, -1.0),
        (Method::Mul, 16.0, 20.0, 320.0),
        (Method::Div, 9.0, 3.0, 3.0),
    ];

    for (method, a, b, expected) in cases {
        let response = s.handle_request(&Request::new(1, method, a, b));
        assert!(response.is_ok(), "{} failed", method);
        assert_eq!(response.result, expected);
    }
}

#[test]
fn test_memory_methods() {
    let s = session();

    let r = s.handle_request(&Request::new(1, Method::AddMem, 5.0, 5.0));
    assert_eq!(r.result, 10.0);

    let r = s.handle_request(&Request::new(2, Method::GetMemory, 0.0, 0.0));
    assert_eq!(r.result, 10.0);

    let r = s.handle_request(&Request::new(3, Method::ResetMemory, 0.0, 0.0));
    assert!(r.is_ok());
    assert_eq!(r.result, 0.0);

    let r = s.handle_request(&Request::new(4, Method::GetMemory, 0.0, 0.0));
    assert_eq!(r.result, 0.0);
}

#[test]
fn test_div_by_zero_response() {
    let mut s = session();
    s.on_request(Request::new(1, Method::Div, 5.0, 0.0)).unwrap();
    assert_eq!(written(&s), "1#4#0$");
}

#[test]
fn test_none_method_is_invalid() {
    let s = session();
    let r = s.handle_request(&Request::new(6, Method::None, 1.0, 1.0));
    assert_eq!(r.status.code(), 2);
}

// =============================================================================
// Response Writing Tests
// =============================================================================

#[test]
fn test_responses_written_in_order() {
    let mut s = session();
    s.on_request(Request::new(1620, Method::Mul, 16.0, 20.0)).unwrap();
    s.on_request(Request::new(7, Method::Add, 0.25, 0.25)).unwrap();

    assert_eq!(written(&s), "1620#0#320$7#0#0.5$");
    assert_eq!(s.requests_handled(), 2);
}

#[test]
fn test_parse_errors_become_responses() {
    let mut s = session();
    s.on_error(7, ParseError::InvalidRequestMethod).unwrap();
    s.on_error(3, ParseError::InvalidRequestOperand2).unwrap();
    s.on_error(-1, ParseError::Overflow).unwrap();

    assert_eq!(written(&s), "7#2#0$3#3#0$-1#1#0$");
    assert_eq!(s.errors_reported(), 3);
    assert_eq!(s.requests_handled(), 0);
}

#[test]
fn test_unencodable_result_becomes_internal_error() {
    let mut s = session();
    s.on_request(Request::new(9, Method::Mul, 1e200, 1e100)).unwrap();
    assert_eq!(written(&s), "9#20#0$");
}

#[test]
fn test_write_failure_propagates() {
    let mut s = Session::new(BrokenWriter, Arc::new(CalcService::new()));
    let result = s.on_request(Request::new(1, Method::Add, 1.0, 1.0));
    assert!(matches!(result, Err(CalcError::Io(_))));
}

// =============================================================================
// Deserializer + Session Tests
// =============================================================================

#[test]
fn test_deserializer_drives_session() {
    let mut de = RingDeserializer::new(Role::Server, 256);
    let mut s = session();

    de.feed(b"1#ADDM#5#5$2#GET", &mut s).unwrap();
    de.feed(b"MEM#0#0$3#XYZ#1#1$", &mut s).unwrap();

    assert_eq!(written(&s), "1#0#10$2#0#10$3#2#0$");
}

#[test]
fn test_shared_service_across_sessions() {
    let service: Arc<dyn Calculator> = Arc::new(CalcService::new());
    let mut first = Session::new(StreamWriter(Vec::new()), Arc::clone(&service));
    let second = Session::new(StreamWriter(Vec::new()), Arc::clone(&service));

    first.on_request(Request::new(1, Method::AddMem, 2.0, 2.0)).unwrap();
    let r = second.handle_request(&Request::new(1, Method::GetMemory, 0.0, 0.0));
    assert_eq!(r.result, 4.0);
}
