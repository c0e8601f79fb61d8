//! calcwire CLI Client
//!
//! Interactive calculator prompt, or one-shot evaluation of an expression.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use calcwire::client::{parse_expression, Expression};
use calcwire::protocol::Response;
use calcwire::{Client, ClientConfig, TransportKind};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

const PROMPT: &str = "? (type quit to exit) ";

/// calcwire CLI
#[derive(Parser, Debug)]
#[command(name = "calcwire-cli")]
#[command(about = "CLI for the calcwire calculator service")]
struct Args {
    /// Transport: tcp, udp, unix-stream or unix-dgram
    #[arg(short, long, default_value = "tcp")]
    transport: TransportKind,

    /// Server address (host:port) for tcp/udp
    #[arg(short = 'a', long, default_value = "127.0.0.1:6666")]
    server: String,

    /// Server socket file for the unix transports
    #[arg(short, long, default_value = "/tmp/calc_svc.sock")]
    socket: PathBuf,

    /// Milliseconds to wait for each response
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,

    /// Evaluate this expression and exit (e.g. "5+3", "mem")
    expression: Option<String>,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let args = Args::parse();

    let config = ClientConfig {
        transport: args.transport,
        server_addr: args.server.clone(),
        socket_path: args.socket.clone(),
        response_timeout_ms: args.timeout_ms,
        ..ClientConfig::default()
    };

    let mut client = match Client::connect(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Could not connect: {}", e);
            std::process::exit(1);
        }
    };

    match args.expression {
        Some(expr) => {
            if !evaluate(&mut client, &expr) {
                std::process::exit(1);
            }
        }
        None => repl(&mut client),
    }

    client.close();
}

/// Prompt for expressions until `quit` or end of input
fn repl(client: &mut Client) {
    let stdin = io::stdin();
    print!("{}", PROMPT);
    let _ = io::stdout().flush();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            print!("{}", PROMPT);
            let _ = io::stdout().flush();
            continue;
        }
        if matches!(parse_expression(&line), Ok(Expression::Quit)) {
            break;
        }
        evaluate(client, &line);
        print!("{}", PROMPT);
        let _ = io::stdout().flush();
    }
    println!("Bye.");
}

/// Send one expression and print the answer; false on failure
fn evaluate(client: &mut Client, line: &str) -> bool {
    let (method, operand1, operand2) = match parse_expression(line) {
        Ok(Expression::Call {
            method,
            operand1,
            operand2,
        }) => (method, operand1, operand2),
        Ok(Expression::Quit) => return true,
        Err(e) => {
            eprintln!("{}", e);
            return false;
        }
    };

    match client.call(method, operand1, operand2) {
        Ok(response) => {
            print_response(&response);
            response.is_ok()
        }
        Err(e) => {
            eprintln!("Request failed: {}", e);
            false
        }
    }
}

fn print_response(response: &Response) {
    println!(
        "req({}) > status: {}, result: {:.6}",
        response.request_id, response.status, response.result
    );
}
