//! Stream Server
//!
//! Accepts connections and runs one worker thread per connection.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::Result;
use crate::service::{CalcService, Calculator};

use super::connection::Connection;
use super::transport::{is_timeout, StreamConnection, StreamListener};

/// Accept loop for TCP and UNIX stream sockets
pub struct StreamServer<L: StreamListener> {
    listener: L,

    config: Config,

    /// One calculator for every connection, when memory is shared
    shared_service: Option<Arc<dyn Calculator>>,

    shutdown: Arc<AtomicBool>,

    /// Workers currently running
    active: Arc<AtomicUsize>,

    /// Clones of open sockets, closed on shutdown to wake blocked workers
    open: Arc<Mutex<HashMap<u64, L::Conn>>>,

    workers: Vec<JoinHandle<()>>,

    next_conn_id: u64,
}

impl<L: StreamListener> StreamServer<L> {
    pub fn new(listener: L, config: Config, shutdown: Arc<AtomicBool>) -> Self {
        let shared_service: Option<Arc<dyn Calculator>> = if config.shared_memory {
            Some(Arc::new(CalcService::new()))
        } else {
            None
        };

        Self {
            listener,
            config,
            shared_service,
            shutdown,
            active: Arc::new(AtomicUsize::new(0)),
            open: Arc::new(Mutex::new(HashMap::new())),
            workers: Vec::new(),
            next_conn_id: 0,
        }
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Accept connections until shutdown is requested (blocking)
    pub fn run(&mut self) -> Result<()> {
        // Non-blocking accept so the shutdown flag is observed
        self.listener.set_accept_nonblocking(true)?;
        let poll = Duration::from_millis(self.config.accept_poll_ms);

        tracing::info!("Accepting connections on {}", self.listener.local_label());

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.listener.accept_conn() {
                Ok(conn) => self.dispatch(conn),
                Err(ref e) if is_timeout(e) => thread::sleep(poll),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    // e.g. EMFILE; keep serving existing clients
                    tracing::warn!("Could not accept a client: {}", e);
                    thread::sleep(poll);
                }
            }
            self.workers.retain(|w| !w.is_finished());
        }

        self.stop_workers();
        Ok(())
    }

    /// Hand an accepted connection to its own worker thread
    fn dispatch(&mut self, conn: L::Conn) {
        let peer = conn.peer_label();

        if self.active.load(Ordering::Acquire) >= self.config.max_connections {
            tracing::warn!(
                "Rejecting {}: {} connections already open",
                peer,
                self.config.max_connections
            );
            let _ = conn.shutdown_conn();
            return;
        }

        if let Err(e) = conn.set_blocking() {
            tracing::warn!("Could not configure connection from {}: {}", peer, e);
            return;
        }

        let conn_id = self.next_conn_id;
        self.next_conn_id += 1;

        match conn.try_clone_conn() {
            Ok(handle) => {
                self.open.lock().insert(conn_id, handle);
            }
            Err(e) => {
                tracing::warn!("Could not register connection from {}: {}", peer, e);
                return;
            }
        }

        let service = match &self.shared_service {
            Some(service) => Arc::clone(service),
            None => Arc::new(CalcService::new()) as Arc<dyn Calculator>,
        };
        let config = self.config.clone();
        let active = Arc::clone(&self.active);
        let open = Arc::clone(&self.open);

        active.fetch_add(1, Ordering::AcqRel);
        let spawned = thread::Builder::new()
            .name(format!("calc-conn-{}", conn_id))
            .spawn(move || {
                let result =
                    Connection::new(conn, service, &config).and_then(|mut c| c.handle());
                if let Err(e) = result {
                    tracing::warn!("Connection {} ended with error: {}", peer, e);
                }
                open.lock().remove(&conn_id);
                active.fetch_sub(1, Ordering::AcqRel);
            });

        match spawned {
            Ok(handle) => self.workers.push(handle),
            Err(e) => {
                tracing::error!("Could not start the client handler thread: {}", e);
                if let Some(conn) = self.open.lock().remove(&conn_id) {
                    let _ = conn.shutdown_conn();
                }
                self.active.fetch_sub(1, Ordering::AcqRel);
            }
        }
    }

    /// Close every open connection and wait for the workers to exit
    fn stop_workers(&mut self) {
        let open: Vec<L::Conn> = self.open.lock().drain().map(|(_, c)| c).collect();
        tracing::info!("Shutting down {} open connections", open.len());

        for conn in open {
            let _ = conn.shutdown_conn();
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("A connection worker panicked");
            }
        }
    }
}
