//! Minimal in-process bridge relay.
//!
//! Every frame received from one client is forwarded, unchanged, to every
//! other connected client. Payloads are never parsed except to log the
//! identity announced by `JOIN`. Used for local development and for testing
//! client connections end to end.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bridgewire_frame::{Frame, FrameConfig, FrameError, FrameReader, FrameWriter, DEFAULT_MAX_PAYLOAD};
use bridgewire_transport::{BridgeListener, BridgeStream, Result, TcpTransport, TransportError};
use tracing::{debug, info, warn};

use crate::message::BridgeMessage;

const ACCEPT_INTERVAL: Duration = Duration::from_millis(20);

/// Relay behavior settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Stop once no client has connected or sent anything for this long.
    pub idle_timeout: Option<Duration>,
    /// Largest frame accepted from a client. Larger frames drop that client.
    pub max_payload_size: usize,
    /// Upper bound for forwarding one frame to one client.
    pub write_timeout: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            idle_timeout: None,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            write_timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// Why [`BridgeRelay::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayExit {
    /// The running flag was cleared.
    Stopped,
    /// The idle timeout elapsed.
    IdleTimeout,
}

type ClientTable = Arc<Mutex<HashMap<u64, FrameWriter<BridgeStream>>>>;

/// A broadcast relay accepting bridge clients over TCP.
pub struct BridgeRelay {
    listener: BridgeListener,
    config: RelayConfig,
    clients: ClientTable,
    next_client_id: AtomicU64,
    last_activity: Arc<Mutex<Instant>>,
}

impl BridgeRelay {
    /// Bind to `addr` (for example `127.0.0.1:0`).
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpTransport::bind(addr)?;
        Ok(Self {
            listener,
            config: RelayConfig::default(),
            clients: Arc::new(Mutex::new(HashMap::new())),
            next_client_id: AtomicU64::new(1),
            last_activity: Arc::new(Mutex::new(Instant::now())),
        })
    }

    pub fn with_config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Number of currently registered clients.
    pub fn client_count(&self) -> usize {
        lock(&self.clients).len()
    }

    /// Accept and relay until `running` is cleared or the idle timeout fires.
    ///
    /// All client connections are shut down before returning.
    pub fn run(&self, running: &AtomicBool) -> Result<RelayExit> {
        self.listener.set_nonblocking(true)?;
        touch(&self.last_activity);
        info!(addr = %self.local_addr(), "relay running");

        let exit = loop {
            if !running.load(Ordering::SeqCst) {
                break Ok(RelayExit::Stopped);
            }

            match self.listener.accept() {
                Ok((stream, addr)) => {
                    touch(&self.last_activity);
                    self.register(stream, addr);
                }
                Err(TransportError::Accept(err)) if err.kind() == io::ErrorKind::WouldBlock => {
                    if self.idle_expired() {
                        info!("relay idle timeout reached");
                        break Ok(RelayExit::IdleTimeout);
                    }
                    thread::sleep(ACCEPT_INTERVAL);
                }
                Err(TransportError::Accept(err)) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => break Err(err),
            }
        };

        self.disconnect_all();
        exit
    }

    /// Run on a background thread.
    pub fn spawn(self) -> Result<RelayHandle> {
        let running = Arc::new(AtomicBool::new(true));
        let addr = self.local_addr();
        let clients = Arc::clone(&self.clients);
        let flag = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name("bridgewire-relay".to_string())
            .spawn(move || self.run(&flag))?;

        Ok(RelayHandle {
            addr,
            running,
            clients,
            thread: Some(thread),
        })
    }

    fn idle_expired(&self) -> bool {
        match self.config.idle_timeout {
            Some(limit) => lock(&self.last_activity).elapsed() >= limit,
            None => false,
        }
    }

    fn register(&self, stream: BridgeStream, addr: SocketAddr) {
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let frame_config = FrameConfig {
            max_payload_size: self.config.max_payload_size,
            read_timeout: None,
            write_timeout: self.config.write_timeout,
        };

        let writer_stream = match stream.try_clone() {
            Ok(clone) => clone,
            Err(err) => {
                warn!(client = id, %addr, error = %err, "rejecting client");
                return;
            }
        };
        let writer = match FrameWriter::with_config_stream(writer_stream, frame_config.clone()) {
            Ok(writer) => writer,
            Err(err) => {
                warn!(client = id, %addr, error = %err, "rejecting client");
                return;
            }
        };
        let reader = FrameReader::with_config(stream, frame_config);

        lock(&self.clients).insert(id, writer);
        info!(client = id, %addr, "client connected");

        let clients = Arc::clone(&self.clients);
        let last_activity = Arc::clone(&self.last_activity);
        let spawned = thread::Builder::new()
            .name(format!("bridgewire-relay-client-{id}"))
            .spawn(move || serve_client(id, addr, reader, clients, last_activity));
        if let Err(err) = spawned {
            warn!(client = id, error = %err, "cannot start client thread");
            drop_client(&self.clients, id);
        }
    }

    fn disconnect_all(&self) {
        let mut clients = lock(&self.clients);
        for (id, writer) in clients.drain() {
            if let Err(err) = writer.get_ref().shutdown_both() {
                debug!(client = id, error = %err, "client already gone");
            }
        }
    }
}

/// Handle to a relay running on a background thread.
///
/// Dropping the handle stops the relay.
pub struct RelayHandle {
    addr: SocketAddr,
    running: Arc<AtomicBool>,
    clients: ClientTable,
    thread: Option<JoinHandle<Result<RelayExit>>>,
}

impl RelayHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn client_count(&self) -> usize {
        lock(&self.clients).len()
    }

    /// Wait until at least `count` clients are registered.
    pub fn wait_for_clients(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.client_count() < count {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    /// Stop the relay and wait for it to finish.
    pub fn stop(mut self) -> Result<RelayExit> {
        self.running.store(false, Ordering::SeqCst);
        match self.thread.take() {
            Some(thread) => thread.join().unwrap_or_else(|_| {
                Err(TransportError::Io(io::Error::other("relay thread panicked")))
            }),
            None => Ok(RelayExit::Stopped),
        }
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn serve_client(
    id: u64,
    addr: SocketAddr,
    mut reader: FrameReader<BridgeStream>,
    clients: ClientTable,
    last_activity: Arc<Mutex<Instant>>,
) {
    loop {
        match reader.read_frame() {
            Ok(frame) => {
                touch(&last_activity);
                log_join(id, &frame);
                broadcast(&clients, id, &frame);
            }
            Err(FrameError::ConnectionClosed { buffered: 0 }) => {
                info!(client = id, %addr, "client disconnected");
                break;
            }
            Err(err) => {
                warn!(client = id, %addr, error = %err, "dropping client");
                break;
            }
        }
    }

    drop_client(&clients, id);
}

fn log_join(id: u64, frame: &Frame) {
    let Ok(value) = serde_json::from_slice(&frame.payload) else {
        return;
    };
    if let BridgeMessage::Join { identity } = BridgeMessage::from_value(value) {
        info!(client = id, %identity, "client joined");
    }
}

fn broadcast(clients: &ClientTable, from: u64, frame: &Frame) {
    let mut clients = lock(clients);
    let mut failed = Vec::new();

    for (&id, writer) in clients.iter_mut() {
        if id == from {
            continue;
        }
        if let Err(err) = writer.write_frame(frame) {
            warn!(client = id, error = %err, "forward failed");
            failed.push(id);
        }
    }

    for id in failed {
        if let Some(writer) = clients.remove(&id) {
            let _ = writer.get_ref().shutdown_both();
        }
    }
}

fn drop_client(clients: &ClientTable, id: u64) {
    if let Some(writer) = lock(clients).remove(&id) {
        let _ = writer.get_ref().shutdown_both();
    }
}

fn touch(last_activity: &Mutex<Instant>) {
    *lock(last_activity) = Instant::now();
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
