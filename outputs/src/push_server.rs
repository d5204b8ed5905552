//! TCP push server.
//!
//! Forwards every published state to external subscribers as one JSON
//! object per line. Subscribers connect with any TCP client; the server
//! never reads from them. Dead connections are pruned on the next write.

use crate::wire;
use fusion_core::error::FusionError;
use fusion_core::interfaces::OutputConsumer;
use fusion_core::types::FusedEntityState;
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

/// Poll interval of the non-blocking accept loop.
const ACCEPT_POLL: Duration = Duration::from_millis(100);

pub struct PushServer {
    port: u16,
    running: Arc<AtomicBool>,
    clients: Arc<Mutex<Vec<TcpStream>>>,
    bound_port: Mutex<Option<u16>>,
    accept_thread: Mutex<Option<JoinHandle<()>>>,
}

impl PushServer {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            running: Arc::new(AtomicBool::new(false)),
            clients: Arc::new(Mutex::new(Vec::new())),
            bound_port: Mutex::new(None),
            accept_thread: Mutex::new(None),
        }
    }

    /// Port actually bound (differs from the configured port when 0 was
    /// requested). `None` before `start`.
    pub fn local_port(&self) -> Option<u16> {
        *self.bound_port.lock().expect("port lock poisoned")
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().expect("clients lock poisoned").len()
    }

    fn accept_loop(
        listener: TcpListener,
        clients: Arc<Mutex<Vec<TcpStream>>>,
        running: Arc<AtomicBool>,
    ) {
        while running.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    info!(%peer, "push subscriber connected");
                    let _ = stream.set_nodelay(true);
                    clients.lock().expect("clients lock poisoned").push(stream);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL);
                }
                Err(e) => {
                    debug!("accept failed: {e}");
                    thread::sleep(ACCEPT_POLL);
                }
            }
        }
    }

    fn broadcast(&self, message: &str) {
        let mut clients = self.clients.lock().expect("clients lock poisoned");
        clients.retain_mut(|stream| {
            let alive = stream
                .write_all(message.as_bytes())
                .and_then(|_| stream.write_all(b"\n"))
                .is_ok();
            if !alive {
                debug!("dropping dead push subscriber");
            }
            alive
        });
    }
}

impl OutputConsumer for PushServer {
    fn start(&self) -> Result<(), FusionError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let listener = TcpListener::bind(("0.0.0.0", self.port)).map_err(|e| {
            self.running.store(false, Ordering::SeqCst);
            FusionError::Startup(format!("push server bind on port {}: {e}", self.port))
        })?;
        if let Err(e) = listener.set_nonblocking(true) {
            self.running.store(false, Ordering::SeqCst);
            return Err(e.into());
        }

        let port = listener
            .local_addr()
            .map(|a| a.port())
            .unwrap_or(self.port);
        *self.bound_port.lock().expect("port lock poisoned") = Some(port);

        let clients = Arc::clone(&self.clients);
        let running = Arc::clone(&self.running);
        let handle = thread::Builder::new()
            .name("push-accept".into())
            .spawn(move || Self::accept_loop(listener, clients, running))?;
        *self.accept_thread.lock().expect("thread lock poisoned") = Some(handle);

        info!(port, "push server listening");
        Ok(())
    }

    fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self
            .accept_thread
            .lock()
            .expect("thread lock poisoned")
            .take()
        {
            let _ = handle.join();
        }
        self.clients.lock().expect("clients lock poisoned").clear();
        info!("push server stopped");
    }

    fn publish_state(&self, state: &FusedEntityState) {
        match wire::serialize_state(state) {
            Ok(message) => self.broadcast(&message),
            Err(e) => error!("state serialization failed: {e}"),
        }
    }

    fn publish_states(&self, states: &[FusedEntityState]) {
        match wire::serialize_states(states) {
            Ok(message) => self.broadcast(&message),
            Err(e) => error!("batch serialization failed: {e}"),
        }
    }
}

impl Drop for PushServer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::WireState;
    use fusion_core::types::{
        EntityId, EntityKind, Position, SensorKind, StateCov, Velocity,
    };
    use std::io::{BufRead, BufReader};
    use std::time::Instant;

    fn sample_state() -> FusedEntityState {
        FusedEntityState {
            entity_id: EntityId(9),
            entity_kind: EntityKind::Personnel,
            position: Position::new(4.0, 5.0, 6.0),
            velocity: Velocity::new(1.0, 0.0, 0.0),
            covariance: StateCov::identity(),
            confidence: 0.9,
            timestamp: Instant::now(),
            last_update_time: Instant::now(),
            contributing_sensors: vec![SensorKind::Rf],
            measurement_count: 12,
        }
    }

    #[test]
    fn subscriber_receives_states_as_json_lines() {
        let server = PushServer::new(0);
        server.start().unwrap();
        let port = server.local_port().unwrap();

        let client = TcpStream::connect(("127.0.0.1", port)).unwrap();
        // Give the 100 ms accept poll time to pick the connection up
        for _ in 0..30 {
            if server.client_count() > 0 {
                break;
            }
            thread::sleep(Duration::from_millis(50));
        }
        assert_eq!(server.client_count(), 1);

        server.publish_state(&sample_state());

        let mut reader = BufReader::new(client);
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let parsed: WireState = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(parsed.entity_id, 9);
        assert_eq!(parsed.kind, "PERSONNEL");
        assert_eq!(parsed.measurements, 12);

        server.stop();
    }

    #[test]
    fn dead_subscribers_are_pruned() {
        let server = PushServer::new(0);
        server.start().unwrap();
        let port = server.local_port().unwrap();

        let client = TcpStream::connect(("127.0.0.1", port)).unwrap();
        for _ in 0..30 {
            if server.client_count() > 0 {
                break;
            }
            thread::sleep(Duration::from_millis(50));
        }
        drop(client);

        // Repeated writes to the closed socket surface the error and prune
        for _ in 0..5 {
            server.publish_state(&sample_state());
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(server.client_count(), 0);

        server.stop();
    }

    #[test]
    fn start_stop_idempotent_without_subscribers() {
        let server = PushServer::new(0);
        server.start().unwrap();
        server.start().unwrap();
        server.publish_state(&sample_state());
        server.stop();
        server.stop();
    }
}
