//! Command Serializer
//!
//! The single task that executes every command against the store.
//!
//! ## Event Sources
//!
//! ```text
//!  envelopes (bounded) ──┐
//!  registrations ────────┤
//!  departures ───────────┼──> select! ──> one event at a time
//!  shutdown (watch) ─────┘
//! ```
//!
//! `select!` picks randomly among ready sources, so no source can starve
//! another, while each queue keeps its own arrival order. Because one task
//! owns execution, no two commands ever run at the same time and commands
//! from one connection are applied in the order they were sent.
//!
//! Each envelope carries a slot the connection reserved on its own reply
//! queue, so handing over a reply never blocks. A client that stops reading
//! backs up only its own queue.

use crate::commands::Command;
use crate::config::ServerConfig;
use crate::connection::{Peer, PeerId, ReplySlot};
use crate::protocol::RespValue;
use crate::storage::Store;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info};

/// A command, the peer that sent it and room for its reply.
#[derive(Debug)]
pub struct Envelope {
    pub command: Command,
    pub peer: PeerId,
    pub reply: ReplySlot,
}

struct Registration {
    peer: Peer,
    ack: oneshot::Sender<()>,
}

/// Counters published by the serializer after every event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializerStats {
    /// Peers currently in the registry
    pub connected_peers: usize,
    /// Envelopes executed
    pub commands_processed: u64,
    /// `GET`s that found no key and therefore sent no reply
    pub missed_gets: u64,
}

/// Failure while executing a command. Never sent to the client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("key not found: {0}")]
    KeyNotFound(String),
}

/// The serializer task has stopped.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("command serializer is not running")]
pub struct SerializerGone;

/// Cloneable handle used by connections to reach the serializer.
#[derive(Debug, Clone)]
pub struct SerializerHandle {
    envelopes: mpsc::Sender<Envelope>,
    registrations: mpsc::UnboundedSender<Registration>,
    departures: mpsc::UnboundedSender<PeerId>,
    shutdown: Arc<watch::Sender<bool>>,
    stats: watch::Receiver<SerializerStats>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("peer", &self.peer.id())
            .finish()
    }
}

impl SerializerHandle {
    /// Adds a peer to the registry and waits until the serializer has done so.
    pub async fn register(&self, peer: Peer) -> Result<(), SerializerGone> {
        let (ack, done) = oneshot::channel();
        self.registrations
            .send(Registration { peer, ack })
            .map_err(|_| SerializerGone)?;
        done.await.map_err(|_| SerializerGone)
    }

    /// Removes a peer from the registry. Fire and forget.
    pub fn deregister(&self, id: PeerId) {
        if self.departures.send(id).is_err() {
            debug!(peer = %id, "Serializer stopped before deregistration");
        }
    }

    /// Queues a command for execution, waiting while the queue is full.
    pub async fn submit(&self, envelope: Envelope) -> Result<(), SerializerGone> {
        self.envelopes.send(envelope).await.map_err(|_| SerializerGone)
    }

    /// Asks the serializer to stop after its current event.
    ///
    /// Queued events are discarded. Open connections and the listener are
    /// left alone.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Resolves once the serializer task has exited.
    pub async fn stopped(&self) {
        let mut stats = self.stats.clone();
        while stats.changed().await.is_ok() {}
    }

    /// Latest published counters.
    pub fn stats(&self) -> SerializerStats {
        *self.stats.borrow()
    }

    /// Receiver for counter updates.
    pub fn subscribe(&self) -> watch::Receiver<SerializerStats> {
        self.stats.clone()
    }
}

/// State owned by the serializer task.
pub struct CommandSerializer {
    store: Arc<Store>,
    registry: HashMap<PeerId, SocketAddr>,
    stats: SerializerStats,
    stats_tx: watch::Sender<SerializerStats>,
}

impl CommandSerializer {
    /// Spawns the serializer task and returns the handle connections use.
    pub fn start(store: Arc<Store>, config: &ServerConfig) -> SerializerHandle {
        let (envelopes, envelope_rx) = mpsc::channel(config.queue_depth.max(1));
        let (registrations, registration_rx) = mpsc::unbounded_channel();
        let (departures, departure_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (stats_tx, stats) = watch::channel(SerializerStats::default());

        let serializer = CommandSerializer::new(store, stats_tx);
        tokio::spawn(serializer.run(envelope_rx, registration_rx, departure_rx, shutdown_rx));

        info!(queue_depth = config.queue_depth, "Command serializer started");

        SerializerHandle {
            envelopes,
            registrations,
            departures,
            shutdown: Arc::new(shutdown),
            stats,
        }
    }

    fn new(store: Arc<Store>, stats_tx: watch::Sender<SerializerStats>) -> Self {
        Self {
            store,
            registry: HashMap::new(),
            stats: SerializerStats::default(),
            stats_tx,
        }
    }

    async fn run(
        mut self,
        mut envelopes: mpsc::Receiver<Envelope>,
        mut registrations: mpsc::UnboundedReceiver<Registration>,
        mut departures: mpsc::UnboundedReceiver<PeerId>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                Some(envelope) = envelopes.recv() => self.process(envelope),
                Some(registration) = registrations.recv() => self.register(registration),
                Some(id) = departures.recv() => self.deregister(id),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Command serializer shutting down");
                        break;
                    }
                }
                else => break,
            }
        }
    }

    fn process(&mut self, envelope: Envelope) {
        let Envelope {
            command,
            peer,
            reply: slot,
        } = envelope;
        let verb = command.verb();

        let outcome = self.execute(command);
        self.stats.commands_processed += 1;
        if matches!(outcome, Err(ExecError::KeyNotFound(_))) {
            self.stats.missed_gets += 1;
        }
        self.publish();

        // A dropped slot frees its room on the queue without sending.
        match outcome {
            Ok(reply) => {
                if slot.send(reply).is_closed() {
                    debug!(peer = %peer, verb, "Peer writer closed, reply dropped");
                }
            }
            Err(e) => error!(peer = %peer, verb, error = %e, "Failed to handle command"),
        }
    }

    /// Applies a command to the store and builds its reply.
    ///
    /// A missing key on `GET` is an error here; the caller logs it and the
    /// client gets no reply at all.
    pub fn execute(&self, command: Command) -> Result<RespValue, ExecError> {
        match command {
            Command::Set { key, value } => {
                self.store.set(key, value);
                Ok(RespValue::ok())
            }
            Command::Get { key } => match self.store.get(&key) {
                Some(value) => Ok(RespValue::bulk_string(value)),
                None => Err(ExecError::KeyNotFound(
                    String::from_utf8_lossy(&key).into_owned(),
                )),
            },
            Command::Hello { .. } => Ok(hello_reply()),
            Command::ClientInfo { .. } => Ok(RespValue::ok()),
        }
    }

    fn register(&mut self, registration: Registration) {
        let Registration { peer, ack } = registration;
        info!(peer = %peer.id(), client = %peer.addr(), "Peer connected");
        self.registry.insert(peer.id(), peer.addr());
        self.stats.connected_peers = self.registry.len();
        self.publish();
        let _ = ack.send(());
    }

    fn deregister(&mut self, id: PeerId) {
        match self.registry.remove(&id) {
            Some(addr) => info!(peer = %id, client = %addr, "Peer disconnected"),
            None => debug!(peer = %id, "Deregistration for unknown peer"),
        }
        self.stats.connected_peers = self.registry.len();
        self.publish();
    }

    fn publish(&self) {
        self.stats_tx.send_replace(self.stats);
    }
}

/// The `HELLO` reply: a one-entry map naming the protocol family.
pub fn hello_reply() -> RespValue {
    RespValue::map(vec![(
        RespValue::simple_string("server"),
        RespValue::simple_string("redis"),
    )])
}
