//! # Legacy Socket Relay
//!
//! One long-lived TCP session to the legacy warehouse system, shared by two
//! relays:
//!
//! - **outbound**: broker deliveries are encoded as legacy frames and written
//!   to the socket; the delivery is acknowledged only after the write.
//! - **inbound**: newline-delimited lines read from the socket are decoded
//!   and published to the updates queue, one at a time, before the socket is
//!   read again.
//!
//! Each session carries a generation number. A failure report names the
//! generation it observed, and reconnecting is a no-op when that generation
//! has already been replaced, so a socket that dies under both relays at
//! once is redialed exactly once.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use crate::config::WarehouseConfig;
use crate::constants::legacy::LINE_TERMINATOR;
use crate::error::BridgeError;
use crate::legacy::{decode, encode, LegacyEvent, LineBuffer, WarehouseCommand};
use crate::logging::log_bridge_event;
use crate::messaging::{BrokerConnectionManager, Delivery, MessageHandler};
use crate::resilience::reconnect_with;

use super::{BridgeState, BridgeStats, WarehouseError};

const READ_CHUNK_BYTES: usize = 4096;

#[derive(Debug, Default)]
struct Session {
    generation: u64,
    writer: Option<OwnedWriteHalf>,
}

#[derive(Debug)]
struct SessionReader {
    generation: u64,
    reader: OwnedReadHalf,
}

pub struct WarehouseBridge {
    config: WarehouseConfig,
    broker: Arc<BrokerConnectionManager>,
    state: watch::Sender<BridgeState>,
    session: Mutex<Session>,
    current_generation: AtomicU64,
    readers_tx: mpsc::UnboundedSender<SessionReader>,
    readers_rx: Mutex<Option<mpsc::UnboundedReceiver<SessionReader>>>,
    stats: BridgeStats,
    #[cfg(test)]
    failing_writes: std::sync::atomic::AtomicU32,
}

impl std::fmt::Debug for WarehouseBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseBridge")
            .field("address", &self.config.address())
            .field("state", &self.state())
            .field("generation", &self.generation())
            .finish()
    }
}

impl WarehouseBridge {
    pub fn new(config: WarehouseConfig, broker: Arc<BrokerConnectionManager>) -> Self {
        let (state, _) = watch::channel(BridgeState::Disconnected);
        let (readers_tx, readers_rx) = mpsc::unbounded_channel();
        Self {
            config,
            broker,
            state,
            session: Mutex::new(Session::default()),
            current_generation: AtomicU64::new(0),
            readers_tx,
            readers_rx: Mutex::new(Some(readers_rx)),
            stats: BridgeStats::default(),
            #[cfg(test)]
            failing_writes: std::sync::atomic::AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<BridgeState> {
        self.state.subscribe()
    }

    /// Generation of the live session, 0 before the first connect
    pub fn generation(&self) -> u64 {
        self.current_generation.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    /// Open the first session; no-op once connected
    pub async fn connect(&self) -> Result<(), WarehouseError> {
        self.reconnect(0).await
    }

    /// Run both relays until either fails terminally
    pub async fn run(&self) -> Result<(), WarehouseError> {
        self.connect().await?;
        tokio::select! {
            result = self.run_inbound() => result,
            result = self.run_outbound() => result,
        }
    }

    /// Relay broker deliveries to the legacy socket
    pub async fn run_outbound(&self) -> Result<(), WarehouseError> {
        info!(queue = %self.config.outbound_queue, "🏭 Outbound relay starting");
        self.broker
            .consume(&self.config.outbound_queue, self)
            .await
            .map_err(WarehouseError::from)
    }

    /// Relay legacy lines to the updates queue
    ///
    /// May only run once per bridge.
    pub async fn run_inbound(&self) -> Result<(), WarehouseError> {
        let mut readers = self
            .readers_rx
            .lock()
            .await
            .take()
            .ok_or(WarehouseError::InboundAlreadyRunning)?;

        info!(queue = %self.config.updates_queue, "🏭 Inbound relay starting");
        self.connect().await?;

        while let Some(session) = readers.recv().await {
            if session.generation != self.generation() {
                debug!(generation = session.generation, "Skipping replaced session");
                continue;
            }
            self.relay_session(session).await?;
        }
        Ok(())
    }

    /// Encode and write one command
    pub async fn send_command(&self, command: &WarehouseCommand) -> Result<(), WarehouseError> {
        let frame = encode(command);
        self.write_frame(&frame).await?;
        self.stats.frames_sent.fetch_add(1, Ordering::Relaxed);
        let event = if command.is_close() { "close" } else { "order" };
        log_bridge_event("outbound", event, Some(&frame));
        Ok(())
    }

    /// Write `frame` plus terminator, retrying once on a fresh session
    pub async fn write_frame(&self, frame: &str) -> Result<(), WarehouseError> {
        self.connect().await?;

        let mut line = Vec::with_capacity(frame.len() + 1);
        line.extend_from_slice(frame.as_bytes());
        line.push(LINE_TERMINATOR);

        let (generation, error) = match self.try_write(&line).await {
            Ok(()) => return Ok(()),
            Err(failure) => failure,
        };

        warn!(generation, error = %error, "🔌 Legacy write failed, reconnecting before retry");
        self.mark_lost(generation);
        self.reconnect(generation).await?;
        self.stats.write_retries.fetch_add(1, Ordering::Relaxed);

        self.try_write(&line).await.map_err(|(generation, error)| {
            warn!(generation, error = %error, "Legacy write failed again, giving up on frame");
            self.mark_lost(generation);
            WarehouseError::io("write", &error)
        })
    }

    /// Close the live session
    pub async fn shutdown(&self) {
        let mut session = self.session.lock().await;
        if let Some(mut writer) = session.writer.take() {
            let _ = writer.shutdown().await;
        }
        self.state.send_replace(BridgeState::Disconnected);
        info!(generation = session.generation, "Legacy session closed");
    }

    async fn try_write(&self, line: &[u8]) -> Result<(), (u64, io::Error)> {
        let mut session = self.session.lock().await;
        let generation = session.generation;
        #[cfg(test)]
        {
            let injected = self
                .failing_writes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if injected {
                session.writer = None;
                return Err((
                    generation,
                    io::Error::new(io::ErrorKind::BrokenPipe, "write failure"),
                ));
            }
        }

        let Some(writer) = session.writer.as_mut() else {
            return Err((
                generation,
                io::Error::new(io::ErrorKind::NotConnected, "no legacy session"),
            ));
        };

        let result = async {
            writer.write_all(line).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            session.writer = None;
            return Err((generation, e));
        }
        Ok(())
    }

    /// Replace session `failed_generation` with a new one
    async fn reconnect(&self, failed_generation: u64) -> Result<(), WarehouseError> {
        let mut session = self.session.lock().await;
        if session.generation != failed_generation {
            return Ok(());
        }
        session.writer = None;
        self.state.send_replace(BridgeState::Connecting);

        let address = self.config.address();
        let connect_timeout = self.config.connect_timeout();
        let stream = reconnect_with(&self.config.reconnect, "warehouse", |attempt| {
            let address = address.clone();
            async move {
                debug!(address = %address, attempt, "Connecting to legacy system");
                match tokio::time::timeout(connect_timeout, TcpStream::connect(&address)).await {
                    Ok(Ok(stream)) => Ok(stream),
                    Ok(Err(e)) => Err(WarehouseError::connect(&address, e.to_string())),
                    Err(_) => Err(WarehouseError::connect(
                        &address,
                        format!("timed out after {}s", connect_timeout.as_secs()),
                    )),
                }
            }
        })
        .await
        .map_err(|exhausted| {
            self.state.send_replace(BridgeState::Disconnected);
            WarehouseError::ReconnectExhausted {
                address: address.clone(),
                attempts: exhausted.attempts,
            }
        })?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Could not disable Nagle on legacy socket");
        }
        let (reader, writer) = stream.into_split();

        session.generation += 1;
        session.writer = Some(writer);
        let generation = session.generation;
        self.current_generation.store(generation, Ordering::SeqCst);
        if generation > 1 {
            self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
        }
        if self
            .readers_tx
            .send(SessionReader { generation, reader })
            .is_err()
        {
            debug!(generation, "Inbound relay gone, read half dropped");
        }
        self.state.send_replace(BridgeState::Connected);

        info!(address = %address, generation, "✅ Connected to legacy system");
        Ok(())
    }

    fn mark_lost(&self, generation: u64) {
        if self.generation() != generation {
            return;
        }
        self.state.send_if_modified(|state| {
            if *state == BridgeState::Connected {
                *state = BridgeState::Lost;
                true
            } else {
                false
            }
        });
    }

    async fn relay_session(&self, session: SessionReader) -> Result<(), WarehouseError> {
        let SessionReader {
            generation,
            mut reader,
        } = session;
        let mut lines = LineBuffer::new(self.config.max_line_bytes);
        let mut state_rx = self.state.subscribe();
        let mut buf = vec![0u8; READ_CHUNK_BYTES];

        loop {
            tokio::select! {
                read = reader.read(&mut buf) => match read {
                    Ok(0) => {
                        info!(generation, "🔌 Legacy system closed the connection");
                        break;
                    }
                    Ok(n) => {
                        for line in lines.push(&buf[..n]) {
                            self.relay_line(&line).await?;
                        }
                    }
                    Err(e) => {
                        warn!(generation, error = %e, "🔌 Legacy socket read failed");
                        break;
                    }
                },
                Ok(()) = state_rx.changed() => {
                    if self.generation() != generation {
                        debug!(generation, "Session replaced by writer reconnect");
                        break;
                    }
                }
            }
        }

        let dropped = lines.discard_partial();
        if dropped > 0 {
            warn!(generation, dropped_bytes = dropped, "Discarding unterminated line from closed session");
        }

        if self.generation() == generation {
            self.mark_lost(generation);
            self.reconnect(generation).await?;
        }
        Ok(())
    }

    async fn relay_line(&self, line: &str) -> Result<(), WarehouseError> {
        self.stats.lines_received.fetch_add(1, Ordering::Relaxed);
        let event = decode(line);

        if event.is_unknown() {
            self.stats.unknown_events.fetch_add(1, Ordering::Relaxed);
            warn!(raw = %line, "⚠️ Unrecognized legacy line, publishing as UNKNOWN");
        } else if !self.status_allowed(&event) {
            self.stats.events_filtered.fetch_add(1, Ordering::Relaxed);
            debug!(line = %line, "Status not in inbound filter, skipping");
            return Ok(());
        }

        self.broker
            .publish(&self.config.updates_queue, &event)
            .await?;
        self.stats.events_published.fetch_add(1, Ordering::Relaxed);
        log_bridge_event("inbound", if event.is_unknown() { "unknown" } else { "status" }, Some(line));
        Ok(())
    }

    fn status_allowed(&self, event: &LegacyEvent) -> bool {
        match (&self.config.inbound_status_filter, event.status()) {
            (Some(allowed), Some(status)) => allowed.iter().any(|a| a == status),
            _ => true,
        }
    }
}

#[async_trait]
impl MessageHandler for WarehouseBridge {
    async fn handle(&self, delivery: &Delivery) -> Result<(), BridgeError> {
        let command = WarehouseCommand::from_payload(&delivery.message)?;
        self.send_command(&command).await?;
        Ok(())
    }
}
