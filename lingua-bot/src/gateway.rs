//! Gateway: wires the bus, channels and dispatcher together and runs the
//! consume loop.
//!
//! Every user gets a FIFO queue drained by a dedicated worker, so one user's
//! events are handled strictly in arrival order while different users are
//! served concurrently.

use crate::bus::MessageBus;
use crate::channel::{Channel, ChannelManager};
use crate::completion::CompletionProvider;
use crate::dispatch::Dispatcher;
use crate::error::{BotError, Result};
use crate::events::InboundEvent;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// How long in-flight events may take to finish after shutdown is requested.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Gateway service.
pub struct Gateway<P> {
    bus: MessageBus,
    channel_manager: ChannelManager,
    dispatcher: Arc<Dispatcher<P>>,
    shutdown: Arc<Notify>,
}

impl<P> std::fmt::Debug for Gateway<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl<P: CompletionProvider + 'static> Gateway<P> {
    /// Create a gateway around `dispatcher`.
    pub fn new(dispatcher: Dispatcher<P>) -> Self {
        let bus = MessageBus::new();
        Self {
            channel_manager: ChannelManager::new(bus.clone()),
            bus,
            dispatcher: Arc::new(dispatcher),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Register a channel. Call before [`run`](Self::run).
    pub async fn register(&self, channel: impl Channel + 'static) {
        self.channel_manager.register(channel).await;
    }

    /// Handle that stops [`run`](Self::run) when notified.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Start every channel and dispatch events until shutdown is requested.
    ///
    /// # Errors
    ///
    /// Returns an error if no channel could be started.
    pub async fn run(&self) -> Result<()> {
        info!("Gateway starting...");

        let results = self.channel_manager.start_all().await;
        if !results.is_empty() && results.iter().all(std::result::Result::is_err) {
            self.channel_manager.stop_all().await;
            return Err(BotError::internal("no channel could be started"));
        }
        info!("Gateway started");

        let mut queues = UserQueues::new(Arc::clone(&self.dispatcher), self.bus.clone());
        loop {
            let event = tokio::select! {
                () = self.shutdown.notified() => break,
                event = self.bus.consume_inbound_timeout(Duration::from_secs(1)) => event,
            };
            let Some(event) = event else { continue };
            queues.push(event);
        }

        info!("Gateway stopping...");
        queues.close().await;
        self.report().await;
        self.channel_manager.stop_all().await;
        info!("Gateway stopped");
        Ok(())
    }

    /// Log channel health, bus counters and the number of sessions.
    async fn report(&self) {
        for status in self.channel_manager.status_all().await {
            if status.is_healthy() {
                info!(
                    channel = %status.name,
                    received = status.events_received,
                    sent = status.messages_sent,
                    "channel summary"
                );
            } else {
                warn!(
                    channel = %status.name,
                    state = ?status.state,
                    last_error = ?status.last_error,
                    "channel unhealthy"
                );
            }
        }

        let stats = self.bus.stats().await;
        let sessions = match self.dispatcher.store().list().await {
            Ok(keys) => keys.len(),
            Err(e) => {
                warn!(error = %e, "could not list sessions");
                0
            }
        };
        info!(
            inbound = stats.inbound_count,
            outbound = stats.outbound_count,
            dropped = stats.dropped_count,
            sessions,
            "bus summary"
        );
    }
}

/// One FIFO queue and worker per session key.
struct UserQueues<P> {
    dispatcher: Arc<Dispatcher<P>>,
    bus: MessageBus,
    queues: HashMap<String, mpsc::UnboundedSender<InboundEvent>>,
    workers: JoinSet<()>,
}

impl<P: CompletionProvider + 'static> UserQueues<P> {
    fn new(dispatcher: Arc<Dispatcher<P>>, bus: MessageBus) -> Self {
        Self {
            dispatcher,
            bus,
            queues: HashMap::new(),
            workers: JoinSet::new(),
        }
    }

    /// Append `event` to its user's queue, starting a worker on first contact.
    fn push(&mut self, event: InboundEvent) {
        let key = event.session_key();
        let event = match self.queues.get(&key) {
            Some(queue) => match queue.send(event) {
                Ok(()) => return,
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        debug!(session = %key, "starting session worker");
        let (tx, rx) = mpsc::unbounded_channel();
        self.workers.spawn(Self::work(
            Arc::clone(&self.dispatcher),
            self.bus.clone(),
            rx,
        ));
        // A fresh receiver is alive, so this cannot fail.
        let _ = tx.send(event);
        self.queues.insert(key, tx);
    }

    async fn work(
        dispatcher: Arc<Dispatcher<P>>,
        bus: MessageBus,
        mut rx: mpsc::UnboundedReceiver<InboundEvent>,
    ) {
        while let Some(event) = rx.recv().await {
            debug!(event = %event.id, channel = %event.channel, "handling event");
            match dispatcher.handle(&event).await {
                Ok(replies) => {
                    for reply in replies {
                        if let Err(e) = bus.publish_outbound(reply).await {
                            error!(error = %e, "failed to publish reply");
                        }
                    }
                }
                Err(e) => error!(event = %event.id, error = %e, "failed to handle event"),
            }
        }
    }

    /// Close every queue and let the workers finish what is already queued.
    async fn close(mut self) {
        self.queues.clear();
        let workers = &mut self.workers;
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while workers.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("abandoning events still in flight");
            self.workers.shutdown().await;
        }
    }
}
