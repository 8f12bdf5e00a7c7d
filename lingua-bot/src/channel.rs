//! Transport abstraction.
//!
//! A [`Channel`] turns platform updates into [`InboundEvent`]s on the bus and
//! renders the [`OutboundMessage`]s routed to it.
//!
//! [`InboundEvent`]: crate::events::InboundEvent
//! [`OutboundMessage`]: crate::events::OutboundMessage

use crate::bus::MessageBus;
use crate::error::ChannelResult;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Channel lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// Not started.
    #[default]
    Stopped,
    /// Starting up.
    Starting,
    /// Running and connected.
    Running,
    /// Encountered a fatal error.
    Error,
}

/// Channel status snapshot.
#[derive(Debug, Clone)]
pub struct ChannelStatus {
    /// Channel name.
    pub name: String,
    /// Current state.
    pub state: ChannelState,
    /// Inbound events published.
    pub events_received: u64,
    /// Outbound messages rendered.
    pub messages_sent: u64,
    /// Last error, if any.
    pub last_error: Option<String>,
}

impl ChannelStatus {
    /// Running and no error recorded.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.state == ChannelState::Running && self.last_error.is_none()
    }
}

/// A messaging transport.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique channel name; also the `channel` field of its events.
    fn name(&self) -> &str;

    /// Connect and spawn the background tasks.
    ///
    /// Implementations publish inbound events on `bus` and consume
    /// `bus.subscribe_channel(self.name())` for outbound messages.
    async fn start(&self, bus: &MessageBus) -> ChannelResult<()>;

    /// Stop background tasks.
    async fn stop(&self) -> ChannelResult<()>;

    /// Current status.
    async fn status(&self) -> ChannelStatus;
}

/// Owns the registered channels and drives their lifecycle.
pub struct ChannelManager {
    channels: RwLock<Vec<Arc<dyn Channel>>>,
    bus: MessageBus,
}

impl std::fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelManager")
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl ChannelManager {
    /// Create a manager bound to `bus`.
    #[must_use]
    pub fn new(bus: MessageBus) -> Self {
        Self {
            channels: RwLock::new(Vec::new()),
            bus,
        }
    }

    /// Register a channel.
    pub async fn register(&self, channel: impl Channel + 'static) {
        let channel: Arc<dyn Channel> = Arc::new(channel);
        info!(channel = %channel.name(), "channel registered");
        self.channels.write().await.push(channel);
    }

    /// Start all registered channels, returning one result per channel.
    pub async fn start_all(&self) -> Vec<ChannelResult<()>> {
        let channels = self.channels.read().await;
        let mut results = Vec::with_capacity(channels.len());

        for channel in channels.iter() {
            info!(channel = %channel.name(), "starting channel");
            let result = channel.start(&self.bus).await;
            if let Err(ref e) = result {
                error!(channel = %channel.name(), error = %e, "failed to start channel");
            }
            results.push(result);
        }

        results
    }

    /// Stop all registered channels.
    pub async fn stop_all(&self) {
        for channel in self.channels.read().await.iter() {
            if let Err(e) = channel.stop().await {
                error!(channel = %channel.name(), error = %e, "failed to stop channel");
            }
        }
    }

    /// Status of every channel.
    pub async fn status_all(&self) -> Vec<ChannelStatus> {
        let channels = self.channels.read().await;
        let mut statuses = Vec::with_capacity(channels.len());
        for channel in channels.iter() {
            statuses.push(channel.status().await);
        }
        statuses
    }
}

/// State and counters shared by channel implementations.
pub struct ChannelBase {
    name: String,
    state: RwLock<ChannelState>,
    stats: RwLock<ChannelStats>,
}

impl std::fmt::Debug for ChannelBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelBase")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct ChannelStats {
    events_received: u64,
    messages_sent: u64,
    last_error: Option<String>,
}

impl ChannelBase {
    /// Create a base for the channel called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(ChannelState::default()),
            stats: RwLock::new(ChannelStats::default()),
        }
    }

    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the state.
    pub async fn set_state(&self, state: ChannelState) {
        *self.state.write().await = state;
        debug!(channel = %self.name, ?state, "channel state changed");
    }

    /// Count an inbound event.
    pub async fn record_received(&self) {
        self.stats.write().await.events_received += 1;
    }

    /// Count an outbound message.
    pub async fn record_sent(&self) {
        self.stats.write().await.messages_sent += 1;
    }

    /// Log and remember an error.
    pub async fn record_error(&self, error: impl Into<String>) {
        let error = error.into();
        error!(channel = %self.name, %error, "channel error");
        self.stats.write().await.last_error = Some(error);
    }

    /// Snapshot the status.
    pub async fn build_status(&self) -> ChannelStatus {
        let state = *self.state.read().await;
        let stats = self.stats.read().await;

        ChannelStatus {
            name: self.name.clone(),
            state,
            events_received: stats.events_received,
            messages_sent: stats.messages_sent,
            last_error: stats.last_error.clone(),
        }
    }
}
