//! Async message bus between transports and the dispatcher.
//!
//! Inbound events from every channel share one queue; outbound messages are
//! routed to the subscribers registered for their target channel.

use crate::error::{BusError, BusResult};
use crate::events::{InboundEvent, OutboundMessage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, trace, warn};

/// Default capacity for message queues.
const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Message bus shared by channels and the gateway.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<MessageBusInner>,
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus").finish_non_exhaustive()
    }
}

struct MessageBusInner {
    /// Inbound event queue (channels → dispatcher).
    inbound_tx: mpsc::Sender<InboundEvent>,
    inbound_rx: RwLock<Option<mpsc::Receiver<InboundEvent>>>,

    /// Per-channel outbound subscribers.
    channel_subscribers: RwLock<HashMap<String, Vec<mpsc::Sender<OutboundMessage>>>>,

    stats: RwLock<BusStats>,
}

/// Message bus statistics.
#[derive(Debug, Default, Clone, Copy)]
pub struct BusStats {
    /// Total inbound events published.
    pub inbound_count: u64,
    /// Total outbound messages delivered to at least one subscriber.
    pub outbound_count: u64,
    /// Outbound messages with no live subscriber.
    pub dropped_count: u64,
}

impl MessageBus {
    /// Create a new message bus.
    #[must_use]
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(DEFAULT_QUEUE_CAPACITY);

        Self {
            inner: Arc::new(MessageBusInner {
                inbound_tx,
                inbound_rx: RwLock::new(Some(inbound_rx)),
                channel_subscribers: RwLock::new(HashMap::new()),
                stats: RwLock::new(BusStats::default()),
            }),
        }
    }

    /// Consume the next inbound event, giving up after `timeout`.
    pub async fn consume_inbound_timeout(&self, timeout: Duration) -> Option<InboundEvent> {
        let mut rx_guard = self.inner.inbound_rx.write().await;
        match rx_guard.as_mut() {
            Some(rx) => tokio::time::timeout(timeout, rx.recv()).await.ok().flatten(),
            None => None,
        }
    }

    /// Deliver an outbound message to the subscribers of its channel.
    ///
    /// A message nobody is subscribed to is counted as dropped, not an error.
    pub async fn publish_outbound(&self, msg: OutboundMessage) -> BusResult<()> {
        trace!(
            channel = %msg.channel,
            chat_id = %msg.chat_id,
            "publishing outbound message"
        );

        let mut delivered = false;
        {
            let subscribers = self.inner.channel_subscribers.read().await;
            if let Some(senders) = subscribers.get(&msg.channel) {
                for sender in senders {
                    if sender.send(msg.clone()).await.is_ok() {
                        delivered = true;
                    } else {
                        debug!(channel = %msg.channel, "channel subscriber disconnected");
                    }
                }
            }
        }

        let mut stats = self.inner.stats.write().await;
        if delivered {
            stats.outbound_count += 1;
        } else {
            warn!(channel = %msg.channel, "no subscriber for outbound message");
            stats.dropped_count += 1;
        }
        Ok(())
    }

    /// Subscribe to outbound messages for a specific channel.
    pub async fn subscribe_channel(&self, channel: &str) -> mpsc::Receiver<OutboundMessage> {
        let (tx, rx) = mpsc::channel(DEFAULT_QUEUE_CAPACITY);

        let mut subscribers = self.inner.channel_subscribers.write().await;
        subscribers.entry(channel.to_string()).or_default().push(tx);

        debug!(channel = %channel, "new channel subscriber registered");
        rx
    }

    /// Get current bus statistics.
    pub async fn stats(&self) -> BusStats {
        *self.inner.stats.read().await
    }

    /// Create a lightweight handle for publishing inbound events.
    #[must_use]
    pub fn inbound_handle(&self) -> InboundHandle {
        InboundHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Lightweight handle channels use to publish inbound events.
#[derive(Clone)]
pub struct InboundHandle {
    inner: Arc<MessageBusInner>,
}

impl std::fmt::Debug for InboundHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundHandle").finish_non_exhaustive()
    }
}

impl InboundHandle {
    /// Publish an inbound event.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InboundClosed`] if the consumer is gone.
    pub async fn publish(&self, event: InboundEvent) -> BusResult<()> {
        trace!(
            channel = %event.channel,
            user = %event.user.id,
            "publishing inbound event"
        );

        self.inner
            .inbound_tx
            .send(event)
            .await
            .map_err(|_| BusError::InboundClosed)?;

        self.inner.stats.write().await.inbound_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MessageFormat, OutboundPayload, UserIdentity};

    fn text(channel: &str, body: &str) -> OutboundMessage {
        OutboundMessage::new(
            channel,
            "chat1",
            OutboundPayload::Text {
                body: body.to_string(),
                format: MessageFormat::Plain,
            },
        )
    }

    fn body(msg: &OutboundMessage) -> &str {
        match &msg.payload {
            OutboundPayload::Text { body, .. } => body,
            _ => panic!("expected text"),
        }
    }

    #[tokio::test]
    async fn test_inbound_flow() {
        let bus = MessageBus::new();
        let user = UserIdentity::new("1", "Ana");

        bus.inbound_handle()
            .publish(InboundEvent::text("test", "chat1", user, "Hello"))
            .await
            .unwrap();

        let received = bus
            .consume_inbound_timeout(Duration::from_millis(100))
            .await
            .unwrap();
        assert!(matches!(received.kind, crate::events::EventKind::Text(ref t) if t == "Hello"));
    }

    #[tokio::test]
    async fn test_channel_routing() {
        let bus = MessageBus::new();
        let mut rx = bus.subscribe_channel("telegram").await;

        bus.publish_outbound(text("telegram", "For Telegram")).await.unwrap();
        bus.publish_outbound(text("cli", "For CLI")).await.unwrap();

        let received = tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body(&received), "For Telegram");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stats() {
        let bus = MessageBus::new();
        let _rx = bus.subscribe_channel("test").await;

        bus.inbound_handle()
            .publish(InboundEvent::text("test", "c", UserIdentity::new("s", "S"), "in"))
            .await
            .unwrap();
        bus.publish_outbound(text("test", "out")).await.unwrap();
        bus.publish_outbound(text("nobody", "lost")).await.unwrap();

        let stats = bus.stats().await;
        assert_eq!(stats.inbound_count, 1);
        assert_eq!(stats.outbound_count, 1);
        assert_eq!(stats.dropped_count, 1);
    }
}
