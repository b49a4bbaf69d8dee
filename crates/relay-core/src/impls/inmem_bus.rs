//! InMemoryBus - 開発・テスト用の pub/sub バス
//!
//! # 実装詳細
//! - Redis pub/sub と同じく、購読者がいないチャンネルへの publish は捨てられる
//! - 購読者ごとに tokio の unbounded mpsc を持ち、publish 時に配る
//! - 観測可能な副作用（接続・publish・購読・解除・close）を順番どおり `BusEvent` に記録する
//! - std の Mutex は await を跨いで保持しない
//!
//! # 使用例
//! ```ignore
//! let bus = InMemoryBus::new();
//! let mut out = bus.watch("out");
//! let runner = ExtensionRunner::new(Arc::new(bus.clone()), ...);
//! bus.publish("in", r#"{"inputs":{}}"#);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::Channel;
use crate::ports::{BusConnector, BusError, Publisher, Subscriber};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Publisher,
    Subscriber,
}

/// One observable bus effect caused by a connection opened through the connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Connected { role: Role },
    Published { channel: String, payload: String },
    Subscribed { channel: String },
    Unsubscribed { channel: String },
    Closed { role: Role },
}

struct Registration {
    tx: mpsc::UnboundedSender<String>,
    channels: HashSet<String>,
}

#[derive(Default)]
struct BusState {
    registrations: HashMap<u64, Registration>,
    /// Observers attached with `watch()`; not recorded as events.
    watchers: HashMap<String, Vec<mpsc::UnboundedSender<String>>>,
    events: Vec<BusEvent>,
    next_id: u64,
    refuse_connections: bool,
    failing_channels: HashSet<String>,
}

impl BusState {
    /// Fan a payload out to every subscriber and watcher of `channel`.
    fn deliver(&mut self, channel: &str, payload: &str) -> usize {
        let mut delivered = 0;
        for registration in self.registrations.values() {
            if registration.channels.contains(channel)
                && registration.tx.send(payload.to_string()).is_ok()
            {
                delivered += 1;
            }
        }
        if let Some(watchers) = self.watchers.get_mut(channel) {
            watchers.retain(|tx| tx.send(payload.to_string()).is_ok());
        }
        delivered
    }
}

/// Process-local bus. Cloning shares the same bus.
#[derive(Clone, Default)]
pub struct InMemoryBus {
    state: Arc<Mutex<BusState>>,
}

fn lock(state: &Mutex<BusState>) -> MutexGuard<'_, BusState> {
    // a panicking test thread must not wedge every other handle
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `publisher()` / `subscriber()` call fail.
    pub fn refuse_connections(&self, refuse: bool) {
        lock(&self.state).refuse_connections = refuse;
    }

    /// Make publishes to `channel` fail.
    pub fn fail_publishes_to(&self, channel: &str) {
        lock(&self.state).failing_channels.insert(channel.to_string());
    }

    /// Publish from outside the runner (the orchestrator's side).
    ///
    /// Returns how many subscribers received the payload.
    pub fn publish(&self, channel: &str, payload: &str) -> usize {
        lock(&self.state).deliver(channel, payload)
    }

    /// Observe everything published on `channel` from now on.
    pub fn watch(&self, channel: &str) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.state)
            .watchers
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// Drop every subscription, ending their message streams.
    pub fn disconnect_subscribers(&self) {
        lock(&self.state).registrations.clear();
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        lock(&self.state)
            .registrations
            .values()
            .filter(|r| r.channels.contains(channel))
            .count()
    }

    pub fn events(&self) -> Vec<BusEvent> {
        lock(&self.state).events.clone()
    }

    /// Payloads the runner published on `channel`, in order.
    pub fn published_on(&self, channel: &str) -> Vec<String> {
        lock(&self.state)
            .events
            .iter()
            .filter_map(|event| match event {
                BusEvent::Published { channel: c, payload } if c == channel => {
                    Some(payload.clone())
                }
                _ => None,
            })
            .collect()
    }

    fn check_connect(&self, role: Role) -> Result<(), BusError> {
        let mut state = lock(&self.state);
        if state.refuse_connections {
            return Err(BusError::Connect {
                source: "connection refused".into(),
            });
        }
        state.events.push(BusEvent::Connected { role });
        Ok(())
    }
}

pub struct InMemoryPublisher {
    state: Arc<Mutex<BusState>>,
}

#[async_trait]
impl Publisher for InMemoryPublisher {
    async fn publish(&self, channel: &Channel, payload: &str) -> Result<(), BusError> {
        let mut state = lock(&self.state);
        if state.failing_channels.contains(channel.as_str()) {
            return Err(BusError::Publish {
                channel: channel.to_string(),
                source: "publish rejected".into(),
            });
        }
        state.events.push(BusEvent::Published {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });
        state.deliver(channel.as_str(), payload);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), BusError> {
        lock(&self.state).events.push(BusEvent::Closed {
            role: Role::Publisher,
        });
        Ok(())
    }
}

pub struct InMemorySubscriber {
    id: u64,
    state: Arc<Mutex<BusState>>,
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl Subscriber for InMemorySubscriber {
    async fn subscribe(&mut self, channel: &Channel) -> Result<(), BusError> {
        let mut state = lock(&self.state);
        let Some(registration) = state.registrations.get_mut(&self.id) else {
            return Err(BusError::Subscribe {
                channel: channel.to_string(),
                source: "subscriber disconnected".into(),
            });
        };
        registration.channels.insert(channel.to_string());
        state.events.push(BusEvent::Subscribed {
            channel: channel.to_string(),
        });
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<String>, BusError> {
        Ok(self.rx.recv().await)
    }

    async fn unsubscribe(&mut self, channel: &Channel) -> Result<(), BusError> {
        let mut state = lock(&self.state);
        if let Some(registration) = state.registrations.get_mut(&self.id) {
            registration.channels.remove(channel.as_str());
        }
        state.events.push(BusEvent::Unsubscribed {
            channel: channel.to_string(),
        });
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), BusError> {
        let mut state = lock(&self.state);
        state.registrations.remove(&self.id);
        state.events.push(BusEvent::Closed {
            role: Role::Subscriber,
        });
        Ok(())
    }
}

#[async_trait]
impl BusConnector for InMemoryBus {
    async fn publisher(&self) -> Result<Box<dyn Publisher>, BusError> {
        self.check_connect(Role::Publisher)?;
        Ok(Box::new(InMemoryPublisher {
            state: Arc::clone(&self.state),
        }))
    }

    async fn subscriber(&self) -> Result<Box<dyn Subscriber>, BusError> {
        self.check_connect(Role::Subscriber)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = lock(&self.state);
        let id = state.next_id;
        state.next_id += 1;
        state.registrations.insert(
            id,
            Registration {
                tx,
                channels: HashSet::new(),
            },
        );
        Ok(Box::new(InMemorySubscriber {
            id,
            state: Arc::clone(&self.state),
            rx,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_dropped() {
        let bus = InMemoryBus::new();
        assert_eq!(bus.publish("in", "lost"), 0);

        let mut sub = bus.subscriber().await.unwrap();
        sub.subscribe(&Channel::new("in")).await.unwrap();
        assert_eq!(bus.publish("in", "kept"), 1);

        assert_eq!(sub.next_message().await.unwrap().as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscriber().await.unwrap();
        let ch = Channel::new("in");
        sub.subscribe(&ch).await.unwrap();
        assert_eq!(bus.subscriber_count("in"), 1);

        sub.unsubscribe(&ch).await.unwrap();
        assert_eq!(bus.subscriber_count("in"), 0);
        assert_eq!(bus.publish("in", "late"), 0);
    }

    #[tokio::test]
    async fn events_are_recorded_in_order() {
        let bus = InMemoryBus::new();
        let publisher = bus.publisher().await.unwrap();
        let mut sub = bus.subscriber().await.unwrap();

        publisher.publish(&Channel::new("ready"), "").await.unwrap();
        sub.subscribe(&Channel::new("in")).await.unwrap();
        sub.close().await.unwrap();
        publisher.close().await.unwrap();

        assert_eq!(
            bus.events(),
            vec![
                BusEvent::Connected { role: Role::Publisher },
                BusEvent::Connected { role: Role::Subscriber },
                BusEvent::Published {
                    channel: "ready".to_string(),
                    payload: String::new()
                },
                BusEvent::Subscribed {
                    channel: "in".to_string()
                },
                BusEvent::Closed { role: Role::Subscriber },
                BusEvent::Closed { role: Role::Publisher },
            ]
        );
        assert_eq!(bus.published_on("ready"), vec![String::new()]);
    }

    #[tokio::test]
    async fn refused_connection_is_a_connect_error() {
        let bus = InMemoryBus::new();
        bus.refuse_connections(true);

        assert!(matches!(
            bus.publisher().await,
            Err(BusError::Connect { .. })
        ));
        assert!(bus.events().is_empty());
    }

    #[tokio::test]
    async fn watchers_see_runner_publishes() {
        let bus = InMemoryBus::new();
        let mut out = bus.watch("out");
        let publisher = bus.publisher().await.unwrap();

        publisher.publish(&Channel::new("out"), "{}").await.unwrap();

        assert_eq!(out.recv().await.as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn disconnect_ends_the_stream() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscriber().await.unwrap();
        sub.subscribe(&Channel::new("in")).await.unwrap();

        bus.disconnect_subscribers();

        assert_eq!(sub.next_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn failing_channel_rejects_publish() {
        let bus = InMemoryBus::new();
        bus.fail_publishes_to("out");
        let publisher = bus.publisher().await.unwrap();

        let err = publisher
            .publish(&Channel::new("out"), "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::Publish { ref channel, .. } if channel == "out"));
    }
}
