//! Bus port - pub/sub バスへの接続
//!
//! # 設計原則
//! - 接続済みのハンドルしか存在しない（`BusConnector` が connect して返す）。
//!   なので「publish/subscribe の前に connect」は型で保証される。
//! - publish 用と subscribe 用は別接続。readiness の publish が購読の準備と競合しない。
//! - callback ではなく `next_message()` を await する。Runner は一直線に書ける。
//! - 配送は at-most-once。リモートでの消費は確認しない。

use async_trait::async_trait;

use crate::domain::Channel;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by bus implementations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Bus unreachable or authentication failed.
    #[error("failed to connect to bus: {source}")]
    Connect {
        #[source]
        source: BoxError,
    },

    #[error("failed to publish on channel {channel}: {source}")]
    Publish {
        channel: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to subscribe to channel {channel}: {source}")]
    Subscribe {
        channel: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to unsubscribe from channel {channel}: {source}")]
    Unsubscribe {
        channel: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to receive message: {source}")]
    Receive {
        #[source]
        source: BoxError,
    },

    #[error("failed to release bus connection: {source}")]
    Close {
        #[source]
        source: BoxError,
    },
}

/// Publishing half of a bus connection.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Send `payload` to `channel`. No acknowledgement of remote consumption.
    async fn publish(&self, channel: &Channel, payload: &str) -> Result<(), BusError>;

    /// Release the connection.
    async fn close(self: Box<Self>) -> Result<(), BusError>;
}

/// Subscribing half of a bus connection.
#[async_trait]
pub trait Subscriber: Send {
    async fn subscribe(&mut self, channel: &Channel) -> Result<(), BusError>;

    /// Wait for the next payload on any subscribed channel.
    ///
    /// Returns `Ok(None)` when the bus closed the subscription stream.
    async fn next_message(&mut self) -> Result<Option<String>, BusError>;

    async fn unsubscribe(&mut self, channel: &Channel) -> Result<(), BusError>;

    /// Release the connection.
    async fn close(self: Box<Self>) -> Result<(), BusError>;
}

/// Opens connected bus handles.
#[async_trait]
pub trait BusConnector: Send + Sync {
    async fn publisher(&self) -> Result<Box<dyn Publisher>, BusError>;

    async fn subscriber(&self) -> Result<Box<dyn Subscriber>, BusError>;
}
