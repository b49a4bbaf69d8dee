//! webhook.acknowledge - 受け取った payload をログに出して空文字を返す

use async_trait::async_trait;
use relay_core::{Handler, HandlerError, Task};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

/// Whatever the webhook delivered; the schema is not ours.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct WebhookEvent(pub Map<String, Value>);

impl Task for WebhookEvent {
    const TYPE: &'static str = "webhook.acknowledge";
    type Output = String;
}

pub struct AcknowledgeHandler;

#[async_trait]
impl Handler<WebhookEvent> for AcknowledgeHandler {
    async fn handle(&self, event: WebhookEvent) -> Result<String, HandlerError> {
        let keys: Vec<&str> = event.0.keys().map(String::as_str).collect();
        info!(?keys, "webhook received");
        Ok(String::new())
    }
}
