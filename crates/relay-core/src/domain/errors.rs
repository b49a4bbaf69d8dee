//! Errors - エラー型と分類
//!
//! # 二系統
//! - **HandlerError**: handler 側（入力不正・外部 API の失敗など）。Runner が捕まえて
//!   `failed` envelope に変換する。プロセスは正常終了する。
//! - **RunnerError**: インフラ側（バス不達・タスクが JSON でない・購読が切れた）。
//!   envelope は出さず、プロセスは非ゼロで終了する。

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;

use crate::domain::task::MalformedTask;
use crate::ports::BusError;

/// ErrorKind は handler エラーの分類
///
/// Serialized with the `*Error` suffix the orchestrator expects
/// (e.g. `"TimeoutError"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Missing or invalid input field.
    #[serde(rename = "ValidationError")]
    Validation,
    /// The external API rejected the call or could not be reached.
    #[serde(rename = "UpstreamError")]
    Upstream,
    /// No task arrived within the configured bound.
    #[serde(rename = "TimeoutError")]
    Timeout,
    #[serde(rename = "InternalError")]
    Internal,
}

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// HandlerError はドメインエラー
///
/// `Display` は message のみ。envelope の `error` に handler の文言をそのまま載せるため。
#[derive(Debug)]
pub struct HandlerError {
    kind: ErrorKind,
    message: String,
    source: Option<BoxError>,
}

impl HandlerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Upstream, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Render the source chain, one cause per line, innermost last.
    ///
    /// Returns `None` when the error has no source.
    pub fn chain(&self) -> Option<String> {
        let mut lines = Vec::new();
        let mut current = StdError::source(self);
        while let Some(cause) = current {
            lines.push(format!("caused by: {cause}"));
            current = cause.source();
        }
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for HandlerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// Infrastructure failures. Fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("malformed task message: {0}")]
    MalformedTask(#[from] MalformedTask),

    #[error("subscription on channel {channel} closed before a task arrived")]
    SubscriptionClosed { channel: String },

    #[error("failed to serialize completion envelope: {0}")]
    Envelope(#[source] serde_json::Error),
}
