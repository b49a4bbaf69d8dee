//! Domain identifiers (strongly-typed IDs).
//!
//! # 相関 ID と実行 ID
//! - **WorkflowInstanceId / WorkflowExtensionId**: 外部のオーケストレータが起動時に注入する
//!   文字列。プロセスの生存期間中は不変で、すべての envelope にそのまま返す。
//! - **RunId**: プロセス 1 回の実行ごとに ULID で採番する。ログの相関専用で、
//!   バスには流さない。
//!
//! ## Phantom Type パターン
//! `CorrelationId<T>` で共通実装を提供しつつ、`T` はマーカー型として
//! instance id と extension id の取り違えをコンパイル時に防ぐ。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait for correlation id kinds.
pub trait IdMarker: Send + Sync + 'static {
    /// Name used in error messages and logs (e.g. "workflowInstanceId").
    fn label() -> &'static str;
}

/// String-backed correlation id.
///
/// Serialized transparently as the inner string, so `{"workflowInstanceId": "wi-1"}`
/// round-trips without a wrapper object.
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId<T: IdMarker> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> CorrelationId<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn label() -> &'static str {
        T::label()
    }
}

// derive(Clone) would require T: Clone on the marker
impl<T: IdMarker> Clone for CorrelationId<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T: IdMarker> fmt::Display for CorrelationId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceMarker;

impl IdMarker for InstanceMarker {
    fn label() -> &'static str {
        "workflowInstanceId"
    }
}

#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtensionMarker;

impl IdMarker for ExtensionMarker {
    fn label() -> &'static str {
        "workflowExtensionId"
    }
}

pub type WorkflowInstanceId = CorrelationId<InstanceMarker>;
pub type WorkflowExtensionId = CorrelationId<ExtensionMarker>;

/// The pair of correlation ids echoed verbatim into every envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowIds {
    pub instance_id: WorkflowInstanceId,
    pub extension_id: WorkflowExtensionId,
}

impl WorkflowIds {
    pub fn new(instance_id: impl Into<String>, extension_id: impl Into<String>) -> Self {
        Self {
            instance_id: WorkflowInstanceId::new(instance_id),
            extension_id: WorkflowExtensionId::new(extension_id),
        }
    }
}

/// Per-run identifier used for log correlation.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(Ulid);

impl RunId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for RunId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_ids_serialize_as_plain_strings() {
        let id = WorkflowInstanceId::new("wi-42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"wi-42\"");

        let back: WorkflowInstanceId = serde_json::from_str("\"wi-42\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn labels_match_envelope_field_names() {
        assert_eq!(WorkflowInstanceId::label(), "workflowInstanceId");
        assert_eq!(WorkflowExtensionId::label(), "workflowExtensionId");
    }

    #[test]
    fn run_id_display_has_prefix() {
        let id = RunId::from_ulid(Ulid::new());
        assert!(id.to_string().starts_with("run-"));
    }
}
