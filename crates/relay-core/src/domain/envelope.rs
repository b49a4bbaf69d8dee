//! CompletionEnvelope - 結果を orchestrator に返す唯一のメッセージ
//!
//! # 形
//! ```text
//! {"type":"completed","workflowInstanceId":..,"workflowExtensionId":..,"output":..}
//! {"type":"failed",   "workflowInstanceId":..,"workflowExtensionId":..,"error":..}
//! ```
//! `error` は既定では文字列。詳細モードでは `{message, kind, stack?}` の object になる。

use serde::{Deserialize, Serialize};

use super::errors::{ErrorKind, HandlerError};
use super::ids::{WorkflowExtensionId, WorkflowIds, WorkflowInstanceId};

/// The `error` field of a failed envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorPayload {
    Message(String),
    Detailed {
        message: String,
        kind: ErrorKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },
}

impl ErrorPayload {
    pub fn from_error(err: &HandlerError, detailed: bool) -> Self {
        if detailed {
            Self::Detailed {
                message: err.message().to_string(),
                kind: err.kind(),
                stack: err.chain(),
            }
        } else {
            Self::Message(err.message().to_string())
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Message(message) => message,
            Self::Detailed { message, .. } => message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum CompletionEnvelope {
    Completed {
        workflow_instance_id: WorkflowInstanceId,
        workflow_extension_id: WorkflowExtensionId,
        output: serde_json::Value,
    },
    Failed {
        workflow_instance_id: WorkflowInstanceId,
        workflow_extension_id: WorkflowExtensionId,
        error: ErrorPayload,
    },
}

impl CompletionEnvelope {
    pub fn completed(ids: &WorkflowIds, output: serde_json::Value) -> Self {
        Self::Completed {
            workflow_instance_id: ids.instance_id.clone(),
            workflow_extension_id: ids.extension_id.clone(),
            output,
        }
    }

    pub fn failed(ids: &WorkflowIds, error: ErrorPayload) -> Self {
        Self::Failed {
            workflow_instance_id: ids.instance_id.clone(),
            workflow_extension_id: ids.extension_id.clone(),
            error,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids() -> WorkflowIds {
        WorkflowIds::new("wi-1", "we-1")
    }

    #[test]
    fn completed_envelope_shape() {
        let env = CompletionEnvelope::completed(&ids(), json!({"id": "abc"}));
        let v: serde_json::Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();

        assert_eq!(
            v,
            json!({
                "type": "completed",
                "workflowInstanceId": "wi-1",
                "workflowExtensionId": "we-1",
                "output": {"id": "abc"}
            })
        );
    }

    #[test]
    fn failed_envelope_carries_plain_message_by_default() {
        let err = HandlerError::validation("Invalid email format");
        let env = CompletionEnvelope::failed(&ids(), ErrorPayload::from_error(&err, false));
        let v = serde_json::to_value(&env).unwrap();

        assert_eq!(v["type"], "failed");
        assert_eq!(v["error"], "Invalid email format");
        assert!(v.get("output").is_none());
    }

    #[test]
    fn detailed_error_includes_kind_and_stack() {
        let io = std::io::Error::other("socket closed");
        let err = HandlerError::upstream("Failed to add comment").with_source(io);
        let env = CompletionEnvelope::failed(&ids(), ErrorPayload::from_error(&err, true));
        let v = serde_json::to_value(&env).unwrap();

        assert_eq!(v["error"]["message"], "Failed to add comment");
        assert_eq!(v["error"]["kind"], "UpstreamError");
        assert_eq!(v["error"]["stack"], "caused by: socket closed");
    }

    #[test]
    fn detailed_error_without_source_omits_stack() {
        let err = HandlerError::timeout("no task");
        let payload = ErrorPayload::from_error(&err, true);
        let v = serde_json::to_value(&payload).unwrap();
        assert!(v.get("stack").is_none());
        assert_eq!(payload.message(), "no task");
    }

    #[test]
    fn envelope_deserializes_from_orchestrator_json() {
        let raw = r#"{"type":"failed","workflowInstanceId":"a","workflowExtensionId":"b","error":"boom"}"#;
        let env: CompletionEnvelope = serde_json::from_str(raw).unwrap();
        assert!(!env.is_completed());
        assert!(matches!(
            env,
            CompletionEnvelope::Failed { error: ErrorPayload::Message(ref m), .. } if m == "boom"
        ));
    }
}
