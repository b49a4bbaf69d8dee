//! TaskMessage - 受信したタスク 1 件
//!
//! `{"inputs": {...}}` 形式の JSON。`inputs` のスキーマは handler が持つ。
//! JSON として読めない、object でない、`inputs` が無い/object でない場合は
//! インフラ側のエラー（malformed task）として扱い、envelope は出さない。

use serde_json::{Map, Value};

/// Why a raw payload could not be read as a task message.
#[derive(Debug, thiserror::Error)]
pub enum MalformedTask {
    #[error("task message is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("task message must be a JSON object")]
    NotAnObject,

    #[error("task message has no `inputs` object")]
    MissingInputs,
}

/// One inbound unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskMessage {
    raw: String,
    inputs: Map<String, Value>,
}

impl TaskMessage {
    /// Parse the raw bus payload.
    pub fn parse(raw: impl Into<String>) -> Result<Self, MalformedTask> {
        let raw = raw.into();
        let value: Value = serde_json::from_str(&raw)?;

        let Value::Object(mut object) = value else {
            return Err(MalformedTask::NotAnObject);
        };

        match object.remove("inputs") {
            Some(Value::Object(inputs)) => Ok(Self { raw, inputs }),
            _ => Err(MalformedTask::MissingInputs),
        }
    }

    /// The payload exactly as it arrived on the bus.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn inputs(&self) -> &Map<String, Value> {
        &self.inputs
    }

    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name)
    }
}
