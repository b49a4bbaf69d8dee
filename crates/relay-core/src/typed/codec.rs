//! PayloadCodec - task message と Task/Output の相互変換
//!
//! # デシリアライズフロー
//! 1. `inputs` を取り出す
//! 2. serde_json で T にデシリアライズ
//! 3. 失敗時は Validation エラー（serde のメッセージがフィールド名を含む）

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::{HandlerError, TaskMessage};

pub type CodecError = HandlerError;

#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadCodec;

impl PayloadCodec {
    pub fn decode_inputs<T: DeserializeOwned>(message: &TaskMessage) -> Result<T, CodecError> {
        serde_json::from_value(Value::Object(message.inputs().clone()))
            .map_err(|e| HandlerError::validation(format!("Invalid input: {e}")).with_source(e))
    }

    pub fn encode_output<O: Serialize>(output: &O) -> Result<Value, CodecError> {
        serde_json::to_value(output).map_err(|e| {
            HandlerError::internal(format!("failed to encode handler output: {e}")).with_source(e)
        })
    }
}
