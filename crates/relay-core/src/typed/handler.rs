//! Handler trait - Task を実行する Handler の定義
//!
//! # 学習ポイント
//! - ジェネリック trait (Handler<T>)
//! - Object-safe trait (DynHandler)
//! - Type erasure パターン (TypedHandler<T, H> → DynHandler)
//!
//! Handler はバス接続・readiness・envelope 組み立てを一切知らない。
//! それらは Runner の責務。

use super::codec::PayloadCodec;
use super::task::Task;
use crate::domain::{HandlerError, TaskMessage};
use async_trait::async_trait;
use std::marker::PhantomData;

/// Handler は Task を実行して出力を返す
///
/// # 使用例
/// ```ignore
/// struct SendEmailHandler;
///
/// #[async_trait]
/// impl Handler<SendEmail> for SendEmailHandler {
///     async fn handle(&self, task: SendEmail) -> Result<serde_json::Value, HandlerError> {
///         Ok(json!({ "sent_to": task.to }))
///     }
/// }
/// ```
///
/// 遅い I/O や失敗しうる外部呼び出しをしてよい。Runner はハンドラ単位の timeout を課さない。
#[async_trait]
pub trait Handler<T: Task>: Send + Sync {
    async fn handle(&self, task: T) -> Result<T::Output, HandlerError>;
}

/// DynHandler は object-safe な Handler の抽象化
///
/// TypedHandler<T, H> を DynHandler に変換することで、
/// HashMap<String, Arc<dyn DynHandler>> に格納可能にします。
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(&self, message: &TaskMessage) -> Result<serde_json::Value, HandlerError>;
    fn task_type(&self) -> &str;
}

pub struct TypedHandler<T: Task, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Task, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Task, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn handle_dyn(&self, message: &TaskMessage) -> Result<serde_json::Value, HandlerError> {
        let task: T = PayloadCodec::decode_inputs(message)?;
        let output = self.handler.handle(task).await?;
        PayloadCodec::encode_output(&output)
    }

    fn task_type(&self) -> &str {
        T::TYPE
    }
}
