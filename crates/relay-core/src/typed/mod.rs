//! Typed - 型付き Task Handler API
//!
//! ハンドラ名の typo を型で排除し、Handler と入力型の対応付けを静的に保証します。
//!
//! # 二層構造
//! - **表層（Typed）**: `Task` trait, `Handler<T>` trait - 型安全
//! - **内部（Dyn）**: `DynHandler` trait - object-safe, type erasure

pub mod codec;
pub mod handler;
pub mod registry;
pub mod task;

pub use self::codec::{CodecError, PayloadCodec};
pub use self::handler::{DynHandler, Handler, TypedHandler};
pub use self::registry::{RegistryError, TypedRegistry};
pub use self::task::Task;
