//! relay-core
//!
//! Building blocks for a workflow extension: announce readiness on a
//! pub/sub bus, take one task, run a handler, publish one envelope.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, channel, task, envelope, errors, state, report）
//! - **ports**: 抽象化レイヤー（BusConnector / Publisher / Subscriber, Clock, IdGenerator）
//! - **app**: ExtensionRunner, AppBuilder, health endpoint
//! - **typed**: 型付き Task API（Task trait, Handler trait, TypedRegistry, PayloadCodec）
//! - **impls**: RedisConnector, InMemoryBus
//! - **config**: 環境変数からの RelayConfig

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;

pub use crate::app::{App, AppBuilder, ExtensionRunner, RunMode, RunnerOptions};
pub use crate::config::{ConfigError, RelayConfig};
pub use crate::domain::{HandlerError, RunnerError};
pub use crate::typed::{Handler, Task};
