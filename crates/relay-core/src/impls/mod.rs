//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **RedisConnector**: 本番用の pub/sub バス
//! - **InMemoryBus**: 開発・テスト用のバス（副作用を記録する）

pub mod inmem_bus;
pub mod redis_bus;

pub use self::inmem_bus::{BusEvent, InMemoryBus, Role};
pub use self::redis_bus::RedisConnector;
