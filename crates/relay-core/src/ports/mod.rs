//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」。外部システム（メッセージバス、時計）への
//! インターフェースを trait で定義し、実装は `impls` に置く。

pub mod bus;
pub mod clock;
pub mod id_generator;

pub use self::bus::{BoxError, BusConnector, BusError, Publisher, Subscriber};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
