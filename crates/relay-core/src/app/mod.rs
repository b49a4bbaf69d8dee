//! App - アプリケーションロジック
//!
//! - **runner**: ExtensionRunner（ハンドシェイクの状態機械）
//! - **builder**: Handler 登録と起動時検証
//! - **health**: 任意の liveness HTTP endpoint

pub mod builder;
pub mod health;
pub mod runner;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::health::{HealthServer, health_routes};
pub use self::runner::{DEFAULT_TASK_TIMEOUT, ExtensionRunner, RunMode, RunnerOptions};
