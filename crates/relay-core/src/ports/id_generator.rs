//! IdGenerator port - ID 生成の抽象化
//!
//! RunId はプロセス実行ごとに 1 つ。ログの相関にだけ使う。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース

use crate::domain::RunId;
use crate::ports::Clock;
use ulid::Ulid;

/// # Thread Safety
/// - `Send + Sync` を要求（Runner から Arc で共有する）
pub trait IdGenerator: Send + Sync {
    fn generate_run_id(&self) -> RunId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// テスト時に FixedClock を使えば timestamp 部分が決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_run_id(&self) -> RunId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        RunId::from(ulid)
    }
}
