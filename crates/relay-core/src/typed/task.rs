//! Task trait - 型付き Task の定義
//!
//! # 学習ポイント
//! - Associated Constants (`const TYPE`)
//! - Associated Types (`type Output`)
//! - Trait bounds の組み合わせ (DeserializeOwned + Send + Sync + 'static)

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Task はハンドラ名と入力の型を対応付ける
///
/// `Self` は task message の `inputs` から deserialize される。
///
/// # 使用例
/// ```ignore
/// #[derive(Deserialize)]
/// struct SendEmail {
///     to: String,
/// }
///
/// impl Task for SendEmail {
///     const TYPE: &'static str = "gmail.send_email";
///     type Output = serde_json::Value;
/// }
/// ```
///
/// # 命名規約
/// - `{integration}.{action}`
/// - 例: `mailchimp.add_subscriber`
pub trait Task: DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;

    /// What the handler returns on success; becomes the envelope's `output`.
    type Output: Serialize + Send + 'static;
}
