//! ScoreStore port - ユーザーのスコアを永続的に加算する外部ストア
//!
//! 本番ではグラフ DB（`MATCH (u:User {email}) SET u.score = u.score + $amount`）
//! が実装します。パイプラインは `apply_reward` を同時に 1 本しか呼びません。

use async_trait::async_trait;

use crate::domain::{IdempotencyKey, StoreError, UserId};

/// ScoreStore は user の score を durably に増やす
///
/// # エラー
/// - `Unavailable`: 一時的（リトライされる）
/// - `NotFound`: user が存在しない（リトライされない）
/// - `Unknown`: その他
///
/// 同じ `key` での再呼び出しを重複として無視できる実装なら、
/// タイムアウト後のリトライによる二重加算を防げます。
#[async_trait]
pub trait ScoreStore: Send + Sync {
    async fn apply_reward(
        &self,
        user_id: &UserId,
        amount: i64,
        key: &IdempotencyKey,
    ) -> Result<(), StoreError>;
}
