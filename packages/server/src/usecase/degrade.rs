//! Degraded continuation for persistence calls.
//!
//! The broker keeps serving real-time traffic while the store is down: a
//! failed (or timed out) store call is logged and replaced by a fallback value.

use std::future::Future;

use crate::domain::StoreError;

/// Await `call`; on failure log it under `operation` and return `fallback()`.
pub async fn with_degradation<T, F>(
    operation: &'static str,
    call: F,
    fallback: impl FnOnce() -> T,
) -> T
where
    F: Future<Output = Result<T, StoreError>>,
{
    match call.await {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Store call '{}' failed, continuing degraded: {}", operation, e);
            fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_returns_value() {
        // テスト項目: 成功時はストアの結果をそのまま返す
        // given (前提条件):
        let call = async { Ok::<_, StoreError>(vec![1, 2, 3]) };

        // when (操作):
        let result = with_degradation("query", call, Vec::new).await;

        // then (期待する結果):
        assert_eq!(result, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failure_returns_fallback() {
        // テスト項目: 失敗時はフォールバック値を返す（パニックしない）
        // given (前提条件):
        let call = async { Err::<Vec<i32>, _>(StoreError::Unavailable("down".to_string())) };

        // when (操作):
        let result = with_degradation("query", call, Vec::new).await;

        // then (期待する結果):
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_is_lazy() {
        // テスト項目: 成功時はフォールバックが評価されない
        // given (前提条件):
        let mut evaluated = false;

        // when (操作):
        let result = with_degradation("query", async { Ok::<_, StoreError>(1) }, || {
            evaluated = true;
            0
        })
        .await;

        // then (期待する結果):
        assert_eq!(result, 1);
        assert!(!evaluated);
    }
}
