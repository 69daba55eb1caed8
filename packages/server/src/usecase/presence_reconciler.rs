//! UseCase: 死んだ接続の定期掃除（Presence Reconciler）
//!
//! 送信チャンネルが閉じているのにレジストリに残っている接続を、
//! 猶予時間を過ぎた時点で `RoomBroker::disconnect` 経由で追い出す。
//! 追い出しは通常の切断と同じ副作用（user-left など）を伴う。

use std::{sync::Arc, time::Duration};

use kaiwa_shared::time::Clock;
use tokio_util::sync::CancellationToken;

use crate::domain::Timestamp;

use super::room_broker::RoomBroker;

/// Default sweep interval and eviction grace period
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_RECONCILE_GRACE: Duration = Duration::from_secs(300);

pub struct PresenceReconciler {
    broker: Arc<RoomBroker>,
    clock: Arc<dyn Clock>,
    grace: Duration,
}

impl PresenceReconciler {
    pub fn new(broker: Arc<RoomBroker>, clock: Arc<dyn Clock>, grace: Duration) -> Self {
        Self {
            broker,
            clock,
            grace,
        }
    }

    /// Evict stale connections once; returns how many were evicted.
    pub async fn sweep(&self) -> usize {
        let now = Timestamp::new(self.clock.now_millis());
        let grace_ms = i64::try_from(self.grace.as_millis()).unwrap_or(i64::MAX);
        let mut evicted = 0;

        for connection in self.broker.connections() {
            if connection.joined_at.elapsed_until(now) < grace_ms {
                continue;
            }
            if self.broker.is_transport_alive(&connection.id).await {
                continue;
            }
            if self.broker.disconnect(&connection.id).await.is_some() {
                tracing::info!(
                    "Evicted stale connection '{}' ('{}')",
                    connection.id,
                    connection.identity.display_name
                );
                evicted += 1;
            }
        }

        if evicted > 0 {
            tracing::info!("Presence sweep evicted {} connections", evicted);
        } else {
            tracing::debug!("Presence sweep found no stale connections");
        }
        evicted
    }

    /// Sweep every `interval` until `shutdown` fires.
    pub async fn run(&self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }
        tracing::debug!("Presence reconciler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecase::testing::{Harness, room};

    const GRACE: Duration = Duration::from_secs(300);

    #[tokio::test]
    async fn test_sweep_evicts_dead_connection_after_grace() {
        // テスト項目: 送信チャンネルが閉じ、猶予時間を過ぎた接続は追い出され、ルームに user-left が届く
        // given (前提条件):
        let (harness, _store) = Harness::in_memory();
        let mut alice = harness.joined("alice", "r1").await;
        let bob = harness.joined("bob", "r1").await;
        alice.drain();
        drop(bob.rx);
        harness.clock.advance(GRACE.as_millis() as i64);
        let reconciler =
            PresenceReconciler::new(harness.broker.clone(), harness.clock.clone(), GRACE);

        // when (操作):
        let evicted = reconciler.sweep().await;

        // then (期待する結果):
        assert_eq!(evicted, 1);
        assert!(harness.broker.connection(&bob.id).is_none());
        assert_eq!(harness.broker.room_connections(&room("r1")).len(), 1);
        assert_eq!(alice.event_names(), vec!["user-left", "participants-updated"]);
    }

    #[tokio::test]
    async fn test_sweep_keeps_young_and_live_connections() {
        // テスト項目: 猶予時間内の接続と、送信チャンネルが生きている接続は残る
        // given (前提条件):
        let (harness, _store) = Harness::in_memory();
        let _alice = harness.joined("alice", "r1").await;
        let bob = harness.joined("bob", "r1").await;
        drop(bob.rx);
        harness.clock.advance(GRACE.as_millis() as i64 - 1);
        let reconciler =
            PresenceReconciler::new(harness.broker.clone(), harness.clock.clone(), GRACE);

        // when (操作):
        let young = reconciler.sweep().await;
        harness.clock.advance(1);
        let after_grace = reconciler.sweep().await;

        // then (期待する結果): 猶予内では誰も追い出されず、猶予後は bob だけが追い出される
        assert_eq!(young, 0);
        assert_eq!(after_grace, 1);
        assert_eq!(harness.broker.connections().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sweeps_periodically_until_shutdown() {
        // テスト項目: run は一定間隔で掃除し、shutdown で停止する
        // given (前提条件):
        let (harness, _store) = Harness::in_memory();
        let bob = harness.joined("bob", "r1").await;
        drop(bob.rx);
        harness.clock.advance(GRACE.as_millis() as i64);
        let reconciler = Arc::new(PresenceReconciler::new(
            harness.broker.clone(),
            harness.clock.clone(),
            GRACE,
        ));
        let shutdown = CancellationToken::new();
        let task = tokio::spawn({
            let reconciler = reconciler.clone();
            let shutdown = shutdown.clone();
            async move { reconciler.run(Duration::from_secs(60), shutdown).await }
        });

        // when (操作):
        tokio::time::sleep(Duration::from_secs(30)).await;
        let before_first_tick = harness.broker.connections().len();
        tokio::time::sleep(Duration::from_secs(31)).await;

        // then (期待する結果):
        assert_eq!(before_first_tick, 1);
        assert!(harness.broker.connections().is_empty());
        shutdown.cancel();
        task.await.unwrap();
    }
}
