//! UseCase: ルームの参加・退出・切断とブロードキャスト（Room Broker）
//!
//! ## 責務
//!
//! - identity の登録（admit）と接続確認イベントの送信
//! - ルームへの参加・退出・切断時の副作用（履歴、参加者一覧、入退室通知）
//! - ルーム単位のファンアウト（broadcast）と個別送信（push_to）
//! - 入力中インジケータの開始・終了の通知
//!
//! ## 設計ノート
//!
//! 退出の副作用（入力中の解除、オフライン記録、user-left、participants-updated）は
//! `depart` に一本化されている。明示的な leave、別ルームへの join、切断のいずれも
//! レジストリの状態遷移（`set_room` / `remove`）に成功した呼び出し元だけが
//! `depart` を実行するため、退出通知はちょうど 1 回だけ送られる。

use std::{sync::Arc, time::Duration};

use kaiwa_shared::time::{Clock, timestamp_to_rfc3339};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{
        Connection, ConnectionId, ConnectionRegistry, Identity, MessagePushError, MessagePusher,
        PusherChannel, RegistryError, RoomId, Timestamp,
    },
    infrastructure::{
        dto::websocket::{
            AuthenticatedPayload, ConnectedPayload, JoinedRoomPayload, MessageDto, ParticipantDto,
            RoomPayload, ServerEvent, TypingPayload, UserPresencePayload,
        },
        typing_tracker::{TypingExpired, TypingTracker},
    },
};

use super::{
    error::{AdmitError, JoinError, LeaveError},
    message_pipeline::ChatHistory,
};

/// Load snapshot for the stats endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerStats {
    pub connections: usize,
    pub identified: usize,
    pub rooms: usize,
    pub typing_rooms: usize,
}

/// What a successful join delivered to the joiner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Room left implicitly by this join
    pub previous_room: Option<RoomId>,
    pub message_count: usize,
    pub participant_count: usize,
    /// The connection was already in the room; only its own view was refreshed
    pub rejoined: bool,
}

#[derive(Clone)]
pub struct RoomBroker {
    registry: Arc<dyn ConnectionRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    typing: Arc<TypingTracker>,
    history: Arc<ChatHistory>,
    clock: Arc<dyn Clock>,
}

impl RoomBroker {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
        typing: Arc<TypingTracker>,
        history: Arc<ChatHistory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            message_pusher,
            typing,
            history,
            clock,
        }
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    /// Current server time, RFC 3339
    pub fn server_time(&self) -> String {
        timestamp_to_rfc3339(self.clock.now_millis())
    }

    pub fn connection(&self, connection_id: &ConnectionId) -> Option<Connection> {
        self.registry.find(connection_id)
    }

    /// Every identified connection
    pub fn connections(&self) -> Vec<Connection> {
        self.registry.list_all()
    }

    pub fn room_connections(&self, room_id: &RoomId) -> Vec<Connection> {
        self.registry.list_by_room(room_id)
    }

    pub fn typing(&self) -> &TypingTracker {
        &self.typing
    }

    pub async fn is_transport_alive(&self, connection_id: &ConnectionId) -> bool {
        self.message_pusher.is_connected(connection_id).await
    }

    pub async fn stats(&self) -> BrokerStats {
        BrokerStats {
            connections: self.message_pusher.count().await,
            identified: self.registry.count(),
            rooms: self.registry.room_counts().len(),
            typing_rooms: self.typing.active_rooms(),
        }
    }

    /// Register the outbound channel of a new socket and greet it with `connected`.
    pub async fn connect(&self, connection_id: ConnectionId, sender: PusherChannel) {
        self.message_pusher
            .register_client(connection_id.clone(), sender)
            .await;

        let event = ServerEvent::Connected(ConnectedPayload {
            connection_id: connection_id.to_string(),
            server_time: self.server_time(),
        });
        if let Err(e) = self.push_to(&connection_id, &event).await {
            tracing::warn!("Failed to greet connection '{}': {}", connection_id, e);
        }
    }

    /// Attach an identity to the connection.
    pub async fn admit(
        &self,
        connection_id: &ConnectionId,
        identity: Identity,
    ) -> Result<Connection, AdmitError> {
        let connection = self
            .registry
            .admit(connection_id.clone(), identity, self.now())
            .map_err(|e| match e {
                RegistryError::DuplicateIdentity(user_id) => AdmitError::DuplicateIdentity(user_id),
                _ => AdmitError::AlreadyAuthenticated,
            })?;

        tracing::info!(
            "Connection '{}' authenticated as '{}' ({})",
            connection_id,
            connection.identity.display_name,
            connection.identity.user_id
        );

        let event = ServerEvent::Authenticated(AuthenticatedPayload {
            connection_id: connection_id.to_string(),
            user_id: connection.identity.user_id.to_string(),
            display_name: connection.identity.display_name.to_string(),
        });
        if let Err(e) = self.push_to(connection_id, &event).await {
            tracing::warn!("Failed to confirm authentication to '{}': {}", connection_id, e);
        }

        Ok(connection)
    }

    /// Join `room_id`, leaving the previous room first.
    pub async fn join(
        &self,
        connection_id: &ConnectionId,
        room_id: RoomId,
    ) -> Result<JoinOutcome, JoinError> {
        let connection = self
            .registry
            .find(connection_id)
            .ok_or(JoinError::NotAuthenticated)?;

        if connection.is_in(&room_id) {
            let messages = self.history.load_history(&room_id).await;
            let participants = self.history.load_participants(&room_id).await;
            let outcome = JoinOutcome {
                previous_room: None,
                message_count: messages.len(),
                participant_count: participants.len(),
                rejoined: true,
            };
            self.push_or_log(connection_id, &history_event(messages)).await;
            self.push_or_log(connection_id, &participants_event(participants))
                .await;
            self.push_or_log(connection_id, &joined_event(&room_id, &outcome))
                .await;
            tracing::debug!("Connection '{}' refreshed room '{}'", connection_id, room_id);
            return Ok(outcome);
        }

        let previous_room = self
            .registry
            .set_room(connection_id, Some(room_id.clone()))
            .map_err(|_| JoinError::NotAuthenticated)?;
        if let Some(previous) = &previous_room {
            self.depart(&connection, previous).await;
            self.push_or_log(connection_id, &left_event(previous)).await;
        }

        self.history
            .record_presence(&room_id, &connection.identity, true, self.now())
            .await;
        let messages = self.history.load_history(&room_id).await;
        let participants = self.history.load_participants(&room_id).await;
        let outcome = JoinOutcome {
            previous_room,
            message_count: messages.len(),
            participant_count: participants.len(),
            rejoined: false,
        };

        self.push_or_log(connection_id, &history_event(messages)).await;
        self.broadcast(&room_id, &participants_event(participants), None)
            .await;
        self.broadcast(
            &room_id,
            &ServerEvent::UserJoined(UserPresencePayload::from(&connection.identity)),
            Some(connection_id),
        )
        .await;
        self.push_or_log(connection_id, &joined_event(&room_id, &outcome))
            .await;

        tracing::info!(
            "'{}' joined room '{}' ({} messages, {} participants)",
            connection.identity.display_name,
            room_id,
            outcome.message_count,
            outcome.participant_count
        );
        Ok(outcome)
    }

    /// Leave `room_id` explicitly.
    pub async fn leave(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
    ) -> Result<(), LeaveError> {
        let connection = self
            .registry
            .find(connection_id)
            .ok_or(LeaveError::NotAuthenticated)?;
        if !connection.is_in(room_id) {
            return Err(LeaveError::NotInRoom(room_id.to_string()));
        }

        self.registry
            .set_room(connection_id, None)
            .map_err(|_| LeaveError::NotAuthenticated)?;
        self.depart(&connection, room_id).await;
        self.push_or_log(connection_id, &left_event(room_id)).await;

        tracing::info!(
            "'{}' left room '{}'",
            connection.identity.display_name,
            room_id
        );
        Ok(())
    }

    /// Transport-level cleanup; idempotent.
    ///
    /// Only the call that actually removes the registry entry runs the
    /// departure side effects and gets `Some`.
    pub async fn disconnect(&self, connection_id: &ConnectionId) -> Option<Connection> {
        self.message_pusher.unregister_client(connection_id).await;

        let connection = self.registry.remove(connection_id)?;
        if let Some(room_id) = &connection.room {
            self.depart(&connection, room_id).await;
        }

        tracing::info!(
            "Connection '{}' ('{}') disconnected",
            connection_id,
            connection.identity.display_name
        );
        Some(connection)
    }

    /// Side effects of `connection` leaving `room_id`.
    ///
    /// The registry must no longer list the connection in `room_id`. Once the
    /// registry transition has happened these effects must not be lost, so they
    /// run on their own task: cancelling the caller (a socket torn down
    /// mid-event) does not cut them short.
    async fn depart(&self, connection: &Connection, room_id: &RoomId) {
        let departure = tokio::spawn({
            let broker = self.clone();
            let connection = connection.clone();
            let room_id = room_id.clone();
            async move { broker.run_departure(&connection, &room_id).await }
        });
        if let Err(e) = departure.await {
            tracing::error!(
                "Departure of '{}' from room '{}' failed: {}",
                connection.id,
                room_id,
                e
            );
        }
    }

    async fn run_departure(&self, connection: &Connection, room_id: &RoomId) {
        self.clear_typing(room_id, connection).await;

        let other_session_present = self
            .registry
            .list_by_room(room_id)
            .iter()
            .any(|c| c.identity.user_id == connection.identity.user_id);
        if !other_session_present {
            self.history
                .record_presence(room_id, &connection.identity, false, self.now())
                .await;
        }

        self.broadcast(
            room_id,
            &ServerEvent::UserLeft(UserPresencePayload::from(&connection.identity)),
            Some(&connection.id),
        )
        .await;
        let participants = self.history.load_participants(room_id).await;
        self.broadcast(room_id, &participants_event(participants), Some(&connection.id))
            .await;
    }

    /// Mark the connection's identity as typing; tell the room on the transition.
    pub async fn mark_typing(&self, room_id: &RoomId, connection: &Connection) -> bool {
        let newly = self
            .typing
            .mark_typing(room_id, &connection.identity.display_name);
        if newly {
            self.broadcast(
                room_id,
                &ServerEvent::UserTyping(typing_payload(connection)),
                Some(&connection.id),
            )
            .await;
        }
        newly
    }

    /// Clear the connection's typing state; tell the room if it was typing.
    pub async fn clear_typing(&self, room_id: &RoomId, connection: &Connection) -> bool {
        let was_typing = self
            .typing
            .clear_typing(room_id, &connection.identity.display_name);
        if was_typing {
            self.broadcast(
                room_id,
                &ServerEvent::UserStopTyping(typing_payload(connection)),
                Some(&connection.id),
            )
            .await;
        }
        was_typing
    }

    /// Tell the room that a typing state ran out.
    pub async fn handle_typing_expired(&self, expired: TypingExpired) {
        let event = ServerEvent::UserStopTyping(TypingPayload {
            display_name: expired.display_name.to_string(),
        });
        self.fan_out(&expired.room_id, &event, |c| {
            c.identity.display_name != expired.display_name
        })
        .await;
    }

    /// Forward typing expirations to their rooms until shutdown.
    pub async fn forward_typing_expirations(
        &self,
        mut expired_rx: mpsc::UnboundedReceiver<TypingExpired>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                next = expired_rx.recv() => match next {
                    Some(expired) => self.handle_typing_expired(expired).await,
                    None => break,
                },
            }
        }
        tracing::debug!("Typing expiration forwarder stopped");
    }

    /// Log [`stats`](Self::stats) every `interval` until shutdown.
    ///
    /// Returns the number of reports written.
    pub async fn report_stats(&self, interval: Duration, shutdown: CancellationToken) -> usize {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        let mut reports = 0;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let stats = self.stats().await;
                    tracing::info!(
                        "Stats: {} connections, {} identified, {} rooms, {} rooms with typing",
                        stats.connections,
                        stats.identified,
                        stats.rooms,
                        stats.typing_rooms
                    );
                    reports += 1;
                }
            }
        }
        tracing::debug!("Stats reporter stopped");
        reports
    }

    /// Send `event` to every member of `room_id` except `exclude`.
    ///
    /// Returns the number of recipients reached.
    pub async fn broadcast(
        &self,
        room_id: &RoomId,
        event: &ServerEvent,
        exclude: Option<&ConnectionId>,
    ) -> usize {
        self.fan_out(room_id, event, |c| Some(&c.id) != exclude)
            .await
    }

    async fn fan_out(
        &self,
        room_id: &RoomId,
        event: &ServerEvent,
        include: impl Fn(&Connection) -> bool,
    ) -> usize {
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("Failed to serialize event for room '{}': {}", room_id, e);
                return 0;
            }
        };

        let targets: Vec<ConnectionId> = self
            .registry
            .list_by_room(room_id)
            .into_iter()
            .filter(|c| include(c))
            .map(|c| c.id)
            .collect();
        if targets.is_empty() {
            return 0;
        }
        self.message_pusher.broadcast(targets, &frame).await
    }

    /// Send `event` to a single connection.
    pub async fn push_to(
        &self,
        connection_id: &ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), MessagePushError> {
        let frame = event
            .to_frame()
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))?;
        self.message_pusher.push_to(connection_id, &frame).await
    }

    async fn push_or_log(&self, connection_id: &ConnectionId, event: &ServerEvent) {
        if let Err(e) = self.push_to(connection_id, event).await {
            tracing::warn!("Failed to push to connection '{}': {}", connection_id, e);
        }
    }
}

fn history_event(messages: Vec<crate::domain::Message>) -> ServerEvent {
    ServerEvent::History(messages.into_iter().map(MessageDto::from).collect())
}

fn participants_event(participants: Vec<crate::domain::ParticipantRecord>) -> ServerEvent {
    ServerEvent::ParticipantsUpdated(participants.into_iter().map(ParticipantDto::from).collect())
}

fn joined_event(room_id: &RoomId, outcome: &JoinOutcome) -> ServerEvent {
    ServerEvent::JoinedRoom(JoinedRoomPayload {
        room_id: room_id.to_string(),
        message_count: outcome.message_count,
        participant_count: outcome.participant_count,
    })
}

fn left_event(room_id: &RoomId) -> ServerEvent {
    ServerEvent::LeftRoom(RoomPayload {
        room_id: room_id.to_string(),
    })
}

fn typing_payload(connection: &Connection) -> TypingPayload {
    TypingPayload {
        display_name: connection.identity.display_name.to_string(),
    }
}
