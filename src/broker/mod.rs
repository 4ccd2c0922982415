//! Realtime Broker: session sinks, room membership, and ordered room-scoped fanout.
//!
//! Scoped to the broker's own job: membership bookkeeping plus ordered delivery. The
//! per-session send half is an `mpsc::UnboundedSender<WireEnvelope>`; the owning WebSocket task
//! on the other end forwards each envelope onto the socket (see `server::ws`).

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use dashmap::DashMap;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::ids::{GameId, LobbyId, SessionId};
use crate::protocol::wire::{Ordering, OutboundEvent, WireEnvelope};

const DOMAIN_TRANSITION_SOURCE: &str = "domain-transition";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    pub fn lobby(lobby_id: &LobbyId) -> Self {
        Self(format!("lobby:{lobby_id}"))
    }

    pub fn game(game_id: &GameId) -> Self {
        Self(format!("game:{game_id}"))
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("publish source is not authorized to broadcast")]
    UnauthorizedSource,
}

pub struct PublishOutcome {
    pub delivered_session_ids: Vec<SessionId>,
    pub delivered_event_count: usize,
}

struct Inner {
    members_by_room: RwLock<std::collections::HashMap<RoomId, HashSet<SessionId>>>,
    rooms_by_session: RwLock<std::collections::HashMap<SessionId, HashSet<RoomId>>>,
}

pub struct RealtimeBroker {
    sink_by_session: DashMap<SessionId, mpsc::UnboundedSender<WireEnvelope>>,
    inner: Inner,
    sequence: AtomicU64,
}

impl Default for RealtimeBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeBroker {
    pub fn new() -> Self {
        Self {
            sink_by_session: DashMap::new(),
            inner: Inner {
                members_by_room: RwLock::new(std::collections::HashMap::new()),
                rooms_by_session: RwLock::new(std::collections::HashMap::new()),
            },
            sequence: AtomicU64::new(0),
        }
    }

    /// Replaces any existing sink for the session and clears its prior room memberships — a
    /// reconnecting client starts from a clean membership slate, rejoining via `subscribe`.
    pub fn connect_session(
        &self,
        session_id: SessionId,
        sink: mpsc::UnboundedSender<WireEnvelope>,
    ) {
        self.leave_all_rooms(&session_id);
        self.sink_by_session.insert(session_id, sink);
    }

    pub fn disconnect_session(&self, session_id: &SessionId) {
        self.sink_by_session.remove(session_id);
        self.leave_all_rooms(session_id);
    }

    pub fn join_room(&self, session_id: &SessionId, room_id: RoomId) {
        if !self.sink_by_session.contains_key(session_id) {
            return;
        }
        self.inner
            .members_by_room
            .write()
            .entry(room_id.clone())
            .or_default()
            .insert(session_id.clone());
        self.inner
            .rooms_by_session
            .write()
            .entry(session_id.clone())
            .or_default()
            .insert(room_id);
    }

    pub fn leave_room(&self, session_id: &SessionId, room_id: &RoomId) {
        if let Some(members) = self.inner.members_by_room.write().get_mut(room_id) {
            members.remove(session_id);
        }
        if let Some(rooms) = self.inner.rooms_by_session.write().get_mut(session_id) {
            rooms.remove(room_id);
        }
    }

    fn leave_all_rooms(&self, session_id: &SessionId) {
        let rooms = self
            .inner
            .rooms_by_session
            .write()
            .remove(session_id)
            .unwrap_or_default();
        let mut members_by_room = self.inner.members_by_room.write();
        for room in rooms {
            if let Some(members) = members_by_room.get_mut(&room) {
                members.remove(session_id);
            }
        }
    }

    /// Broadcasts `events` to every member of `room_id`, in order, assigning each event a
    /// strictly-increasing sequence number shared by every recipient of that event (ordering is
    /// per-publish, not per-recipient) and delivering a fresh deep copy per sink so a
    /// misbehaving receiver can never corrupt another recipient's payload.
    pub fn publish(
        &self,
        source: &str,
        room_id: &RoomId,
        events: Vec<OutboundEvent>,
        now_ms: u64,
    ) -> Result<PublishOutcome, BrokerError> {
        if source != DOMAIN_TRANSITION_SOURCE {
            return Err(BrokerError::UnauthorizedSource);
        }

        let members: Vec<SessionId> = self
            .inner
            .members_by_room
            .read()
            .get(room_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();

        let mut delivered_event_count = 0usize;
        for event in events {
            let sequence = self.sequence.fetch_add(1, AtomicOrdering::SeqCst) + 1;
            let ordering = Ordering {
                sequence,
                emitted_at_ms: now_ms,
            };
            for session_id in &members {
                if let Some(sink) = self.sink_by_session.get(session_id) {
                    let envelope = WireEnvelope::new(event.clone(), Some(ordering));
                    if sink.send(envelope).is_ok() {
                        delivered_event_count += 1;
                    }
                }
            }
        }

        Ok(PublishOutcome {
            delivered_session_ids: members,
            delivered_event_count,
        })
    }

    /// Delivers a single event to exactly one session's sink, bypassing room membership entirely.
    /// Used for seat-private projections (a player's own hand) that must never reach the shared
    /// room fanout `publish` performs. Returns `Ok(false)` if the session has no connected sink.
    pub fn publish_to_session(
        &self,
        source: &str,
        session_id: &SessionId,
        event: OutboundEvent,
        now_ms: u64,
    ) -> Result<bool, BrokerError> {
        if source != DOMAIN_TRANSITION_SOURCE {
            return Err(BrokerError::UnauthorizedSource);
        }

        let Some(sink) = self.sink_by_session.get(session_id) else {
            return Ok(false);
        };
        let sequence = self.sequence.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        let ordering = Ordering {
            sequence,
            emitted_at_ms: now_ms,
        };
        let envelope = WireEnvelope::new(event, Some(ordering));
        Ok(sink.send(envelope).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::LobbyId;

    fn connected(broker: &RealtimeBroker, id: &str) -> (SessionId, mpsc::UnboundedReceiver<WireEnvelope>) {
        let session_id = SessionId::new(id).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        broker.connect_session(session_id.clone(), tx);
        (session_id, rx)
    }

    #[test]
    fn publish_rejects_unauthorized_source() {
        let broker = RealtimeBroker::new();
        let lobby_id = LobbyId::generate();
        let room = RoomId::lobby(&lobby_id);
        let err = broker
            .publish("client", &room, vec![], 0)
            .unwrap_err();
        assert_eq!(err, BrokerError::UnauthorizedSource);
    }

    #[test]
    fn delivers_n_events_to_m_members_in_order() {
        let broker = RealtimeBroker::new();
        let lobby_id = LobbyId::generate();
        let room = RoomId::lobby(&lobby_id);

        let (a, mut rx_a) = connected(&broker, "a");
        let (b, mut rx_b) = connected(&broker, "b");
        let (_c, mut rx_c) = connected(&broker, "c");
        broker.join_room(&a, room.clone());
        broker.join_room(&b, room.clone());
        // c stays in a different room entirely.
        let other_room = RoomId::lobby(&LobbyId::generate());
        broker.join_room(&_c, other_room);

        let events = vec![
            OutboundEvent::SystemNotice {
                message: "one".into(),
            },
            OutboundEvent::SystemNotice {
                message: "two".into(),
            },
            OutboundEvent::SystemNotice {
                message: "three".into(),
            },
        ];
        let outcome = broker.publish("domain-transition", &room, events, 1_000).unwrap();

        assert_eq!(outcome.delivered_event_count, 6);
        assert_eq!(outcome.delivered_session_ids.len(), 2);

        let mut sequences_a = Vec::new();
        while let Ok(envelope) = rx_a.try_recv() {
            sequences_a.push(envelope.ordering.unwrap().sequence);
        }
        assert_eq!(sequences_a, vec![1, 2, 3]);

        let mut sequences_b = Vec::new();
        while let Ok(envelope) = rx_b.try_recv() {
            sequences_b.push(envelope.ordering.unwrap().sequence);
        }
        assert_eq!(sequences_b, vec![1, 2, 3]);

        assert!(rx_c.try_recv().is_err());
    }

    #[test]
    fn disconnect_clears_membership_so_future_publishes_skip_it() {
        let broker = RealtimeBroker::new();
        let lobby_id = LobbyId::generate();
        let room = RoomId::lobby(&lobby_id);
        let (a, _rx) = connected(&broker, "a");
        broker.join_room(&a, room.clone());
        broker.disconnect_session(&a);

        let outcome = broker
            .publish(
                "domain-transition",
                &room,
                vec![OutboundEvent::SystemNotice {
                    message: "hi".into(),
                }],
                0,
            )
            .unwrap();
        assert!(outcome.delivered_session_ids.is_empty());
    }

    #[test]
    fn publish_to_session_reaches_only_the_named_session() {
        let broker = RealtimeBroker::new();
        let lobby_id = LobbyId::generate();
        let room = RoomId::lobby(&lobby_id);

        let (a, mut rx_a) = connected(&broker, "a");
        let (b, mut rx_b) = connected(&broker, "b");
        broker.join_room(&a, room.clone());
        broker.join_room(&b, room);

        let delivered = broker
            .publish_to_session(
                "domain-transition",
                &a,
                OutboundEvent::SystemNotice {
                    message: "private to a".into(),
                },
                1_000,
            )
            .unwrap();
        assert!(delivered);

        let envelope = rx_a.try_recv().expect("a should receive its private event");
        assert_eq!(envelope.ordering.unwrap().sequence, 1);
        assert!(
            rx_b.try_recv().is_err(),
            "b shares a's room but must not receive a's private event"
        );
    }

    #[test]
    fn publish_to_session_rejects_unauthorized_source() {
        let broker = RealtimeBroker::new();
        let (a, _rx) = connected(&broker, "a");
        let err = broker
            .publish_to_session(
                "client",
                &a,
                OutboundEvent::SystemNotice { message: "x".into() },
                0,
            )
            .unwrap_err();
        assert_eq!(err, BrokerError::UnauthorizedSource);
    }
}
