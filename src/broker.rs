//! Session broker: room lifecycle, sender binding and cast relay.
//!
//! The broker is the only mutator of room state. Every operation holds the
//! room map's write (or read) guard for its whole body and emits its events
//! inside that critical section, so subscribers observe events for a room in
//! exactly the order the operations were accepted.

use chrono::Utc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::error::{CastErr, CastResult};
use crate::state::{
    normalize_code, CastCommand, Room, RoomEvent, RoomMap, RoomSnapshot, SenderSession,
    CODE_ALPHABET, CODE_LEN,
};

const CODE_ATTEMPTS: usize = 16;

#[derive(Clone)]
pub struct SessionBroker {
    rooms: RoomMap,
    max_rooms: usize,
}

impl SessionBroker {
    pub fn new(max_rooms: usize) -> Self {
        Self {
            rooms: RoomMap::default(),
            max_rooms,
        }
    }

    /// Opens a room for a receiver and returns its code.
    pub async fn create_room(&self) -> CastResult<String> {
        let mut rooms = self.rooms.write().await;
        if rooms.len() >= self.max_rooms {
            return Err(CastErr::Capacity);
        }
        for _ in 0..CODE_ATTEMPTS {
            let code = nanoid::nanoid!(CODE_LEN, &CODE_ALPHABET);
            if rooms.contains_key(&code) {
                continue;
            }
            rooms.insert(code.clone(), Room::new(code.clone()));
            tracing::info!(%code, active = rooms.len(), "room created");
            return Ok(code);
        }
        // The code space is effectively exhausted.
        Err(CastErr::Capacity)
    }

    /// Binds a sender to a room. Re-joining with the same id succeeds and
    /// only refreshes the session timestamps; a different sender is rejected
    /// while the room is occupied.
    pub async fn join_room(&self, code: &str, sender_id: &str) -> CastResult<SenderSession> {
        let code = normalize_code(code);
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(&code)
            .ok_or_else(|| CastErr::RoomNotFound(code.clone()))?;

        let now = Utc::now();
        match room.sender.as_mut() {
            Some(s) if s.sender_id == sender_id => {
                s.connected_at = now;
                s.last_seen = now;
                return Ok(s.clone());
            }
            Some(_) => return Err(CastErr::RoomOccupied(code)),
            None => {}
        }

        let session = SenderSession {
            sender_id: sender_id.to_owned(),
            connected_at: now,
            last_seen: now,
        };
        room.sender = Some(session.clone());
        let _ = room.tx.send(RoomEvent::SenderConnected {
            sender_id: sender_id.to_owned(),
        });
        tracing::info!(%code, sender_id, "sender joined");
        Ok(session)
    }

    /// Unbinds the given sender and drops any pending cast command. No-op
    /// when that sender is not the one bound.
    pub async fn leave_room(&self, code: &str, sender_id: &str) -> CastResult<()> {
        let code = normalize_code(code);
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(&code)
            .ok_or_else(|| CastErr::RoomNotFound(code.clone()))?;

        match &room.sender {
            Some(s) if s.sender_id == sender_id => {}
            _ => return Ok(()),
        }
        room.sender = None;
        room.cast = None;
        let _ = room.tx.send(RoomEvent::SenderDisconnected);
        tracing::info!(%code, sender_id, "sender left");
        Ok(())
    }

    /// Replaces the room's current cast command and notifies subscribers.
    /// Only the bound sender may cast.
    pub async fn cast(
        &self,
        code: &str,
        sender_id: &str,
        media_uri: String,
        title: String,
    ) -> CastResult<()> {
        let code = normalize_code(code);
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(&code)
            .ok_or_else(|| CastErr::NotConnected(code.clone()))?;

        let now = Utc::now();
        match room.sender.as_mut() {
            Some(s) if s.sender_id == sender_id => s.last_seen = now,
            _ => return Err(CastErr::NotConnected(code)),
        }

        let cmd = CastCommand {
            media_uri,
            title,
            issued_at: now,
        };
        let _ = room.tx.send(RoomEvent::CastUpdated {
            media_uri: cmd.media_uri.clone(),
            title: cmd.title.clone(),
            issued_at: cmd.issued_at,
        });
        tracing::debug!(%code, media_uri = %cmd.media_uri, "cast updated");
        room.cast = Some(cmd);
        Ok(())
    }

    /// Clears the current cast command. Emits `cast-cleared` only when a
    /// command was actually present.
    pub async fn stop_cast(&self, code: &str) -> CastResult<()> {
        let code = normalize_code(code);
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(&code)
            .ok_or_else(|| CastErr::RoomNotFound(code.clone()))?;

        if room.cast.take().is_some() {
            let _ = room.tx.send(RoomEvent::CastCleared);
            tracing::debug!(%code, "cast cleared");
        }
        Ok(())
    }

    /// Receiver shutdown. Removes the room, notifying subscribers first so
    /// they see `receiver-disconnected` before the channel closes. Safe to
    /// call on a room that is already gone.
    pub async fn teardown_room(&self, code: &str) -> CastResult<()> {
        let code = normalize_code(code);
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.remove(&code) {
            let _ = room.tx.send(RoomEvent::ReceiverDisconnected);
            tracing::info!(%code, "room torn down");
        }
        Ok(())
    }

    /// Registers for the room's events. Dropping the receiver is the
    /// deregistration.
    pub async fn subscribe(&self, code: &str) -> CastResult<broadcast::Receiver<RoomEvent>> {
        let code = normalize_code(code);
        let rooms = self.rooms.read().await;
        rooms
            .get(&code)
            .map(|room| room.tx.subscribe())
            .ok_or(CastErr::RoomNotFound(code))
    }

    /// Current sender presence and cast command for a room.
    pub async fn snapshot(&self, code: &str) -> CastResult<RoomSnapshot> {
        let code = normalize_code(code);
        let rooms = self.rooms.read().await;
        let room = rooms
            .get(&code)
            .ok_or_else(|| CastErr::RoomNotFound(code.clone()))?;
        Ok(RoomSnapshot {
            room_code: room.code.clone(),
            created_at: room.created_at,
            sender: room.sender.clone(),
            cast: room.cast.clone(),
        })
    }

    /// Tears down rooms whose last activity is older than `ttl` and returns
    /// their codes. Subscribers get the usual `receiver-disconnected`.
    pub async fn sweep_idle(&self, ttl: Duration) -> Vec<String> {
        let now = Utc::now();
        let mut rooms = self.rooms.write().await;
        let expired: Vec<String> = rooms
            .values()
            .filter(|room| room.last_activity() + ttl <= now)
            .map(|room| room.code.clone())
            .collect();
        for code in &expired {
            if let Some(room) = rooms.remove(code) {
                let _ = room.tx.send(RoomEvent::ReceiverDisconnected);
                tracing::info!(%code, "idle room torn down");
            }
        }
        expired
    }
}
