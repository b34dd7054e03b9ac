use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

pub type Tx = broadcast::Sender<RoomEvent>;

/// Per-room event buffer. Subscribers that fall further behind than this
/// skip the missed events (broadcast `Lagged`).
pub const EVENT_CAPACITY: usize = 64;

/* ------------ room codes ------------ */

// Uppercase alphanumerics minus the glyphs people misread over a TV screen
// (0/O, 1/I/L).
pub const CODE_ALPHABET: [char; 31] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'M', 'N', 'P', 'Q', 'R',
    'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '2', '3', '4', '5', '6', '7', '8',
    '9',
];
pub const CODE_LEN: usize = 4;

/// Room codes are matched case-insensitively; the uppercase form is canonical.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/* ------------ data model ------------ */

#[derive(Debug, Clone, Serialize)]
pub struct SenderSession {
    pub sender_id: String,
    pub connected_at: DateTime<Utc>,
    #[serde(skip)]
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CastCommand {
    pub media_uri: String,
    pub title: String,
    pub issued_at: DateTime<Utc>,
}

/// A casting room. Presence in the broker's map is what makes a room
/// "active"; teardown removes the entry and closes the event channel.
#[derive(Debug)]
pub struct Room {
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub sender: Option<SenderSession>,
    pub cast: Option<CastCommand>,
    pub tx: Tx,
}

impl Room {
    pub fn new(code: String) -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            code,
            created_at: Utc::now(),
            sender: None,
            cast: None,
            tx,
        }
    }

    /// Most recent sign of life: creation, sender join or last cast.
    /// Drives the idle sweep.
    pub fn last_activity(&self) -> DateTime<Utc> {
        let mut at = self.created_at;
        if let Some(s) = &self.sender {
            at = at.max(s.last_seen);
        }
        if let Some(c) = &self.cast {
            at = at.max(c.issued_at);
        }
        at
    }
}

pub type RoomMap = Arc<RwLock<HashMap<String, Room>>>;

/* ------------ events / queries ------------ */

/// Pushed to room subscribers, serialized as one JSON frame per event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RoomEvent {
    SenderConnected {
        sender_id: String,
    },
    SenderDisconnected,
    CastUpdated {
        media_uri: String,
        title: String,
        issued_at: DateTime<Utc>,
    },
    CastCleared,
    ReceiverDisconnected,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    pub room_code: String,
    pub created_at: DateTime<Utc>,
    pub sender: Option<SenderSession>,
    pub cast: Option<CastCommand>,
}
