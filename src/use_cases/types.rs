// Use-case level inputs/outputs for the hub actor.

use crate::domain::Entity;
use axum::extract::ws::Utf8Bytes;
use std::fmt;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Process-unique connection identity assigned by the hub on registration.
pub type ClientId = u64;

/// Bounded outbound queue feeding one connection's writer.
pub type Outbound = mpsc::Sender<Utf8Bytes>;

/// Shared configuration for the hub actor.
#[derive(Debug, Clone)]
pub struct HubSettings {
    /// Period of the broadcast tick.
    pub tick_interval: Duration,
    /// Capacity of the hub's event stream.
    pub event_channel_capacity: usize,
}

/// Everything that can change hub state, processed strictly one at a time.
#[derive(Debug)]
pub enum HubEvent {
    Register {
        outbound: Outbound,
        reply: oneshot::Sender<ClientId>,
    },
    Unregister {
        client_id: ClientId,
    },
    Join {
        client_id: ClientId,
        lobby: String,
    },
    Leave {
        client_id: ClientId,
    },
    Input {
        client_id: ClientId,
        seq: u32,
    },
    SyncRequest {
        client_id: ClientId,
    },
    // Gameplay writes the authoritative entity collection of a lobby.
    SetEntities {
        lobby: String,
        entities: Vec<Entity>,
    },
    LobbySnapshot {
        lobby: String,
        reply: oneshot::Sender<Option<LobbySnapshot>>,
    },
    LastInput {
        client_id: ClientId,
        reply: oneshot::Sender<Option<u32>>,
    },
    LobbyCount {
        reply: oneshot::Sender<usize>,
    },
}

/// Read-only copy of one lobby's state.
#[derive(Debug, Clone, PartialEq)]
pub struct LobbySnapshot {
    pub seq: u32,
    pub members: Vec<ClientId>,
    pub current: Vec<Entity>,
    pub previous: Option<Vec<Entity>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubError {
    // The hub actor has stopped; nothing will be processed.
    Closed,
    // Event stream is full; only returned for droppable events.
    Busy,
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubError::Closed => f.write_str("hub is not running"),
            HubError::Busy => f.write_str("hub event stream is full"),
        }
    }
}

impl std::error::Error for HubError {}
