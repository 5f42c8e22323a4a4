// The hub actor: sole owner of the client registry and every lobby's state.
//
// Connections never touch this state directly. They submit `HubEvent`s through a
// `HubHandle`, and the actor applies them one at a time between broadcast ticks.

use crate::domain::{Entity, SPAWN_POSITION, compute_delta, default_world};
use crate::interface_adapters::protocol::{
    InputAckPayload, PresencePayload, ProtocolError, ServerMessage,
};
use crate::interface_adapters::utils::throttle::LogThrottle;
use crate::use_cases::types::{
    ClientId, HubError, HubEvent, HubSettings, LobbySnapshot, Outbound,
};

use axum::extract::ws::Utf8Bytes;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

struct ClientEntry {
    outbound: Outbound,
    lobby: Option<String>,
    last_input_seq: Option<u32>,
    // Broadcasts skipped because the outbound queue was full.
    dropped: u64,
    drop_log: LogThrottle,
}

struct Lobby {
    members: BTreeSet<ClientId>,
    current: Vec<Entity>,
    // None until the first broadcast; afterwards the snapshot of the last tick.
    previous: Option<Vec<Entity>>,
    seq: u32,
}

impl Lobby {
    fn new() -> Self {
        Self {
            members: BTreeSet::new(),
            current: default_world(),
            previous: None,
            seq: 0,
        }
    }

    fn snapshot(&self) -> LobbySnapshot {
        LobbySnapshot {
            seq: self.seq,
            members: self.members.iter().copied().collect(),
            current: self.current.clone(),
            previous: self.previous.clone(),
        }
    }
}

// Non-blocking enqueue; a full queue drops the message for this client only.
fn deliver(clients: &mut HashMap<ClientId, ClientEntry>, client_id: ClientId, bytes: Utf8Bytes) {
    let Some(entry) = clients.get_mut(&client_id) else {
        return;
    };
    match entry.outbound.try_send(bytes) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            entry.dropped += 1;
            if entry.drop_log.should_log() {
                debug!(
                    client_id,
                    dropped = entry.dropped,
                    "outbound queue full; dropping message"
                );
            }
        }
        Err(TrySendError::Closed(_)) => {
            // Writer already gone; its Unregister is on the way.
            debug!(client_id, "outbound queue closed; dropping message");
        }
    }
}

fn encode_or_log(message: &ServerMessage, seq: u32) -> Option<Utf8Bytes> {
    message
        .encode(seq)
        .inspect_err(|e: &ProtocolError| {
            error!(error = %e, kind = %message.message_type(), "failed to encode message");
        })
        .ok()
}

pub struct Hub {
    clients: HashMap<ClientId, ClientEntry>,
    lobbies: HashMap<String, Lobby>,
    next_client_id: ClientId,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            lobbies: HashMap::new(),
            next_client_id: 1,
        }
    }

    /// Processes events until every `HubHandle` is dropped, ticking on `tick_interval`.
    pub async fn run(mut self, mut events: mpsc::Receiver<HubEvent>, tick_interval: Duration) {
        let mut interval = tokio::time::interval(tick_interval);
        // A stalled hub should not burst a backlog of ticks at its clients.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => {
                        info!("hub event stream closed; hub exiting");
                        break;
                    }
                },
                _ = interval.tick() => self.tick(),
            }
        }
    }

    pub fn handle(&mut self, event: HubEvent) {
        match event {
            HubEvent::Register { outbound, reply } => {
                let client_id = self.register(outbound);
                if reply.send(client_id).is_err() {
                    // The connection gave up before learning its id.
                    self.unregister(client_id);
                }
            }
            HubEvent::Unregister { client_id } => self.unregister(client_id),
            HubEvent::Join { client_id, lobby } => self.join(client_id, lobby),
            HubEvent::Leave { client_id } => self.leave_lobby(client_id),
            HubEvent::Input { client_id, seq } => self.record_input(client_id, seq),
            HubEvent::SyncRequest { client_id } => self.sync(client_id),
            HubEvent::SetEntities { lobby, entities } => self.set_entities(&lobby, entities),
            HubEvent::LobbySnapshot { lobby, reply } => {
                let _ = reply.send(self.lobbies.get(&lobby).map(Lobby::snapshot));
            }
            HubEvent::LastInput { client_id, reply } => {
                let seq = self
                    .clients
                    .get(&client_id)
                    .and_then(|entry| entry.last_input_seq);
                let _ = reply.send(seq);
            }
            HubEvent::LobbyCount { reply } => {
                let _ = reply.send(self.lobbies.len());
            }
        }
    }

    pub fn register(&mut self, outbound: Outbound) -> ClientId {
        let client_id = self.next_client_id;
        self.next_client_id += 1;
        self.clients.insert(
            client_id,
            ClientEntry {
                outbound,
                lobby: None,
                last_input_seq: None,
                dropped: 0,
                drop_log: LogThrottle::default(),
            },
        );
        info!(client_id, "client registered");
        client_id
    }

    /// Removes the client and closes its outbound queue. Unknown ids are ignored.
    pub fn unregister(&mut self, client_id: ClientId) {
        self.leave_lobby(client_id);
        // Dropping the entry drops the hub's sender, which closes the queue.
        if let Some(entry) = self.clients.remove(&client_id) {
            info!(client_id, dropped = entry.dropped, "client unregistered");
        }
    }

    pub fn join(&mut self, client_id: ClientId, lobby_name: String) {
        let Some(entry) = self.clients.get(&client_id) else {
            warn!(client_id, "join from unregistered client ignored");
            return;
        };

        if entry.lobby.as_deref() != Some(lobby_name.as_str()) {
            self.leave_lobby(client_id);

            let lobby = self.lobbies.entry(lobby_name.clone()).or_insert_with(|| {
                info!(lobby = %lobby_name, "lobby created");
                Lobby::new()
            });
            let presence = ServerMessage::PlayerJoined(PresencePayload { client_id });
            if let Some(bytes) = encode_or_log(&presence, lobby.seq) {
                for &member in &lobby.members {
                    deliver(&mut self.clients, member, bytes.clone());
                }
            }
            lobby.members.insert(client_id);

            if let Some(entry) = self.clients.get_mut(&client_id) {
                entry.lobby = Some(lobby_name.clone());
            }
            info!(client_id, lobby = %lobby_name, "client joined lobby");
        }

        let Some(lobby) = self.lobbies.get(&lobby_name) else {
            return;
        };
        let joined = ServerMessage::joined(client_id, &lobby_name, SPAWN_POSITION, &lobby.current);
        if let Some(bytes) = encode_or_log(&joined, lobby.seq) {
            deliver(&mut self.clients, client_id, bytes);
        }
    }

    /// Takes the client out of its lobby, discarding the lobby once it is empty.
    pub fn leave_lobby(&mut self, client_id: ClientId) {
        let Some(lobby_name) = self
            .clients
            .get_mut(&client_id)
            .and_then(|entry| entry.lobby.take())
        else {
            return;
        };
        let Some(lobby) = self.lobbies.get_mut(&lobby_name) else {
            return;
        };

        lobby.members.remove(&client_id);
        info!(client_id, lobby = %lobby_name, "client left lobby");

        if lobby.members.is_empty() {
            self.lobbies.remove(&lobby_name);
            info!(lobby = %lobby_name, "lobby empty; state discarded");
            return;
        }

        let presence = ServerMessage::PlayerLeft(PresencePayload { client_id });
        if let Some(bytes) = encode_or_log(&presence, lobby.seq) {
            for &member in &lobby.members {
                deliver(&mut self.clients, member, bytes.clone());
            }
        }
    }

    fn record_input(&mut self, client_id: ClientId, seq: u32) {
        let Some(entry) = self.clients.get_mut(&client_id) else {
            return;
        };
        entry.last_input_seq = Some(seq);

        let ack = ServerMessage::InputAck(InputAckPayload { seq });
        if let Some(bytes) = encode_or_log(&ack, seq) {
            deliver(&mut self.clients, client_id, bytes);
        }
    }

    // Rebases a client on the last broadcast snapshot so following deltas apply cleanly.
    fn sync(&mut self, client_id: ClientId) {
        let Some(lobby) = self
            .clients
            .get(&client_id)
            .and_then(|entry| entry.lobby.as_ref())
            .and_then(|name| self.lobbies.get(name))
        else {
            debug!(client_id, "sync request outside a lobby ignored");
            return;
        };

        let entities = lobby.previous.as_deref().unwrap_or(&lobby.current);
        let response = ServerMessage::sync_response(lobby.seq, entities);
        if let Some(bytes) = encode_or_log(&response, lobby.seq) {
            deliver(&mut self.clients, client_id, bytes);
        }
    }

    pub fn set_entities(&mut self, lobby_name: &str, entities: Vec<Entity>) {
        match self.lobbies.get_mut(lobby_name) {
            Some(lobby) => lobby.current = entities,
            None => debug!(lobby = %lobby_name, "entity update for missing lobby ignored"),
        }
    }

    /// One broadcast cycle: full STATE on a lobby's first tick, STATE_DELTA afterwards.
    pub fn tick(&mut self) {
        for (name, lobby) in self.lobbies.iter_mut() {
            if lobby.members.is_empty() {
                continue;
            }
            lobby.seq = lobby.seq.wrapping_add(1);

            let message = match &lobby.previous {
                None => Some(ServerMessage::state(&lobby.current)),
                Some(previous) => {
                    let delta = compute_delta(previous, &lobby.current);
                    (!delta.is_empty())
                        .then(|| ServerMessage::state_delta(lobby.seq.wrapping_sub(1), &delta))
                }
            };
            // Updated even when nothing is sent so the next delta stays relative to the latest state.
            lobby.previous = Some(lobby.current.clone());

            let Some(message) = message else {
                continue;
            };
            let Some(bytes) = encode_or_log(&message, lobby.seq) else {
                continue;
            };
            debug!(
                lobby = %name,
                seq = lobby.seq,
                kind = %message.message_type(),
                members = lobby.members.len(),
                bytes = bytes.len(),
                "broadcast"
            );
            for &member in &lobby.members {
                deliver(&mut self.clients, member, bytes.clone());
            }
        }
    }
}

/// Cloneable front door to the hub actor.
#[derive(Debug, Clone)]
pub struct HubHandle {
    events: mpsc::Sender<HubEvent>,
}

impl HubHandle {
    pub fn new(events: mpsc::Sender<HubEvent>) -> Self {
        Self { events }
    }

    async fn send(&self, event: HubEvent) -> Result<(), HubError> {
        self.events.send(event).await.map_err(|_| HubError::Closed)
    }

    async fn query<T>(
        &self,
        event: impl FnOnce(oneshot::Sender<T>) -> HubEvent,
    ) -> Result<T, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(event(reply)).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    pub async fn register(&self, outbound: Outbound) -> Result<ClientId, HubError> {
        self.query(|reply| HubEvent::Register { outbound, reply }).await
    }

    pub async fn unregister(&self, client_id: ClientId) -> Result<(), HubError> {
        self.send(HubEvent::Unregister { client_id }).await
    }

    pub async fn join(&self, client_id: ClientId, lobby: String) -> Result<(), HubError> {
        self.send(HubEvent::Join { client_id, lobby }).await
    }

    pub async fn leave(&self, client_id: ClientId) -> Result<(), HubError> {
        self.send(HubEvent::Leave { client_id }).await
    }

    /// Input markers are droppable; a full event stream returns `Busy` instead of waiting.
    pub fn try_input(&self, client_id: ClientId, seq: u32) -> Result<(), HubError> {
        self.events
            .try_send(HubEvent::Input { client_id, seq })
            .map_err(|e| match e {
                TrySendError::Full(_) => HubError::Busy,
                TrySendError::Closed(_) => HubError::Closed,
            })
    }

    pub async fn sync_request(&self, client_id: ClientId) -> Result<(), HubError> {
        self.send(HubEvent::SyncRequest { client_id }).await
    }

    pub async fn set_entities(&self, lobby: String, entities: Vec<Entity>) -> Result<(), HubError> {
        self.send(HubEvent::SetEntities { lobby, entities }).await
    }

    pub async fn lobby_snapshot(&self, lobby: String) -> Result<Option<LobbySnapshot>, HubError> {
        self.query(|reply| HubEvent::LobbySnapshot { lobby, reply }).await
    }

    pub async fn last_input(&self, client_id: ClientId) -> Result<Option<u32>, HubError> {
        self.query(|reply| HubEvent::LastInput { client_id, reply }).await
    }

    pub async fn lobby_count(&self) -> Result<usize, HubError> {
        self.query(|reply| HubEvent::LobbyCount { reply }).await
    }
}

/// Spawns the hub actor on the current runtime.
pub fn spawn_hub(settings: &HubSettings) -> HubHandle {
    let (events_tx, events_rx) = mpsc::channel::<HubEvent>(settings.event_channel_capacity);
    tokio::spawn(Hub::new().run(events_rx, settings.tick_interval));
    HubHandle::new(events_tx)
}
