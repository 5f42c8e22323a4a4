// Wire protocol: the JSON envelope wrapped around every message and the payload DTOs.
//
// Every message in both directions looks like
// `{"type": "STATE", "timestamp": 1700000000000, "seq": 42, "data": {...}}`.
// The payload is decoded only after the type tag is known.

use crate::domain::{Entity, EntityDelta, EntityId, PartialEntity, Vec3};
use crate::interface_adapters::utils::clock::now_millis;
use axum::extract::ws::Utf8Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Every type tag the protocol recognises. `as_str` is the single wire-name table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    // Client -> server.
    Join,
    Leave,
    Input,
    Ping,
    SyncRequest,
    // Server -> client.
    Joined,
    PlayerJoined,
    PlayerLeft,
    State,
    StateDelta,
    EntitySpawn,
    EntityDestroy,
    WorldEvent,
    Error,
    Pong,
    InputAck,
    SyncResponse,
}

impl MessageType {
    pub const ALL: [MessageType; 17] = [
        MessageType::Join,
        MessageType::Leave,
        MessageType::Input,
        MessageType::Ping,
        MessageType::SyncRequest,
        MessageType::Joined,
        MessageType::PlayerJoined,
        MessageType::PlayerLeft,
        MessageType::State,
        MessageType::StateDelta,
        MessageType::EntitySpawn,
        MessageType::EntityDestroy,
        MessageType::WorldEvent,
        MessageType::Error,
        MessageType::Pong,
        MessageType::InputAck,
        MessageType::SyncResponse,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Join => "JOIN",
            MessageType::Leave => "LEAVE",
            MessageType::Input => "INPUT",
            MessageType::Ping => "PING",
            MessageType::SyncRequest => "SYNC_REQUEST",
            MessageType::Joined => "JOINED",
            MessageType::PlayerJoined => "PLAYER_JOINED",
            MessageType::PlayerLeft => "PLAYER_LEFT",
            MessageType::State => "STATE",
            MessageType::StateDelta => "STATE_DELTA",
            MessageType::EntitySpawn => "ENTITY_SPAWN",
            MessageType::EntityDestroy => "ENTITY_DESTROY",
            MessageType::WorldEvent => "WORLD_EVENT",
            MessageType::Error => "ERROR",
            MessageType::Pong => "PONG",
            MessageType::InputAck => "INPUT_ACK",
            MessageType::SyncResponse => "SYNC_RESPONSE",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum ProtocolError {
    // Envelope or payload is not valid JSON for its declared type.
    Json(serde_json::Error),
    // Type tag outside the recognised set.
    UnknownType(String),
    // Recognised tag that only flows server -> client.
    UnexpectedType(MessageType),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Json(e) => write!(f, "invalid json: {e}"),
            ProtocolError::UnknownType(tag) => write!(f, "unknown message type {tag:?}"),
            ProtocolError::UnexpectedType(kind) => write!(f, "unexpected message type {kind}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::Json(e)
    }
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    #[serde(rename = "type")]
    kind: &'static str,
    timestamp: i64,
    seq: u32,
    data: &'a T,
}

/// Wraps `payload` in an envelope stamped with the current time.
pub fn encode<T: Serialize>(
    kind: MessageType,
    seq: u32,
    payload: &T,
) -> Result<Utf8Bytes, ProtocolError> {
    let txt = serde_json::to_string(&Envelope {
        kind: kind.as_str(),
        timestamp: now_millis(),
        seq,
        data: payload,
    })?;
    Ok(Utf8Bytes::from(txt))
}

// Envelope with the payload left undecoded until the tag is known.
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    seq: u32,
    #[serde(default)]
    data: serde_json::Value,
}

/// A decoded client message together with its envelope metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub seq: u32,
    pub timestamp: i64,
    pub message: ClientMessage,
}

/// Messages the client sends to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Join(JoinPayload),
    Leave,
    Input(InputPayload),
    Ping(PingPayload),
    SyncRequest,
}

// Clients may send `null` for any optional field; it reads as the field's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// A missing or null `data` decodes to the payload's defaults.
fn payload<T: DeserializeOwned + Default>(data: serde_json::Value) -> Result<T, ProtocolError> {
    if data.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(data)?)
}

/// Reads the type tag first, then decodes `data` with the matching payload type.
pub fn decode(text: &str) -> Result<Inbound, ProtocolError> {
    let raw: RawEnvelope = serde_json::from_str(text)?;
    let kind =
        MessageType::from_tag(&raw.kind).ok_or_else(|| ProtocolError::UnknownType(raw.kind))?;

    let message = match kind {
        MessageType::Join => ClientMessage::Join(payload(raw.data)?),
        MessageType::Leave => ClientMessage::Leave,
        MessageType::Input => ClientMessage::Input(payload(raw.data)?),
        MessageType::Ping => ClientMessage::Ping(payload(raw.data)?),
        MessageType::SyncRequest => ClientMessage::SyncRequest,
        other => return Err(ProtocolError::UnexpectedType(other)),
    };

    Ok(Inbound {
        seq: raw.seq,
        timestamp: raw.timestamp,
        message,
    })
}

/// JOIN payload. Unknown fields (player name, client version) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JoinPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub lobby: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct MovementDto {
    #[serde(default, deserialize_with = "null_as_default")]
    pub x: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub y: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct RotationDto {
    #[serde(default, deserialize_with = "null_as_default")]
    pub pitch: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub yaw: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActionsDto {
    #[serde(default, deserialize_with = "null_as_default")]
    pub shoot: bool,
    #[serde(default)]
    pub ability: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub interact: bool,
}

/// Per-frame input sample. Only parsed here; applying it is gameplay's job.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InputPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub movement: MovementDto,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rotation: RotationDto,
    #[serde(default, deserialize_with = "null_as_default")]
    pub actions: ActionsDto,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PingPayload {
    #[serde(default)]
    pub id: Option<String>,
}

/// Flattened entity as it appears in STATE, JOINED and `added` lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDto {
    pub id: EntityId,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<i32>,
}

impl From<&Entity> for EntityDto {
    fn from(e: &Entity) -> Self {
        let [x, y, z] = e.position;
        let [vx, vy, vz] = e.velocity;
        Self {
            id: e.id,
            kind: e.kind.clone(),
            x,
            y,
            z,
            vx,
            vy,
            vz,
            hp: e.health,
        }
    }
}

impl From<EntityDto> for Entity {
    fn from(dto: EntityDto) -> Self {
        Self {
            id: dto.id,
            kind: dto.kind,
            position: [dto.x, dto.y, dto.z],
            velocity: [dto.vx, dto.vy, dto.vz],
            health: dto.hp,
        }
    }
}

fn entity_dtos(entities: &[Entity]) -> Vec<EntityDto> {
    entities.iter().map(EntityDto::from).collect()
}

/// Changed fields of one entity; absent fields are omitted.
///
/// `health: null` means the entity stopped being damageable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialEntityDto {
    pub id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<Option<i32>>,
}

impl From<&PartialEntity> for PartialEntityDto {
    fn from(p: &PartialEntity) -> Self {
        Self {
            id: p.id,
            position: p.position,
            velocity: p.velocity,
            health: p.health,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorldStateDto {
    pub entities: Vec<EntityDto>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedPayload {
    pub client_id: u64,
    pub lobby: String,
    pub spawn_position: Vec3,
    pub world_state: WorldStateDto,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    pub client_id: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatePayload {
    pub entities: Vec<EntityDto>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDeltaPayload {
    pub base_seq: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<PartialEntityDto>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<EntityId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<EntityDto>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PongPayload {
    pub id: String,
    pub server_time: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputAckPayload {
    pub seq: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncResponsePayload {
    pub seq: u32,
    pub entities: Vec<EntityDto>,
}

/// Messages the server sends to connected clients.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Joined(JoinedPayload),
    PlayerJoined(PresencePayload),
    PlayerLeft(PresencePayload),
    State(StatePayload),
    StateDelta(StateDeltaPayload),
    Pong(PongPayload),
    InputAck(InputAckPayload),
    SyncResponse(SyncResponsePayload),
}

impl ServerMessage {
    pub fn joined(client_id: u64, lobby: &str, spawn_position: Vec3, entities: &[Entity]) -> Self {
        ServerMessage::Joined(JoinedPayload {
            client_id,
            lobby: lobby.to_string(),
            spawn_position,
            world_state: WorldStateDto {
                entities: entity_dtos(entities),
            },
        })
    }

    pub fn state(entities: &[Entity]) -> Self {
        ServerMessage::State(StatePayload {
            entities: entity_dtos(entities),
        })
    }

    pub fn state_delta(base_seq: u32, delta: &EntityDelta) -> Self {
        ServerMessage::StateDelta(StateDeltaPayload {
            base_seq,
            changes: delta.changed.iter().map(PartialEntityDto::from).collect(),
            removed: delta.removed.clone(),
            added: entity_dtos(&delta.added),
        })
    }

    pub fn pong(id: String) -> Self {
        ServerMessage::Pong(PongPayload {
            id,
            server_time: now_millis(),
        })
    }

    pub fn sync_response(seq: u32, entities: &[Entity]) -> Self {
        ServerMessage::SyncResponse(SyncResponsePayload {
            seq,
            entities: entity_dtos(entities),
        })
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            ServerMessage::Joined(_) => MessageType::Joined,
            ServerMessage::PlayerJoined(_) => MessageType::PlayerJoined,
            ServerMessage::PlayerLeft(_) => MessageType::PlayerLeft,
            ServerMessage::State(_) => MessageType::State,
            ServerMessage::StateDelta(_) => MessageType::StateDelta,
            ServerMessage::Pong(_) => MessageType::Pong,
            ServerMessage::InputAck(_) => MessageType::InputAck,
            ServerMessage::SyncResponse(_) => MessageType::SyncResponse,
        }
    }

    /// Serializes the message once so it can be shared across every recipient.
    pub fn encode(&self, seq: u32) -> Result<Utf8Bytes, ProtocolError> {
        encode(self.message_type(), seq, self)
    }
}
