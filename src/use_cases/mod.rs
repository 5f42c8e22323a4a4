// Use cases layer: the hub actor that owns lobbies and drives state sync.

pub mod hub;
pub mod types;

pub use hub::{Hub, HubHandle, spawn_hub};
pub use types::{ClientId, HubError, HubEvent, HubSettings, LobbySnapshot, Outbound};
