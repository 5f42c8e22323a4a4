use crate::interface_adapters::net::ConnectionSettings;
use crate::use_cases::HubHandle;

#[derive(Clone)]
pub struct AppState {
    // Event stream into the hub actor; the only way to reach lobby state.
    pub hub: HubHandle,
    // Limits applied to each accepted WebSocket.
    pub connection: ConnectionSettings,
}
