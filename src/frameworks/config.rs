use crate::interface_adapters::net::ConnectionSettings;
use crate::use_cases::HubSettings;
use std::{env, net::IpAddr, time::Duration};

// Runtime/server constants.

pub fn http_port() -> u16 {
    env::var("SPACEHUB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080)
}

pub fn bind_addr() -> IpAddr {
    env::var("SPACEHUB_BIND_ADDR")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

// ~15 Hz broadcast by default.
pub fn tick_interval() -> Duration {
    let millis = env::var("SPACEHUB_TICK_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|&ms| ms > 0)
        .unwrap_or(66);
    Duration::from_millis(millis)
}

pub const HUB_EVENT_CHANNEL_CAPACITY: usize = 1024;
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;
pub const MAX_MESSAGE_SIZE: usize = 512;
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(60);
// Must stay below IDLE_TIMEOUT so pongs keep the peer's read window open.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(54);
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

pub fn hub_settings() -> HubSettings {
    HubSettings {
        tick_interval: tick_interval(),
        event_channel_capacity: HUB_EVENT_CHANNEL_CAPACITY,
    }
}

pub fn connection_settings() -> ConnectionSettings {
    ConnectionSettings {
        outbound_capacity: OUTBOUND_QUEUE_CAPACITY,
        max_message_size: MAX_MESSAGE_SIZE,
        idle_timeout: IDLE_TIMEOUT,
        keepalive_interval: KEEPALIVE_INTERVAL,
        write_timeout: WRITE_TIMEOUT,
    }
}
