// Per-connection actor: one WebSocket, two duties (inbound and outbound) that stop together.

use crate::interface_adapters::protocol::{self, ClientMessage, Inbound, ServerMessage};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::throttle::LogThrottle;
use crate::use_cases::{ClientId, HubError, HubHandle};

use axum::{
    body::Bytes,
    extract::{
        State,
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use futures_util::stream::{SplitSink, SplitStream};
use std::{fmt, sync::Arc, time::Duration};
use tokio::sync::mpsc::{self, WeakSender, error::TrySendError};
use tokio::time::{Instant, interval_at, timeout};
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Limits and timers applied to every connection.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Capacity of the outbound queue the hub fills.
    pub outbound_capacity: usize,
    /// Largest accepted inbound message; bigger ones close the connection.
    pub max_message_size: usize,
    /// Read silence after which the connection is considered dead.
    pub idle_timeout: Duration,
    /// Period of WebSocket pings sent regardless of queue activity.
    pub keepalive_interval: Duration,
    /// Deadline for a single write.
    pub write_timeout: Duration,
}

#[derive(Debug)]
enum NetError {
    // Transport failures end the connection; malformed payloads never reach here.
    Ws(axum::Error),
    IdleTimeout,
    WriteTimeout,
    Hub(HubError),
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::Ws(e) => write!(f, "websocket error: {e}"),
            NetError::IdleTimeout => f.write_str("no traffic within idle timeout"),
            NetError::WriteTimeout => f.write_str("write deadline exceeded"),
            NetError::Hub(e) => write!(f, "hub unavailable: {e}"),
        }
    }
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

impl From<HubError> for NetError {
    fn from(e: HubError) -> Self {
        NetError::Hub(e)
    }
}

#[derive(Debug, Default)]
struct InboundStats {
    msgs_in: u64,
    bytes_in: u64,
    malformed: u64,
    malformed_log: LogThrottle,
    pong_full_log: LogThrottle,
    input_full_log: LogThrottle,
}

#[derive(Debug, Default)]
struct OutboundStats {
    msgs_out: u64,
    bytes_out: u64,
    pings_out: u64,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let hub = state.hub.clone();
    let settings = state.connection.clone();

    ws.max_message_size(settings.max_message_size)
        .max_frame_size(settings.max_message_size)
        .on_failed_upgrade(|e| warn!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| handle_socket(socket, hub, settings))
}

async fn handle_socket(socket: WebSocket, hub: HubHandle, settings: ConnectionSettings) {
    let (outbound_tx, outbound_rx) = mpsc::channel::<Utf8Bytes>(settings.outbound_capacity);
    // Only the hub holds a strong sender, so unregistering closes the queue.
    let replies = outbound_tx.downgrade();

    let client_id = match hub.register(outbound_tx).await {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, "failed to register connection");
            return;
        }
    };

    let span = info_span!("conn", client_id);
    run_connection(socket, hub, client_id, replies, outbound_rx, settings)
        .instrument(span)
        .await;
}

async fn run_connection(
    socket: WebSocket,
    hub: HubHandle,
    client_id: ClientId,
    replies: WeakSender<Utf8Bytes>,
    mut outbound_rx: mpsc::Receiver<Utf8Bytes>,
    settings: ConnectionSettings,
) {
    info!("client connected");
    let (mut sink, mut stream) = socket.split();
    let mut in_stats = InboundStats::default();
    let mut out_stats = OutboundStats::default();

    // Whichever duty ends first cancels the other.
    let (duty, result) = tokio::select! {
        r = inbound_duty(&mut stream, &hub, client_id, &replies, &settings, &mut in_stats) => ("inbound", r),
        r = outbound_duty(&mut sink, &mut outbound_rx, &settings, &mut out_stats) => ("outbound", r),
    };
    match result {
        Ok(()) => debug!(duty, "connection duty finished"),
        Err(e) => warn!(duty, error = %e, "connection duty failed"),
    }

    // The single unregistration point for this connection.
    if let Err(e) = hub.unregister(client_id).await {
        warn!(error = %e, "failed to unregister connection");
    }
    if let Ok(Err(e)) = timeout(settings.write_timeout, sink.close()).await {
        debug!(error = %e, "socket close error");
    }

    debug!(
        msgs_in = in_stats.msgs_in,
        bytes_in = in_stats.bytes_in,
        malformed = in_stats.malformed,
        msgs_out = out_stats.msgs_out,
        bytes_out = out_stats.bytes_out,
        pings_out = out_stats.pings_out,
        "connection stats"
    );
    info!("client disconnected");
}

async fn inbound_duty(
    stream: &mut SplitStream<WebSocket>,
    hub: &HubHandle,
    client_id: ClientId,
    replies: &WeakSender<Utf8Bytes>,
    settings: &ConnectionSettings,
    stats: &mut InboundStats,
) -> Result<(), NetError> {
    loop {
        // Any frame, keepalive pongs included, refreshes the idle window.
        let Some(incoming) = timeout(settings.idle_timeout, stream.next())
            .await
            .map_err(|_| NetError::IdleTimeout)?
        else {
            info!("websocket closed");
            return Ok(());
        };

        match incoming? {
            Message::Text(text) => {
                stats.msgs_in += 1;
                stats.bytes_in += text.len() as u64;

                match protocol::decode(text.as_str()) {
                    Ok(inbound) => dispatch(inbound, hub, client_id, replies, stats).await?,
                    Err(e) => {
                        stats.malformed += 1;
                        if stats.malformed_log.should_log() {
                            warn!(bytes = text.len(), error = %e, "dropping malformed message");
                        }
                    }
                }
            }
            Message::Binary(bytes) => {
                stats.malformed += 1;
                if stats.malformed_log.should_log() {
                    warn!(bytes = bytes.len(), "dropping binary message");
                }
            }
            // Pings are answered by the socket itself.
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return Ok(()),
        }
    }
}

async fn dispatch(
    inbound: Inbound,
    hub: &HubHandle,
    client_id: ClientId,
    replies: &WeakSender<Utf8Bytes>,
    stats: &mut InboundStats,
) -> Result<(), NetError> {
    match inbound.message {
        ClientMessage::Join(payload) => hub.join(client_id, payload.lobby).await?,
        ClientMessage::Leave => hub.leave(client_id).await?,
        ClientMessage::SyncRequest => hub.sync_request(client_id).await?,
        ClientMessage::Ping(payload) => {
            // A missing or null id is echoed as an empty string.
            let pong = ServerMessage::pong(payload.id.unwrap_or_default());
            let pong = match pong.encode(inbound.seq) {
                Ok(pong) => pong,
                Err(e) => {
                    error!(error = %e, "failed to encode pong");
                    return Ok(());
                }
            };
            // A failed upgrade means the hub already closed our queue; the writer is stopping.
            if let Some(outbound) = replies.upgrade() {
                if let Err(TrySendError::Full(_)) = outbound.try_send(pong) {
                    if stats.pong_full_log.should_log() {
                        warn!("outbound queue full; dropping pong");
                    }
                }
            }
        }
        ClientMessage::Input(_) => match hub.try_input(client_id, inbound.seq) {
            Ok(()) => {}
            Err(HubError::Busy) => {
                if stats.input_full_log.should_log() {
                    warn!(seq = inbound.seq, "hub event stream full; dropping input marker");
                }
            }
            Err(e) => return Err(e.into()),
        },
    }
    Ok(())
}

async fn outbound_duty(
    sink: &mut SplitSink<WebSocket, Message>,
    outbound_rx: &mut mpsc::Receiver<Utf8Bytes>,
    settings: &ConnectionSettings,
    stats: &mut OutboundStats,
) -> Result<(), NetError> {
    let mut keepalive = interval_at(
        Instant::now() + settings.keepalive_interval,
        settings.keepalive_interval,
    );

    loop {
        tokio::select! {
            queued = outbound_rx.recv() => {
                // None: the hub unregistered us and dropped its sender.
                let Some(bytes) = queued else {
                    return Ok(());
                };
                let len = bytes.len() as u64;
                write(sink, Message::Text(bytes), settings.write_timeout).await?;
                stats.msgs_out += 1;
                stats.bytes_out += len;
            }
            _ = keepalive.tick() => {
                write(sink, Message::Ping(Bytes::new()), settings.write_timeout).await?;
                stats.pings_out += 1;
            }
        }
    }
}

async fn write(
    sink: &mut SplitSink<WebSocket, Message>,
    message: Message,
    deadline: Duration,
) -> Result<(), NetError> {
    timeout(deadline, sink.send(message))
        .await
        .map_err(|_| NetError::WriteTimeout)??;
    Ok(())
}
