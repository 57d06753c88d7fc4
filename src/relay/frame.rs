//! Frame translation between the downstream (axum) and upstream
//! (tungstenite) socket types.
//!
//! Both sides speak the same WebSocket frame model; translation only moves
//! type and payload across unchanged. Close codes and reasons survive.

use axum::extract::ws::{CloseFrame as DownstreamClose, Message as DownstreamMessage};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as UpstreamClose;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;

/// Frame read from the client, destined for the upstream.
pub fn to_upstream(message: DownstreamMessage) -> Option<UpstreamMessage> {
    Some(match message {
        DownstreamMessage::Text(text) => UpstreamMessage::Text(text.as_str().to_owned().into()),
        DownstreamMessage::Binary(data) => UpstreamMessage::Binary(data),
        DownstreamMessage::Ping(data) => UpstreamMessage::Ping(data),
        DownstreamMessage::Pong(data) => UpstreamMessage::Pong(data),
        DownstreamMessage::Close(frame) => UpstreamMessage::Close(frame.map(|f| UpstreamClose {
            code: CloseCode::from(f.code),
            reason: f.reason.as_str().to_owned().into(),
        })),
    })
}

/// Frame read from the upstream, destined for the client.
///
/// Raw `Frame` values are only produced when writing, never by a read, so
/// they are dropped.
pub fn to_downstream(message: UpstreamMessage) -> Option<DownstreamMessage> {
    Some(match message {
        UpstreamMessage::Text(text) => DownstreamMessage::Text(text.as_str().to_owned().into()),
        UpstreamMessage::Binary(data) => DownstreamMessage::Binary(data),
        UpstreamMessage::Ping(data) => DownstreamMessage::Ping(data),
        UpstreamMessage::Pong(data) => DownstreamMessage::Pong(data),
        UpstreamMessage::Close(frame) => DownstreamMessage::Close(frame.map(|f| DownstreamClose {
            code: u16::from(f.code),
            reason: f.reason.as_str().to_owned().into(),
        })),
        UpstreamMessage::Frame(_) => return None,
    })
}
