//! Slack Socket Mode transport.
//!
//! Keeps one websocket session alive, acknowledges every envelope, and feeds
//! normalized [`ChatEvent`]s into an mpsc channel. It never interprets the
//! events beyond classification; that is the dispatcher's job.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::api::SlackApi;
use crate::error::SlackApiError;
use crate::events::ChatEvent;

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Option<EventsApiPayload>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventsApiPayload {
    #[serde(default)]
    event: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SlackEvent {
    Message {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        user: Option<String>,
        #[serde(default)]
        channel: Option<String>,
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        bot_id: Option<String>,
    },
    ReactionAdded {
        reaction: String,
        user: String,
        #[serde(default)]
        item_user: Option<String>,
        item: ReactionItem,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ReactionItem {
    #[serde(default)]
    channel: Option<String>,
}

/// One decoded websocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Present on every envelope that must be acknowledged.
    pub envelope_id: Option<String>,
    pub kind: FrameKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    Hello,
    Disconnect { reason: String },
    Event(ChatEvent),
}

pub fn parse_frame(text: &str) -> Result<Frame, serde_json::Error> {
    let raw: RawFrame = serde_json::from_str(text)?;

    let kind = match raw.kind.as_str() {
        "hello" => FrameKind::Hello,
        "disconnect" => FrameKind::Disconnect {
            reason: raw.reason.unwrap_or_else(|| "unspecified".to_string()),
        },
        "events_api" => FrameKind::Event(
            raw.payload
                .and_then(|payload| payload.event)
                .map(classify_event)
                .unwrap_or(ChatEvent::Unrecognized),
        ),
        _ => FrameKind::Event(ChatEvent::Unrecognized),
    };

    Ok(Frame {
        envelope_id: raw.envelope_id,
        kind,
    })
}

fn classify_event(event: serde_json::Value) -> ChatEvent {
    let event: SlackEvent = match serde_json::from_value(event) {
        Ok(event) => event,
        Err(error) => {
            debug!(%error, "undecodable slack event");
            return ChatEvent::Unrecognized;
        }
    };

    match event {
        // Edits, joins and bot posts (including our own replies) are not commands.
        SlackEvent::Message {
            text: Some(text),
            user: Some(user),
            channel: Some(channel),
            subtype: None,
            bot_id: None,
        } => ChatEvent::Message {
            text,
            user,
            channel,
        },
        SlackEvent::ReactionAdded {
            reaction,
            user,
            item_user: Some(item_user),
            item: ReactionItem {
                channel: Some(channel),
            },
        } => ChatEvent::ReactionAdded {
            reaction,
            user,
            item_user,
            channel,
        },
        _ => ChatEvent::Unrecognized,
    }
}

enum SessionEnd {
    /// Slack asked us to reconnect, or the socket closed cleanly.
    Reconnect,
    Failed(String),
    /// The event consumer is gone.
    ReceiverClosed,
}

pub struct SocketModeTransport {
    api: Arc<SlackApi>,
    reconnect_delay: Duration,
}

impl SocketModeTransport {
    pub fn new(api: Arc<SlackApi>, reconnect_delay: Duration) -> Self {
        Self {
            api,
            reconnect_delay,
        }
    }

    /// Run until credentials are rejected or the receiver is dropped.
    pub async fn run(self, events: mpsc::Sender<ChatEvent>) {
        loop {
            match self.session(&events).await {
                Ok(SessionEnd::ReceiverClosed) => {
                    debug!("chat event receiver dropped; transport stopping");
                    return;
                }
                Ok(SessionEnd::Reconnect) => {
                    info!("socket mode session ended; reconnecting");
                }
                Ok(SessionEnd::Failed(message)) => {
                    warn!(%message, "socket mode session failed");
                    if events
                        .send(ChatEvent::TransportError { message })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Err(error) if error.is_invalid_auth() => {
                    warn!(%error, "slack credentials rejected");
                    let _ = events.send(ChatEvent::InvalidCredentials).await;
                    return;
                }
                Err(error) => {
                    warn!(%error, "could not establish socket mode session");
                    if events
                        .send(ChatEvent::TransportError {
                            message: error.to_string(),
                        })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }

            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    async fn session(&self, events: &mpsc::Sender<ChatEvent>) -> Result<SessionEnd, SlackApiError> {
        let bot_user_id = self.api.auth_test().await?;
        let url = self.api.open_connection().await?;

        let (socket, _) = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok(connected) => connected,
            Err(error) => return Ok(SessionEnd::Failed(error.to_string())),
        };
        info!(%bot_user_id, "connected to slack socket mode");

        if events
            .send(ChatEvent::Connected { bot_user_id })
            .await
            .is_err()
        {
            return Ok(SessionEnd::ReceiverClosed);
        }

        let (mut write, mut read) = socket.split();

        while let Some(message) = read.next().await {
            let text = match message {
                Ok(WsMessage::Text(text)) => text,
                Ok(WsMessage::Ping(payload)) => {
                    if let Err(error) = write.send(WsMessage::Pong(payload)).await {
                        return Ok(SessionEnd::Failed(error.to_string()));
                    }
                    continue;
                }
                Ok(WsMessage::Close(_)) => return Ok(SessionEnd::Reconnect),
                Ok(_) => continue,
                Err(error) => return Ok(SessionEnd::Failed(error.to_string())),
            };

            let frame = match parse_frame(&text) {
                Ok(frame) => frame,
                Err(error) => {
                    debug!(%error, "ignoring undecodable socket frame");
                    continue;
                }
            };

            if let Some(envelope_id) = &frame.envelope_id {
                let ack = json!({ "envelope_id": envelope_id }).to_string();
                if let Err(error) = write.send(WsMessage::Text(ack)).await {
                    return Ok(SessionEnd::Failed(error.to_string()));
                }
            }

            match frame.kind {
                FrameKind::Hello => debug!("socket mode hello"),
                FrameKind::Disconnect { reason } => {
                    info!(%reason, "slack requested disconnect");
                    return Ok(SessionEnd::Reconnect);
                }
                FrameKind::Event(ChatEvent::Unrecognized) => {}
                FrameKind::Event(event) => {
                    if events.send(event).await.is_err() {
                        return Ok(SessionEnd::ReceiverClosed);
                    }
                }
            }
        }

        Ok(SessionEnd::Reconnect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_message_envelope() {
        let frame = parse_frame(
            r#"{
                "envelope_id": "env-1",
                "type": "events_api",
                "payload": {
                    "event": {
                        "type": "message",
                        "text": "<@UBOT> tip <@U3>",
                        "user": "U1",
                        "channel": "C1"
                    }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(frame.envelope_id.as_deref(), Some("env-1"));
        assert_eq!(
            frame.kind,
            FrameKind::Event(ChatEvent::Message {
                text: "<@UBOT> tip <@U3>".to_string(),
                user: "U1".to_string(),
                channel: "C1".to_string(),
            })
        );
    }

    #[test]
    fn parses_reaction_envelope() {
        let frame = parse_frame(
            r#"{
                "envelope_id": "env-2",
                "type": "events_api",
                "payload": {
                    "event": {
                        "type": "reaction_added",
                        "user": "U1",
                        "reaction": "+1",
                        "item_user": "U3",
                        "item": { "type": "message", "channel": "C9", "ts": "1.2" }
                    }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(
            frame.kind,
            FrameKind::Event(ChatEvent::ReactionAdded {
                reaction: "+1".to_string(),
                user: "U1".to_string(),
                item_user: "U3".to_string(),
                channel: "C9".to_string(),
            })
        );
    }

    #[test]
    fn bot_and_edited_messages_are_unrecognized() {
        for event in [
            r#"{"type":"message","text":"hi","user":"U1","channel":"C1","bot_id":"B1"}"#,
            r#"{"type":"message","text":"hi","user":"U1","channel":"C1","subtype":"message_changed"}"#,
            r#"{"type":"app_mention","text":"<@UBOT> tip U2","user":"U1","channel":"C1"}"#,
        ] {
            let text = format!(
                r#"{{"envelope_id":"e","type":"events_api","payload":{{"event":{event}}}}}"#
            );
            let frame = parse_frame(&text).unwrap();
            assert_eq!(frame.kind, FrameKind::Event(ChatEvent::Unrecognized), "{event}");
            assert_eq!(frame.envelope_id.as_deref(), Some("e"));
        }
    }

    #[test]
    fn parses_control_frames() {
        assert_eq!(
            parse_frame(r#"{"type":"hello","num_connections":1}"#).unwrap().kind,
            FrameKind::Hello
        );
        assert_eq!(
            parse_frame(r#"{"type":"disconnect","reason":"refresh_requested"}"#)
                .unwrap()
                .kind,
            FrameKind::Disconnect {
                reason: "refresh_requested".to_string()
            }
        );
    }

    #[test]
    fn other_envelopes_are_still_acknowledged() {
        let frame = parse_frame(r#"{"type":"slash_commands","envelope_id":"env-9"}"#).unwrap();
        assert_eq!(frame.envelope_id.as_deref(), Some("env-9"));
        assert_eq!(frame.kind, FrameKind::Event(ChatEvent::Unrecognized));
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse_frame("not json").is_err());
    }
}
