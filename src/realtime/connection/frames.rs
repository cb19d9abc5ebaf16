use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tokio_tungstenite::tungstenite::protocol::Message;
use uuid::Uuid;

/// Frames queued for the outbound writer.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    /// A serialized change event, shared across recipients.
    Event(Bytes),
    /// Reply to a control frame.
    Notice(String),
}

impl OutboundFrame {
    pub fn subscribed(table_id: Uuid) -> Self {
        OutboundFrame::Notice(json!({"type": "subscribed", "tableId": table_id}).to_string())
    }

    pub fn unsubscribed(table_id: Uuid) -> Self {
        OutboundFrame::Notice(json!({"type": "unsubscribed", "tableId": table_id}).to_string())
    }

    pub fn error(message: &str) -> Self {
        OutboundFrame::Notice(json!({"type": "error", "message": message}).to_string())
    }

    pub fn into_message(self) -> Message {
        match self {
            OutboundFrame::Event(payload) => {
                Message::Text(String::from_utf8_lossy(&payload).into_owned())
            }
            OutboundFrame::Notice(text) => Message::Text(text),
        }
    }
}

/// Client requests accepted on an open connection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ControlFrame {
    Subscribe {
        #[serde(rename = "tableId")]
        table_id: Uuid,
    },
    Unsubscribe {
        #[serde(rename = "tableId")]
        table_id: Uuid,
    },
}

impl ControlFrame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
