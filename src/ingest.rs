//! Parsing and field extraction for the host's stdin protocol.
//!
//! One line is one JSON document: either a UI command (an object with a
//! `command` key) or an inbound push payload. Display fields of a push payload
//! prefer the `data` map over the sender's `notification` block, matching what
//! the push-delivery subsystem actually populates.

use crate::model::{AlertRequest, PushMessage};
use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// A UI command line, e.g. `{"command":"stop"}` or
/// `{"command":"open","orderId":"42"}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandLine {
    pub command: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum InputLine {
    Command(CommandLine),
    Push(PushMessage),
}

/// Parse one stdin line into a command or a push payload.
pub fn parse_line(line: &str) -> Result<InputLine> {
    let value: serde_json::Value =
        serde_json::from_str(line).context("input line is not valid JSON")?;
    if !value.is_object() {
        bail!("input line is not a JSON object");
    }

    if value.get("command").is_some() {
        let cmd: CommandLine =
            serde_json::from_value(value).context("malformed command line")?;
        Ok(InputLine::Command(cmd))
    } else {
        let msg: PushMessage =
            serde_json::from_value(value).context("malformed push payload")?;
        Ok(InputLine::Push(msg))
    }
}

/// Classification inputs and alert request extracted from a push payload.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub kind: Option<String>,
    pub request: AlertRequest,
}

/// Pull the alert-relevant fields out of a push payload.
///
/// Priority, per what senders populate in practice: title from `data.title`
/// then `notification.title`; message from `data.body`, then `data.message`,
/// then `notification.body`. Type and order id only ever live in `data`.
pub fn extract(msg: &PushMessage) -> Extracted {
    let note = msg.notification.as_ref();

    let title = msg
        .data
        .get("title")
        .cloned()
        .or_else(|| note.and_then(|n| n.title.clone()));

    let message = msg
        .data
        .get("body")
        .cloned()
        .or_else(|| msg.data.get("message").cloned())
        .or_else(|| note.and_then(|n| n.body.clone()));

    Extracted {
        kind: msg.data.get("type").cloned(),
        request: AlertRequest {
            title,
            message,
            order_id: msg.data.get("orderId").cloned(),
        },
    }
}
