use crate::api::{ApiError, ApiResult};
use crate::gateway::BookmarkChange;
use crate::models::Bookmark;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;

pub(crate) const SCHEMA: &str = "public";
pub(crate) const TABLE: &str = "bookmarks";
pub(crate) const HEARTBEAT_TOPIC: &str = "phoenix";

pub(crate) fn channel_topic() -> String {
    format!("realtime:{SCHEMA}:{TABLE}")
}

/// Phoenix channel frame (serializer `vsn=1.0.0`, JSON objects).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub msg_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub(crate) enum ChangeKind {
    Insert,
    Update,
    Delete,
}

const CHANGE_KINDS: [ChangeKind; 3] = [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete];

/// Join with one `postgres_changes` binding per change kind, each filtered
/// to the owner's rows.
pub(crate) fn join_message(owner_id: &str, access_token: &str, msg_ref: &str) -> PhoenixMessage {
    let filter = format!("user_id=eq.{owner_id}");
    let bindings: Vec<Value> = CHANGE_KINDS
        .iter()
        .map(|kind| {
            json!({
                "event": kind.to_string(),
                "schema": SCHEMA,
                "table": TABLE,
                "filter": filter,
            })
        })
        .collect();

    PhoenixMessage {
        topic: channel_topic(),
        event: "phx_join".to_string(),
        payload: json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": bindings,
            },
            "access_token": access_token,
        }),
        msg_ref: Some(msg_ref.to_string()),
        join_ref: Some(msg_ref.to_string()),
    }
}

pub(crate) fn heartbeat_message(msg_ref: &str) -> PhoenixMessage {
    PhoenixMessage {
        topic: HEARTBEAT_TOPIC.to_string(),
        event: "heartbeat".to_string(),
        payload: json!({}),
        msg_ref: Some(msg_ref.to_string()),
        join_ref: None,
    }
}

pub(crate) fn leave_message(msg_ref: &str, join_ref: &str) -> PhoenixMessage {
    PhoenixMessage {
        topic: channel_topic(),
        event: "phx_leave".to_string(),
        payload: json!({}),
        msg_ref: Some(msg_ref.to_string()),
        join_ref: Some(join_ref.to_string()),
    }
}

/// What an incoming frame means for the subscriber.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ChannelEvent {
    Change(BookmarkChange),
    Joined,
    JoinFailed(String),
    /// Server-side status notice (e.g. "Subscribed to PostgreSQL").
    Status(String),
    Error(String),
    Closed,
    Ignored,
}

#[derive(Deserialize, Debug)]
struct ChangeData {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
    #[serde(default)]
    errors: Option<Value>,
}

pub(crate) fn decode_frame(text: &str) -> ApiResult<ChannelEvent> {
    let msg: PhoenixMessage = serde_json::from_str(text).map_err(ApiError::parse)?;
    decode_message(msg)
}

fn decode_message(msg: PhoenixMessage) -> ApiResult<ChannelEvent> {
    // Heartbeat replies arrive on the `phoenix` topic.
    if msg.topic != channel_topic() {
        return Ok(ChannelEvent::Ignored);
    }

    match msg.event.as_str() {
        "postgres_changes" => decode_change(&msg.payload),
        "phx_reply" => {
            // Only the reply to our join carries a join_ref equal to its ref.
            if msg.msg_ref.is_none() || msg.msg_ref != msg.join_ref {
                return Ok(ChannelEvent::Ignored);
            }
            match msg.payload.get("status").and_then(|s| s.as_str()) {
                Some("ok") => Ok(ChannelEvent::Joined),
                _ => Ok(ChannelEvent::JoinFailed(
                    reason(&msg.payload["response"]).unwrap_or_else(|| msg.payload.to_string()),
                )),
            }
        }
        "system" => {
            let message = msg
                .payload
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or_default()
                .to_string();
            match msg.payload.get("status").and_then(|s| s.as_str()) {
                Some("ok") => Ok(ChannelEvent::Status(message)),
                _ => Ok(ChannelEvent::Error(message)),
            }
        }
        "phx_error" => Ok(ChannelEvent::Error(
            reason(&msg.payload).unwrap_or_else(|| "channel error".to_string()),
        )),
        "phx_close" => Ok(ChannelEvent::Closed),
        _ => Ok(ChannelEvent::Ignored),
    }
}

fn reason(v: &Value) -> Option<String> {
    ["reason", "message"]
        .iter()
        .find_map(|k| v.get(*k).and_then(|m| m.as_str()))
        .map(|s| s.to_string())
}

fn decode_change(payload: &Value) -> ApiResult<ChannelEvent> {
    let data: ChangeData =
        serde_json::from_value(payload.get("data").cloned().unwrap_or(Value::Null))
            .map_err(ApiError::parse)?;

    if let Some(errors) = data.errors.filter(|e| !e.is_null()) {
        return Ok(ChannelEvent::Error(errors.to_string()));
    }

    let kind = ChangeKind::from_str(&data.kind)
        .map_err(|_| ApiError::parse(format!("unknown change type {}", data.kind)))?;

    let change = match kind {
        ChangeKind::Insert => BookmarkChange::Insert(record(data.record)?),
        ChangeKind::Update => BookmarkChange::Update(record(data.record)?),
        ChangeKind::Delete => {
            // Without REPLICA IDENTITY FULL only the primary key survives.
            let id = data
                .old_record
                .as_ref()
                .and_then(|r| r.get("id"))
                .and_then(|v| v.as_str())
                .ok_or_else(|| ApiError::parse("delete event without id"))?;
            BookmarkChange::Delete { id: id.to_string() }
        }
    };
    Ok(ChannelEvent::Change(change))
}

fn record(v: Option<Value>) -> ApiResult<Bookmark> {
    let v = v.ok_or_else(|| ApiError::parse("change event without record"))?;
    serde_json::from_value(v).map_err(ApiError::parse)
}
