//! Room event data model.
//!
//! This module defines the events stored in a room timeline and the message
//! content built for sending. Message content is a closed sum type over the
//! supported `msgtype`s and serializes to the Matrix `m.room.message` content
//! shape, so the same value is used for incoming and outgoing messages.

pub use matrix_sdk::ruma::events::room::EncryptedFile;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Format value announcing an HTML `formatted_body`.
pub const HTML_FORMAT: &str = "org.matrix.custom.html";

/// Event type of room messages.
pub const ROOM_MESSAGE_TYPE: &str = "m.room.message";

/// Event type of the room aliases state event.
const ROOM_ALIASES_TYPE: &str = "m.room.aliases";

/// Reference to the event a message replies to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InReplyTo {
    /// Id of the replied-to event
    pub event_id: String,
}

/// Relation of a message to a prior event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    #[serde(rename = "m.in_reply_to")]
    pub in_reply_to: InReplyTo,
}

impl Relation {
    /// Creates a reply relation to `event_id`.
    pub fn reply_to(event_id: &str) -> Self {
        Relation {
            in_reply_to: InReplyTo {
                event_id: event_id.to_owned(),
            },
        }
    }
}

/// Content of text-like messages (`m.text` and `m.emote`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    /// Plain text body
    pub body: String,
    /// Format of `formatted_body`, set to [`HTML_FORMAT`] when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Rich (HTML) variant of the body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_body: Option<String>,
    /// Reply relation
    #[serde(
        rename = "m.relates_to",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub relates_to: Option<Relation>,
}

/// Metadata of a media attachment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    /// Size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Width in pixels (image and video only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<u64>,
    /// Height in pixels (image and video only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<u64>,
    /// Blur placeholder hash (image and video only)
    #[serde(
        rename = "xyz.amorgan.blurhash",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub blurhash: Option<String>,
}

/// Content of media messages (`m.image`, `m.file`, `m.audio`, `m.video`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MediaContent {
    /// File name of the attachment
    pub body: String,
    /// Content URI, absent when the attachment is encrypted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Encryption descriptor for attachments in encrypted rooms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<EncryptedFile>,
    #[serde(default)]
    pub info: MediaInfo,
    #[serde(
        rename = "m.relates_to",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub relates_to: Option<Relation>,
}

impl PartialEq for MediaContent {
    fn eq(&self, other: &Self) -> bool {
        self.body == other.body
            && self.url == other.url
            && same_encrypted_file(self.file.as_ref(), other.file.as_ref())
            && self.info == other.info
            && self.relates_to == other.relates_to
    }
}

impl Eq for MediaContent {}

/// Compares encryption descriptors by the blob they point to.
pub(crate) fn same_encrypted_file(a: Option<&EncryptedFile>, b: Option<&EncryptedFile>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.url == b.url,
        (None, None) => true,
        _ => false,
    }
}

/// Builds a descriptor of `url` with zeroed key material.
#[cfg(test)]
pub(crate) fn create_encrypted_file(url: &str) -> EncryptedFile {
    let zeros = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
    serde_json::from_value(serde_json::json!({
        "url": url,
        "key": {
            "kty": "oct",
            "key_ops": ["encrypt", "decrypt"],
            "alg": "A256CTR",
            "k": zeros,
            "ext": true
        },
        "iv": "AAAAAAAAAAAAAAAAAAAAAA",
        "hashes": { "sha256": zeros },
        "v": "v2"
    }))
    .unwrap()
}

/// Room message content, tagged by its `msgtype`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "msgtype")]
pub enum Message {
    #[serde(rename = "m.text")]
    Text(TextContent),
    #[serde(rename = "m.emote")]
    Emote(TextContent),
    #[serde(rename = "m.image")]
    Image(MediaContent),
    #[serde(rename = "m.file")]
    File(MediaContent),
    #[serde(rename = "m.audio")]
    Audio(MediaContent),
    #[serde(rename = "m.video")]
    Video(MediaContent),
}

impl Message {
    /// Plain text body of the message, the file name for media.
    pub fn body(&self) -> &str {
        match self {
            Message::Text(content) | Message::Emote(content) => &content.body,
            Message::Image(content)
            | Message::File(content)
            | Message::Audio(content)
            | Message::Video(content) => &content.body,
        }
    }

    /// Rich variant of the body, only text-like messages have one.
    pub fn formatted_body(&self) -> Option<&str> {
        match self {
            Message::Text(content) | Message::Emote(content) => content.formatted_body.as_deref(),
            _ => None,
        }
    }

    /// Id of the event this message replies to.
    pub fn in_reply_to(&self) -> Option<&str> {
        let relation = match self {
            Message::Text(content) | Message::Emote(content) => content.relates_to.as_ref(),
            Message::Image(content)
            | Message::File(content)
            | Message::Audio(content)
            | Message::Video(content) => content.relates_to.as_ref(),
        };
        relation.map(|r| r.in_reply_to.event_id.as_str())
    }

    /// Encryption descriptor of an image attachment.
    ///
    /// Only images are registered with the media service, other kinds are
    /// downloaded on demand and never previewed.
    pub fn encrypted_image(&self) -> Option<&EncryptedFile> {
        match self {
            Message::Image(content) => content.file.as_ref(),
            _ => None,
        }
    }

    /// The `msgtype` wire name.
    pub fn msgtype(&self) -> &'static str {
        match self {
            Message::Text(_) => "m.text",
            Message::Emote(_) => "m.emote",
            Message::Image(_) => "m.image",
            Message::File(_) => "m.file",
            Message::Audio(_) => "m.audio",
            Message::Video(_) => "m.video",
        }
    }
}

/// Content of an `m.room.aliases` state event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasesContent {
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Decoded content of a room state event.
#[derive(Clone, Debug, PartialEq)]
pub enum StateContent {
    Aliases(AliasesContent),
    Other(Value),
}

/// A generic room state event.
#[derive(Clone, Debug, PartialEq)]
pub struct StateEvent {
    pub event_type: String,
    pub state_key: String,
    pub content: StateContent,
}

/// Content of a timeline event.
#[derive(Clone, Debug, PartialEq)]
pub enum EventContent {
    /// A room message of one of the supported kinds
    Message(Message),
    /// A room state event
    State(StateEvent),
    /// Any other event, including messages of unsupported kinds
    Other { event_type: String, content: Value },
}

/// An event of a room timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct TimelineEvent {
    pub event_id: String,
    pub sender: String,
    /// Milliseconds since the unix epoch, as stamped by the origin server
    pub origin_server_ts: u64,
    /// Transaction id of the local echo, only set for our own events
    pub transaction_id: Option<String>,
    pub content: EventContent,
}

#[derive(Default, Deserialize)]
struct RawUnsigned {
    #[serde(default)]
    transaction_id: Option<String>,
}

/// Wire shape of a sync timeline event.
#[derive(Deserialize)]
struct RawTimelineEvent {
    event_id: String,
    sender: String,
    #[serde(default)]
    origin_server_ts: u64,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    state_key: Option<String>,
    #[serde(default)]
    content: Value,
    #[serde(default)]
    unsigned: RawUnsigned,
}

impl TimelineEvent {
    /// Creates a message event.
    pub fn message(event_id: &str, sender: &str, message: Message) -> Self {
        TimelineEvent {
            event_id: event_id.to_owned(),
            sender: sender.to_owned(),
            origin_server_ts: 0,
            transaction_id: None,
            content: EventContent::Message(message),
        }
    }

    /// Parses a sync timeline event from its JSON representation.
    ///
    /// Message content that does not decode into a supported kind is kept as
    /// [`EventContent::Other`] rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or misses the mandatory
    /// `event_id`, `sender` or `type` fields.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: RawTimelineEvent = serde_json::from_str(json)?;

        let content = match raw.state_key {
            Some(state_key) => {
                let content = match raw.event_type.as_str() {
                    ROOM_ALIASES_TYPE => serde_json::from_value(raw.content.clone())
                        .map(StateContent::Aliases)
                        .unwrap_or(StateContent::Other(raw.content)),
                    _ => StateContent::Other(raw.content),
                };
                EventContent::State(StateEvent {
                    event_type: raw.event_type,
                    state_key,
                    content,
                })
            }
            None if raw.event_type == ROOM_MESSAGE_TYPE => {
                match serde_json::from_value::<Message>(raw.content.clone()) {
                    Ok(message) => EventContent::Message(message),
                    Err(_) => EventContent::Other {
                        event_type: raw.event_type,
                        content: raw.content,
                    },
                }
            }
            None => EventContent::Other {
                event_type: raw.event_type,
                content: raw.content,
            },
        };

        Ok(TimelineEvent {
            event_id: raw.event_id,
            sender: raw.sender,
            origin_server_ts: raw.origin_server_ts,
            transaction_id: raw.unsigned.transaction_id,
            content,
        })
    }

    /// The message carried by this event, if any.
    pub fn as_message(&self) -> Option<&Message> {
        match &self.content {
            EventContent::Message(message) => Some(message),
            _ => None,
        }
    }
}

/// Ephemeral room data delivered alongside the timeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EphemeralEvent {
    /// Users currently typing in the room
    Typing(Vec<String>),
    /// Event ids that received a read receipt
    Receipts(Vec<String>),
    /// Unhandled ephemeral event
    Other(String),
}

#[derive(Deserialize)]
struct RawEphemeralEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    content: Value,
}

#[derive(Deserialize)]
struct RawTypingContent {
    #[serde(default)]
    user_ids: Vec<String>,
}

impl EphemeralEvent {
    /// Parses an ephemeral room event from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: RawEphemeralEvent = serde_json::from_str(json)?;

        match raw.event_type.as_str() {
            "m.typing" => {
                let typing: RawTypingContent = serde_json::from_value(raw.content)?;
                Ok(EphemeralEvent::Typing(typing.user_ids))
            }
            // Receipt content is keyed by the acknowledged event ids
            "m.receipt" => {
                let event_ids = match raw.content {
                    Value::Object(map) => map.into_iter().map(|(id, _)| id).collect(),
                    _ => vec![],
                };
                Ok(EphemeralEvent::Receipts(event_ids))
            }
            _ => Ok(EphemeralEvent::Other(raw.event_type)),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_text_message() {
        let json = r#"{
            "event_id": "$1:example.com",
            "sender": "@alice:example.com",
            "origin_server_ts": 1000,
            "type": "m.room.message",
            "content": {
                "msgtype": "m.text",
                "body": "hello",
                "format": "org.matrix.custom.html",
                "formatted_body": "<b>hello</b>",
                "m.relates_to": { "m.in_reply_to": { "event_id": "$0:example.com" } }
            }
        }"#;

        let event = TimelineEvent::from_json(json).unwrap();
        assert_eq!(event.event_id, "$1:example.com");
        assert_eq!(event.sender, "@alice:example.com");
        assert_eq!(event.origin_server_ts, 1000);

        let message = event.as_message().unwrap();
        assert_eq!(message.msgtype(), "m.text");
        assert_eq!(message.body(), "hello");
        assert_eq!(message.formatted_body(), Some("<b>hello</b>"));
        assert_eq!(message.in_reply_to(), Some("$0:example.com"));
    }

    #[test]
    fn test_parse_encrypted_image() {
        let json = json!({
            "event_id": "$img:example.com",
            "sender": "@bob:example.com",
            "type": "m.room.message",
            "unsigned": { "transaction_id": "txn42" },
            "content": {
                "msgtype": "m.image",
                "body": "cat.png",
                "info": {
                    "mimetype": "image/png",
                    "size": 2048,
                    "w": 640,
                    "h": 480,
                    "xyz.amorgan.blurhash": "LEHV6nWB2yk8"
                },
                "file": {
                    "url": "mxc://example.com/cat",
                    "key": { "kty": "oct", "key_ops": ["encrypt", "decrypt"], "alg": "A256CTR", "k": "AAAA", "ext": true },
                    "iv": "AAAAAAAAAAAAAAAAAAAAAA",
                    "hashes": { "sha256": "AAAA" },
                    "v": "v2"
                }
            }
        })
        .to_string();

        let event = TimelineEvent::from_json(&json).unwrap();
        assert_eq!(event.transaction_id.as_deref(), Some("txn42"));

        let Some(Message::Image(image)) = event.as_message() else {
            panic!("expected an image message");
        };
        assert_eq!(image.url, None);
        assert_eq!(image.info.w, Some(640));
        assert_eq!(image.info.h, Some(480));
        assert_eq!(image.info.blurhash.as_deref(), Some("LEHV6nWB2yk8"));
        assert_eq!(
            event.as_message().unwrap().encrypted_image().unwrap().url.as_str(),
            "mxc://example.com/cat"
        );
    }

    #[test]
    fn test_parse_unsupported_msgtype_is_kept() {
        let json = json!({
            "event_id": "$n:example.com",
            "sender": "@bot:example.com",
            "type": "m.room.message",
            "content": { "msgtype": "m.notice", "body": "beep" }
        })
        .to_string();

        let event = TimelineEvent::from_json(&json).unwrap();
        assert!(matches!(
            event.content,
            EventContent::Other { ref event_type, .. } if event_type == "m.room.message"
        ));
    }

    #[test]
    fn test_parse_aliases_state_event() {
        let json = json!({
            "event_id": "$a:example.com",
            "sender": "@alice:example.com",
            "type": "m.room.aliases",
            "state_key": "example.com",
            "content": { "aliases": ["#room:example.com", "#other:example.com"] }
        })
        .to_string();

        let event = TimelineEvent::from_json(&json).unwrap();
        let EventContent::State(state) = event.content else {
            panic!("expected a state event");
        };
        assert_eq!(state.state_key, "example.com");
        assert_eq!(
            state.content,
            StateContent::Aliases(AliasesContent {
                aliases: vec![
                    "#room:example.com".to_owned(),
                    "#other:example.com".to_owned()
                ]
            })
        );
    }

    #[test]
    fn test_parse_generic_state_event() {
        let json = json!({
            "event_id": "$t:example.com",
            "sender": "@alice:example.com",
            "type": "m.room.topic",
            "state_key": "",
            "content": { "topic": "rust" }
        })
        .to_string();

        let event = TimelineEvent::from_json(&json).unwrap();
        let EventContent::State(state) = event.content else {
            panic!("expected a state event");
        };
        assert_eq!(state.event_type, "m.room.topic");
        assert_eq!(state.content, StateContent::Other(json!({ "topic": "rust" })));
    }

    #[test]
    fn test_parse_missing_event_id_fails() {
        let json = r#"{ "sender": "@alice:example.com", "type": "m.room.message" }"#;
        assert!(TimelineEvent::from_json(json).is_err());
    }

    #[test]
    fn test_serialize_reply_content() {
        let message = Message::Text(TextContent {
            body: "hi".to_owned(),
            format: Some(HTML_FORMAT.to_owned()),
            formatted_body: Some("<p>hi</p>".to_owned()),
            relates_to: Some(Relation::reply_to("$0:example.com")),
        });

        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "msgtype": "m.text",
                "body": "hi",
                "format": "org.matrix.custom.html",
                "formatted_body": "<p>hi</p>",
                "m.relates_to": { "m.in_reply_to": { "event_id": "$0:example.com" } }
            })
        );
    }

    #[test]
    fn test_serialize_plain_file_omits_optional_fields() {
        let message = Message::File(MediaContent {
            body: "notes.txt".to_owned(),
            url: Some("mxc://example.com/notes".to_owned()),
            info: MediaInfo {
                mimetype: Some("text/plain".to_owned()),
                size: Some(12),
                ..Default::default()
            },
            ..Default::default()
        });

        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "msgtype": "m.file",
                "body": "notes.txt",
                "url": "mxc://example.com/notes",
                "info": { "mimetype": "text/plain", "size": 12 }
            })
        );
    }

    #[test]
    fn test_parse_typing() {
        let json = r#"{ "type": "m.typing", "content": { "user_ids": ["@a:x", "@b:x"] } }"#;
        assert_eq!(
            EphemeralEvent::from_json(json).unwrap(),
            EphemeralEvent::Typing(vec!["@a:x".to_owned(), "@b:x".to_owned()])
        );
    }

    #[test]
    fn test_parse_receipts() {
        let json = r#"{
            "type": "m.receipt",
            "content": {
                "$1:x": { "m.read": { "@a:x": { "ts": 1 } } },
                "$2:x": { "m.read": { "@b:x": { "ts": 2 } } }
            }
        }"#;
        assert_eq!(
            EphemeralEvent::from_json(json).unwrap(),
            EphemeralEvent::Receipts(vec!["$1:x".to_owned(), "$2:x".to_owned()])
        );
    }

    #[test]
    fn test_parse_other_ephemeral() {
        let json = r#"{ "type": "m.fully_read", "content": {} }"#;
        assert_eq!(
            EphemeralEvent::from_json(json).unwrap(),
            EphemeralEvent::Other("m.fully_read".to_owned())
        );
    }
}
