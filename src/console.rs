//! Console commands driving the timeline engine.
//!
//! Every line typed on the console is either a command starting with `/` or a
//! text message for the active room.
//!
//! # Commands
//!
//! - `/rooms` - List the known rooms
//! - `/room <room_id>` - Select the active room
//! - `/me <text>` - Send an emote in the active room
//! - `/reply <event_id> <text>` - Reply to a message of the active room
//! - `/read <event_id>...` - Mark events of the active room as read
//! - `/attach <room_id> <mxc_url> <mimetype> <size> <filename> [WxH]` - Send an uploaded attachment
//! - `/help` - Display the commands

use std::fmt;

use command_parser::{Command as ParserCommand, Parser};
use log::debug;

use crate::timeline::{Dimensions, MediaAttachment, MediaKind, TimelineError, TimelineManager};

const HELP: &str = "\
/rooms                                   list the known rooms
/room <room_id>                          select the active room
/me <text>                               send an emote in the active room
/reply <event_id> <text>                 reply to a message of the active room
/read <event_id>...                      mark events of the active room as read
/attach <room_id> <mxc_url> <mimetype> <size> <filename> [WxH]
                                         send an uploaded attachment
/help                                    display this help
<text>                                   send a message in the active room";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Help,
    Rooms,
    /// Select the active room
    Room(String),
    /// Text message for the active room
    Text(String),
    /// Emote for the active room
    Emote(String),
    /// Reply to an event of the active room
    ///
    /// # Fields
    ///
    /// * `String` - Replied-to event id
    /// * `String` - Reply text
    Reply(String, String),
    /// Events of the active room to mark as read
    Read(Vec<String>),
    /// Attachment already uploaded to the media repository
    Attach {
        room_id: String,
        kind: MediaKind,
        attachment: MediaAttachment,
        dimensions: Option<Dimensions>,
    },
}

/// Errors that can occur during console line parsing.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleError {
    /// The line is blank
    Empty,
    /// The line starts with `/` but is not a valid command line
    UnableToParse,
    /// The command is not recognized
    Unknown(String),
    /// The command arguments are invalid, the usage is attached
    InvalidArguments(&'static str),
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::Empty => write!(f, "nothing to send"),
            ConsoleError::UnableToParse => write!(f, "unable to parse command"),
            ConsoleError::Unknown(name) => write!(f, "unknown command /{}, try /help", name),
            ConsoleError::InvalidArguments(usage) => write!(f, "usage: {}", usage),
        }
    }
}

/// Parses console lines and applies them to a [`TimelineManager`].
pub struct Console {
    parser: Parser,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        Console {
            parser: Parser::new('/', '-'),
        }
    }

    /// Parses a console line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is blank or is an invalid command.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lattice::console::{Console, ConsoleCommand};
    /// let console = Console::new();
    ///
    /// assert_eq!(
    ///     console.parse("/room !abc:example.com"),
    ///     Ok(ConsoleCommand::Room("!abc:example.com".to_string()))
    /// );
    /// assert_eq!(
    ///     console.parse("hello"),
    ///     Ok(ConsoleCommand::Text("hello".to_string()))
    /// );
    /// ```
    pub fn parse(&self, line: &str) -> Result<ConsoleCommand, ConsoleError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ConsoleError::Empty);
        }

        if !line.starts_with('/') {
            return Ok(ConsoleCommand::Text(line.to_owned()));
        }

        // For an unknown reason the parser ignores the last word, so we add a dummy word at the end
        let command = self
            .parser
            .parse(&format!("{} dummy", line))
            .map_err(|_| ConsoleError::UnableToParse)?;

        debug!("parsing command: {:?}", command);

        match command.name.as_str() {
            "help" => Ok(ConsoleCommand::Help),
            "rooms" => Ok(ConsoleCommand::Rooms),
            "room" => match command.arguments.first() {
                Some(room_id) => Ok(ConsoleCommand::Room(room_id.clone())),
                None => Err(ConsoleError::InvalidArguments("/room <room_id>")),
            },
            "me" => match remainder(line, 1) {
                Some(text) => Ok(ConsoleCommand::Emote(text.to_owned())),
                None => Err(ConsoleError::InvalidArguments("/me <text>")),
            },
            "reply" => match (command.arguments.first(), remainder(line, 2)) {
                (Some(event_id), Some(text)) => {
                    Ok(ConsoleCommand::Reply(event_id.clone(), text.to_owned()))
                }
                _ => Err(ConsoleError::InvalidArguments("/reply <event_id> <text>")),
            },
            "read" if command.arguments.is_empty() => {
                Err(ConsoleError::InvalidArguments("/read <event_id>..."))
            }
            "read" => Ok(ConsoleCommand::Read(command.arguments.clone())),
            "attach" => parse_attach(&command),
            name => Err(ConsoleError::Unknown(name.to_owned())),
        }
    }

    /// Applies a command to the engine and returns the text to display.
    pub fn execute(&self, command: ConsoleCommand, manager: &mut TimelineManager) -> String {
        match command {
            ConsoleCommand::Help => HELP.to_owned(),
            ConsoleCommand::Rooms => format_rooms(manager),
            ConsoleCommand::Room(room_id) => match manager.set_active_room(&room_id) {
                true => format!("active room is now {}", room_id),
                false => format!("unknown room {}", room_id),
            },
            ConsoleCommand::Text(text) => format_queued(manager.queue_text_message(&text, None)),
            ConsoleCommand::Emote(text) => format_queued(manager.queue_emote_message(&text)),
            ConsoleCommand::Reply(event_id, text) => {
                let Some(related) = manager
                    .active_timeline()
                    .and_then(|timeline| timeline.related_info(&event_id))
                else {
                    return format!("no message {} in the active room", event_id);
                };
                format_queued(manager.queue_text_message(&text, Some(&related)))
            }
            ConsoleCommand::Read(event_ids) => {
                let Some(room_id) = manager.active_room().map(str::to_owned) else {
                    return "no active room, select one with /room".to_owned();
                };
                manager.update_read_receipts(&room_id, &event_ids);
                format!("{} events marked as read", event_ids.len())
            }
            ConsoleCommand::Attach {
                room_id,
                kind,
                attachment,
                dimensions,
            } => {
                let result = match kind {
                    MediaKind::Image => {
                        manager.queue_image_message(&room_id, attachment, dimensions, None, None)
                    }
                    MediaKind::Video => {
                        manager.queue_video_message(&room_id, attachment, dimensions, None, None)
                    }
                    MediaKind::Audio => manager.queue_audio_message(&room_id, attachment, None),
                    MediaKind::File => manager.queue_file_message(&room_id, attachment, None),
                };
                format_media_result(result)
            }
        }
    }
}

/// Text of `line` after its first `words` words, if not blank.
fn remainder(line: &str, words: usize) -> Option<&str> {
    let mut rest = line;
    for _ in 0..words {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace)?;
        rest = &rest[end..];
    }

    let rest = rest.trim();
    (!rest.is_empty()).then_some(rest)
}

fn parse_attach(command: &ParserCommand) -> Result<ConsoleCommand, ConsoleError> {
    const USAGE: &str = "/attach <room_id> <mxc_url> <mimetype> <size> <filename> [WxH]";

    let [room_id, url, mimetype, size, filename, rest @ ..] = command.arguments.as_slice() else {
        return Err(ConsoleError::InvalidArguments(USAGE));
    };

    let mime: mime::Mime = mimetype
        .parse()
        .map_err(|_| ConsoleError::InvalidArguments(USAGE))?;
    let size = size
        .parse::<u64>()
        .map_err(|_| ConsoleError::InvalidArguments(USAGE))?;
    let dimensions = match rest.first() {
        Some(dimensions) => {
            Some(parse_dimensions(dimensions).ok_or(ConsoleError::InvalidArguments(USAGE))?)
        }
        None => None,
    };

    Ok(ConsoleCommand::Attach {
        room_id: room_id.clone(),
        kind: MediaKind::from_mime(&mime),
        attachment: MediaAttachment {
            filename: filename.clone(),
            url: url.clone(),
            file: None,
            mimetype: mime.essence_str().to_owned(),
            size,
        },
        dimensions,
    })
}

fn parse_dimensions(value: &str) -> Option<Dimensions> {
    let (width, height) = value.split_once('x')?;
    Some(Dimensions {
        width: width.parse().ok()?,
        height: height.parse().ok()?,
    })
}

fn format_rooms(manager: &TimelineManager) -> String {
    let room_ids = manager.room_ids();
    if room_ids.is_empty() {
        return "no rooms yet".to_owned();
    }

    room_ids
        .iter()
        .map(|room_id| {
            let marker = match manager.active_room() == Some(room_id.as_str()) {
                true => "*",
                false => " ",
            };
            let aliases = manager
                .timeline(room_id)
                .map(|timeline| timeline.aliases().join(", "))
                .unwrap_or_default();
            format!("{} {} {}", marker, room_id, aliases)
                .trim_end()
                .to_owned()
        })
        .collect::<Vec<String>>()
        .join("\n")
}

fn format_queued(transaction_id: Option<String>) -> String {
    match transaction_id {
        Some(transaction_id) => format!("queued {}", transaction_id),
        None => "no active room, select one with /room".to_owned(),
    }
}

fn format_media_result(result: Result<String, TimelineError>) -> String {
    match result {
        Ok(transaction_id) => format!("queued {}", transaction_id),
        Err(e) => e.to_string(),
    }
}
