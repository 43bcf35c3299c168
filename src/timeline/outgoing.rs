//! Construction of outgoing messages.
//!
//! These functions turn what the user typed or uploaded into the [`Message`]
//! handed to a timeline's send path. They have no side effect.

use crate::{
    markup::{MarkupConverter, escape_html, has_markup, plain_to_html, reply_html},
    settings::Settings,
    timeline::events::{
        EncryptedFile, HTML_FORMAT, MediaContent, MediaInfo, Message, Relation, TextContent,
        same_encrypted_file,
    },
};

/// Context of the event a message replies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelatedInfo {
    /// Id of the replied-to event
    pub related_event: String,
    /// Room of the replied-to event
    pub room_id: String,
    /// Sender of the replied-to event
    pub quoted_user: String,
    /// Plain body of the replied-to event
    pub quoted_body: String,
    /// Rich body of the replied-to event, if it had one
    pub quoted_formatted_body: Option<String>,
}

/// A message waiting to be transmitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub room_id: String,
    /// Client generated id matching the remote echo to this message
    pub transaction_id: String,
    pub message: Message,
}

/// Kind of a media attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    File,
    Audio,
    Video,
}

impl MediaKind {
    /// Picks the message kind matching a MIME type, files being the fallback.
    pub fn from_mime(mime: &mime::Mime) -> Self {
        let type_ = mime.type_();
        if type_ == mime::IMAGE {
            MediaKind::Image
        } else if type_ == mime::AUDIO {
            MediaKind::Audio
        } else if type_ == mime::VIDEO {
            MediaKind::Video
        } else {
            MediaKind::File
        }
    }
}

/// An uploaded attachment.
#[derive(Clone, Debug, Default)]
pub struct MediaAttachment {
    /// File name, used as the message body
    pub filename: String,
    /// Content URI returned by the upload
    pub url: String,
    /// Encryption descriptor when the room is encrypted
    pub file: Option<EncryptedFile>,
    pub mimetype: String,
    /// Size in bytes
    pub size: u64,
}

impl PartialEq for MediaAttachment {
    fn eq(&self, other: &Self) -> bool {
        self.filename == other.filename
            && self.url == other.url
            && same_encrypted_file(self.file.as_ref(), other.file.as_ref())
            && self.mimetype == other.mimetype
            && self.size == other.size
    }
}

impl Eq for MediaAttachment {}

/// Pixel size of an image or video.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u64,
    pub height: u64,
}

/// Builds an `m.text` message.
///
/// The body is trimmed and, when markdown is enabled, rendered to HTML. The
/// HTML variant is dropped when it carries no tag. A reply quotes the related
/// event line by line above the new body and always gets an HTML variant,
/// whatever the markdown setting.
///
/// # Examples
///
/// ```
/// use lattice::{
///     markup::MarkdownConverter,
///     settings::UserSettings,
///     timeline::{RelatedInfo, build_text_message},
/// };
///
/// let related = RelatedInfo {
///     related_event: "$1:example.com".to_owned(),
///     room_id: "!room:example.com".to_owned(),
///     quoted_user: "alice".to_owned(),
///     quoted_body: "line1\nline2".to_owned(),
///     quoted_formatted_body: None,
/// };
/// let message = build_text_message(
///     "hi",
///     Some(&related),
///     &UserSettings::default(),
///     &MarkdownConverter,
/// );
/// assert_eq!(message.body(), "> <alice> line1\n> line2\n\nhi");
/// ```
pub fn build_text_message(
    msg: &str,
    related: Option<&RelatedInfo>,
    settings: &dyn Settings,
    converter: &dyn MarkupConverter,
) -> Message {
    let body = msg.trim();
    let mut content = TextContent {
        body: body.to_owned(),
        ..Default::default()
    };

    let html = settings
        .is_markdown_enabled()
        .then(|| converter.to_html(body));

    if let Some(html) = &html
        && has_markup(html)
    {
        content.format = Some(HTML_FORMAT.to_owned());
        content.formatted_body = Some(html.clone());
    }

    if let Some(related) = related {
        content.body = format!("{}\n\n{}", quote_body(related), body);

        // Rich replies always carry a formatted body
        let reply = html.unwrap_or_else(|| escape_html(body));
        let quoted = related
            .quoted_formatted_body
            .clone()
            .unwrap_or_else(|| plain_to_html(&related.quoted_body));
        content.format = Some(HTML_FORMAT.to_owned());
        content.formatted_body = Some(reply_html(
            &related.room_id,
            &related.related_event,
            &related.quoted_user,
            &quoted,
            &reply,
        ));
        content.relates_to = Some(Relation::reply_to(&related.related_event));
    }

    Message::Text(content)
}

/// Builds an `m.emote` message, following the same formatting rules as
/// [`build_text_message`] without reply support.
pub fn build_emote_message(
    msg: &str,
    settings: &dyn Settings,
    converter: &dyn MarkupConverter,
) -> Message {
    let body = msg.trim();
    let mut content = TextContent {
        body: body.to_owned(),
        ..Default::default()
    };

    if settings.is_markdown_enabled() {
        let html = converter.to_html(body);
        if has_markup(&html) {
            content.format = Some(HTML_FORMAT.to_owned());
            content.formatted_body = Some(html);
        }
    }

    Message::Emote(content)
}

/// Builds a media message of the given kind.
///
/// `dimensions` and `blurhash` are only kept for images and videos. The
/// content URI is left out when the attachment is encrypted because the
/// encryption descriptor carries it.
pub fn build_media_message(
    kind: MediaKind,
    attachment: MediaAttachment,
    dimensions: Option<Dimensions>,
    blurhash: Option<String>,
    related: Option<&RelatedInfo>,
) -> Message {
    let mut info = MediaInfo {
        mimetype: Some(attachment.mimetype),
        size: Some(attachment.size),
        ..Default::default()
    };

    if matches!(kind, MediaKind::Image | MediaKind::Video) {
        info.w = dimensions.map(|d| d.width);
        info.h = dimensions.map(|d| d.height);
        info.blurhash = blurhash.filter(|hash| !hash.is_empty());
    }

    let url = match attachment.file {
        Some(_) => None,
        None => Some(attachment.url),
    };

    let content = MediaContent {
        body: attachment.filename,
        url,
        file: attachment.file,
        info,
        relates_to: related.map(|r| Relation::reply_to(&r.related_event)),
    };

    match kind {
        MediaKind::Image => Message::Image(content),
        MediaKind::File => Message::File(content),
        MediaKind::Audio => Message::Audio(content),
        MediaKind::Video => Message::Video(content),
    }
}

/// Quotes the related body, citing its sender on the first line.
fn quote_body(related: &RelatedInfo) -> String {
    related
        .quoted_body
        .split('\n')
        .enumerate()
        .map(|(index, line)| match index {
            0 => format!("> <{}> {}", related.quoted_user, line),
            _ => format!("> {}", line),
        })
        .collect::<Vec<String>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        markup::MarkdownConverter,
        settings::UserSettings,
        timeline::events::create_encrypted_file,
    };

    fn settings(markdown: bool) -> UserSettings {
        UserSettings {
            markdown,
            ..Default::default()
        }
    }

    fn related() -> RelatedInfo {
        RelatedInfo {
            related_event: "$quoted:example.com".to_owned(),
            room_id: "!room:example.com".to_owned(),
            quoted_user: "alice".to_owned(),
            quoted_body: "line1\nline2".to_owned(),
            quoted_formatted_body: None,
        }
    }

    fn encrypted_file() -> EncryptedFile {
        create_encrypted_file("mxc://example.com/secret")
    }

    fn attachment() -> MediaAttachment {
        MediaAttachment {
            filename: "cat.png".to_owned(),
            url: "mxc://example.com/cat".to_owned(),
            file: None,
            mimetype: "image/png".to_owned(),
            size: 2048,
        }
    }

    #[test]
    fn test_text_is_trimmed() {
        let message = build_text_message("  hello \n", None, &settings(false), &MarkdownConverter);
        assert_eq!(
            message,
            Message::Text(TextContent {
                body: "hello".to_owned(),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_text_without_markup_has_no_formatted_body() {
        let message = build_text_message("just words", None, &settings(true), &MarkdownConverter);
        let Message::Text(content) = message else {
            panic!("expected a text message");
        };
        assert_eq!(content.formatted_body, None);
        assert_eq!(content.format, None);
    }

    #[test]
    fn test_text_with_markup_has_formatted_body() {
        let message = build_text_message("*hello*", None, &settings(true), &MarkdownConverter);
        let Message::Text(content) = message else {
            panic!("expected a text message");
        };
        assert_eq!(content.body, "*hello*");
        assert_eq!(content.format.as_deref(), Some(HTML_FORMAT));
        assert_eq!(content.formatted_body.as_deref(), Some("<em>hello</em>"));
    }

    #[test]
    fn test_markup_ignored_when_markdown_disabled() {
        let message = build_text_message("*hello*", None, &settings(false), &MarkdownConverter);
        assert_eq!(message.formatted_body(), None);
    }

    #[test]
    fn test_reply_body() {
        let related = related();
        let message = build_text_message("hi", Some(&related), &settings(true), &MarkdownConverter);

        assert_eq!(message.body(), "> <alice> line1\n> line2\n\nhi");
        assert_eq!(message.in_reply_to(), Some("$quoted:example.com"));
        assert!(!message.formatted_body().unwrap().is_empty());
    }

    #[test]
    fn test_reply_always_formatted_without_markdown() {
        let related = related();
        let message =
            build_text_message("a < b", Some(&related), &settings(false), &MarkdownConverter);

        let Message::Text(content) = message else {
            panic!("expected a text message");
        };
        assert_eq!(content.format.as_deref(), Some(HTML_FORMAT));

        let formatted = content.formatted_body.unwrap();
        assert!(formatted.starts_with("<mx-reply><blockquote>"));
        assert!(formatted.contains("line1<br />line2"));
        assert!(formatted.ends_with("</mx-reply>a &lt; b"));
    }

    #[test]
    fn test_reply_uses_markdown_html_when_enabled() {
        let related = related();
        let message =
            build_text_message("**yes**", Some(&related), &settings(true), &MarkdownConverter);

        let formatted = message.formatted_body().unwrap();
        assert!(formatted.ends_with("</mx-reply><strong>yes</strong>"));
    }

    #[test]
    fn test_reply_quotes_formatted_body() {
        let mut related = related();
        related.quoted_formatted_body = Some("<b>line1</b>".to_owned());
        let message = build_text_message("hi", Some(&related), &settings(true), &MarkdownConverter);

        assert!(message.formatted_body().unwrap().contains("<br /><b>line1</b>"));
    }

    #[test]
    fn test_emote() {
        let plain = build_emote_message(" waves ", &settings(true), &MarkdownConverter);
        assert_eq!(
            plain,
            Message::Emote(TextContent {
                body: "waves".to_owned(),
                ..Default::default()
            })
        );

        let rich = build_emote_message("waves _slowly_", &settings(true), &MarkdownConverter);
        assert_eq!(rich.formatted_body(), Some("waves <em>slowly</em>"));
    }

    #[test]
    fn test_image_message() {
        let message = build_media_message(
            MediaKind::Image,
            attachment(),
            Some(Dimensions {
                width: 640,
                height: 480,
            }),
            Some("LEHV6nWB2yk8".to_owned()),
            None,
        );

        assert_eq!(
            message,
            Message::Image(MediaContent {
                body: "cat.png".to_owned(),
                url: Some("mxc://example.com/cat".to_owned()),
                file: None,
                info: MediaInfo {
                    mimetype: Some("image/png".to_owned()),
                    size: Some(2048),
                    w: Some(640),
                    h: Some(480),
                    blurhash: Some("LEHV6nWB2yk8".to_owned()),
                },
                relates_to: None,
            })
        );
    }

    #[test]
    fn test_file_message_drops_image_fields() {
        let message = build_media_message(
            MediaKind::File,
            attachment(),
            Some(Dimensions {
                width: 640,
                height: 480,
            }),
            Some("LEHV6nWB2yk8".to_owned()),
            Some(&related()),
        );

        let Message::File(content) = message else {
            panic!("expected a file message");
        };
        assert_eq!(content.info.w, None);
        assert_eq!(content.info.h, None);
        assert_eq!(content.info.blurhash, None);
        assert_eq!(
            content.relates_to,
            Some(Relation::reply_to("$quoted:example.com"))
        );
    }

    #[test]
    fn test_encrypted_media_has_no_url() {
        let mut attachment = attachment();
        attachment.file = Some(encrypted_file());

        let message = build_media_message(MediaKind::Video, attachment, None, None, None);
        let Message::Video(content) = message else {
            panic!("expected a video message");
        };
        assert_eq!(content.url, None);
        assert_eq!(
            content.file.map(|file| file.url.to_string()),
            Some("mxc://example.com/secret".to_owned())
        );
    }

    #[test]
    fn test_media_kind_from_mime() {
        assert_eq!(MediaKind::from_mime(&mime::IMAGE_PNG), MediaKind::Image);
        assert_eq!(
            MediaKind::from_mime(&"audio/ogg".parse().unwrap()),
            MediaKind::Audio
        );
        assert_eq!(
            MediaKind::from_mime(&"video/mp4".parse().unwrap()),
            MediaKind::Video
        );
        assert_eq!(
            MediaKind::from_mime(&mime::APPLICATION_PDF),
            MediaKind::File
        );
    }
}
