//! Markdown to HTML conversion and HTML helpers for message bodies.
//!
//! Message bodies typed by the user are interpreted as markdown and rendered
//! to the HTML subset accepted in Matrix `formatted_body` fields.

use pulldown_cmark::{Event, Options, Parser, html};

/// Converts a plain message body into rich markup.
pub trait MarkupConverter: Send + Sync {
    /// Renders `text` to HTML.
    fn to_html(&self, text: &str) -> String;
}

/// [`MarkupConverter`] rendering CommonMark with `pulldown-cmark`.
///
/// Line breaks typed by the user are kept as `<br />`, and a body made of a
/// single paragraph is returned without its `<p>` wrapper, so plain text
/// renders to itself (HTML-escaped).
#[derive(Clone, Copy, Debug, Default)]
pub struct MarkdownConverter;

impl MarkupConverter for MarkdownConverter {
    fn to_html(&self, text: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);

        let parser = Parser::new_ext(text, options).map(|event| match event {
            Event::SoftBreak => Event::HardBreak,
            event => event,
        });

        let mut output = String::new();
        html::push_html(&mut output, parser);

        strip_single_paragraph(output.trim_end()).to_owned()
    }
}

fn strip_single_paragraph(html: &str) -> &str {
    match html
        .strip_prefix("<p>")
        .and_then(|inner| inner.strip_suffix("</p>"))
    {
        Some(inner) if !inner.contains("<p>") => inner,
        _ => html,
    }
}

/// Whether rendered HTML carries any tag.
///
/// Rendering plain text only escapes it, so a result without `<` is not
/// worth sending as a `formatted_body`.
pub fn has_markup(html: &str) -> bool {
    html.contains('<')
}

/// Escapes the HTML special characters of `text`.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    // Writing to a String cannot fail
    let _ = pulldown_cmark_escape::escape_html(&mut escaped, text);
    escaped
}

/// Builds the HTML of a rich reply.
///
/// The quoted event is wrapped in an `mx-reply` block linking to the event
/// and its sender, and the reply's own HTML follows it.
///
/// # Arguments
///
/// * `room_id` - Room of the quoted event
/// * `event_id` - Id of the quoted event
/// * `quoted_user` - Sender of the quoted event
/// * `quoted_html` - HTML of the quoted body
/// * `reply_html` - HTML of the new message
pub fn reply_html(
    room_id: &str,
    event_id: &str,
    quoted_user: &str,
    quoted_html: &str,
    reply_html: &str,
) -> String {
    format!(
        "<mx-reply><blockquote>\
         <a href=\"https://matrix.to/#/{room}/{event}\">In reply to</a> \
         <a href=\"https://matrix.to/#/{user}\">{user}</a><br />{quoted_html}\
         </blockquote></mx-reply>{reply_html}",
        room = escape_html(room_id),
        event = escape_html(event_id),
        user = escape_html(quoted_user),
    )
}

/// Renders a plain quoted body for inclusion in [`reply_html`].
pub fn plain_to_html(body: &str) -> String {
    escape_html(body).replace('\n', "<br />")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_has_no_markup() {
        let html = MarkdownConverter.to_html("hello world");
        assert_eq!(html, "hello world");
        assert!(!has_markup(&html));
    }

    #[test]
    fn test_plain_text_is_escaped() {
        let html = MarkdownConverter.to_html("fish & chips");
        assert_eq!(html, "fish &amp; chips");
        assert!(!has_markup(&html));
    }

    #[test]
    fn test_emphasis_has_markup() {
        let html = MarkdownConverter.to_html("**bold** move");
        assert_eq!(html, "<strong>bold</strong> move");
        assert!(has_markup(&html));
    }

    #[test]
    fn test_line_breaks_are_kept() {
        let html = MarkdownConverter.to_html("one\ntwo");
        assert_eq!(html, "one<br />\ntwo");
    }

    #[test]
    fn test_multiple_paragraphs_keep_wrappers() {
        let html = MarkdownConverter.to_html("one\n\ntwo");
        assert_eq!(html, "<p>one</p>\n<p>two</p>");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<a href=\"x\">&</a>"),
            "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_escape_html_single_quote() {
        assert_eq!(escape_html("it's <b>"), "it&#39;s &lt;b&gt;");
    }

    #[test]
    fn test_plain_to_html() {
        assert_eq!(plain_to_html("a < b\nc"), "a &lt; b<br />c");
    }

    #[test]
    fn test_reply_html() {
        let html = reply_html("!room:x", "$event:x", "@alice:x", "quoted", "<em>new</em>");
        assert_eq!(
            html,
            "<mx-reply><blockquote>\
             <a href=\"https://matrix.to/#/!room:x/$event:x\">In reply to</a> \
             <a href=\"https://matrix.to/#/@alice:x\">@alice:x</a><br />quoted\
             </blockquote></mx-reply><em>new</em>"
        );
    }
}
