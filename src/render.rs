//! Response Renderer
//!
//! Builds transport-neutral replies: HTML text plus an inline keyboard of
//! callback tokens. `telegram` turns these into teloxide calls.

use crate::callback::CallbackAction;
use once_cell::sync::Lazy;
use regex::Regex;

/// Telegram rejects messages over 4096 chars; stay below with room for tags
pub const MAX_MESSAGE_CHARS: usize = 4000;

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").unwrap());
static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*\n]+)\*\*").unwrap());

/// One inline button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub data: String,
}

impl Button {
    pub fn new(text: impl Into<String>, action: &CallbackAction) -> Self {
        Self {
            text: text.into(),
            data: action.encode(),
        }
    }
}

/// Rows of buttons
pub type Keyboard = Vec<Vec<Button>>;

/// A renderable reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub text: String,
    /// Parse `text` as Telegram HTML
    pub html: bool,
    pub buttons: Keyboard,
}

impl Response {
    /// Unformatted text, no buttons
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            html: false,
            buttons: Vec::new(),
        }
    }

    /// HTML body with no title
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            text: body.into(),
            html: true,
            buttons: Vec::new(),
        }
    }

    /// Title in bold, body, optional footer in italics. `body` must already
    /// be HTML-safe.
    pub fn template(title: &str, body: &str, footer: Option<&str>) -> Self {
        let mut text = format!("<b>{}</b>\n\n{}", html_escape(title), body);
        if let Some(footer) = footer {
            text.push_str(&format!("\n\n<i>{}</i>", html_escape(footer)));
        }
        Self {
            text,
            html: true,
            buttons: Vec::new(),
        }
    }

    pub fn with_buttons(mut self, buttons: Keyboard) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn has_buttons(&self) -> bool {
        !self.buttons.is_empty()
    }

    /// Text with markup removed, used when Telegram refuses the HTML
    pub fn plain_text(&self) -> String {
        if self.html {
            strip_html(&self.text)
        } else {
            self.text.clone()
        }
    }
}

// ============ Escaping ============

pub fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Remove tags and undo [`html_escape`]
pub fn strip_html(html: &str) -> String {
    RE_TAG
        .replace_all(html, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Convert the markdown an LLM tends to emit into Telegram HTML.
///
/// Handles fenced blocks, inline code and `**bold**`; everything else is
/// escaped verbatim.
pub fn llm_to_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 32);
    let mut in_fence = false;

    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if line.trim_start().starts_with("```") {
            out.push_str(if in_fence { "</code></pre>" } else { "<pre><code>" });
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            out.push_str(&html_escape(line));
        } else {
            out.push_str(&inline_markdown(line));
        }
    }

    if in_fence {
        out.push_str("</code></pre>");
    }
    out
}

fn inline_markdown(line: &str) -> String {
    // odd-indexed segments sit between backticks
    let mut out = String::new();
    let segments: Vec<&str> = line.split('`').collect();
    let closed = segments.len() % 2 == 1;

    for (i, segment) in segments.iter().enumerate() {
        let is_code = i % 2 == 1 && (closed || i + 1 < segments.len());
        if is_code {
            out.push_str("<code>");
            out.push_str(&html_escape(segment));
            out.push_str("</code>");
        } else {
            if i % 2 == 1 {
                out.push('`');
            }
            let escaped = html_escape(segment);
            out.push_str(&RE_BOLD.replace_all(&escaped, "<b>$1</b>"));
        }
    }
    out
}

/// Split text into chunks of at most `max` chars, preferring line breaks
pub fn split_chunks(text: &str, max: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut remaining = text;

    while remaining.chars().count() > max {
        let hard = remaining
            .char_indices()
            .nth(max)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let cut = remaining[..hard]
            .rfind('\n')
            .filter(|&i| i > 0)
            .map(|i| i + 1)
            .unwrap_or(hard);
        let (chunk, rest) = remaining.split_at(cut);
        chunks.push(chunk);
        remaining = rest;
    }
    if !remaining.is_empty() || chunks.is_empty() {
        chunks.push(remaining);
    }
    chunks
}

/// Truncate to `max` chars, appending "..." when cut
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Uppercase the first letter
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============ Inline Keyboards ============

/// Thumbs up / down for an answer
pub fn feedback_buttons(opaque_id: &str) -> Keyboard {
    vec![vec![
        Button::new(
            "👍",
            &CallbackAction::Feedback {
                rating: 5,
                opaque_id: opaque_id.to_string(),
            },
        ),
        Button::new(
            "👎",
            &CallbackAction::Feedback {
                rating: 1,
                opaque_id: opaque_id.to_string(),
            },
        ),
    ]]
}

/// Feedback controls plus a regenerate control on the first row
pub fn regenerate_buttons(opaque_id: &str, content_type: &str, prompt: &str) -> Keyboard {
    let mut rows = feedback_buttons(opaque_id);
    let prefix: String = prompt.chars().take(10).filter(|c| *c != ':').collect();
    rows[0].push(Button::new(
        "🔄 Regenerate",
        &CallbackAction::Regenerate {
            content_type: content_type.to_string(),
            prompt_prefix: prefix,
        },
    ));
    rows
}

/// Secondary picker shown after a low rating
pub fn feedback_reason_picker(opaque_id: &str) -> Keyboard {
    use crate::store::FeedbackReason::*;
    let reason = |reason| CallbackAction::DetailedFeedback {
        reason,
        opaque_id: opaque_id.to_string(),
    };
    vec![
        vec![
            Button::new("It wasn't helpful", &reason(NotHelpful)),
            Button::new("It was incorrect", &reason(Incorrect)),
        ],
        vec![
            Button::new("It was inappropriate", &reason(Inappropriate)),
            Button::new(
                "No thanks",
                &CallbackAction::CancelPicker {
                    opaque_id: opaque_id.to_string(),
                },
            ),
        ],
    ]
}

/// Five-to-one star ratings, one per row, used by `/feedback`
pub fn rating_picker(opaque_id: &str) -> Keyboard {
    (1..=5)
        .rev()
        .map(|rating| {
            vec![Button::new(
                "⭐".repeat(rating as usize),
                &CallbackAction::Feedback {
                    rating,
                    opaque_id: opaque_id.to_string(),
                },
            )]
        })
        .collect()
}

/// Lay buttons out `per_row` at a time
pub fn rows_of(buttons: Vec<Button>, per_row: usize) -> Keyboard {
    buttons
        .chunks(per_row.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_escapes_title() {
        let r = Response::template("A < B", "body", Some("foot & note"));
        assert!(r.text.starts_with("<b>A &lt; B</b>"));
        assert!(r.text.ends_with("<i>foot &amp; note</i>"));
        assert!(r.html);
    }

    #[test]
    fn test_plain_text_fallback() {
        let r = Response::template("Title", "x &lt; y", None);
        assert_eq!(r.plain_text(), "Title\n\nx < y");
    }

    #[test]
    fn test_llm_to_html() {
        let html = llm_to_html("Use `a<b` and **bold**\n```rust\nfn main() {}\n```");
        assert!(html.contains("<code>a&lt;b</code>"));
        assert!(html.contains("<b>bold</b>"));
        assert!(html.contains("<pre><code>\nfn main() {}\n</code></pre>"));
    }

    #[test]
    fn test_unclosed_backtick_is_literal() {
        assert_eq!(llm_to_html("it`s"), "it`s");
    }

    #[test]
    fn test_split_chunks() {
        let text = "aaaa\nbbbb\ncccc";
        let chunks = split_chunks(text, 6);
        assert_eq!(chunks, vec!["aaaa\n", "bbbb\n", "cccc"]);
        assert_eq!(split_chunks("", 10), vec![""]);
        assert_eq!(split_chunks("abcdef", 4), vec!["abcd", "ef"]);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hello...");
    }

    #[test]
    fn test_feedback_reason_picker_tokens() {
        let picker = feedback_reason_picker("0123456789");
        let tokens: Vec<&str> = picker.iter().flatten().map(|b| b.data.as_str()).collect();
        assert_eq!(
            tokens,
            vec!["df:nh:01234567", "df:ic:01234567", "df:ia:01234567", "cn:01234567"]
        );
    }

    #[test]
    fn test_regenerate_prefix() {
        let rows = regenerate_buttons("id", "poem", "about: the sea at night");
        assert_eq!(rows[0][2].data, "regen:poem:about the");
    }

    #[test]
    fn test_rows_of() {
        let buttons = (0..5)
            .map(|i| Button::new(i.to_string(), &CallbackAction::Menu(i.to_string())))
            .collect();
        let rows = rows_of(buttons, 2);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].len(), 1);
    }
}
