//! Static menus and help screens

use crate::callback::{CallbackAction, PrefAction};
use crate::render::{Button, Keyboard, Response};

const LANGUAGES: [(&str, &str); 9] = [
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("zh", "Chinese"),
    ("ru", "Russian"),
    ("ar", "Arabic"),
];

pub const CONTENT_TYPES: [&str; 4] = ["poem", "story", "joke", "code"];

/// Display name for a `tr:` code; unknown codes pass through unchanged
pub fn language_name(code: &str) -> String {
    LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| code.to_string())
}

fn menu(section: &str) -> CallbackAction {
    CallbackAction::Menu(section.to_string())
}

fn help(section: &str) -> CallbackAction {
    CallbackAction::Help(section.to_string())
}

fn back_to_menu() -> Vec<Button> {
    vec![Button::new("⬅️ Back to Menu", &menu("main"))]
}

fn main_buttons() -> Keyboard {
    vec![
        vec![
            Button::new("🔍 Search", &menu("search")),
            Button::new("💬 Ask", &menu("ask")),
        ],
        vec![
            Button::new("🔄 Translate", &menu("translate")),
            Button::new("📋 Summarize", &menu("summarize")),
        ],
        vec![
            Button::new("⏰ Reminders", &menu("reminders")),
            Button::new("⚙️ Preferences", &menu("preferences")),
        ],
        vec![Button::new("✨ Generate Content", &menu("generate"))],
        vec![Button::new("📖 Help & Commands", &menu("help"))],
    ]
}

/// `/start`
pub fn welcome(first_name: &str) -> Response {
    let body = "I'm <b>Just Ask AI</b>, powered by Google's Gemini API.\n\n\
        <b>I can help you with:</b>\n\
        • Answering questions and having conversations\n\
        • Translating text between languages\n\
        • Summarizing long texts\n\
        • Generating creative content\n\
        • Searching the web for information\n\
        • Setting reminders and notifications\n\
        • Personalizing responses to your preferences";

    Response::template(
        &format!("👋 Hello, {}!", first_name),
        body,
        Some("Select a category below or just ask me something!"),
    )
    .with_buttons(main_buttons())
}

/// `menu:main`
pub fn main_menu(first_name: &str) -> Response {
    Response::template(
        &format!("👋 Hello, {}!", first_name),
        "I'm Just Ask AI, powered by Google's Gemini API.\n\n\
         I can help you with a variety of tasks. Select an option below to learn more or just ask me something!",
        None,
    )
    .with_buttons(main_buttons())
}

/// Help root. The callback version links back to the main menu.
pub fn help_menu(with_back: bool) -> Response {
    let mut last_row = vec![Button::new("📱 Show All Commands", &help("all"))];
    if with_back {
        last_row.push(Button::new("⬅️ Back to Menu", &menu("main")));
    }

    let buttons = vec![
        vec![
            Button::new("🔎 Core Commands", &help("core")),
            Button::new("📄 Info Retrieval", &help("info")),
        ],
        vec![
            Button::new("💻 Personalization", &help("personal")),
            Button::new("⏰ Task Automation", &help("tasks")),
        ],
        last_row,
    ];

    let footer = if with_back {
        None
    } else {
        Some("You can also just send me a message and I'll do my best to respond!")
    };

    Response::template(
        "🤖 Just Ask AI - Available Commands",
        "Select a category to see available commands or 'Show All Commands' to view everything at once.",
        footer,
    )
    .with_buttons(buttons)
}

pub fn language_buttons(with_back: bool) -> Keyboard {
    let mut rows: Keyboard = LANGUAGES
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .map(|(code, name)| Button::new(*name, &CallbackAction::Translate(code.to_string())))
                .collect()
        })
        .collect();
    if with_back {
        rows.push(back_to_menu());
    }
    rows
}

pub fn summary_buttons(with_back: bool) -> Keyboard {
    let style = |s: &str| CallbackAction::Summarize(s.to_string());
    let mut rows = vec![
        vec![
            Button::new("Short Summary", &style("short")),
            Button::new("Medium Summary", &style("medium")),
        ],
        vec![
            Button::new("Detailed Summary", &style("detailed")),
            Button::new("Key Points Only", &style("key")),
        ],
    ];
    if with_back {
        rows.push(back_to_menu());
    }
    rows
}

pub fn generation_buttons(with_back: bool) -> Keyboard {
    let kind = |k: &str| CallbackAction::Generate(k.to_string());
    let mut rows = vec![
        vec![
            Button::new("🌿 Poem", &kind("poem")),
            Button::new("📖 Story", &kind("story")),
        ],
        vec![
            Button::new("😄 Joke", &kind("joke")),
            Button::new("💻 Code", &kind("code")),
        ],
    ];
    if with_back {
        rows.push(back_to_menu());
    }
    rows
}

/// A `menu:<section>` screen. `None` for unknown sections.
pub fn menu_section(section: &str, first_name: &str) -> Option<Response> {
    let response = match section {
        "search" => Response::template(
            "🔍 Search",
            "You can search the web for information using the /search command.\n\n\
             Example: /search latest news about AI",
            Some("What would you like to search for?"),
        ),
        "ask" => Response::template(
            "💬 Ask a Question",
            "You can ask me factual questions using the /ask command.\n\n\
             Example: /ask What is the capital of France?",
            Some("What would you like to know?"),
        ),
        "translate" => Response::template(
            "🌎 Translation",
            "You can translate text using the /translate command.\n\n\
             Example: /translate Hello to Spanish\n\n\
             Or select a language below and then send the text you want to translate.",
            None,
        )
        .with_buttons(language_buttons(true)),
        "summarize" => Response::template(
            "📋 Text Summarization",
            "You can summarize text using the /summarize command.\n\n\
             Example: /summarize followed by the text you want to summarize\n\n\
             Or select a summary style below and then send the text you want to summarize.",
            None,
        )
        .with_buttons(summary_buttons(true)),
        "reminders" => Response::template(
            "⏰ Reminders",
            "You can set reminders using the /remind command.\n\n\
             Examples:\n\
             • /remind Call John in 30 minutes\n\
             • /remind Buy milk tomorrow at 10am\n\
             • /remind Meeting with team on Friday at 2pm\n\n\
             Use /reminders to view your active reminders and /cancelreminder to cancel a reminder.",
            Some("What would you like to be reminded about?"),
        ),
        "preferences" => Response::template(
            "⚙️ Preferences",
            "You can view and manage your preferences using these commands:\n\n\
             • /preferences - View your current preferences\n\
             • /setpreference - Set a preference (e.g., /setpreference language Spanish)\n\
             • /deletepreference - Delete a preference (e.g., /deletepreference language)",
            Some("Your preferences help me personalize my responses to you."),
        )
        .with_buttons(vec![vec![Button::new(
            "📑 View Preferences",
            &CallbackAction::Pref(PrefAction::View),
        )]]),
        "generate" => Response::template(
            "✨ Content Generation",
            "You can generate creative content using the /generate command.\n\n\
             Example: /generate poem about nature\n\n\
             Or select a content type below and then send your topic.",
            None,
        )
        .with_buttons(generation_buttons(true)),
        "help" => help_menu(true),
        "main" => main_menu(first_name),
        _ => return None,
    };
    Some(response)
}

/// A `help:<section>` screen with a link back to the help root.
/// `back` is handled by the caller; unknown sections give `None`.
pub fn help_section(section: &str) -> Option<Response> {
    let (title, body) = match section {
        "core" => (
            "🔎 Core Commands",
            "/start - Start the bot\n\
             /help - Show this help message\n\
             /translate - Translate text (usage: /translate Hello to Spanish)\n\
             /summarize - Summarize text (usage: /summarize followed by the text)\n\
             /generate - Generate creative content (usage: /generate poem about nature)\n\
             /reset - Reset conversation history",
        ),
        "info" => (
            "📄 Information Retrieval",
            "/search - Search the web (usage: /search latest news about AI)\n\
             /ask - Ask a factual question (usage: /ask What is the capital of France?)\n\
             /learn - Add to knowledge base (usage: /learn Question | Answer)",
        ),
        "personal" => (
            "💻 Personalization",
            "/preferences - View your preferences\n\
             /setpreference - Set a preference (usage: /setpreference language Spanish)\n\
             /deletepreference - Delete a preference (usage: /deletepreference language)",
        ),
        "tasks" => (
            "⏰ Task Automation",
            "/remind - Set a reminder (usage: /remind Call John in 30 minutes)\n\
             /reminders - View your active reminders\n\
             /cancelreminder - Cancel a reminder (usage: /cancelreminder 123)",
        ),
        "all" => ("🤖 All Available Commands", ALL_COMMANDS),
        _ => return None,
    };

    Some(
        Response::template(title, body, None).with_buttons(vec![vec![Button::new(
            "⬅️ Back to Help Menu",
            &help("back"),
        )]]),
    )
}

const ALL_COMMANDS: &str = "Core Commands:\n\
    /start - Start the bot\n\
    /help - Show this help message\n\
    /translate - Translate text\n\
    /summarize - Summarize text\n\
    /generate - Generate creative content\n\
    /reset - Reset conversation history\n\n\
    Information Retrieval:\n\
    /search - Search the web\n\
    /ask - Ask a factual question\n\
    /learn - Add to knowledge base\n\n\
    Personalization:\n\
    /preferences - View your preferences\n\
    /setpreference - Set a preference\n\
    /deletepreference - Delete a preference\n\n\
    Task Automation:\n\
    /remind - Set a reminder\n\
    /reminders - View your active reminders\n\
    /cancelreminder - Cancel a reminder\n\n\
    Feedback:\n\
    /feedback - Provide feedback about the bot";

/// Legacy `more_info` screens
pub fn more_info(kind: &str) -> Option<Response> {
    match kind {
        "commands" => Some(Response::template(
            "Available Commands",
            "Here are all the available commands:\n\n\
             /start - Start the bot\n\
             /help - Show help information\n\
             /translate - Translate text\n\
             /summarize - Summarize text\n\
             /generate - Generate creative content\n\
             /search - Search the web\n\
             /ask - Ask a question\n\
             /learn - Add to knowledge base\n\
             /preferences - View your preferences\n\
             /setpreference - Set a preference\n\
             /deletepreference - Delete a preference\n\
             /remind - Set a reminder\n\
             /reminders - View your reminders\n\
             /cancelreminder - Cancel a reminder\n\
             /reset - Reset conversation history\n\
             /feedback - Provide feedback",
            None,
        )),
        "features" => Some(Response::template(
            "Bot Features",
            "Just Ask AI can help you with:\n\n\
             • Answering questions\n\
             • Translating text\n\
             • Summarizing content\n\
             • Generating creative text\n\
             • Setting reminders\n\
             • Searching the web\n\
             • Storing personal preferences\n\
             • Learning new information",
            None,
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_name_fallback() {
        assert_eq!(language_name("es"), "Spanish");
        assert_eq!(language_name("pt"), "pt");
    }

    #[test]
    fn test_known_sections() {
        for section in [
            "search", "ask", "translate", "summarize", "reminders", "preferences", "generate",
            "help", "main",
        ] {
            assert!(menu_section(section, "Ana").is_some(), "{}", section);
        }
        assert!(menu_section("settings", "Ana").is_none());
    }

    #[test]
    fn test_help_sections_link_back() {
        let r = help_section("core").unwrap();
        assert_eq!(r.buttons[0][0].data, "help:back");
        assert!(help_section("back").is_none());
    }

    #[test]
    fn test_language_grid() {
        let rows = language_buttons(true);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0][1].data, "tr:es");
        assert_eq!(rows[3][0].data, "menu:main");
    }
}
