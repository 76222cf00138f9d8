//! Preference screens shared by commands, callbacks and the pending-value path

use crate::callback::{CallbackAction, PrefAction};
use crate::render::{capitalize, html_escape, rows_of, Button, Keyboard, Response};
use crate::store::Preferences;

/// Keys offered in the UI. The store accepts any key.
pub const PREFERENCE_KEYS: [&str; 5] = ["language", "tone", "length", "expertise", "interests"];

const SETTINGS_FOOTER: &str =
    "Preferences help me personalize my responses to better match your needs.";

pub fn is_known_key(key: &str) -> bool {
    PREFERENCE_KEYS.contains(&key)
}

pub fn emoji(key: &str) -> &'static str {
    match key.to_lowercase().as_str() {
        "language" => "🌐",
        "tone" => "🔊",
        "length" => "📏",
        "expertise" => "📚",
        "interests" => "🎯",
        _ => "⚙️",
    }
}

/// Predefined values for a key; unknown keys have none
pub fn options(key: &str) -> &'static [&'static str] {
    match key.to_lowercase().as_str() {
        "language" => &[
            "English", "Spanish", "French", "German", "Chinese", "Japanese", "Russian", "Arabic",
        ],
        "tone" => &["Formal", "Professional", "Casual", "Friendly", "Technical", "Simple"],
        "length" => &["Very Short", "Short", "Medium", "Detailed", "Comprehensive"],
        "expertise" => &["Beginner", "Intermediate", "Advanced", "Expert", "Technical"],
        "interests" => &[
            "Technology", "Science", "Arts", "Business", "Sports", "Health", "Education",
        ],
        _ => &[],
    }
}

pub fn description(key: &str) -> &'static str {
    match key.to_lowercase().as_str() {
        "language" => "This sets your preferred language for responses. I'll try to respond in this language when appropriate.",
        "tone" => "This sets how formal or casual you want my responses to be.",
        "length" => "This sets how detailed you want my responses to be. Choose 'Short' for brief answers or 'Comprehensive' for detailed explanations.",
        "expertise" => "This sets the technical level of my responses. Choose 'Beginner' for simpler explanations or 'Expert' for more technical details.",
        "interests" => "This helps me personalize content based on topics you care about. You can list multiple interests separated by commas.",
        _ => "This preference helps personalize my responses to better match your needs.",
    }
}

fn category_summary(key: &str) -> &'static str {
    match key {
        "language" => "Your preferred language for responses",
        "tone" => "How formal or casual you want responses to be",
        "length" => "How detailed you want responses to be",
        "expertise" => "The level of technical detail in responses",
        _ => "Topics you're interested in",
    }
}

fn label(key: &str) -> String {
    format!("<b>{}</b>", html_escape(&capitalize(key)))
}

/// One bullet line per preference
fn bullet_lines(prefs: &Preferences) -> Vec<String> {
    prefs
        .iter()
        .map(|(key, value)| format!("• {} {}: {}", emoji(key), label(key), html_escape(value)))
        .collect()
}

fn set_button(key: &str, text: String) -> Button {
    Button::new(text, &CallbackAction::Pref(PrefAction::Set(key.to_string())))
}

fn delete_button(key: &str) -> Button {
    Button::new(
        format!("🗑️ Delete {} {}", emoji(key), capitalize(key)),
        &CallbackAction::Pref(PrefAction::Delete(key.to_string())),
    )
}

fn view_all_row() -> Vec<Button> {
    vec![Button::new(
        "📑 View All Preferences",
        &CallbackAction::Pref(PrefAction::View),
    )]
}

/// Language/Tone, Length/Expertise, Interests
fn category_rows() -> Keyboard {
    let buttons = PREFERENCE_KEYS
        .iter()
        .map(|key| set_button(key, format!("{} {}", emoji(key), capitalize(key))))
        .collect();
    rows_of(buttons, 2)
}

/// "Set" buttons for every known key except `skip`
fn set_rows_except(skip: Option<&str>, per_row: usize) -> Keyboard {
    let buttons = PREFERENCE_KEYS
        .iter()
        .filter(|key| Some(**key) != skip)
        .map(|key| set_button(key, format!("Set {} {}", emoji(key), capitalize(key))))
        .collect();
    rows_of(buttons, per_row)
}

/// Current preferences with change and delete controls, or the
/// no-preferences screen when the map is empty
pub fn overview(prefs: &Preferences) -> Response {
    if prefs.is_empty() {
        return Response::template(
            "ℹ️ No Preferences",
            "You don't have any preferences set yet. Select a preference category below to set it.",
            Some(SETTINGS_FOOTER),
        )
        .with_buttons(category_rows());
    }

    let mut body = String::from("Your current preferences:\n\n");
    for line in bullet_lines(prefs) {
        body.push_str(&line);
        body.push('\n');
    }
    body.push_str("\nSelect a preference to change it or delete it.");

    let mut buttons = category_rows();
    buttons.extend(rows_of(prefs.keys().map(|k| delete_button(k)).collect(), 2));

    Response::template("⚙️ Preference Settings", &body, Some(SETTINGS_FOOTER)).with_buttons(buttons)
}

/// Confirmation after a value was stored
pub fn updated(key: &str, value: &str, prefs: &Preferences) -> Response {
    let body = format!(
        "Your {} {} preference has been set to '{}'.\n\nYour current preferences:\n\n{}",
        emoji(key),
        label(key),
        html_escape(value),
        bullet_lines(prefs).join("\n")
    );

    let mut buttons = set_rows_except(Some(key), 2);
    buttons.push(view_all_row());

    Response::template(
        "✅ Preference Updated",
        &body,
        Some("These preferences will be used to personalize my responses."),
    )
    .with_buttons(buttons)
}

/// Option list for one key plus a custom-value control
pub fn value_picker(key: &str) -> Response {
    let mut buttons: Keyboard = options(key)
        .iter()
        .map(|option| {
            vec![Button::new(
                *option,
                &CallbackAction::PrefValue {
                    key: key.to_string(),
                    value: option.to_string(),
                },
            )]
        })
        .collect();
    buttons.push(vec![Button::new(
        "✏️ Custom Value",
        &CallbackAction::PrefCustom(key.to_string()),
    )]);
    buttons.push(vec![Button::new(
        "⬅️ Back to Preferences",
        &CallbackAction::Pref(PrefAction::View),
    )]);

    Response::template(
        &format!("{} Set {} Preference", emoji(key), capitalize(key)),
        &format!(
            "Select a value for your {} preference or choose 'Custom Value' to enter your own.",
            html_escape(key)
        ),
        Some(description(key)),
    )
    .with_buttons(buttons)
}

/// Prompt shown while waiting for a free-text value
pub fn custom_value_prompt(key: &str) -> Response {
    Response::template(
        &format!("{} Custom {} Value", emoji(key), capitalize(key)),
        &format!(
            "Please send a message with your custom value for the {} preference.",
            html_escape(key)
        ),
        Some(description(key)),
    )
}

/// Yes/no before deleting `key`, showing its current value
pub fn confirm_delete(key: &str, current: &str) -> Response {
    let buttons = vec![vec![
        Button::new(
            "Yes, delete it",
            &CallbackAction::PrefConfirmDelete(key.to_string()),
        ),
        Button::new("No, keep it", &CallbackAction::Pref(PrefAction::View)),
    ]];

    Response::template(
        &format!("🗑️ Delete {} Preference", capitalize(key)),
        &format!(
            "Are you sure you want to delete your {} {} preference?\n\nCurrent value: {}",
            emoji(key),
            label(key),
            html_escape(current)
        ),
        Some("This action cannot be undone."),
    )
    .with_buttons(buttons)
}

/// After a delete: remaining preferences, or set controls when none remain
pub fn deleted(key: &str, remaining: &Preferences) -> Response {
    let (tail, buttons) = if remaining.is_empty() {
        (
            "You have no remaining preferences. Select an option above to set a new preference."
                .to_string(),
            set_rows_except(None, 1),
        )
    } else {
        let mut rows: Keyboard = remaining.keys().map(|k| vec![delete_button(k)]).collect();
        rows.push(view_all_row());
        (
            format!(
                "Your remaining preferences:\n\n{}",
                bullet_lines(remaining).join("\n")
            ),
            rows,
        )
    };

    Response::template(
        "✅ Preference Deleted",
        &format!(
            "Your {} {} preference has been deleted.\n\n{}",
            emoji(key),
            label(key),
            tail
        ),
        None,
    )
    .with_buttons(buttons)
}

/// `/setpreference` without arguments
pub fn category_picker() -> Response {
    let body = PREFERENCE_KEYS
        .iter()
        .map(|key| format!("{} {}: {}", emoji(key), label(key), category_summary(key)))
        .collect::<Vec<_>>()
        .join("\n");

    let mut buttons: Keyboard = PREFERENCE_KEYS
        .iter()
        .map(|key| vec![set_button(key, format!("{} {}", emoji(key), capitalize(key)))])
        .collect();
    buttons.push(vec![Button::new(
        "⬅️ Back to Main Menu",
        &CallbackAction::Menu("main".into()),
    )]);

    Response::template(
        "⚙️ Set Preference",
        &format!("Please select a preference category to set:\n\n{}", body),
        Some("Your preferences help me personalize my responses to better match your needs."),
    )
    .with_buttons(buttons)
}

pub fn invalid_key(key: &str) -> Response {
    Response::template(
        "❌ Invalid Preference",
        &format!(
            "'{}' is not a valid preference key. Please choose from the options below:",
            html_escape(key)
        ),
        None,
    )
    .with_buttons(set_rows_except(None, 1))
}

/// `/deletepreference` without arguments
pub fn delete_picker(prefs: &Preferences) -> Response {
    let mut buttons: Keyboard = prefs.keys().map(|k| vec![delete_button(k)]).collect();
    buttons.push(view_all_row());

    Response::template(
        "🗑️ Delete Preference",
        &format!(
            "Select a preference to delete:\n\n{}",
            bullet_lines(prefs).join("\n")
        ),
        Some("Deleting a preference will remove it from your profile."),
    )
    .with_buttons(buttons)
}

/// `/deletepreference` when nothing is stored
pub fn nothing_to_delete() -> Response {
    Response::template(
        "ℹ️ No Preferences",
        "You don't have any preferences set yet. Use /setpreference to set preferences.",
        Some("Example: /setpreference language Spanish"),
    )
}

/// `/deletepreference <key>` for a key the user has not set
pub fn not_set(key: &str, prefs: &Preferences) -> Response {
    let buttons: Keyboard = prefs.keys().map(|k| vec![delete_button(k)]).collect();
    Response::template(
        "❌ Invalid Preference",
        &format!(
            "You don't have a preference set for '{}'.\n\nYour current preferences are:\n\n{}",
            html_escape(key),
            bullet_lines(prefs).join("\n")
        ),
        None,
    )
    .with_buttons(buttons)
}
