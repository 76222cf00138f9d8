//! Callback token protocol
//!
//! Inline buttons carry a short token, either the compact colon form
//! (`prefix:arg1[:arg2]`) or a legacy JSON object with an `action` field.
//! [`CallbackAction::decode`] turns the raw string into a typed action once,
//! at the boundary; handlers never look at the string again.

use crate::error::{AssistantError, Result};
use crate::store::FeedbackReason;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

/// Opaque message references are cut to this many characters so the whole
/// token stays under Telegram's 64-byte callback limit.
pub const OPAQUE_ID_LEN: usize = 8;

/// Sub-actions of `pref:`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefAction {
    View,
    Set(String),
    Delete(String),
}

/// Every interaction an inline button can trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// `fb:<rating>:<id>`
    Feedback { rating: i64, opaque_id: String },
    /// `df:<reason>:<id>`
    DetailedFeedback {
        reason: FeedbackReason,
        opaque_id: String,
    },
    /// `cn:<id>`
    CancelPicker { opaque_id: String },
    /// `menu:<section>`
    Menu(String),
    /// `help:<section>`
    Help(String),
    /// `tr:<language code>`
    Translate(String),
    /// `sum:<style>`
    Summarize(String),
    /// `gen:<content type>`
    Generate(String),
    /// `regen:<content type>:<prompt prefix>`
    Regenerate {
        content_type: String,
        prompt_prefix: String,
    },
    /// `reset:<confirm|cancel>`
    Reset(String),
    /// `pref:view`, `pref:set:<key>`, `pref:delete:<key>`
    Pref(PrefAction),
    /// `prefval:<key>:<value>`
    PrefValue { key: String, value: String },
    /// `prefcustom:<key>`
    PrefCustom(String),
    /// `prefconfirm:delete:<key>`
    PrefConfirmDelete(String),
    /// Legacy JSON `{"action": "quick_reply", "query": ..}`
    QuickReply(Option<String>),
    /// Legacy JSON `{"action": "more_info", "type": ..}`
    MoreInfo(Option<String>),
    /// Legacy JSON `{"action": "cancel"}`
    Cancel,
    /// Legacy JSON with an action we do not know
    UnknownAction(String),
    /// Neither a recognized compact token nor JSON
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct LegacyPayload {
    action: Option<String>,
    query: Option<String>,
    #[serde(rename = "type")]
    info_type: Option<String>,
}

impl LegacyPayload {
    fn parse(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|e| AssistantError::Protocol(e.to_string()))
    }
}

/// Rewrite truncated `pref:view` labels (`pref:vi`, `pref:viw`, ...) back to
/// `pref:view`. Only the exact near-miss forms qualify.
pub fn normalize(data: &str) -> &str {
    const NEAR_MISSES: [&str; 6] = ["viw", "vew", "vie", "viev", "vi", "ve"];

    if let Some(rest) = data.strip_prefix("pref:") {
        if rest != "view" && NEAR_MISSES.contains(&rest) {
            warn!(token = data, "Fixing typo in callback data -> pref:view");
            return "pref:view";
        }
    }
    data
}

impl CallbackAction {
    /// Decode a raw callback token. Never fails; unknown input becomes
    /// [`CallbackAction::Unsupported`].
    pub fn decode(raw: &str) -> Self {
        let data = normalize(raw);

        if data.contains(':') {
            if let Some(action) = Self::decode_compact(data) {
                return action;
            }
        }

        Self::decode_legacy(data)
    }

    fn decode_compact(data: &str) -> Option<Self> {
        let parts: Vec<&str> = data.split(':').collect();
        let arg = |i: usize| parts.get(i).map(|s| s.to_string());
        // last argument keeps any further colons
        let rest = |i: usize| (parts.len() > i).then(|| parts[i..].join(":"));

        let action = match parts[0] {
            "fb" if parts.len() >= 3 => {
                let rating: i64 = parts[1].trim().parse().ok()?;
                if !(1..=5).contains(&rating) {
                    return None;
                }
                Self::Feedback {
                    rating,
                    opaque_id: arg(2)?,
                }
            }
            "df" if parts.len() >= 3 => Self::DetailedFeedback {
                reason: FeedbackReason::from_code(parts[1]),
                opaque_id: arg(2)?,
            },
            "cn" if parts.len() >= 2 => Self::CancelPicker { opaque_id: arg(1)? },
            "menu" if parts.len() >= 2 => Self::Menu(arg(1)?),
            "help" if parts.len() >= 2 => Self::Help(arg(1)?),
            "tr" if parts.len() >= 2 => Self::Translate(arg(1)?),
            "sum" if parts.len() >= 2 => Self::Summarize(arg(1)?),
            "gen" if parts.len() >= 2 => Self::Generate(arg(1)?),
            "regen" if parts.len() >= 3 => Self::Regenerate {
                content_type: arg(1)?,
                prompt_prefix: rest(2)?,
            },
            "reset" if parts.len() >= 2 => Self::Reset(arg(1)?),
            "pref" if parts.len() >= 3 => match parts[1] {
                "view" => Self::Pref(PrefAction::View),
                "set" => Self::Pref(PrefAction::Set(arg(2)?)),
                "delete" => Self::Pref(PrefAction::Delete(arg(2)?)),
                _ => return None,
            },
            "pref" if parts.len() == 2 && parts[1] == "view" => Self::Pref(PrefAction::View),
            "prefval" if parts.len() >= 3 => Self::PrefValue {
                key: arg(1)?,
                value: rest(2)?,
            },
            "prefcustom" if parts.len() >= 2 => Self::PrefCustom(arg(1)?),
            "prefconfirm" if parts.len() >= 3 && parts[1] == "delete" => {
                Self::PrefConfirmDelete(arg(2)?)
            }
            _ => return None,
        };
        Some(action)
    }

    fn decode_legacy(data: &str) -> Self {
        let payload = match LegacyPayload::parse(data) {
            Ok(p) => p,
            Err(e) => {
                warn!(token = data, error = %e, "Invalid callback data format");
                return Self::Unsupported;
            }
        };

        match payload.action.as_deref() {
            Some("quick_reply") => Self::QuickReply(payload.query),
            Some("more_info") => Self::MoreInfo(payload.info_type),
            Some("cancel") => Self::Cancel,
            other => {
                let action = other.unwrap_or("none").to_string();
                warn!(action = %action, "Unknown callback action");
                Self::UnknownAction(action)
            }
        }
    }

    /// Encode back into a token. Compact actions use the colon form;
    /// legacy actions are written as JSON.
    pub fn encode(&self) -> String {
        match self {
            Self::Feedback { rating, opaque_id } => {
                format!("fb:{}:{}", rating, short_id(opaque_id))
            }
            Self::DetailedFeedback { reason, opaque_id } => {
                let code = match reason {
                    FeedbackReason::NotHelpful => "nh",
                    FeedbackReason::Incorrect => "ic",
                    FeedbackReason::Inappropriate => "ia",
                    FeedbackReason::Other => "ot",
                };
                format!("df:{}:{}", code, short_id(opaque_id))
            }
            Self::CancelPicker { opaque_id } => format!("cn:{}", short_id(opaque_id)),
            Self::Menu(section) => format!("menu:{}", section),
            Self::Help(section) => format!("help:{}", section),
            Self::Translate(code) => format!("tr:{}", code),
            Self::Summarize(style) => format!("sum:{}", style),
            Self::Generate(kind) => format!("gen:{}", kind),
            Self::Regenerate {
                content_type,
                prompt_prefix,
            } => format!("regen:{}:{}", content_type, prompt_prefix),
            Self::Reset(action) => format!("reset:{}", action),
            Self::Pref(PrefAction::View) => "pref:view".to_string(),
            Self::Pref(PrefAction::Set(key)) => format!("pref:set:{}", key),
            Self::Pref(PrefAction::Delete(key)) => format!("pref:delete:{}", key),
            Self::PrefValue { key, value } => format!("prefval:{}:{}", key, value),
            Self::PrefCustom(key) => format!("prefcustom:{}", key),
            Self::PrefConfirmDelete(key) => format!("prefconfirm:delete:{}", key),
            Self::QuickReply(query) => json!({ "action": "quick_reply", "query": query }).to_string(),
            Self::MoreInfo(info_type) => json!({ "action": "more_info", "type": info_type }).to_string(),
            Self::Cancel => json!({ "action": "cancel" }).to_string(),
            Self::UnknownAction(action) => json!({ "action": action }).to_string(),
            Self::Unsupported => "unsupported".to_string(),
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Feedback { .. } => "feedback",
            Self::DetailedFeedback { .. } => "detailed_feedback",
            Self::CancelPicker { .. } => "cancel_picker",
            Self::Menu(_) => "menu",
            Self::Help(_) => "help",
            Self::Translate(_) => "translate",
            Self::Summarize(_) => "summarize",
            Self::Generate(_) => "generate",
            Self::Regenerate { .. } => "regenerate",
            Self::Reset(_) => "reset",
            Self::Pref(_) => "pref",
            Self::PrefValue { .. } => "prefval",
            Self::PrefCustom(_) => "prefcustom",
            Self::PrefConfirmDelete(_) => "prefconfirm",
            Self::QuickReply(_) => "quick_reply",
            Self::MoreInfo(_) => "more_info",
            Self::Cancel => "cancel",
            Self::UnknownAction(_) => "unknown_action",
            Self::Unsupported => "unsupported",
        }
    }
}

/// First [`OPAQUE_ID_LEN`] characters of an opaque id
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(OPAQUE_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_decode() {
        assert_eq!(
            CallbackAction::decode("fb:2:abcd1234"),
            CallbackAction::Feedback {
                rating: 2,
                opaque_id: "abcd1234".into()
            }
        );
    }

    #[test]
    fn test_feedback_rating_out_of_range() {
        assert_eq!(CallbackAction::decode("fb:9:abc"), CallbackAction::Unsupported);
        assert_eq!(CallbackAction::decode("fb:x:abc"), CallbackAction::Unsupported);
    }

    #[test]
    fn test_arity_too_short_is_unrecognized() {
        assert_eq!(CallbackAction::decode("fb:5"), CallbackAction::Unsupported);
        assert_eq!(CallbackAction::decode("regen:poem"), CallbackAction::Unsupported);
        assert_eq!(CallbackAction::decode("prefval:tone"), CallbackAction::Unsupported);
    }

    #[test]
    fn test_detailed_feedback_reason_map() {
        let decoded = CallbackAction::decode("df:zz:abc");
        assert!(matches!(
            decoded,
            CallbackAction::DetailedFeedback {
                reason: FeedbackReason::Other,
                ..
            }
        ));
    }

    #[test]
    fn test_pref_typo_window() {
        for typo in ["pref:viw", "pref:vew", "pref:vie", "pref:viev", "pref:vi", "pref:ve"] {
            assert_eq!(
                CallbackAction::decode(typo),
                CallbackAction::Pref(PrefAction::View),
                "{}",
                typo
            );
        }
        assert_eq!(CallbackAction::decode("pref:viewx"), CallbackAction::Unsupported);
        assert_eq!(normalize("pref:view"), "pref:view");
        // only the pref namespace is rewritten
        assert_eq!(normalize("menu:viw"), "menu:viw");
    }

    #[test]
    fn test_pref_sub_actions() {
        assert_eq!(
            CallbackAction::decode("pref:set:tone"),
            CallbackAction::Pref(PrefAction::Set("tone".into()))
        );
        assert_eq!(
            CallbackAction::decode("pref:delete:language"),
            CallbackAction::Pref(PrefAction::Delete("language".into()))
        );
        assert_eq!(CallbackAction::decode("pref:bogus:tone"), CallbackAction::Unsupported);
    }

    #[test]
    fn test_regen_prefix_keeps_colons() {
        assert_eq!(
            CallbackAction::decode("regen:poem:a:b"),
            CallbackAction::Regenerate {
                content_type: "poem".into(),
                prompt_prefix: "a:b".into()
            }
        );
    }

    #[test]
    fn test_legacy_json() {
        assert_eq!(
            CallbackAction::decode(r#"{"action":"quick_reply","query":"help"}"#),
            CallbackAction::QuickReply(Some("help".into()))
        );
        assert_eq!(
            CallbackAction::decode(r#"{"action":"more_info","type":"features"}"#),
            CallbackAction::MoreInfo(Some("features".into()))
        );
        assert_eq!(CallbackAction::decode(r#"{"action":"cancel"}"#), CallbackAction::Cancel);
        assert_eq!(
            CallbackAction::decode(r#"{"action":"launch"}"#),
            CallbackAction::UnknownAction("launch".into())
        );
    }

    #[test]
    fn test_garbage_is_unsupported() {
        assert_eq!(CallbackAction::decode("garbage_not_json"), CallbackAction::Unsupported);
        assert_eq!(CallbackAction::decode("nope:x"), CallbackAction::Unsupported);
    }

    #[test]
    fn test_encode_truncates_opaque_id() {
        let action = CallbackAction::Feedback {
            rating: 5,
            opaque_id: "0123456789abcdef".into(),
        };
        let token = action.encode();
        assert_eq!(token, "fb:5:01234567");
        assert!(matches!(
            CallbackAction::decode(&token),
            CallbackAction::Feedback { rating: 5, ref opaque_id } if opaque_id == "01234567"
        ));
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id("regen_12345_poem"), "regen_12");
    }
}
