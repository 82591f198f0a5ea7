//! Form payloads sent to the webhook endpoints and the response shapes they
//! return.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    domain::{ChannelId, PostId, Settings},
    error::DomainFailure,
};

#[derive(Debug, Clone, Serialize)]
pub struct PostIdForm {
    pub id: PostId,
}

/// Edits always carry the link so a cleared one reaches the backend as `link=`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdatePostForm {
    pub id: PostId,
    pub title: String,
    pub text: String,
    pub link: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPostForm {
    pub title: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TitleForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<PostId>,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<PostId>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<PostId>,
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelUrlForm {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelIdForm {
    pub id: ChannelId,
}

/// One individually settable field of the backend settings record. Each has
/// its own endpoint and form key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingField {
    Prompt,
    PromptTitle,
    PromptText,
    PromptImg,
    CountNews,
    CountNewsParsing,
}

impl SettingField {
    pub const ALL: [SettingField; 6] = [
        SettingField::Prompt,
        SettingField::PromptTitle,
        SettingField::PromptText,
        SettingField::PromptImg,
        SettingField::CountNews,
        SettingField::CountNewsParsing,
    ];

    pub fn path(self) -> &'static str {
        match self {
            SettingField::Prompt => "/webhook/settings/edit/prompt",
            SettingField::PromptTitle => "/webhook/settings/edit/prompt/title",
            SettingField::PromptText => "/webhook/settings/edit/prompt/text",
            SettingField::PromptImg => "/webhook/settings/edit/prompt/img",
            SettingField::CountNews => "/webhook/settings/edit/count_news",
            SettingField::CountNewsParsing => "/webhook/settings/edit/count_news_parsing",
        }
    }

    pub fn form_key(self) -> &'static str {
        match self {
            SettingField::Prompt => "prompt",
            SettingField::PromptTitle => "prompt_title",
            SettingField::PromptText => "prompt_text",
            SettingField::PromptImg => "prompt_img",
            SettingField::CountNews => "count_news",
            SettingField::CountNewsParsing => "count_news_parsing",
        }
    }

    /// The field's current value, rendered the way its form expects it.
    pub fn value_in(self, settings: &Settings) -> String {
        match self {
            SettingField::Prompt => settings.prompt.clone(),
            SettingField::PromptTitle => settings.prompt_title.clone(),
            SettingField::PromptText => settings.prompt_text.clone(),
            SettingField::PromptImg => settings.prompt_img.clone(),
            SettingField::CountNews => settings.count_news.to_string(),
            SettingField::CountNewsParsing => settings.count_news_parsing.to_string(),
        }
    }
}

/// Several endpoints wrap their single result in a one-element array.
pub fn unwrap_single(value: Value) -> Value {
    match value {
        Value::Array(items) => items.into_iter().next().unwrap_or(Value::Null),
        other => other,
    }
}

/// Extracts the domain error marker from a response body, if any.
pub fn domain_marker(value: &Value) -> Option<DomainFailure> {
    let object = match value {
        Value::Array(items) => items.first()?,
        other => other,
    };
    object
        .get("error")
        .and_then(Value::as_str)
        .filter(|marker| !marker.trim().is_empty())
        .map(DomainFailure::from_marker)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationOutput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerationItem {
    output: GenerationOutput,
}

/// Parses `[{"output": {...}}]` (or the bare object) returned by the title and
/// text generators. `None` means the shape was not recognised.
pub fn parse_generation(value: Value) -> Option<GenerationOutput> {
    serde_json::from_value::<GenerationItem>(unwrap_single(value))
        .ok()
        .map(|item| item.output)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratedImage {
    #[serde(default)]
    pub image_base64: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPost {
    pub id: PostId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct TimerStatus {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub active: bool,
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(flag)) => flag,
        Some(Value::String(raw)) => raw.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

/// Outcome of a one-shot parsing trigger, carried in the body's `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseRunStatus {
    Completed,
    AlreadyRunning,
    Other(String),
}

impl ParseRunStatus {
    pub fn from_body(value: &Value) -> Self {
        let status = unwrap_single(value.clone())
            .get("status")
            .and_then(Value::as_str)
            .map(|status| status.trim().to_ascii_lowercase())
            .unwrap_or_default();
        match status.as_str() {
            "ok" => ParseRunStatus::Completed,
            "close" => ParseRunStatus::AlreadyRunning,
            _ => ParseRunStatus::Other(status),
        }
    }
}
