use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserialize_flexible_i64(deserializer).map($name)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map($name)
            }
        }
    };
}

id_newtype!(PostId);
id_newtype!(ChannelId);

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(i64),
    Text(String),
}

/// Webhook payloads are produced by workflow nodes that do not agree on
/// whether identifiers and counters are numbers or numeric strings.
fn deserialize_flexible_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(value) => Ok(value),
        NumberOrText::Text(raw) => raw
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected a numeric value, got {raw:?}"))),
    }
}

pub(crate) fn deserialize_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(0),
        Some(NumberOrText::Number(value)) => u32::try_from(value)
            .map_err(|_| de::Error::custom(format!("count out of range: {value}"))),
        Some(NumberOrText::Text(raw)) if raw.trim().is_empty() => Ok(0),
        Some(NumberOrText::Text(raw)) => raw
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected a count, got {raw:?}"))),
    }
}

pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|value| !value.trim().is_empty()))
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
    Other(String),
}

impl PostStatus {
    pub fn label(&self) -> &str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Other(label) => label,
        }
    }
}

impl From<String> for PostStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "draft" => PostStatus::Draft,
            "published" | "publish" => PostStatus::Published,
            _ => PostStatus::Other(value),
        }
    }
}

impl From<PostStatus> for String {
    fn from(value: PostStatus) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn status_or_default<'de, D>(deserializer: D) -> Result<PostStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(PostStatus::from)
        .unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub text: String,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
    #[serde(default, deserialize_with = "status_or_default")]
    pub status: PostStatus,
}

impl Post {
    pub fn has_image(&self) -> bool {
        self.img_url.is_some()
    }

    pub fn is_draft(&self) -> bool {
        self.status == PostStatus::Draft
    }

    /// Publication timestamp, when the backend sent one in a recognisable
    /// format (RFC 3339 or a naive `YYYY-MM-DD HH:MM:SS` taken as UTC).
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.pub_date.as_deref()?.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| naive.and_utc())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub prompt: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub prompt_title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub prompt_text: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub prompt_img: String,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub count_news: u32,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub count_news_parsing: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawChannel")]
pub struct Channel {
    pub id: ChannelId,
    pub url: String,
}

#[derive(Deserialize)]
struct RawChannel {
    id: ChannelId,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

impl From<RawChannel> for Channel {
    fn from(raw: RawChannel) -> Self {
        Self {
            id: raw.id,
            url: raw.url.or(raw.link).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_accepts_string_ids_and_blank_optionals() {
        let post: Post = serde_json::from_value(serde_json::json!({
            "id": "42",
            "title": null,
            "text": "body",
            "img_url": "",
            "link": "https://example.com/a",
            "status": "published"
        }))
        .expect("post");

        assert_eq!(post.id, PostId(42));
        assert_eq!(post.title, "");
        assert!(!post.has_image());
        assert_eq!(post.link.as_deref(), Some("https://example.com/a"));
        assert_eq!(post.status, PostStatus::Published);
    }

    #[test]
    fn missing_status_defaults_to_draft_and_unknown_labels_survive() {
        let post: Post = serde_json::from_value(serde_json::json!({ "id": 1 })).expect("post");
        assert!(post.is_draft());

        let post: Post =
            serde_json::from_value(serde_json::json!({ "id": 2, "status": "Queued" }))
                .expect("post");
        assert_eq!(post.status, PostStatus::Other("Queued".into()));
        assert_eq!(post.status.to_string(), "Queued");
    }

    #[test]
    fn published_at_understands_rfc3339_and_naive_timestamps() {
        let mut post: Post = serde_json::from_value(serde_json::json!({
            "id": 1,
            "pub_date": "2024-05-01T10:00:00+03:00"
        }))
        .expect("post");
        assert_eq!(
            post.published_at().map(|ts| ts.to_rfc3339()),
            Some("2024-05-01T07:00:00+00:00".to_string())
        );

        post.pub_date = Some("2024-05-01 10:00:00".into());
        assert!(post.published_at().is_some());

        post.pub_date = Some("yesterday".into());
        assert!(post.published_at().is_none());
    }

    #[test]
    fn settings_counts_accept_numbers_strings_and_nulls() {
        let settings: Settings = serde_json::from_value(serde_json::json!({
            "prompt": "system",
            "count_news": "7",
            "count_news_parsing": null
        }))
        .expect("settings");

        assert_eq!(settings.prompt, "system");
        assert_eq!(settings.count_news, 7);
        assert_eq!(settings.count_news_parsing, 0);
        assert_eq!(settings.prompt_img, "");
    }

    #[test]
    fn channel_url_falls_back_to_link_field() {
        let channel: Channel =
            serde_json::from_value(serde_json::json!({ "id": 3, "link": "https://t.me/x" }))
                .expect("channel");
        assert_eq!(channel.url, "https://t.me/x");

        let channel: Channel = serde_json::from_value(serde_json::json!({
            "id": 4,
            "url": "https://t.me/primary",
            "link": "https://t.me/secondary"
        }))
        .expect("channel");
        assert_eq!(channel.url, "https://t.me/primary");
    }

    #[test]
    fn ids_parse_from_cli_text() {
        assert_eq!(" 15 ".parse::<PostId>().expect("id"), PostId(15));
        assert!("abc".parse::<ChannelId>().is_err());
    }
}
