use std::{
    fmt,
    path::Path,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    multipart::{Form, Part},
    Client, RequestBuilder,
};
use serde::Serialize;
use serde_json::Value;
use shared::{
    domain::{Channel, ChannelId, Post, PostId, Settings},
    protocol::{
        unwrap_single, ChannelIdForm, ChannelUrlForm, CreatedPost, GeneratedImage, NewPostForm,
        ParseRunStatus, PostIdForm, PromptForm, SettingField, TextForm, TimerStatus, TitleForm,
        UpdatePostForm,
    },
};
use tracing::debug;

pub mod auth;
pub mod context;
pub mod error;
pub mod notifications;
pub mod orchestrator;
pub mod pages;
pub mod polling;
pub mod store;

pub use auth::BearerToken;
pub use context::{AppContext, ClientConfig, Theme};
pub use error::ClientError;
pub use notifications::{DisplayMode, Notification, NotificationCenter, NotificationKind};
pub use orchestrator::{ActionFailure, ActionKind, ActionOrchestrator, ActionOutcome, BusyPolicy};

const GENERATED_IMAGE_NAME: &str = "generated-image.jpg";

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// An image headed for the photo upload endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUpload")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

impl ImageUpload {
    pub async fn from_path(path: &Path) -> Result<Self, ClientError> {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        if mime.type_() != mime_guess::mime::IMAGE {
            return Err(ClientError::InvalidImage(format!(
                "'{}' does not look like an image ({})",
                path.display(),
                mime.essence_str()
            )));
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ClientError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self {
            filename,
            mime_type: mime.essence_str().to_string(),
            bytes,
        })
    }

    /// Decodes the base64 JPEG produced by the photo generator. A `data:` URL
    /// prefix is tolerated.
    pub fn from_base64_jpeg(encoded: &str) -> Result<Self, ClientError> {
        let encoded = encoded.trim();
        let payload = match encoded.split_once(";base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => encoded,
        };
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| ClientError::InvalidImage(format!("invalid base64 image payload: {e}")))?;
        if bytes.is_empty() {
            return Err(ClientError::InvalidImage("generated image is empty".into()));
        }
        Ok(Self {
            filename: GENERATED_IMAGE_NAME.to_string(),
            mime_type: "image/jpeg".to_string(),
            bytes,
        })
    }
}

/// The webhook backend as seen by the pages. One method per endpoint.
#[async_trait]
pub trait NewsdeskApi: Send + Sync {
    async fn list_posts(&self) -> Result<Vec<Post>, ClientError>;
    async fn get_post(&self, id: PostId) -> Result<Option<Post>, ClientError>;
    async fn add_post(&self, form: NewPostForm) -> Result<CreatedPost, ClientError>;
    async fn update_post(&self, form: UpdatePostForm) -> Result<Value, ClientError>;
    async fn delete_post(&self, id: PostId) -> Result<Value, ClientError>;
    async fn publish_post(&self, id: PostId) -> Result<Value, ClientError>;
    async fn generate_title(&self, seed: &str) -> Result<Value, ClientError>;
    async fn generate_text(&self, seed: &str) -> Result<Value, ClientError>;
    async fn generate_photo(&self, prompt: &str) -> Result<GeneratedImage, ClientError>;
    async fn regenerate_photo(&self, id: PostId, prompt: &str) -> Result<Value, ClientError>;
    async fn delete_post_image(&self, id: PostId) -> Result<Value, ClientError>;
    async fn upload_post_image(&self, id: PostId, image: ImageUpload)
        -> Result<Value, ClientError>;
    async fn regenerate_title(&self, id: PostId, title: &str) -> Result<Value, ClientError>;
    async fn regenerate_text(&self, id: PostId, text: &str) -> Result<Value, ClientError>;
    async fn get_settings(&self) -> Result<Settings, ClientError>;
    async fn set_setting(&self, field: SettingField, value: &str) -> Result<Value, ClientError>;
    async fn list_channels(&self) -> Result<Vec<Channel>, ClientError>;
    async fn add_channel(&self, url: &str) -> Result<Value, ClientError>;
    async fn remove_channel(&self, id: ChannelId) -> Result<Value, ClientError>;
    async fn timer_status(&self) -> Result<TimerStatus, ClientError>;
    async fn activate_timer(&self) -> Result<Value, ClientError>;
    async fn deactivate_timer(&self) -> Result<Value, ClientError>;
    async fn parse_site(&self) -> Result<ParseRunStatus, ClientError>;
    async fn parse_telegram(&self) -> Result<ParseRunStatus, ClientError>;
}

pub struct HttpNewsdeskClient {
    http: Client,
    base_url: String,
}

impl HttpNewsdeskClient {
    pub fn new(config: &ClientConfig, token: Option<&BearerToken>) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&token.header_value())
                .map_err(|e| ClientError::InvalidToken(e.to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_context(ctx: &AppContext) -> Result<Self, ClientError> {
        Self::new(ctx.config(), ctx.token())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Value, ClientError> {
        debug!(endpoint = path, "api: request");
        let response = request.send().await?.error_for_status()?;
        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }

    async fn get_json(&self, path: &str) -> Result<Value, ClientError> {
        self.send(path, self.http.get(self.url(path))).await
    }

    async fn post_form<T: Serialize + ?Sized>(
        &self,
        path: &str,
        form: &T,
    ) -> Result<Value, ClientError> {
        self.send(path, self.http.post(self.url(path)).form(form))
            .await
    }

    async fn post_empty(&self, path: &str) -> Result<Value, ClientError> {
        self.send(path, self.http.post(self.url(path))).await
    }

    async fn put_form<T: Serialize + ?Sized>(
        &self,
        path: &str,
        form: &T,
    ) -> Result<Value, ClientError> {
        self.send(path, self.http.put(self.url(path)).form(form))
            .await
    }

    async fn delete_form<T: Serialize + ?Sized>(
        &self,
        path: &str,
        form: &T,
    ) -> Result<Value, ClientError> {
        self.send(path, self.http.delete(self.url(path)).form(form))
            .await
    }

    async fn post_multipart(&self, path: &str, form: Form) -> Result<Value, ClientError> {
        self.send(path, self.http.post(self.url(path)).multipart(form))
            .await
    }
}

/// Lists come back as an array, a single bare object when there is one item,
/// or nothing at all when there are none.
fn decode_list<T: serde::de::DeserializeOwned>(value: Value) -> Result<Vec<T>, ClientError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => Ok(serde_json::from_value(value)?),
        other => Ok(vec![serde_json::from_value(other)?]),
    }
}

#[async_trait]
impl NewsdeskApi for HttpNewsdeskClient {
    async fn list_posts(&self) -> Result<Vec<Post>, ClientError> {
        decode_list(self.get_json("/webhook/news").await?)
    }

    async fn get_post(&self, id: PostId) -> Result<Option<Post>, ClientError> {
        let value = unwrap_single(self.post_form("/webhook/new", &PostIdForm { id }).await?);
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    async fn add_post(&self, form: NewPostForm) -> Result<CreatedPost, ClientError> {
        let mut multipart = Form::new().text("title", form.title).text("text", form.text);
        if let Some(link) = form.link {
            multipart = multipart.text("link", link);
        }
        let value = self.post_multipart("/webhook/new/add", multipart).await?;
        Ok(serde_json::from_value(unwrap_single(value))?)
    }

    async fn update_post(&self, form: UpdatePostForm) -> Result<Value, ClientError> {
        self.put_form("/webhook/new/update", &form).await
    }

    async fn delete_post(&self, id: PostId) -> Result<Value, ClientError> {
        self.delete_form("/webhook/new/delete", &PostIdForm { id })
            .await
    }

    async fn publish_post(&self, id: PostId) -> Result<Value, ClientError> {
        self.post_form("/webhook/new/pub", &PostIdForm { id }).await
    }

    async fn generate_title(&self, seed: &str) -> Result<Value, ClientError> {
        let form = TitleForm {
            id: None,
            title: seed.to_string(),
        };
        self.post_form("/webhook/new/gen/title", &form).await
    }

    async fn generate_text(&self, seed: &str) -> Result<Value, ClientError> {
        let form = TextForm {
            id: None,
            text: seed.to_string(),
        };
        self.post_form("/webhook/new/gen/text", &form).await
    }

    async fn generate_photo(&self, prompt: &str) -> Result<GeneratedImage, ClientError> {
        let form = PromptForm {
            id: None,
            prompt: prompt.to_string(),
        };
        let value = self.post_form("/webhook/new/photo/gen", &form).await?;
        Ok(serde_json::from_value(unwrap_single(value)).unwrap_or_default())
    }

    async fn regenerate_photo(&self, id: PostId, prompt: &str) -> Result<Value, ClientError> {
        let form = PromptForm {
            id: Some(id),
            prompt: prompt.to_string(),
        };
        self.post_form("/webhook/new/photo/peregen", &form).await
    }

    async fn delete_post_image(&self, id: PostId) -> Result<Value, ClientError> {
        self.post_form("/webhook/new/photo/del", &PostIdForm { id })
            .await
    }

    async fn upload_post_image(
        &self,
        id: PostId,
        image: ImageUpload,
    ) -> Result<Value, ClientError> {
        let part = Part::bytes(image.bytes)
            .file_name(image.filename)
            .mime_str(&image.mime_type)?;
        let form = Form::new().text("id", id.to_string()).part("img", part);
        self.post_multipart("/webhook/new/photo/add", form).await
    }

    async fn regenerate_title(&self, id: PostId, title: &str) -> Result<Value, ClientError> {
        let form = TitleForm {
            id: Some(id),
            title: title.to_string(),
        };
        self.post_form("/webhook/new/peregen/title", &form).await
    }

    async fn regenerate_text(&self, id: PostId, text: &str) -> Result<Value, ClientError> {
        let form = TextForm {
            id: Some(id),
            text: text.to_string(),
        };
        self.post_form("/webhook/new/peregen/text", &form).await
    }

    async fn get_settings(&self) -> Result<Settings, ClientError> {
        let value = unwrap_single(self.get_json("/webhook/settings").await?);
        if value.is_null() {
            return Ok(Settings::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn set_setting(&self, field: SettingField, value: &str) -> Result<Value, ClientError> {
        self.post_form(field.path(), &[(field.form_key(), value)])
            .await
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, ClientError> {
        decode_list(self.get_json("/webhook/channels").await?)
    }

    async fn add_channel(&self, url: &str) -> Result<Value, ClientError> {
        let form = ChannelUrlForm {
            url: url.to_string(),
        };
        self.post_form("/webhook/channel/add", &form).await
    }

    async fn remove_channel(&self, id: ChannelId) -> Result<Value, ClientError> {
        self.delete_form("/webhook/channel/delete", &ChannelIdForm { id })
            .await
    }

    async fn timer_status(&self) -> Result<TimerStatus, ClientError> {
        let value = unwrap_single(self.get_json("/webhook/timer/check").await?);
        if value.is_null() {
            return Ok(TimerStatus::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn activate_timer(&self) -> Result<Value, ClientError> {
        self.post_empty("/webhook/timer/activate").await
    }

    async fn deactivate_timer(&self) -> Result<Value, ClientError> {
        self.post_empty("/webhook/timer/deactivate").await
    }

    async fn parse_site(&self) -> Result<ParseRunStatus, ClientError> {
        let value = self.post_empty("/webhook/parsing/site").await?;
        Ok(ParseRunStatus::from_body(&value))
    }

    async fn parse_telegram(&self) -> Result<ParseRunStatus, ClientError> {
        let value = self.post_empty("/webhook/parsing/tg").await?;
        Ok(ParseRunStatus::from_body(&value))
    }
}

#[cfg(test)]
#[path = "tests/fake_api.rs"]
pub(crate) mod fake_api;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
