use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Business-rule failure reported by the backend inside an otherwise
/// successful HTTP response, through its `error` marker field.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DomainFailure {
    #[error("post content is too long to publish")]
    ContentTooLong,
    #[error("image generation failed")]
    ImageNotGenerated,
    #[error("backend reported `{0}`")]
    Other(String),
}

impl DomainFailure {
    pub const NOT_PUBLISH: &'static str = "not_publish";
    pub const NOT_IMG: &'static str = "not_img";

    pub fn from_marker(marker: &str) -> Self {
        match marker.trim() {
            Self::NOT_PUBLISH => DomainFailure::ContentTooLong,
            Self::NOT_IMG => DomainFailure::ImageNotGenerated,
            other => DomainFailure::Other(other.to_string()),
        }
    }

    pub fn marker(&self) -> &str {
        match self {
            DomainFailure::ContentTooLong => Self::NOT_PUBLISH,
            DomainFailure::ImageNotGenerated => Self::NOT_IMG,
            DomainFailure::Other(marker) => marker,
        }
    }

    /// Operator-facing wording, distinct from the generic transport failure
    /// message of the operation that hit it.
    pub fn user_message(&self) -> String {
        match self {
            DomainFailure::ContentTooLong => {
                "Publishing failed: the post content is too long.".to_string()
            }
            DomainFailure::ImageNotGenerated => {
                "Image generation failed, please try again.".to_string()
            }
            DomainFailure::Other(marker) => format!("The backend rejected the request ({marker})."),
        }
    }
}

impl From<String> for DomainFailure {
    fn from(value: String) -> Self {
        DomainFailure::from_marker(&value)
    }
}

impl From<DomainFailure> for String {
    fn from(value: DomainFailure) -> Self {
        value.marker().to_string()
    }
}
