//! Outbound posts.
//!
//! - `compose`: sale and fallback post text
//! - `twitter`: X API v2 client with image upload
//! - [`DryRunNotifier`]: logs what would have been posted

pub mod compose;
pub mod twitter;

pub use compose::{compose_fallback, compose_sale, FallbackReason, PostStyle};
pub use twitter::TwitterNotifier;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("image unavailable: {0}")]
    Image(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub text: String,
    pub image_url: Option<String>,
    /// Tried when `image_url` cannot be fetched.
    pub fallback_image_url: Option<String>,
}

impl Post {
    pub fn text_only(text: String) -> Self {
        Self {
            text,
            image_url: None,
            fallback_image_url: None,
        }
    }

    pub fn image_candidates(&self) -> impl Iterator<Item = &str> {
        self.image_url
            .iter()
            .chain(self.fallback_image_url.iter())
            .map(String::as_str)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post(&self, post: &Post) -> Result<(), NotifyError>;
}

pub struct DryRunNotifier;

#[async_trait]
impl Notifier for DryRunNotifier {
    async fn post(&self, post: &Post) -> Result<(), NotifyError> {
        info!(
            image_url = post.image_url.as_deref().unwrap_or("-"),
            text = %post.text,
            "would post"
        );
        Ok(())
    }
}
