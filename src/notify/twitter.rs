//! X (Twitter) API v2 poster.

use crate::notify::{Notifier, NotifyError, Post};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct DataId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    data: DataId,
}

pub struct TwitterNotifier {
    api_url: String,
    bearer_token: String,
    http: Client,
}

impl TwitterNotifier {
    pub fn new(api_url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            bearer_token: bearer_token.into(),
            http: Client::new(),
        }
    }

    async fn download_image(&self, url: &str) -> Result<(Vec<u8>, String), NotifyError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status().as_u16();
        if status >= 400 {
            return Err(NotifyError::Image(format!("{url} returned {status}")));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(NotifyError::Image(format!(
                "{url} is {content_type:?}, not an image"
            )));
        }
        let bytes = resp.bytes().await?;
        Ok((bytes.to_vec(), content_type))
    }

    async fn upload_media(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, NotifyError> {
        let part = Part::bytes(bytes)
            .file_name("pin.png")
            .mime_str(content_type)?;
        let form = Form::new()
            .text("media_category", "tweet_image")
            .part("media", part);

        let resp = self
            .http
            .post(format!("{}/2/media/upload", self.api_url))
            .bearer_auth(&self.bearer_token)
            .multipart(form)
            .send()
            .await?;
        let status = resp.status().as_u16();
        if status >= 400 {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Api { status, body });
        }
        let uploaded: ApiResponse = resp.json().await?;
        Ok(uploaded.data.id)
    }

    /// Try each image candidate in order; `None` when none could be attached.
    async fn attach_image(&self, candidates: &[&str]) -> Option<String> {
        for url in candidates {
            let result = match self.download_image(url).await {
                Ok((bytes, content_type)) => self.upload_media(bytes, &content_type).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(media_id) => {
                    debug!(url = *url, media_id = %media_id, "image uploaded");
                    return Some(media_id);
                }
                Err(e) => warn!(url = *url, error = %e, "image attach failed"),
            }
        }
        None
    }
}

#[async_trait]
impl Notifier for TwitterNotifier {
    async fn post(&self, post: &Post) -> Result<(), NotifyError> {
        let candidates: Vec<&str> = post.image_candidates().collect();
        let media_id = if candidates.is_empty() {
            None
        } else {
            self.attach_image(&candidates).await
        };

        let body = match &media_id {
            Some(id) => json!({ "text": post.text, "media": { "media_ids": [id] } }),
            None => json!({ "text": post.text }),
        };

        let resp = self
            .http
            .post(format!("{}/2/tweets", self.api_url))
            .bearer_auth(&self.bearer_token)
            .json(&body)
            .send()
            .await?;
        let status = resp.status().as_u16();
        if status >= 400 {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Api { status, body });
        }
        let created: ApiResponse = resp.json().await?;
        info!(
            post_id = %created.data.id,
            with_image = media_id.is_some(),
            "post published"
        );
        Ok(())
    }
}
