//! Imgur image host.
//!
//! Re-hosts a rendered chart so the page embeds a durable URL instead of
//! the renderer's short-lived one. Uploads are anonymous and authenticated
//! with `Authorization: Client-ID <IMGUR_CLIENT_ID>`.
//!
//! In `url` mode Imgur fetches the chart itself. In `bytes` mode the chart
//! is downloaded first and uploaded as base64, for renderers whose URLs are
//! not reachable from Imgur.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;

use crate::config::{HttpConfig, ImgurConfig};
use crate::models::{ChartReference, ImageReference};
use crate::traits::ImageHost;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    Url,
    Bytes,
}

pub struct ImgurHost {
    client: reqwest::Client,
    client_id: String,
    base_url: String,
    mode: UploadMode,
}

impl std::fmt::Debug for ImgurHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImgurHost")
            .field("client_id", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    data: Option<UploadData>,
}

#[derive(Deserialize)]
struct UploadData {
    link: Option<String>,
}

impl ImgurHost {
    pub fn new(config: &ImgurConfig, http: &HttpConfig) -> Result<Self> {
        let mode = match config.mode.as_str() {
            "url" => UploadMode::Url,
            "bytes" => UploadMode::Bytes,
            other => bail!("Unknown imgur.mode: '{}'", other),
        };
        let client = reqwest::Client::builder().timeout(http.timeout()).build()?;
        Ok(Self {
            client,
            client_id: config.client_id.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            mode,
        })
    }

    async fn download(&self, chart: &ChartReference) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(chart.as_str())
            .send()
            .await
            .with_context(|| format!("Failed to download chart {}", chart))?;

        if !resp.status().is_success() {
            bail!("Chart download failed (HTTP {})", resp.status());
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ImageHost for ImgurHost {
    async fn upload(&self, chart: &ChartReference) -> Result<ImageReference> {
        let form: Vec<(&str, String)> = match self.mode {
            UploadMode::Url => vec![("image", chart.as_str().to_string()), ("type", "url".into())],
            UploadMode::Bytes => {
                let bytes = self.download(chart).await?;
                tracing::debug!(bytes = bytes.len(), "uploading chart content");
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                vec![("image", encoded), ("type", "base64".into())]
            }
        };

        let resp = self
            .client
            .post(format!("{}/3/image", self.base_url))
            .header("Accept", "application/json")
            .header("Authorization", format!("Client-ID {}", self.client_id))
            .form(&form)
            .send()
            .await
            .context("Imgur upload request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "Imgur upload failed (HTTP {}): {}",
                status,
                body.chars().take(500).collect::<String>()
            );
        }

        let uploaded: UploadResponse = resp
            .json()
            .await
            .context("Imgur upload returned invalid JSON")?;
        uploaded
            .data
            .and_then(|d| d.link)
            .map(ImageReference)
            .ok_or_else(|| anyhow::anyhow!("Imgur upload response has no data.link"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn host(server: &MockServer, mode: &str) -> ImgurHost {
        let config = ImgurConfig {
            client_id: "cid123".into(),
            base_url: server.uri(),
            mode: mode.into(),
        };
        ImgurHost::new(&config, &HttpConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_upload_by_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/3/image"))
            .and(header("authorization", "Client-ID cid123"))
            .and(body_string_contains("type=url"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "id": "XwU6DJt", "link": "https://i.imgur.com/XwU6DJt.png" },
                "success": true,
                "status": 200
            })))
            .expect(1)
            .mount(&server)
            .await;

        let image = host(&server, "url")
            .upload(&ChartReference("https://quickchart.io/chart/render/zf-1".into()))
            .await
            .unwrap();
        assert_eq!(image.as_str(), "https://i.imgur.com/XwU6DJt.png");
    }

    #[tokio::test]
    async fn test_upload_by_bytes_downloads_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chart.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PNGDATA".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/3/image"))
            .and(body_string_contains("type=base64"))
            .and(body_string_contains("UE5HREFUQQ"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "link": "https://i.imgur.com/b.png" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let chart = ChartReference(format!("{}/chart.png", server.uri()));
        let image = host(&server, "bytes").upload(&chart).await.unwrap();
        assert_eq!(image.as_str(), "https://i.imgur.com/b.png");
    }

    #[tokio::test]
    async fn test_rate_limited_upload_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/3/image"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = host(&server, "url")
            .upload(&ChartReference("https://example.com/c.png".into()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn test_missing_link_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/3/image"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
            .mount(&server)
            .await;

        assert!(host(&server, "url")
            .upload(&ChartReference("https://example.com/c.png".into()))
            .await
            .is_err());
    }
}
