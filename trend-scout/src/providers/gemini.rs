//! Multimodal inference provider (Gemini file + generateContent REST API).

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::http::{ensure_success, truncate};
use crate::{Error, Result};

const SERVICE: &str = "gemini";

/// Processing state of an uploaded file on the provider side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    Processing,
    Active,
    Failed,
    #[serde(other)]
    Unspecified,
}

/// A file handle issued by the inference provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    /// Resource name, e.g. `files/abc123`.
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default = "default_state")]
    pub state: FileState,
}

fn default_state() -> FileState {
    FileState::Unspecified
}

#[async_trait]
pub trait InferenceProvider: Send + Sync {
    async fn upload_file(&self, data: Bytes, mime_type: &str, display_name: &str)
    -> Result<RemoteFile>;
    async fn get_file(&self, name: &str) -> Result<RemoteFile>;
    /// One prompt plus file references in, response text out.
    async fn generate(&self, prompt: &str, files: &[RemoteFile]) -> Result<String>;
    async fn delete_file(&self, name: &str) -> Result<()>;
}

pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileEnvelope {
    file: RemoteFile,
}

#[async_trait]
impl InferenceProvider for GeminiClient {
    async fn upload_file(
        &self,
        data: Bytes,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile> {
        // Two-phase resumable upload: start a session, then send the bytes and finalize.
        let start = self
            .client
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", data.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(|e| Error::UploadFailed(format!("start: {e}")))?;
        let start = ensure_success(SERVICE, start)
            .await
            .map_err(|e| Error::UploadFailed(format!("start: {e}")))?;
        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::UploadFailed("start: no upload URL returned".to_string()))?;

        let finalize = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header(reqwest::header::CONTENT_LENGTH, data.len().to_string())
            .body(data)
            .send()
            .await
            .map_err(|e| Error::UploadFailed(format!("finalize: {e}")))?;
        let envelope: FileEnvelope = ensure_success(SERVICE, finalize)
            .await
            .map_err(|e| Error::UploadFailed(format!("finalize: {e}")))?
            .json()
            .await
            .map_err(|e| Error::UploadFailed(format!("finalize response: {e}")))?;

        debug!(file = %envelope.file.name, state = ?envelope.file.state, "Uploaded file");
        Ok(envelope.file)
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile> {
        let response = self
            .client
            .get(format!("{}/v1beta/{}", self.base_url, name))
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;
        Ok(ensure_success(SERVICE, response).await?.json().await?)
    }

    async fn generate(&self, prompt: &str, files: &[RemoteFile]) -> Result<String> {
        let body = generate_request(prompt, files);
        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::InferenceFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::InferenceFailed(format!(
                "{}: {}",
                status.as_u16(),
                truncate(&text, 512)
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::InferenceFailed(format!("unreadable response: {e}")))?;
        parsed.text()
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/v1beta/{}", self.base_url, name))
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;
        ensure_success(SERVICE, response).await?;
        Ok(())
    }
}

fn generate_request(prompt: &str, files: &[RemoteFile]) -> serde_json::Value {
    let mut parts = vec![json!({ "text": prompt })];
    parts.extend(files.iter().map(|f| {
        json!({
            "file_data": { "mime_type": f.mime_type, "file_uri": f.uri }
        })
    }));

    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": { "responseMimeType": "application/json" }
    })
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GenerateCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateCandidate {
    content: Option<GenerateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContent {
    #[serde(default)]
    parts: Vec<GeneratePart>,
}

#[derive(Debug, Deserialize)]
struct GeneratePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn text(self) -> Result<String> {
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::InferenceFailed("response has no candidates".to_string()))?;
        let finish_reason = candidate.finish_reason;
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::InferenceFailed(format!(
                "empty response (finish reason: {})",
                finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_state_parsing() {
        let file: RemoteFile = serde_json::from_str(
            r#"{"name":"files/a","uri":"https://g/files/a","mimeType":"video/mp4","state":"ACTIVE"}"#,
        )
        .unwrap();
        assert_eq!(file.state, FileState::Active);

        let file: RemoteFile =
            serde_json::from_str(r#"{"name":"files/b","uri":"u","state":"STATE_UNSPECIFIED"}"#)
                .unwrap();
        assert_eq!(file.state, FileState::Unspecified);
    }

    #[test]
    fn test_generate_request_shape() {
        let file = RemoteFile {
            name: "files/a".into(),
            uri: "https://g/files/a".into(),
            mime_type: "image/jpeg".into(),
            state: FileState::Active,
        };
        let body = generate_request("analyze", &[file]);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "analyze");
        assert_eq!(
            body["contents"][0]["parts"][1]["file_data"]["file_uri"],
            "https://g/files/a"
        );
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(response.text().unwrap(), "{\"a\":1}");

        let empty: GenerateResponse =
            serde_json::from_value(serde_json::json!({"candidates": [{"finishReason": "SAFETY"}]}))
                .unwrap();
        assert!(matches!(empty.text(), Err(Error::InferenceFailed(m)) if m.contains("SAFETY")));
    }
}
