//! Text translation provider (Google Translate v2).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::http::ensure_success;
use crate::domain::TargetLanguage;
use crate::{Error, Result};

const SERVICE: &str = "translate";

#[async_trait]
pub trait TextTranslator: Send + Sync {
    async fn translate(&self, text: &str, target: TargetLanguage) -> Result<String>;
}

pub struct GoogleTranslator {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl GoogleTranslator {
    pub fn new(client: reqwest::Client, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

#[async_trait]
impl TextTranslator for GoogleTranslator {
    async fn translate(&self, text: &str, target: TargetLanguage) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "q": text, "target": target.code(), "format": "text" }))
            .send()
            .await?;
        let body: TranslateResponse = ensure_success(SERVICE, response).await?.json().await?;
        body.data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| Error::upstream(SERVICE, 200, "no translations returned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let body: TranslateResponse = serde_json::from_str(
            r#"{"data":{"translations":[{"translatedText":"hello","detectedSourceLanguage":"es"}]}}"#,
        )
        .unwrap();
        assert_eq!(body.data.translations[0].translated_text, "hello");
    }
}
