//! Thin HTTP client for the Gemini `generateContent` endpoint.
//!
//! One call sends the source portrait plus the combined instruction and asks
//! for both image and text back. The image becomes a `data:` URI; the text
//! part goes through the label converter.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::generation::{GeneratedVariant, GenerationService};
use crate::labels::convert_labels;
use crate::prompt::catalog::Category;
use crate::prompt::constructor::PromptConstructor;
use crate::utils::media::{to_data_uri, SourceImage};

/// Request header carrying the API key; the URL stays key-free.
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum RequestPart<'a> {
    InlineData {
        #[serde(rename = "mimeType")]
        mime_type: &'a str,
        data: String,
    },
    Text(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    #[serde(alias = "inline_data")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(alias = "mime_type")]
    mime_type: Option<String>,
    data: String,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    prompts: PromptConstructor,
}

impl GeminiClient {
    pub fn new(base_url: String, model: String, api_key: String) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        GeminiClient {
            client: Client::new(),
            base_url: base,
            model,
            api_key,
            prompts: PromptConstructor::new(),
        }
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        let key = config
            .gemini_api_key
            .clone()
            .ok_or_else(|| AppError::Config("GEMINI_API_KEY environment variable not set".to_string()))?;
        Ok(Self::new(config.gemini_base_url.clone(), config.gemini_model.clone(), key))
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    /// Issue one `generateContent` call and return the parsed response.
    ///
    /// Non-success statuses become `AppError::Api` carrying status and body.
    pub async fn generate_content(
        &self,
        source: &SourceImage,
        combined_prompt: String,
    ) -> AppResult<GenerateResponse> {
        let url = self.endpoint();
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::InlineData { mime_type: &source.mime_type, data: source.to_base64() },
                    RequestPart::Text(combined_prompt),
                ],
            }],
            generation_config: GenerationConfig { response_modalities: vec!["IMAGE", "TEXT"] },
        };
        tracing::debug!("Sending generateContent request to {}", url);

        let response = self.client.post(&url)
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::HttpClient(e.without_url()))?;

        if response.status().is_success() {
            response.json().await.map_err(|e| AppError::HttpClient(e.without_url()))
        } else {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_else(|_| "Unable to read error body".to_string());
            let error_message = format!("Status: {}, Body: {}", status, error_body);
            tracing::error!("generateContent failed. {}", error_message);
            Err(AppError::Api(error_message))
        }
    }
}

/// Pull the image and detection text out of the first candidate.
///
/// Fails with `AppError::NoImage` when no part carries inline data; the
/// label is empty when no part carries text.
pub fn extract_variant(response: GenerateResponse) -> AppResult<GeneratedVariant> {
    let parts = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default();

    let mut image = None;
    let mut text = None;
    for part in parts {
        if image.is_none() {
            if let Some(inline) = part.inline_data {
                image = Some(inline);
                continue;
            }
        }
        if text.is_none() {
            text = part.text;
        }
    }

    let inline = image.ok_or(AppError::NoImage)?;
    let mime = inline.mime_type.as_deref().unwrap_or("image/png");
    let label = text.map(|t| convert_labels(&t)).unwrap_or_default();
    Ok(GeneratedVariant { image_uri: to_data_uri(mime, &inline.data), label })
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate(
        &self,
        source: &SourceImage,
        prompt: &str,
        category: Category,
    ) -> AppResult<GeneratedVariant> {
        let combined = self.prompts.construct_prompt(prompt, category)?;
        let response = self.generate_content(source, combined).await?;
        extract_variant(response).map_err(|e| {
            tracing::error!(%category, "Image generation failed: {}", e);
            e
        })
    }
}
