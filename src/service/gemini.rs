//! Gemini `generateContent` REST 客户端

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::extraction::{
    parse_contract_response, parse_invoice_response, parse_verification_response, DocumentExtractor,
    ExtractionError, CONTRACT_PROMPT, INVOICE_PROMPT, VERIFY_PROMPT,
};
use crate::config::ExtractionConfig;
use crate::models::{ExtractedContract, ExtractedInvoice, UploadedDocument, VerificationResult};

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    response_mime_type: &'static str,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// 基于 Gemini 的文档识别
#[derive(Clone)]
pub struct GeminiExtractor {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self, ExtractionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExtractionError::Request(e.to_string()))?;

        if config.api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY not set, document extraction requests will fail");
        }

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// 发送 提示词 + 文档, 返回模型输出的文本
    async fn generate(&self, prompt: &str, document: &UploadedDocument) -> Result<String, ExtractionError> {
        let api_key = self.api_key.as_deref().ok_or(ExtractionError::MissingApiKey)?;
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: document.mime_type,
                            data: STANDARD.encode(&document.bytes),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: 0.0,
            },
        };

        let start = std::time::Instant::now();
        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractionError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status, file = %document.filename, "Gemini request failed");
            return Err(ExtractionError::Status { status, body });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::InvalidResponse(e.to_string()))?;

        tracing::info!(
            model = %self.model,
            file = %document.filename,
            elapsed = ?start.elapsed(),
            "Gemini request completed"
        );

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ExtractionError::InvalidResponse("empty model response".to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl DocumentExtractor for GeminiExtractor {
    async fn extract_invoice(&self, document: &UploadedDocument) -> Result<ExtractedInvoice, ExtractionError> {
        let text = self.generate(INVOICE_PROMPT, document).await?;
        parse_invoice_response(&text)
    }

    async fn extract_contract(&self, document: &UploadedDocument) -> Result<ExtractedContract, ExtractionError> {
        let text = self.generate(CONTRACT_PROMPT, document).await?;
        parse_contract_response(&text)
    }

    async fn verify_invoice(&self, document: &UploadedDocument) -> Result<VerificationResult, ExtractionError> {
        let text = self.generate(VERIFY_PROMPT, document).await?;
        parse_verification_response(&text)
    }
}
