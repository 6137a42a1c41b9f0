//! Structured product analysis.
//!
//! One request per call: the image, an instruction, and a response schema
//! that pins the model to the [`ProductDescription`] shape.

use std::sync::Arc;

use tracing::{error, info};

use crate::error::{Result, ShopVisionError};
use crate::gemini::{ContentGenerator, GenerateContentRequest, GenerationConfig};
use crate::media::SourceImage;
use crate::models::ProductDescription;

pub const DEFAULT_INSTRUCTION: &str = "Identify this product for an online storefront. \
    Give its name, a likely brand or market tier, an estimated retail price, \
    its primary materials or fabrics, its design style (e.g. Minimalist, Industrial, Luxury), \
    a short marketing description, and three items that would complement it visually.";

pub struct Analyzer {
    generator: Arc<dyn ContentGenerator>,
    model: String,
}

impl Analyzer {
    pub fn new(generator: Arc<dyn ContentGenerator>, model: impl Into<String>) -> Self {
        Self { generator, model: model.into() }
    }

    pub fn build_request(image: &SourceImage, instruction: &str) -> GenerateContentRequest {
        let instruction = if instruction.trim().is_empty() { DEFAULT_INSTRUCTION } else { instruction };
        GenerateContentRequest::image_and_text(image, instruction).with_config(GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(ProductDescription::response_schema()),
            ..Default::default()
        })
    }

    pub async fn analyze(&self, image: &SourceImage, instruction: &str) -> Result<ProductDescription> {
        info!("🔎 Analyzing {} image ({} bytes) with {}", image.mime_type(), image.len(), self.model);
        let request = Self::build_request(image, instruction);
        let response = self.generator.generate_content(&self.model, &request).await?;

        let text = response.text().unwrap_or_default();
        match parse_description(&text) {
            Ok(description) => {
                info!("✅ Identified product: {}", description.name);
                Ok(description)
            }
            Err(e) => {
                error!("❌ Analyzer output rejected: {}", e);
                Err(e)
            }
        }
    }
}

/// Parses model text into a validated description. A surrounding markdown
/// code fence is stripped first.
pub fn parse_description(text: &str) -> Result<ProductDescription> {
    let json = strip_code_fence(text);
    if json.is_empty() {
        return Err(ShopVisionError::Parse("empty response".into()));
    }
    let description: ProductDescription = serde_json::from_str(json)
        .map_err(|e| ShopVisionError::Parse(e.to_string()))?;
    description.validate()?;
    Ok(description)
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    if trimmed.starts_with("```") {
        if let Some(start) = trimmed.find('\n') {
            let body = &trimmed[start + 1..];
            if let Some(end) = body.rfind("```") {
                return body[..end].trim();
            }
        }
    }
    trimmed
}
