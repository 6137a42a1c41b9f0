//! Lifestyle re-rendering of a product photo.

use std::sync::Arc;

use base64::Engine;
use tracing::{error, info, warn};

use crate::error::{Result, ShopVisionError};
use crate::gemini::{ContentGenerator, GenerateContentRequest, GenerationConfig, InlineData, Part};
use crate::media::SourceImage;
use crate::models::RenderedImage;

/// Appended to every scene instruction; never replaces it.
pub const QUALITY_CONTRACT: &str = "Maintain the core product's identity while changing the environment or style realistically. \
    Realistic lighting, 4k resolution, professional photography style.";

const FALLBACK_MIME: &str = "image/png";

pub struct Visualizer {
    generator: Arc<dyn ContentGenerator>,
    model: String,
}

impl Visualizer {
    pub fn new(generator: Arc<dyn ContentGenerator>, model: impl Into<String>) -> Self {
        Self { generator, model: model.into() }
    }

    pub fn build_request(image: &SourceImage, instruction: &str) -> GenerateContentRequest {
        GenerateContentRequest::image_and_text(image, elaborate_prompt(instruction)).with_config(GenerationConfig {
            response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
            temperature: Some(0.4),
            ..Default::default()
        })
    }

    pub async fn visualize(&self, image: &SourceImage, instruction: &str) -> Result<RenderedImage> {
        if instruction.trim().is_empty() {
            warn!("Visualizing without a scene instruction; output is unconstrained");
        }
        info!("🎨 Rendering scene with {}: {}", self.model, instruction);

        let request = Self::build_request(image, instruction);
        let response = self.generator.generate_content(&self.model, &request).await?;

        let inline = first_inline_image(response.parts()).ok_or_else(|| {
            error!("❌ No inline image in {} response parts", response.parts().len());
            ShopVisionError::Render("no image produced".into())
        })?;
        let rendered = decode_inline_image(inline)?;
        info!("🖼️ Rendered {} image ({} bytes)", rendered.mime_type(), rendered.len());

        Ok(RenderedImage { image: rendered, prompt: instruction.to_string() })
    }
}

pub fn elaborate_prompt(instruction: &str) -> String {
    let scene = instruction.trim().trim_end_matches('.');
    if scene.is_empty() {
        format!("High quality product visualization. {QUALITY_CONTRACT}")
    } else {
        format!("High quality product visualization: {scene}. {QUALITY_CONTRACT}")
    }
}

/// Scans parts in order and stops at the first one carrying image bytes.
/// Later parts, including further images, are ignored.
pub fn first_inline_image(parts: &[Part]) -> Option<&InlineData> {
    for part in parts {
        if let Some(inline) = &part.inline_data {
            let is_image = inline.mime_type.is_empty()
                || inline.mime_type.get(..6).is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"));
            if is_image && !inline.data.is_empty() {
                return Some(inline);
            }
        }
    }
    None
}

fn decode_inline_image(inline: &InlineData) -> Result<SourceImage> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(inline.data.trim())
        .map_err(|e| ShopVisionError::Render(format!("image data could not be decoded: {e}")))?;
    let mime = if inline.mime_type.is_empty() { FALLBACK_MIME } else { inline.mime_type.as_str() };
    SourceImage::new(bytes, mime).map_err(|e| ShopVisionError::Render(e.to_string()))
}
