use serde::{Serialize, Deserialize};
use serde_json::{json, Value};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Result, ShopVisionError};
use crate::media::SourceImage;

/// Structured product description produced by the analyzer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProductDescription {
    pub name: String,
    pub brand_suggestion: String,
    pub estimated_price: String, // currency formatted, e.g. "$1,200 - $1,500"
    pub materials: Vec<String>,
    pub style: String,
    pub description: String,
    pub complementary_items: Vec<String>,
}

impl ProductDescription {
    /// Wire names of every field the model must emit.
    pub const REQUIRED_FIELDS: [&'static str; 7] = [
        "name",
        "brandSuggestion",
        "estimatedPrice",
        "materials",
        "style",
        "description",
        "complementaryItems",
    ];

    /// Gemini `responseSchema` constraining the analyzer output to this shape.
    pub fn response_schema() -> Value {
        let text = |description: &str| json!({ "type": "STRING", "description": description });
        let list = |description: &str| json!({
            "type": "ARRAY",
            "description": description,
            "items": { "type": "STRING" }
        });
        json!({
            "type": "OBJECT",
            "properties": {
                "name": text("Product name"),
                "brandSuggestion": text("Likely brand or market tier"),
                "estimatedPrice": text("Estimated retail price, currency formatted"),
                "materials": list("Primary materials or fabrics"),
                "style": text("Design style, e.g. Minimalist, Industrial, Luxury"),
                "description": text("Short marketing description"),
                "complementaryItems": list("Items that would complement this product visually"),
            },
            "required": Self::REQUIRED_FIELDS,
            "propertyOrdering": Self::REQUIRED_FIELDS,
        })
    }

    /// Rejects blank strings and empty lists; serde already rejects missing fields.
    pub fn validate(&self) -> Result<()> {
        let mut blank = Vec::new();
        for (field, value) in [
            ("name", &self.name),
            ("brandSuggestion", &self.brand_suggestion),
            ("estimatedPrice", &self.estimated_price),
            ("style", &self.style),
            ("description", &self.description),
        ] {
            if value.trim().is_empty() {
                blank.push(field);
            }
        }
        for (field, values) in [("materials", &self.materials), ("complementaryItems", &self.complementary_items)] {
            if values.is_empty() || values.iter().any(|v| v.trim().is_empty()) {
                blank.push(field);
            }
        }
        if blank.is_empty() {
            Ok(())
        } else {
            Err(ShopVisionError::Parse(format!("empty fields in product description: {}", blank.join(", "))))
        }
    }
}

/// Output of a visualizer call.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub image: SourceImage,
    /// The caller's instruction, before quality modifiers were added.
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HistoryItem {
    pub id: Uuid,
    pub image: SourceImage,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageOrigin {
    #[default]
    Upload,
    Capture,
}

/// A named scene instruction offered to shoppers as a one-click restyle.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct ScenePreset {
    pub id: &'static str,
    pub label: &'static str,
    pub prompt: &'static str,
}

pub const RETAIL_PRESETS: &[ScenePreset] = &[
    ScenePreset { id: "luxury", label: "Penthouse", prompt: "Inside a luxury minimalist penthouse, golden hour lighting." },
    ScenePreset { id: "studio", label: "Studio", prompt: "Professional white studio background, cinematic soft light." },
    ScenePreset { id: "scandi", label: "Bright Home", prompt: "Bright Scandinavian living room, light wood, plants." },
    ScenePreset { id: "nature", label: "Outdoor", prompt: "Lush garden setting, natural morning sunlight, 85mm lens." },
];

/// Sample product photos offered on the landing page for a quick test.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct DemoImage {
    pub id: &'static str,
    pub label: &'static str,
    pub url: &'static str,
}

pub const DEMO_IMAGES: &[DemoImage] = &[
    DemoImage {
        id: "chair",
        label: "Eames Chair",
        url: "https://images.unsplash.com/photo-1540574163026-643ea20ade25?auto=format&fit=crop&q=80&w=400",
    },
    DemoImage {
        id: "watch",
        label: "Smart Watch",
        url: "https://images.unsplash.com/photo-1523275335684-37898b6baf30?auto=format&fit=crop&q=80&w=400",
    },
    DemoImage {
        id: "headphones",
        label: "Headphones",
        url: "https://images.unsplash.com/photo-1505740420928-5e560c06d30e?auto=format&fit=crop&q=80&w=400",
    },
];

pub fn find_demo(id: &str) -> Option<&'static DemoImage> {
    DEMO_IMAGES.iter().find(|d| d.id == id)
}

pub fn find_preset(id: &str) -> Option<&'static ScenePreset> {
    RETAIL_PRESETS.iter().find(|p| p.id == id)
}

// --- HTTP request / response bodies ---

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnalyzeRequest {
    pub image: SourceImage,
    #[serde(default)]
    pub instruction: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VisualizeRequest {
    pub image: SourceImage,
    #[serde(flatten)]
    pub scene: SceneRequest,
}

/// Scene selection: a preset id wins over free text when both are given.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SceneRequest {
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default)]
    pub preset: Option<String>,
}

impl SceneRequest {
    /// Resolves the instruction text. `None` means the preset id is unknown.
    pub fn resolve(&self) -> Option<String> {
        match &self.preset {
            Some(id) => find_preset(id).map(|p| p.prompt.to_string()),
            None => Some(self.instruction.clone().unwrap_or_default()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct InstructionRequest {
    #[serde(default)]
    pub instruction: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoadImageRequest {
    pub image: SourceImage,
    #[serde(default)]
    pub origin: ImageOrigin,
}
