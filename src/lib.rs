//! ShopVision: product photo analysis and lifestyle re-rendering on top of
//! Gemini multimodal models, plus the session service that drives them.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod gemini;
pub mod media;
pub mod models;
pub mod routes;
pub mod session;
pub mod visualizer;

#[cfg(test)]
pub(crate) mod testing;

pub use analyzer::Analyzer;
pub use config::Config;
pub use error::{Result, ShopVisionError};
pub use gemini::{ContentGenerator, GeminiClient};
pub use media::SourceImage;
pub use models::{ProductDescription, RenderedImage};
pub use session::{Action, Session};
pub use visualizer::Visualizer;
