/// Runtime settings, read from the process environment (and `.env` via dotenv in `main`).
///
/// The API key is deliberately absent: the Gemini client resolves it on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub api_base: String,
    pub analyze_model: String,
    pub visualize_model: String,
}

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_ANALYZE_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_VISUALIZE_MODEL: &str = "gemini-2.5-flash-image";

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            api_base: DEFAULT_API_BASE.to_string(),
            analyze_model: DEFAULT_ANALYZE_MODEL.to_string(),
            visualize_model: DEFAULT_VISUALIZE_MODEL.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            port: non_empty("PORT").and_then(|v| v.parse().ok()).unwrap_or(defaults.port),
            api_base: non_empty("GEMINI_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            analyze_model: non_empty("SHOPVISION_ANALYZE_MODEL").unwrap_or(defaults.analyze_model),
            visualize_model: non_empty("SHOPVISION_VISUALIZE_MODEL").unwrap_or(defaults.visualize_model),
        }
    }
}
