use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::geometry::PageReference;

/// Environment variable naming the OCR endpoint
pub const ENV_OCR_ENDPOINT: &str = "DOCSIGHT_OCR_ENDPOINT";
/// Environment variable naming the OCR credential
pub const ENV_OCR_API_KEY: &str = "DOCSIGHT_OCR_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocsightConfig {
    pub ocr: OcrConfig,
    pub overlay: OverlayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Base URL of the document-analysis service
    pub endpoint: String,

    /// Credential sent with every analysis request
    pub api_key: String,

    /// Multiplier from OCR units to 72-dpi points (72.0 when the backend
    /// reports inches, 1.0 when it already reports points)
    pub unit_scale: f64,

    /// Delay between result polls while an analysis operation runs
    pub poll_interval_ms: u64,

    /// Give up polling after this many attempts
    pub max_poll_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Reference page size the OCR coordinates are scaled against,
    /// in points. US Letter unless the document says otherwise.
    pub reference_width_pts: f64,
    pub reference_height_pts: f64,

    /// Outward padding applied to highlight boxes, percent of page dimension
    pub padding_pct: f64,

    /// How long a scroll-to-field request stays valid before it expires
    pub scroll_target_ttl_ms: u64,
}

impl Default for DocsightConfig {
    fn default() -> Self {
        Self {
            ocr: OcrConfig {
                endpoint: String::new(),
                api_key: String::new(),
                unit_scale: 72.0,
                poll_interval_ms: 1000,
                max_poll_attempts: 60,
            },
            overlay: OverlayConfig {
                reference_width_pts: 612.0,
                reference_height_pts: 792.0,
                padding_pct: 0.2,
                scroll_target_ttl_ms: 1000,
            },
        }
    }
}

impl DocsightConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow!("Failed to read config file: {}", e))?;

        let config: DocsightConfig =
            toml::from_str(&content).map_err(|e| anyhow!("Failed to parse config file: {}", e))?;

        Ok(config)
    }

    /// Default config with environment overrides applied
    pub fn load_from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Overlay environment values onto whatever was loaded from disk
    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var(ENV_OCR_ENDPOINT) {
            self.ocr.endpoint = endpoint;
        }

        if let Ok(api_key) = std::env::var(ENV_OCR_API_KEY) {
            self.ocr.api_key = api_key;
        }

        if let Ok(scale) = std::env::var("DOCSIGHT_OCR_UNIT_SCALE") {
            if let Ok(value) = scale.parse::<f64>() {
                self.ocr.unit_scale = value;
            }
        }

        if let Ok(padding) = std::env::var("DOCSIGHT_OVERLAY_PADDING_PCT") {
            if let Ok(value) = padding.parse::<f64>() {
                self.overlay.padding_pct = value;
            }
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| anyhow!("Failed to write config file: {}", e))?;

        Ok(())
    }

    /// Names of the endpoint/credential values that are still unset.
    /// Non-empty means analysis is blocked in the ConfigurationMissing state.
    pub fn missing_ocr_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.ocr.endpoint.trim().is_empty() {
            missing.push(ENV_OCR_ENDPOINT);
        }
        if self.ocr.api_key.trim().is_empty() {
            missing.push(ENV_OCR_API_KEY);
        }
        missing
    }

    pub fn is_ocr_configured(&self) -> bool {
        self.missing_ocr_settings().is_empty()
    }

    pub fn page_reference(&self) -> PageReference {
        PageReference::new(
            self.overlay.reference_width_pts,
            self.overlay.reference_height_pts,
        )
    }
}
