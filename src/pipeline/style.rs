use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::PipelineError;

// @module: Render style descriptor forwarded to the rendering stage

/// Subtitle look applied when burning subtitles in; missing fields take defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStyle {
    /// Font family
    pub font: String,
    /// Point size
    pub font_size: u32,
    pub bold: bool,
    pub italic: bool,
    /// `#RRGGBB`
    pub font_color: String,
    /// `#RRGGBB`
    pub outline_color: String,
    pub outline_thickness: u32,
    pub shadow_offset: u32,
    /// Numpad position, 1 (bottom-left) to 9 (top-right)
    pub alignment: u8,
    /// Vertical margin in pixels
    pub margin_v: u32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            font: "Arial".to_string(),
            font_size: 28,
            bold: false,
            italic: false,
            font_color: "#FFFFFF".to_string(),
            outline_color: "#000000".to_string(),
            outline_thickness: 2,
            shadow_offset: 0,
            alignment: 2,
            margin_v: 30,
        }
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7 && value.starts_with('#') && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

impl RenderStyle {
    /// Parse and validate a style descriptor; unknown fields are ignored
    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| PipelineError::InvalidInput(format!("style_json must be valid JSON: {}", e)))?;
        if !value.is_object() {
            return Err(PipelineError::InvalidInput("style_json must be a JSON object".to_string()));
        }

        let style: RenderStyle = serde_json::from_value(value)
            .map_err(|e| PipelineError::InvalidInput(format!("invalid style_json: {}", e)))?;
        style.validate()?;
        Ok(style)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.font.trim().is_empty() {
            return Err(PipelineError::InvalidInput("font must not be empty".to_string()));
        }
        if self.font_size == 0 {
            return Err(PipelineError::InvalidInput("font_size must be positive".to_string()));
        }
        for (name, color) in [("font_color", &self.font_color), ("outline_color", &self.outline_color)] {
            if !is_hex_color(color) {
                return Err(PipelineError::InvalidInput(format!(
                    "{} must look like #RRGGBB, got {:?}",
                    name, color
                )));
            }
        }
        if !(1..=9).contains(&self.alignment) {
            return Err(PipelineError::InvalidInput(format!(
                "alignment must be between 1 and 9, got {}",
                self.alignment
            )));
        }
        Ok(())
    }

    /// Canonical JSON sent to the rendering stage, with every field explicit
    pub fn to_json(&self) -> Result<String, PipelineError> {
        serde_json::to_string(self).map_err(|e| PipelineError::Internal(format!("Failed to serialize style: {}", e)))
    }
}
