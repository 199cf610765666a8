use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

/// Image formats accepted for classification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr, IntoStaticStr,
    EnumIter,
)]
pub enum ImageMimeType {
    #[serde(rename = "image/png")]
    #[strum(serialize = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    #[strum(to_string = "image/jpeg", serialize = "image/jpg")]
    Jpeg,
    #[serde(rename = "image/webp")]
    #[strum(serialize = "image/webp")]
    Webp,
}

impl ImageMimeType {
    pub fn as_mime(&self) -> &'static str {
        (*self).into()
    }

    pub fn accepted() -> Vec<&'static str> {
        ImageMimeType::iter().map(|m| m.as_mime()).collect()
    }
}

/// Closed view over the severity ratings the model is asked to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum SeverityLevel {
    None,
    Low,
    Medium,
    High,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ClassificationResult {
    pub class: String,
    pub is_weed: bool,
    pub confidence: f64,
    pub description: String,
    /// Kept as the provider sent it; see [`ClassificationResult::severity`].
    pub severity_level: String,
    pub recommended_actions: String,
}

impl ClassificationResult {
    /// `None` when the provider used a rating outside the four known levels.
    pub fn severity(&self) -> Option<SeverityLevel> {
        SeverityLevel::from_str(self.severity_level.trim()).ok()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}
