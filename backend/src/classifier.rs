//! Plant classification over a multimodal model.
//!
//! One call in, one parsed [`ClassificationResult`] or one [`ClassificationFailure`]
//! out. There is no retry and no caching; every call issues exactly one provider
//! request.

use serde_json::{Value, json};
use shared::{ClassificationResult, ImageMimeType};
use std::fmt;
use std::sync::Arc;

use crate::encoder::{self, TransportPayload};
use crate::provider::{
    ClassificationProvider, Content, GenerateContentRequest, GenerationConfig, Part, ProviderError,
};

pub const INSTRUCTION: &str = "Analyze the plant in this image and provide a detailed classification. \
Identify if it's a weed and provide management advice.";

pub const SYSTEM_INSTRUCTION: &str = "You are an expert botanist and agronomist specializing in weed \
identification and control. Respond ONLY with a valid JSON object that adheres to the provided schema. \
If the image does not clearly show a plant, return an error within the JSON structure.";

pub const FAILURE_MESSAGE: &str =
    "Failed to get a valid classification from the AI model. Please try again with a clearer image.";

const RESPONSE_MIME_TYPE: &str = "application/json";

pub const REQUIRED_FIELDS: [&str; 6] = [
    "class",
    "is_weed",
    "confidence",
    "description",
    "severity_level",
    "recommended_actions",
];

/// Response schema handed to the provider. All six fields are required.
pub fn classification_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "class": {
                "type": "STRING",
                "description": "The scientific or common name of the plant species."
            },
            "is_weed": {
                "type": "BOOLEAN",
                "description": "A boolean indicating if the plant is considered a weed."
            },
            "confidence": {
                "type": "NUMBER",
                "description": "A confidence score from 0.0 to 1.0 for the classification."
            },
            "description": {
                "type": "STRING",
                "description": "A detailed description of the plant, including its key identifying characteristics."
            },
            "severity_level": {
                "type": "STRING",
                "description": "A severity level ('Low', 'Medium', 'High', 'None') based on its potential harm to crops or gardens."
            },
            "recommended_actions": {
                "type": "STRING",
                "description": "Actionable advice for management or removal if it's a harmful weed. Provide control methods (mechanical, cultural, chemical)."
            }
        },
        "required": REQUIRED_FIELDS,
    })
}

/// Per-call progress. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationStage {
    Idle,
    Encoding,
    Requesting,
    Succeeded,
    Failed,
}

impl ClassificationStage {
    /// A payload encoded elsewhere goes straight from `Idle` to `Requesting`.
    pub fn can_advance_to(self, next: ClassificationStage) -> bool {
        use ClassificationStage::*;
        matches!(
            (self, next),
            (Idle, Encoding)
                | (Idle, Requesting)
                | (Encoding, Requesting)
                | (Encoding, Failed)
                | (Requesting, Succeeded)
                | (Requesting, Failed)
        )
    }

    fn advance(self, next: ClassificationStage) -> ClassificationStage {
        debug_assert!(self.can_advance_to(next), "{:?} -> {:?}", self, next);
        log::debug!("Classification stage {:?} -> {:?}", self, next);
        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Provider,
    MalformedResponse,
}

impl From<&ProviderError> for FailureKind {
    fn from(err: &ProviderError) -> Self {
        match err {
            ProviderError::Http(_) | ProviderError::Timeout(_) | ProviderError::Endpoint(_) => {
                FailureKind::Transport
            }
            ProviderError::Server { .. } | ProviderError::EmptyResponse(_) => FailureKind::Provider,
            ProviderError::Json(_) => FailureKind::MalformedResponse,
        }
    }
}

/// Uniform failure surfaced to callers. The message never carries the cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationFailure {
    kind: FailureKind,
}

impl ClassificationFailure {
    fn new(kind: FailureKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }
}

impl fmt::Display for ClassificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(FAILURE_MESSAGE)
    }
}

impl std::error::Error for ClassificationFailure {}

#[derive(Clone)]
pub struct ClassificationClient {
    provider: Arc<dyn ClassificationProvider>,
}

impl ClassificationClient {
    pub fn new(provider: Arc<dyn ClassificationProvider>) -> Self {
        Self { provider }
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn build_request(payload: &TransportPayload) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::image(payload), Part::text(INSTRUCTION)],
            }],
            system_instruction: Content {
                parts: vec![Part::text(SYSTEM_INSTRUCTION)],
            },
            generation_config: GenerationConfig {
                response_mime_type: RESPONSE_MIME_TYPE.to_string(),
                response_schema: classification_schema(),
            },
        }
    }

    pub async fn classify(
        &self,
        payload: &TransportPayload,
    ) -> Result<ClassificationResult, ClassificationFailure> {
        self.classify_from(ClassificationStage::Idle, payload).await
    }

    async fn classify_from(
        &self,
        stage: ClassificationStage,
        payload: &TransportPayload,
    ) -> Result<ClassificationResult, ClassificationFailure> {
        let request = Self::build_request(payload);
        let stage = stage.advance(ClassificationStage::Requesting);
        log::debug!(
            "Requesting classification ({} bytes of {})",
            payload.encoded_len(),
            payload.mime_type
        );

        let text = match self.provider.generate(&request).await {
            Ok(text) => text,
            Err(e) => {
                log::error!("Error classifying weed: {}", e);
                stage.advance(ClassificationStage::Failed);
                return Err(ClassificationFailure::new(FailureKind::from(&e)));
            }
        };

        match parse_result(&text) {
            Ok(result) => {
                stage.advance(ClassificationStage::Succeeded);
                Ok(result)
            }
            Err(e) => {
                log::error!("Error classifying weed: unparseable model output: {}", e);
                stage.advance(ClassificationStage::Failed);
                Err(ClassificationFailure::new(FailureKind::MalformedResponse))
            }
        }
    }
}

/// Structural decode only: every field must be present with its JSON type.
/// Values are passed through untouched.
pub fn parse_result(text: &str) -> Result<ClassificationResult, serde_json::Error> {
    serde_json::from_str(text.trim())
}

/// Encodes the raw image and classifies it in one step.
pub async fn classify_image(
    client: &ClassificationClient,
    image: &[u8],
    mime_type: ImageMimeType,
) -> Result<ClassificationResult, ClassificationFailure> {
    let stage = ClassificationStage::Idle.advance(ClassificationStage::Encoding);
    let payload = encoder::encode_bytes(image, mime_type);
    client.classify_from(stage, &payload).await
}
