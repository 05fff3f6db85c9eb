//! JSON shapes of the Gemini `generateContent` REST API.

use serde::{Deserialize, Serialize};

use crate::chat::core::data_uri::{DEFAULT_IMAGE_MIME, InlineImage};
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::message::{GroundingMetadata, GroundingSource};
use crate::llm::service::{Content, GenerationRequest, GenerationResponse, Part};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<WireGenerationConfig>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<WireBlob>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBlob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTool {
    google_search: EmptyObject,
}

#[derive(Debug, Serialize)]
struct EmptyObject {}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<WireThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<WireImageConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireImageConfig {
    aspect_ratio: String,
}

/// Full or partial response body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    #[serde(default)]
    error: Option<WireError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    #[serde(default)]
    content: Option<WireContent>,
    #[serde(default)]
    grounding_metadata: Option<WireGroundingMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireGroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<WireGroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct WireGroundingChunk {
    #[serde(default)]
    web: Option<WireWebSource>,
}

#[derive(Debug, Deserialize)]
struct WireWebSource {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(default)]
    message: String,
}

impl From<&Content> for WireContent {
    fn from(content: &Content) -> Self {
        Self {
            role: Some(content.role.as_str().to_string()),
            parts: content.parts.iter().map(WirePart::from).collect(),
        }
    }
}

impl From<&Part> for WirePart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text(text) => Self {
                text: Some(text.clone()),
                inline_data: None,
            },
            Part::InlineData(image) => Self {
                text: None,
                inline_data: Some(WireBlob {
                    mime_type: Some(image.mime_type.clone()),
                    data: image.data.clone(),
                }),
            },
        }
    }
}

impl From<&GenerationRequest> for WireRequest {
    fn from(request: &GenerationRequest) -> Self {
        let system_instruction = request.system_instruction.as_ref().map(|text| WireContent {
            role: None,
            parts: vec![WirePart {
                text: Some(text.clone()),
                inline_data: None,
            }],
        });

        let tools = if request.enable_search {
            vec![WireTool {
                google_search: EmptyObject {},
            }]
        } else {
            Vec::new()
        };

        let generation_config = WireGenerationConfig {
            thinking_config: request
                .thinking_budget
                .map(|thinking_budget| WireThinkingConfig { thinking_budget }),
            image_config: request
                .image_aspect_ratio
                .as_ref()
                .map(|aspect_ratio| WireImageConfig {
                    aspect_ratio: aspect_ratio.clone(),
                }),
        };
        let generation_config = (generation_config.thinking_config.is_some()
            || generation_config.image_config.is_some())
        .then_some(generation_config);

        Self {
            contents: request.contents.iter().map(WireContent::from).collect(),
            system_instruction,
            tools,
            generation_config,
        }
    }
}

impl WireResponse {
    /// Convert the first candidate into a domain response.
    ///
    /// # Errors
    /// Returns an error when the body carries an `error` object.
    pub(crate) fn into_response(self) -> ChatResult<GenerationResponse> {
        if let Some(error) = self.error {
            return Err(ChatError::Stream(error.message));
        }

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Ok(GenerationResponse::default());
        };

        let parts = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(WirePart::into_part)
            .collect();

        let grounding = candidate.grounding_metadata.map(|meta| GroundingMetadata {
            sources: meta
                .grounding_chunks
                .into_iter()
                .filter_map(|chunk| chunk.web)
                .filter_map(|web| {
                    let uri = web.uri?;
                    let title = web.title.unwrap_or_else(|| uri.clone());
                    Some(GroundingSource { uri, title })
                })
                .collect(),
        });

        Ok(GenerationResponse { parts, grounding })
    }
}

impl WirePart {
    fn into_part(self) -> Option<Part> {
        if let Some(blob) = self.inline_data.filter(|blob| !blob.data.is_empty()) {
            return Some(Part::InlineData(InlineImage {
                mime_type: blob
                    .mime_type
                    .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string()),
                data: blob.data,
            }));
        }
        self.text.map(Part::Text)
    }
}

/// Extract a readable message from an error body, falling back to the raw text.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<WireResponse>(body)
        .ok()
        .and_then(|response| response.error)
        .map_or_else(|| body.chars().take(512).collect(), |error| error.message)
}
