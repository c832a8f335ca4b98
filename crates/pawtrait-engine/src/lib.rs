pub mod config;
pub mod error;
pub mod generation;
pub mod pipeline;
pub mod poll;
pub mod request;
pub mod retry;
pub mod vision;

pub use config::{EngineConfig, GenerationConfig, VisionConfig};
pub use error::PipelineError;
pub use generation::{download_image, DownloadedImage, GenerationClient, GenerationService};
pub use pipeline::{Pipeline, StylizeOptions};
pub use vision::{VisionClient, VisionService};

use pawtrait_contracts::events::EventPayload;
use reqwest::blocking::Response;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Decodes a provider reply, folding HTTP-level failures into the error
/// taxonomy. Bodies are truncated before they land in error messages.
pub(crate) fn response_json_or_error(response: Response) -> Result<Value, PipelineError> {
    let status = response.status();
    let body = response.text()?;
    if !status.is_success() {
        return Err(PipelineError::provider(
            status.as_u16(),
            truncate_text(&body, 512),
        ));
    }
    serde_json::from_str(&body).map_err(|err| {
        PipelineError::MalformedResponse(format!(
            "unparseable provider reply ({err}): {}",
            truncate_text(&body, 512)
        ))
    })
}

pub(crate) fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push('…');
    truncated
}

/// Appends a warning unless it is blank or already present.
pub(crate) fn push_unique_warning(warnings: &mut Vec<String>, warning: String) {
    let trimmed = warning.trim();
    if trimmed.is_empty() || warnings.iter().any(|existing| existing == trimmed) {
        return;
    }
    warnings.push(trimmed.to_string());
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Content digest used as the description-cache key.
pub(crate) fn image_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Pixel dimensions of an encoded image, if it decodes at all.
pub(crate) fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let decoded = image::load_from_memory(bytes).ok()?;
    Some((decoded.width(), decoded.height()))
}

pub(crate) fn map_object(value: Value) -> EventPayload {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
