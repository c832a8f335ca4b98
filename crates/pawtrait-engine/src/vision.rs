use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use pawtrait_contracts::entities::{Description, SourceImage};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};

use crate::config::VisionConfig;
use crate::error::PipelineError;
use crate::retry::send_with_retries;
use crate::{push_unique_warning, response_json_or_error};

pub const CHINESE_MARKER: &str = "[Chinese]";
pub const ENGLISH_MARKER: &str = "[English]";

/// Produces a bilingual description for a source photo.
pub trait VisionService: Send + Sync {
    fn describe(
        &self,
        image: &SourceImage,
        hint: Option<&str>,
        warnings: &mut Vec<String>,
    ) -> Result<Description, PipelineError>;
}

/// Client for an OpenAI-compatible chat-completions vision endpoint.
pub struct VisionClient {
    config: VisionConfig,
    http: HttpClient,
}

impl VisionClient {
    pub fn new(config: VisionConfig) -> Self {
        Self {
            config,
            http: HttpClient::new(),
        }
    }

    fn chat_endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_base)
    }

    fn request_payload(&self, image: &SourceImage, hint: Option<&str>) -> Value {
        let data_url = format!(
            "data:{};base64,{}",
            image.mime_type,
            BASE64.encode(&image.bytes)
        );
        let user_text = match hint.map(str::trim).filter(|value| !value.is_empty()) {
            Some(hint) => format!("{}\nExtra context from the owner: {hint}", describe_instruction()),
            None => describe_instruction().to_string(),
        };
        json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": bilingual_format_instruction()},
                {"role": "user", "content": [
                    {"type": "image_url", "image_url": {"url": data_url}},
                    {"type": "text", "text": user_text},
                ]},
            ],
            "max_tokens": self.config.max_tokens,
        })
    }
}

impl VisionService for VisionClient {
    fn describe(
        &self,
        image: &SourceImage,
        hint: Option<&str>,
        warnings: &mut Vec<String>,
    ) -> Result<Description, PipelineError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(PipelineError::MissingCredential("VISION_API_KEY"));
        };

        let endpoint = self.chat_endpoint();
        let payload = self.request_payload(image, hint);
        let response = send_with_retries(&self.config.retry, "vision describe", warnings, |_| {
            let response = self
                .http
                .post(&endpoint)
                .bearer_auth(api_key)
                .timeout(self.config.request_timeout)
                .json(&payload)
                .send()?;
            response_json_or_error(response)
        })?;

        let content = extract_message_content(&response).ok_or_else(|| {
            PipelineError::MalformedResponse("vision reply carries no message content".to_string())
        })?;
        Ok(split_bilingual(&content, warnings))
    }
}

fn bilingual_format_instruction() -> &'static str {
    "You describe pet photos for an image generator. Always answer with exactly two labeled segments and nothing else:\n[Chinese]<两三句中文描述>\n[English]<two or three English sentences>"
}

fn describe_instruction() -> &'static str {
    "Describe the animal in this photo for a portrait artist: species, breed traits, fur colors and markings, eye color, pose, expression, and any accessories. Keep each segment under 80 words."
}

fn extract_message_content(payload: &Value) -> Option<String> {
    payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(|row| row.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| {
            payload
                .get("content")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        })
}

/// Splits a vision reply into Chinese and English segments.
///
/// Prefers the `[Chinese]`/`[English]` markers in either order. Without
/// markers, the first mostly-meaningful ASCII line starts the English
/// segment. Without such a line both segments carry the full text, and
/// either fallback is surfaced as a warning. `raw_text` is always the
/// unmodified reply.
pub fn split_bilingual(raw: &str, warnings: &mut Vec<String>) -> Description {
    let trimmed = raw.trim();

    if let (Some(zh_idx), Some(en_idx)) = (trimmed.find(CHINESE_MARKER), trimmed.find(ENGLISH_MARKER))
    {
        let chinese = marker_segment(trimmed, zh_idx + CHINESE_MARKER.len(), en_idx, zh_idx);
        let english = marker_segment(trimmed, en_idx + ENGLISH_MARKER.len(), zh_idx, en_idx);
        return Description {
            chinese_text: chinese,
            english_text: english,
            raw_text: raw.to_string(),
        };
    }

    let lines: Vec<&str> = trimmed.lines().collect();
    if let Some(split_idx) = lines.iter().position(|line| looks_like_english_line(line)) {
        push_unique_warning(
            warnings,
            "vision reply had no language markers; split by line script.".to_string(),
        );
        return Description {
            chinese_text: lines[..split_idx].join("\n").trim().to_string(),
            english_text: lines[split_idx..].join("\n").trim().to_string(),
            raw_text: raw.to_string(),
        };
    }

    push_unique_warning(
        warnings,
        "vision reply had no language markers; using the full text for both segments.".to_string(),
    );
    Description {
        chinese_text: trimmed.to_string(),
        english_text: trimmed.to_string(),
        raw_text: raw.to_string(),
    }
}

/// Text following a marker, up to the other marker when it comes later.
fn marker_segment(text: &str, start: usize, other_idx: usize, own_idx: usize) -> String {
    let end = if other_idx > own_idx {
        other_idx
    } else {
        text.len()
    };
    text[start..end].trim().to_string()
}

fn looks_like_english_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.chars().count() >= 10
        && trimmed.is_ascii()
        && trimmed.chars().any(|ch| ch.is_ascii_alphabetic())
}
