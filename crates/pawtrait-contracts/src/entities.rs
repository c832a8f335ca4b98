use serde::{Deserialize, Serialize};

/// Raw photo bytes as captured from user input. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl SourceImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// File-extension token the generation provider expects for this MIME type.
    pub fn extension(&self) -> &'static str {
        let lowered = self.mime_type.to_ascii_lowercase();
        if lowered.contains("png") {
            return "png";
        }
        if lowered.contains("webp") {
            return "webp";
        }
        if lowered.contains("gif") {
            return "gif";
        }
        if lowered.contains("bmp") {
            return "bmp";
        }
        "jpg"
    }
}

/// Bilingual visual description produced by the vision service.
///
/// `raw_text` is always the unmodified reply; the language segments may be
/// empty when the reply carried no usable markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Description {
    pub chinese_text: String,
    pub english_text: String,
    pub raw_text: String,
}

/// Provider-side reference to an uploaded image. Valid only for the session
/// of the provider that issued it.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadHandle {
    pub id: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Complete,
    Failed,
}

impl JobStatus {
    /// Maps a provider status string; anything unrecognized counts as
    /// still pending so the poll loop takes another tick.
    pub fn from_provider(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "COMPLETE" => JobStatus::Complete,
            "FAILED" => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Complete => "COMPLETE",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

/// Remote generation task as last observed from the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationJob {
    pub id: String,
    pub status: JobStatus,
    pub result_image_url: Option<String>,
}

/// One style element chosen for a request, weight already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSelection {
    pub ak_uuid: String,
    pub weight: f64,
}

/// Fully resolved job parameters submitted to the generation provider.
/// Built fresh per run and never mutated after submission.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub width: u32,
    pub height: u32,
    pub prompt: String,
    pub init_image_id: String,
    pub init_strength: f64,
    pub elements: Vec<ElementSelection>,
    pub style_reference_id: Option<String>,
    pub fast_mode: bool,
}

/// Terminal outcome of one end-to-end stylize run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    pub success: bool,
    pub image_url: Option<String>,
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

impl PipelineResult {
    pub fn completed(image_url: impl Into<String>, warnings: Vec<String>) -> Self {
        Self {
            success: true,
            image_url: Some(image_url.into()),
            error: None,
            warnings,
        }
    }

    pub fn failed(error: impl Into<String>, warnings: Vec<String>) -> Self {
        Self {
            success: false,
            image_url: None,
            error: Some(error.into()),
            warnings,
        }
    }
}

/// Observable stage of the stylize pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Analyzing,
    Generating,
    Polling,
    Complete,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Analyzing => "analyzing",
            RunState::Generating => "generating",
            RunState::Polling => "polling",
            RunState::Complete => "complete",
            RunState::Failed => "failed",
        }
    }
}
